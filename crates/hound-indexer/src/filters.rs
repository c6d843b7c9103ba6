use hound_core::glob;
use hound_core::RepoConfig;

/// A file is binary if its first 8 KiB contains a NUL byte or more than
/// 30% of sampled bytes fall outside {tab, newline, 0x20-0x7E, valid UTF-8
/// continuation bytes} (§4.2).
pub fn is_binary(bytes: &[u8]) -> bool {
    let sample_len = bytes.len().min(8192);
    let sample = &bytes[..sample_len];
    if sample.is_empty() {
        return false;
    }
    if sample.contains(&0u8) {
        return true;
    }
    let bad = sample.iter().filter(|&&b| !is_text_byte(b)).count();
    (bad as f64) / (sample.len() as f64) > 0.30
}

fn is_text_byte(b: u8) -> bool {
    b == b'\t' || b == b'\n' || b == b'\r' || (0x20..=0x7E).contains(&b) || b >= 0x80
}

/// Whether `relative_path` should be indexed at all, per `exclude-dot-files`
/// and `auto-generated-files` (§4.2). Size and binary-content checks need
/// the file's bytes and are applied separately once read.
pub fn path_is_acceptable(relative_path: &str, repo: &RepoConfig) -> bool {
    if repo.exclude_dot_files && glob::has_dot_segment(relative_path) {
        return false;
    }
    if glob::matches_any_component(&repo.auto_generated_files, relative_path) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(auto_generated: &[&str], exclude_dot_files: bool) -> RepoConfig {
        RepoConfig {
            url: "https://example.test".to_string(),
            display_name: None,
            ms_between_poll: 30_000,
            vcs: "git".to_string(),
            url_pattern: Default::default(),
            exclude_dot_files,
            enable_poll_updates: true,
            enable_push_updates: false,
            auto_generated_files: auto_generated.iter().map(|s| s.to_string()).collect(),
            max_file_bytes: 5 * 1024 * 1024,
        }
    }

    #[test]
    fn plain_text_is_not_binary() {
        assert!(!is_binary(b"hello world\nline two\n"));
    }

    #[test]
    fn nul_byte_marks_binary() {
        assert!(is_binary(b"abc\0def"));
    }

    #[test]
    fn mostly_high_bytes_marks_binary() {
        let bytes: Vec<u8> = (0..100).map(|i| if i % 3 == 0 { b'a' } else { 0x01 }).collect();
        assert!(is_binary(&bytes));
    }

    #[test]
    fn empty_file_is_not_binary() {
        assert!(!is_binary(b""));
    }

    #[test]
    fn dotfile_excluded_when_configured() {
        let repo = repo(&[], true);
        assert!(!path_is_acceptable(".gitignore", &repo));
        assert!(!path_is_acceptable("src/.hidden/x.rs", &repo));
        assert!(path_is_acceptable("src/lib.rs", &repo));
    }

    #[test]
    fn dotfile_kept_when_not_configured() {
        let repo = repo(&[], false);
        assert!(path_is_acceptable(".gitignore", &repo));
    }

    #[test]
    fn auto_generated_glob_excludes() {
        let repo = repo(&["*.pb.go", "vendor*"], false);
        assert!(!path_is_acceptable("api/service.pb.go", &repo));
        assert!(!path_is_acceptable("vendor_bundle.js", &repo));
        assert!(path_is_acceptable("src/main.rs", &repo));
    }
}
