pub mod filters;

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use hound_core::{Error, RepoConfig, Result};
use hound_index::{IndexBuilder, IndexReader};
use walkdir::WalkDir;

/// Drives one index build (§4.3): walks `working_copy_root` in
/// deterministic per-directory sorted order, applies the §4.2 acceptance
/// filters, streams accepted files into a fresh `IndexBuilder` rooted at
/// `staging_dir`, and returns the committed generation's reader.
pub struct Indexer;

impl Indexer {
    pub fn build(
        working_copy_root: &Path,
        staging_dir: &Path,
        generation: u32,
        repo: &RepoConfig,
        cancel: &AtomicBool,
    ) -> Result<IndexReader> {
        let mut builder = IndexBuilder::begin(staging_dir, generation, repo.max_file_bytes)?;

        let walker = WalkDir::new(working_copy_root)
            .follow_links(false)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()));

        for entry in walker {
            if cancel.load(Ordering::Relaxed) {
                builder.abort()?;
                return Err(Error::Canceled);
            }

            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::debug!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let relative = match entry.path().strip_prefix(working_copy_root) {
                Ok(p) => p,
                Err(_) => continue,
            };
            let relative_path = relative.to_string_lossy().replace('\\', "/");

            if !filters::path_is_acceptable(&relative_path, repo) {
                tracing::debug!(path = %relative_path, "excluded by filter");
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(path = %relative_path, error = %e, "skipping unreadable file");
                    continue;
                }
            };
            if metadata.len() > repo.max_file_bytes {
                tracing::debug!(path = %relative_path, size = metadata.len(), "skipping oversized file");
                continue;
            }

            let bytes = match std::fs::read(entry.path()) {
                Ok(b) => b,
                Err(e) => {
                    tracing::debug!(path = %relative_path, error = %e, "skipping unreadable file");
                    continue;
                }
            };

            if filters::is_binary(&bytes) {
                tracing::debug!(path = %relative_path, "skipping binary file");
                continue;
            }

            let mtime = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);

            if let Err(e) = builder.add_file(&relative_path, &bytes, mtime) {
                tracing::warn!(path = %relative_path, error = %e, "skipping file rejected by builder");
            }
        }

        let committed = builder.finish()?;
        IndexReader::open(&committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::atomic::AtomicBool;

    fn default_repo() -> RepoConfig {
        RepoConfig {
            url: "https://example.test".to_string(),
            display_name: None,
            ms_between_poll: 30_000,
            vcs: "git".to_string(),
            url_pattern: Default::default(),
            exclude_dot_files: true,
            enable_poll_updates: true,
            enable_push_updates: false,
            auto_generated_files: vec!["*.generated.rs".to_string()],
            max_file_bytes: 5 * 1024 * 1024,
        }
    }

    #[test]
    fn builds_index_skipping_dotfiles_and_binaries() {
        let working_copy = tempfile::tempdir().unwrap();
        fs::write(working_copy.path().join("a.txt"), b"hello world").unwrap();
        fs::write(working_copy.path().join(".secret"), b"shh").unwrap();
        fs::write(working_copy.path().join("img.bin"), b"\0\0\0binary").unwrap();
        fs::write(
            working_copy.path().join("schema.generated.rs"),
            b"generated code",
        )
        .unwrap();

        let staging = tempfile::tempdir().unwrap();
        let reader = Indexer::build(
            working_copy.path(),
            &staging.path().join("idx-rev1-1"),
            1,
            &default_repo(),
            &AtomicBool::new(false),
        )
        .unwrap();

        let paths: Vec<&str> = reader.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt"]);
    }

    #[test]
    fn walks_nested_directories_in_sorted_order() {
        let working_copy = tempfile::tempdir().unwrap();
        fs::create_dir_all(working_copy.path().join("b")).unwrap();
        fs::create_dir_all(working_copy.path().join("a")).unwrap();
        fs::write(working_copy.path().join("b/file.txt"), b"x").unwrap();
        fs::write(working_copy.path().join("a/file.txt"), b"y").unwrap();

        let staging = tempfile::tempdir().unwrap();
        let reader = Indexer::build(
            working_copy.path(),
            &staging.path().join("idx-rev1-1"),
            1,
            &default_repo(),
            &AtomicBool::new(false),
        )
        .unwrap();

        let paths: Vec<&str> = reader.files().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a/file.txt", "b/file.txt"]);
    }

    #[test]
    fn cancellation_aborts_without_leaving_staging_directory() {
        let working_copy = tempfile::tempdir().unwrap();
        fs::write(working_copy.path().join("a.txt"), b"hello").unwrap();

        let staging_root = tempfile::tempdir().unwrap();
        let staging = staging_root.path().join("idx-rev1-1");
        let cancel = AtomicBool::new(true);
        let result = Indexer::build(working_copy.path(), &staging, 1, &default_repo(), &cancel);
        assert!(matches!(result, Err(Error::Canceled)));
        assert!(!staging.exists());
    }
}
