//! Resolves each repo's configured `vcs` selector to a concrete
//! `VcsDriver` (§6). Real git/mercurial/GitLab-API fetch plumbing is out
//! of scope for this repository (§1) — the core only depends on the
//! trait. `local` is the one driver this binary ships, intended for
//! single-machine setups and for exercising the rest of the pipeline
//! against a plain directory. Any other selector resolves to a driver
//! that always reports `VcsError`, so the owning Searcher lands in
//! `Failed` and is reported `Unavailable` per §7 rather than refusing to
//! start the whole daemon.

use std::path::Path;
use std::sync::Arc;

use hound_core::{Error, RepoConfig, Result};
use hound_vcs::{LocalPathDriver, RevisionId, VcsDriver};

struct UnsupportedDriver {
    vcs: String,
}

impl VcsDriver for UnsupportedDriver {
    fn pull(&self, _workdir: &Path) -> Result<RevisionId> {
        Err(Error::Vcs(format!(
            "no driver for vcs = \"{}\"; real VCS plumbing is out of scope for houndd, \
             configure vcs = \"local\" or supply a driver out of process",
            self.vcs
        )))
    }
}

pub fn build(repo: &RepoConfig) -> Arc<dyn VcsDriver> {
    match repo.vcs.as_str() {
        "local" => Arc::new(LocalPathDriver::new(&repo.url)),
        other => Arc::new(UnsupportedDriver {
            vcs: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(vcs: &str, url: &str) -> RepoConfig {
        RepoConfig {
            url: url.to_string(),
            display_name: None,
            ms_between_poll: 30_000,
            vcs: vcs.to_string(),
            url_pattern: Default::default(),
            exclude_dot_files: false,
            enable_poll_updates: true,
            enable_push_updates: false,
            auto_generated_files: Vec::new(),
            max_file_bytes: 5 * 1024 * 1024,
        }
    }

    #[test]
    fn local_vcs_builds_a_working_driver() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"hi").unwrap();
        let driver = build(&repo("local", dir.path().to_str().unwrap()));
        let workdir = tempfile::tempdir().unwrap();
        assert!(driver.pull(&workdir.path().join("wc")).is_ok());
    }

    #[test]
    fn unsupported_vcs_fails_pull_with_vcs_error() {
        let driver = build(&repo("git", "https://example.test/repo.git"));
        let workdir = tempfile::tempdir().unwrap();
        assert!(matches!(
            driver.pull(&workdir.path().join("wc")),
            Err(Error::Vcs(_))
        ));
    }
}
