use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use hound_core::{Config, Error, Result};
use hound_vcs::VcsDriver;

use crate::searcher::{RepoStatus, Searcher};

/// Owns one `Searcher` per configured repository (§2's "SearcherRegistry"),
/// keyed by repo name and iterated in a stable (`BTreeMap`) order so that
/// cross-repo results are deterministic without an extra sort step (§5).
pub struct SearcherRegistry {
    searchers: BTreeMap<String, Arc<Searcher>>,
}

impl SearcherRegistry {
    /// Spawns a `Searcher` for every entry in `config.repos`. `drivers`
    /// supplies the already-constructed `VcsDriver` for each repo name;
    /// wiring concrete VCS plumbing (git/hg/http) is the caller's job, not
    /// this crate's (§1, §6).
    pub fn spawn(
        config: &Config,
        drivers: BTreeMap<String, Arc<dyn VcsDriver>>,
    ) -> Result<SearcherRegistry> {
        let mut searchers = BTreeMap::new();
        for (name, repo) in &config.repos {
            let driver = drivers
                .get(name)
                .cloned()
                .ok_or_else(|| Error::ConfigInvalid(format!("repo {name}: no vcs driver supplied")))?;
            let searcher = Searcher::spawn(name.clone(), dbpath(config), repo.clone(), driver);
            searchers.insert(name.clone(), searcher);
        }
        Ok(SearcherRegistry { searchers })
    }

    pub fn get(&self, name: &str) -> Option<Arc<Searcher>> {
        self.searchers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.searchers.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<Searcher>)> {
        self.searchers.iter()
    }

    pub fn statuses(&self) -> Vec<RepoStatus> {
        self.searchers.values().map(|s| s.status()).collect()
    }

    /// Requests a rebuild of one repo, or every repo when `repo` is `None`
    /// (§10.6's `Reindex` control request).
    pub fn trigger_reindex(&self, repo: Option<&str>) -> Result<()> {
        match repo {
            Some(name) => {
                let searcher = self
                    .get(name)
                    .ok_or_else(|| Error::Other(format!("unknown repo {name}")))?;
                searcher.trigger_reindex();
                Ok(())
            }
            None => {
                for searcher in self.searchers.values() {
                    searcher.trigger_reindex();
                }
                Ok(())
            }
        }
    }

    /// Signals every Searcher to stop and blocks until all of their
    /// background threads have exited (§10.6's `Shutdown` control request).
    pub fn stop_all(&self) {
        for searcher in self.searchers.values() {
            searcher.stop();
        }
        for searcher in self.searchers.values() {
            searcher.wait();
        }
    }
}

fn dbpath(config: &Config) -> PathBuf {
    config.dbpath.clone()
}
