use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use hound_core::{Error, RepoConfig, Result};
use hound_index::IndexReader;
use hound_indexer::Indexer;
use hound_vcs::{RevisionId, VcsDriver};

use crate::backoff::Backoff;
use crate::state::SearcherState;

const POLL_STEP: Duration = Duration::from_millis(200);

/// One committed generation currently published as "current" (§3).
struct CurrentGeneration {
    reader: Arc<IndexReader>,
    revision: RevisionId,
    dir: PathBuf,
}

/// A generation superseded by a newer one, kept alive until the last
/// outstanding `current()` handle referencing it is dropped (§3, §9).
struct RetiredGeneration {
    reader: Arc<IndexReader>,
    dir: PathBuf,
}

/// A snapshot of a Searcher's health, as surfaced by the control plane
/// (§10.6).
#[derive(Debug, Clone)]
pub struct RepoStatus {
    pub name: String,
    pub state: SearcherState,
    pub last_indexed_revision: Option<String>,
    pub last_error: Option<String>,
}

/// The per-repository supervisor (§4.4): owns the current `IndexReader`,
/// schedules fetches via its `VcsDriver`, triggers reindex when the
/// remote revision changes, and performs atomic swap under a
/// readers/writer discipline.
pub struct Searcher {
    name: String,
    dbpath: PathBuf,
    repo: RepoConfig,
    vcs: Arc<dyn VcsDriver>,

    state: Mutex<SearcherState>,
    current: RwLock<Option<CurrentGeneration>>,
    retire_queue: Mutex<Vec<RetiredGeneration>>,

    reindex_requested: AtomicBool,
    shutdown: AtomicBool,
    build_cancel: Arc<AtomicBool>,

    generation_counter: AtomicU32,
    nonce_counter: AtomicU64,
    last_error: Mutex<Option<String>>,

    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Searcher {
    /// Spawns the background scheduler thread and returns immediately;
    /// the Searcher starts in `Initializing` and transitions to `Ready`
    /// or `Failed` once the first build completes (§4.4).
    pub fn spawn(name: String, dbpath: PathBuf, repo: RepoConfig, vcs: Arc<dyn VcsDriver>) -> Arc<Searcher> {
        let searcher = Arc::new(Searcher {
            name,
            dbpath,
            repo,
            vcs,
            state: Mutex::new(SearcherState::Initializing),
            current: RwLock::new(None),
            retire_queue: Mutex::new(Vec::new()),
            reindex_requested: AtomicBool::new(false),
            shutdown: AtomicBool::new(false),
            build_cancel: Arc::new(AtomicBool::new(false)),
            generation_counter: AtomicU32::new(0),
            nonce_counter: AtomicU64::new(0),
            last_error: Mutex::new(None),
            thread: Mutex::new(None),
        });

        let worker = Arc::clone(&searcher);
        let handle = std::thread::spawn(move || worker.run());
        *searcher.thread.lock().unwrap() = Some(handle);
        searcher
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SearcherState {
        *self.state.lock().unwrap()
    }

    pub fn status(&self) -> RepoStatus {
        let last_indexed_revision = self
            .current
            .read()
            .unwrap()
            .as_ref()
            .map(|g| g.revision.0.clone());
        RepoStatus {
            name: self.name.clone(),
            state: self.state(),
            last_indexed_revision,
            last_error: self.last_error.lock().unwrap().clone(),
        }
    }

    /// Returns a handle to the current generation. The returned `Arc`
    /// prevents retirement of this generation for as long as the caller
    /// holds it (§3, §4.4).
    pub fn current(&self) -> Result<Arc<IndexReader>> {
        self.current
            .read()
            .unwrap()
            .as_ref()
            .map(|g| g.reader.clone())
            .ok_or_else(|| Error::Unavailable(self.name.clone()))
    }

    /// Idempotent: coalesces with any rebuild already in flight or
    /// already requested (§4.4).
    pub fn trigger_reindex(&self) {
        self.reindex_requested.store(true, Ordering::SeqCst);
    }

    /// Stops polling, cancels an in-flight reindex at the next file
    /// boundary, and signals the background thread to wind down.
    /// Existing `current()` handles remain valid until their owners drop
    /// them (§5).
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.build_cancel.store(true, Ordering::SeqCst);
    }

    /// Blocks until the background thread has exited.
    pub fn wait(&self) {
        let handle = self.thread.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn set_state(&self, state: SearcherState) {
        *self.state.lock().unwrap() = state;
        tracing::info!(repo = %self.name, state = %state, "searcher state transition");
    }

    fn workdir(&self) -> PathBuf {
        hound_core::paths::repo_dir(&self.dbpath, &self.name).join("workdir")
    }

    /// Removes any `idx-*` staging directory left over from a previous
    /// process that never reached `finish()` (no `manifest` file), per §6:
    /// "absence [of manifest] ⇒ incomplete generation, eligible for GC on
    /// startup." Runs once, before the first build, so a crash mid-reindex
    /// doesn't leak disk space across restarts.
    fn gc_incomplete_generations(&self) {
        let repo_dir = hound_core::paths::repo_dir(&self.dbpath, &self.name);
        let entries = match std::fs::read_dir(&repo_dir) {
            Ok(entries) => entries,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let is_generation_dir = entry
                .file_name()
                .to_str()
                .map(|n| n.starts_with("idx-"))
                .unwrap_or(false);
            if !is_generation_dir || !path.is_dir() {
                continue;
            }
            if !path.join("manifest").exists() {
                tracing::info!(repo = %self.name, dir = %path.display(), "removing incomplete generation left from a previous run");
                if let Err(e) = std::fs::remove_dir_all(&path) {
                    tracing::warn!(repo = %self.name, dir = %path.display(), error = %e, "failed to remove incomplete generation");
                }
            }
        }
    }

    fn run(self: Arc<Self>) {
        self.set_state(SearcherState::Initializing);
        self.gc_incomplete_generations();
        let mut backoff = Backoff::new();

        match self.fetch_and_build() {
            Ok(()) => {
                backoff.reset();
                self.set_state(SearcherState::Ready);
            }
            Err(e) => {
                self.record_error(&e);
                self.set_state(SearcherState::Failed);
            }
        }

        let mut next_retry_at: Option<std::time::Instant> = None;

        while !self.shutdown.load(Ordering::SeqCst) {
            self.drain_retire_queue();

            if self.reindex_requested.swap(false, Ordering::SeqCst) {
                self.set_state(SearcherState::Reindexing);
                match self.fetch_and_build() {
                    Ok(()) => {
                        backoff.reset();
                        next_retry_at = None;
                        self.set_state(SearcherState::Ready);
                    }
                    Err(e) => {
                        self.record_error(&e);
                        next_retry_at = Some(std::time::Instant::now() + backoff.advance());
                        self.set_state(self.state_after_failed_build());
                    }
                }
                continue;
            }

            if let Some(due) = next_retry_at {
                if std::time::Instant::now() >= due {
                    self.reindex_requested.store(true, Ordering::SeqCst);
                    continue;
                }
            }

            if self.repo.enable_poll_updates {
                self.set_state(SearcherState::Polling);
                match self.poll_once() {
                    Ok(changed) => {
                        if changed {
                            self.reindex_requested.store(true, Ordering::SeqCst);
                            continue;
                        }
                        self.set_state(self.state_after_poll());
                    }
                    Err(e) => {
                        self.record_error(&e);
                        self.set_state(self.state_after_poll());
                    }
                }
            }

            self.sleep_interruptible(Duration::from_millis(self.repo.ms_between_poll));
        }

        self.set_state(SearcherState::Stopping);
        *self.current.write().unwrap() = None;
        self.drain_retire_queue();
        self.set_state(SearcherState::Stopped);
    }

    fn state_after_failed_build(&self) -> SearcherState {
        if self.current.read().unwrap().is_some() {
            SearcherState::Ready
        } else {
            SearcherState::Failed
        }
    }

    fn state_after_poll(&self) -> SearcherState {
        self.state_after_failed_build()
    }

    fn sleep_interruptible(&self, total: Duration) {
        let mut slept = Duration::ZERO;
        while slept < total {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let step = POLL_STEP.min(total - slept);
            std::thread::sleep(step);
            slept += step;
        }
    }

    fn record_error(&self, e: &Error) {
        if e.is_error_level() {
            tracing::warn!(repo = %self.name, error = %e, "searcher error");
        }
        *self.last_error.lock().unwrap() = Some(e.to_string());
    }

    /// Compares the upstream revision to the current generation's
    /// source revision without building anything (§4.4 polling cycle).
    fn poll_once(&self) -> Result<bool> {
        let revision = self.vcs.pull(&self.workdir())?;
        let changed = match self.current.read().unwrap().as_ref() {
            Some(cur) => cur.revision != revision,
            None => true,
        };
        Ok(changed)
    }

    /// Fetches the latest revision and unconditionally builds a fresh
    /// generation from it, then performs the atomic swap (§4.4).
    fn fetch_and_build(&self) -> Result<()> {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(Error::Canceled);
        }

        let workdir = self.workdir();
        let revision = self.vcs.pull(&workdir)?;

        let generation = self.generation_counter.fetch_add(1, Ordering::SeqCst) + 1;
        let nonce = self.nonce_counter.fetch_add(1, Ordering::SeqCst);
        let staging = hound_core::paths::staging_dir(&self.dbpath, &self.name, &revision.0, nonce);

        self.build_cancel.store(false, Ordering::SeqCst);
        let reader = Indexer::build(&workdir, &staging, generation, &self.repo, &self.build_cancel)?;
        fsync_dir(&staging)?;

        let reader = Arc::new(reader);
        {
            let mut current = self.current.write().unwrap();
            if let Some(old) = current.take() {
                self.retire_queue.lock().unwrap().push(RetiredGeneration {
                    reader: old.reader,
                    dir: old.dir,
                });
            }
            *current = Some(CurrentGeneration {
                reader,
                revision,
                dir: staging.clone(),
            });
        }
        self.write_current_pointer(&staging)?;
        self.drain_retire_queue();
        Ok(())
    }

    fn write_current_pointer(&self, staging: &std::path::Path) -> Result<()> {
        let pointer = hound_core::paths::current_pointer(&self.dbpath, &self.name);
        if let Some(parent) = pointer.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(pointer, staging.as_os_str().as_encoded_bytes())?;
        Ok(())
    }

    /// Drops any retired generation whose only remaining reference is
    /// the retire-queue entry itself, unmapping its files and deleting
    /// its directory (§3, §4.4, §9).
    fn drain_retire_queue(&self) {
        let mut queue = self.retire_queue.lock().unwrap();
        queue.retain(|gen| {
            if Arc::strong_count(&gen.reader) > 1 {
                return true;
            }
            if let Err(e) = std::fs::remove_dir_all(&gen.dir) {
                tracing::warn!(repo = %self.name, dir = %gen.dir.display(), error = %e, "failed to remove retired generation");
            }
            false
        });
    }
}

fn fsync_dir(dir: &std::path::Path) -> Result<()> {
    let file = std::fs::File::open(dir)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound_vcs::LocalPathDriver;
    use std::time::Instant;

    fn wait_for<F: Fn() -> bool>(timeout: Duration, cond: F) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn repo_config() -> RepoConfig {
        RepoConfig {
            url: "local".to_string(),
            display_name: None,
            ms_between_poll: 50,
            vcs: "local".to_string(),
            url_pattern: Default::default(),
            exclude_dot_files: false,
            enable_poll_updates: true,
            enable_push_updates: false,
            auto_generated_files: Vec::new(),
            max_file_bytes: 5 * 1024 * 1024,
        }
    }

    #[test]
    fn becomes_ready_after_initial_build() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"hello world").unwrap();

        let dbpath = tempfile::tempdir().unwrap();
        let driver = Arc::new(LocalPathDriver::new(source.path()));
        let searcher = Searcher::spawn("repo1".to_string(), dbpath.path().to_path_buf(), repo_config(), driver);

        assert!(wait_for(Duration::from_secs(5), || searcher.state() == SearcherState::Ready));
        let reader = searcher.current().unwrap();
        assert_eq!(reader.files().len(), 1);

        searcher.stop();
        searcher.wait();
    }

    #[test]
    fn unavailable_before_first_build_completes() {
        // A Searcher whose VcsDriver always fails never reaches Ready.
        struct FailingDriver;
        impl VcsDriver for FailingDriver {
            fn pull(&self, _workdir: &std::path::Path) -> Result<RevisionId> {
                Err(Error::Network("simulated failure".into()))
            }
        }

        let dbpath = tempfile::tempdir().unwrap();
        let mut repo = repo_config();
        repo.ms_between_poll = 10_000_000; // avoid a retry racing the assertion
        let searcher = Searcher::spawn("repo2".to_string(), dbpath.path().to_path_buf(), repo, Arc::new(FailingDriver));

        assert!(wait_for(Duration::from_secs(5), || searcher.state() == SearcherState::Failed));
        assert!(matches!(searcher.current(), Err(Error::Unavailable(_))));

        searcher.stop();
        searcher.wait();
    }

    #[test]
    fn trigger_reindex_picks_up_new_content() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"version one").unwrap();

        let dbpath = tempfile::tempdir().unwrap();
        let mut repo = repo_config();
        repo.ms_between_poll = 10_000_000;
        let driver = Arc::new(LocalPathDriver::new(source.path()));
        let searcher = Searcher::spawn("repo3".to_string(), dbpath.path().to_path_buf(), repo, driver);

        assert!(wait_for(Duration::from_secs(5), || searcher.state() == SearcherState::Ready));
        let first_gen = searcher.current().unwrap().generation();

        std::fs::write(source.path().join("b.txt"), b"version two").unwrap();
        searcher.trigger_reindex();

        assert!(wait_for(Duration::from_secs(5), || {
            searcher.current().map(|r| r.files().len()).unwrap_or(0) == 2
        }));
        assert_ne!(searcher.current().unwrap().generation(), first_gen);

        searcher.stop();
        searcher.wait();
    }

    #[test]
    fn retired_generation_survives_until_handle_dropped() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"version one").unwrap();

        let dbpath = tempfile::tempdir().unwrap();
        let mut repo = repo_config();
        repo.ms_between_poll = 10_000_000;
        let driver = Arc::new(LocalPathDriver::new(source.path()));
        let searcher = Searcher::spawn("repo4".to_string(), dbpath.path().to_path_buf(), repo, driver);

        assert!(wait_for(Duration::from_secs(5), || searcher.state() == SearcherState::Ready));
        let old_reader = searcher.current().unwrap();
        let old_dir = old_reader.dir().to_path_buf();

        std::fs::write(source.path().join("b.txt"), b"version two").unwrap();
        searcher.trigger_reindex();

        assert!(wait_for(Duration::from_secs(5), || {
            searcher.current().map(|r| r.generation()).unwrap_or(0) != old_reader.generation()
        }));

        // The old generation's directory must still exist: our handle
        // keeps its refcount above 1.
        assert!(old_dir.exists());
        drop(old_reader);

        searcher.stop();
        searcher.wait();
    }

    #[test]
    fn startup_removes_incomplete_generation_directories() {
        let source = tempfile::tempdir().unwrap();
        std::fs::write(source.path().join("a.txt"), b"hello").unwrap();

        let dbpath = tempfile::tempdir().unwrap();
        let repo_dir = hound_core::paths::repo_dir(dbpath.path(), "repo5");
        let stale = repo_dir.join("idx-deadbeef-1");
        std::fs::create_dir_all(&stale).unwrap();
        std::fs::write(stale.join("files"), b"partial").unwrap();
        // No `manifest` written: this generation never finished building.

        let mut repo = repo_config();
        repo.ms_between_poll = 10_000_000;
        let driver = Arc::new(LocalPathDriver::new(source.path()));
        let searcher = Searcher::spawn("repo5".to_string(), dbpath.path().to_path_buf(), repo, driver);

        assert!(wait_for(Duration::from_secs(5), || searcher.state() == SearcherState::Ready));
        assert!(!stale.exists());

        searcher.stop();
        searcher.wait();
    }
}
