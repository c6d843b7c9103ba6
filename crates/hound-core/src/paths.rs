use std::path::{Path, PathBuf};

/// Directory under `dbpath` holding every generation of one repo's index.
pub fn repo_dir(dbpath: &Path, repo_name: &str) -> PathBuf {
    dbpath.join(repo_name)
}

/// A fresh staging directory for a new generation, per §4.3:
/// `<dbpath>/<repo>/idx-<revision>-<nonce>/`.
pub fn staging_dir(dbpath: &Path, repo_name: &str, revision: &str, nonce: u64) -> PathBuf {
    repo_dir(dbpath, repo_name).join(format!("idx-{revision}-{nonce:x}"))
}

/// The small pointer file naming the active generation directory (§6).
pub fn current_pointer(dbpath: &Path, repo_name: &str) -> PathBuf {
    repo_dir(dbpath, repo_name).join("current")
}

/// Default control-socket path, overridable via `HOUND_DIR`.
pub fn hound_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("HOUND_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".hound")
}

pub fn socket_path() -> PathBuf {
    hound_dir().join("houndd.sock")
}

pub fn pid_file_path() -> PathBuf {
    hound_dir().join("houndd.pid")
}

/// Serializes tests that mutate `HOUND_DIR`, since the env var is process-wide
/// but `cargo test` runs cases concurrently in threads.
#[doc(hidden)]
pub fn test_env_lock() -> std::sync::MutexGuard<'static, ()> {
    use std::sync::{Mutex, OnceLock};
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(())).lock().unwrap()
}
