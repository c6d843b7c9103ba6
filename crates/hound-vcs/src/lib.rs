//! The `VcsDriver` capability (§6): the core consumes a local working-copy
//! path and an opaque revision identifier, never the VCS plumbing itself.
//! Real git/mercurial/GitLab-API fetch invocation is explicitly out of
//! scope (§1) — this crate is the boundary, plus a minimal reference
//! implementation for single-machine setups and tests.

use std::path::Path;

use hound_core::Result;

/// A revision identifier, opaque to the core and compared only for
/// equality (§6).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionId(pub String);

impl std::fmt::Display for RevisionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Drives one repository's working copy (§6). Implementations fetch into
/// `workdir` and report the resulting revision; failures are distinguished
/// only by taxonomy (`NetworkError`/`AuthError`/`VcsError`), never by a
/// richer error type, since the Searcher only needs to decide whether to
/// log-and-backoff or proceed to reindex.
pub trait VcsDriver: Send + Sync {
    /// Brings `workdir` up to date with the upstream source and returns
    /// the revision now checked out. Must honor cancellation when it can
    /// (§5): a long-running fetch should poll `cancel` between the
    /// sub-steps it controls.
    fn pull(&self, workdir: &Path) -> Result<RevisionId>;
}

/// A reference `VcsDriver` that treats `url` as an already-checked-out
/// local directory path — the working copy lives in place, and the
/// "revision" is a cheap content fingerprint of the tree. Useful for
/// single-machine setups and for driving the Searcher/Indexer tests
/// without a real VCS.
pub struct LocalPathDriver {
    source: std::path::PathBuf,
}

impl LocalPathDriver {
    pub fn new(source: impl Into<std::path::PathBuf>) -> LocalPathDriver {
        LocalPathDriver {
            source: source.into(),
        }
    }
}

impl VcsDriver for LocalPathDriver {
    fn pull(&self, workdir: &Path) -> Result<RevisionId> {
        sync_tree(&self.source, workdir)?;
        let fingerprint = fingerprint_tree(workdir)?;
        Ok(RevisionId(fingerprint))
    }
}

fn sync_tree(source: &Path, workdir: &Path) -> Result<()> {
    if workdir.exists() {
        std::fs::remove_dir_all(workdir)?;
    }
    copy_dir_recursive(source, workdir)
}

fn copy_dir_recursive(source: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(source)? {
        let entry = entry?;
        let dest_path = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), dest_path)?;
        }
    }
    Ok(())
}

/// A stable fingerprint of file paths and mtimes, standing in for a real
/// VCS revision hash — sufficient for the Searcher's equality check.
fn fingerprint_tree(root: &Path) -> Result<String> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut entries = Vec::new();
    collect_entries(root, root, &mut entries)?;
    entries.sort();

    let mut hasher = DefaultHasher::new();
    for entry in &entries {
        entry.hash(&mut hasher);
    }
    Ok(format!("{:016x}", hasher.finish()))
}

fn collect_entries(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_entries(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root).unwrap_or(&path);
            let mtime = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);
            out.push(format!("{}:{}", relative.display(), mtime));
        }
    }
    Ok(())
}
