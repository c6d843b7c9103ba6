//! Daemon lifecycle helpers shared by `houndd` and `hound` (§10.1): where
//! the pid file and control socket live, and whether a daemon is already
//! running there. Starting/stopping a background process is the CLI's
//! concern; this module only inspects state, it never spawns anything.

use std::fs;

use crate::paths;

/// Writes the running process's pid to the pid file, creating parent
/// directories as needed.
pub fn write_pid(pid: u32) -> std::io::Result<()> {
    let path = paths::pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, pid.to_string())
}

pub fn remove_pid_file() -> std::io::Result<()> {
    let path = paths::pid_file_path();
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub fn read_pid() -> Option<u32> {
    fs::read_to_string(paths::pid_file_path())
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Whether a process is listening on the control socket. This is the only
/// reliable "is a daemon running" check available without signalling a
/// pid that may have been reused by an unrelated process.
pub fn is_running() -> bool {
    #[cfg(unix)]
    {
        std::os::unix::net::UnixStream::connect(paths::socket_path()).is_ok()
    }
    #[cfg(not(unix))]
    {
        false
    }
}
