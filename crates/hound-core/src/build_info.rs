use serde::{Deserialize, Serialize};

/// Version and provenance of the running binary, embedded at compile time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub version: &'static str,
    pub git_sha: &'static str,
    pub timestamp: &'static str,
    pub target: &'static str,
}

pub const CURRENT: BuildInfo = BuildInfo {
    version: env!("CARGO_PKG_VERSION"),
    git_sha: env!("HOUND_BUILD_GIT_SHA"),
    timestamp: env!("HOUND_BUILD_TIMESTAMP"),
    target: env!("HOUND_BUILD_TARGET"),
};
