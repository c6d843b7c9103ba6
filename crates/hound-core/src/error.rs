use std::io;

/// The Hound error taxonomy (§7). Each variant carries its own propagation
/// policy, enforced by callers rather than the type system: `CorruptIndex`
/// always triggers a rebuild and is never fatal; `ConfigInvalid` is always
/// fatal at startup; `Unavailable` and `QueryInvalid` are always surfaced
/// to the caller rather than logged as errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("vcs error: {0}")]
    Vcs(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("invalid query: {0}")]
    QueryInvalid(String),

    #[error("repository unavailable: {0}")]
    Unavailable(String),

    #[error("unknown file id {0}")]
    UnknownFileId(u32),

    #[error("canceled")]
    Canceled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error should be logged at `error` level. `Canceled` is
    /// cooperative and `Unavailable` is an expected per-repo condition
    /// reported alongside otherwise-successful results (§7).
    pub fn is_error_level(&self) -> bool {
        !matches!(self, Error::Canceled | Error::Unavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
