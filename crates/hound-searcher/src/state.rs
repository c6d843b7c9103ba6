/// The Searcher state machine (§4.4). Transitions are driven entirely by
/// the supervisor's own background thread; nothing outside `Searcher`
/// writes this directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearcherState {
    /// First index is being built; no generation is current yet.
    Initializing,
    /// A committed generation is current and serving queries.
    Ready,
    /// Asking the `VcsDriver` for the remote head.
    Polling,
    /// Building a new generation.
    Reindexing,
    /// Draining: no longer polling, releasing the current index.
    Stopping,
    /// Terminal; the background thread has exited.
    Stopped,
    /// No committed generation exists (initial build, or every
    /// subsequent rebuild, failed).
    Failed,
}

impl SearcherState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearcherState::Initializing => "initializing",
            SearcherState::Ready => "ready",
            SearcherState::Polling => "polling",
            SearcherState::Reindexing => "reindexing",
            SearcherState::Stopping => "stopping",
            SearcherState::Stopped => "stopped",
            SearcherState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for SearcherState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
