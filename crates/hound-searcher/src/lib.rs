//! The per-repository supervisor (§4.4) and the cross-repo query engine
//! (§4.5) built on top of it. This crate is the glue layer named
//! "Searcher" / "SearcherRegistry" / "QueryEngine" in §2's component
//! diagram — everything below it (`hound-index`, `hound-indexer`,
//! `hound-vcs`) is agnostic to the fact that many repos exist at once.

mod backoff;
mod query;
mod registry;
mod searcher;
mod state;

pub use backoff::Backoff;
pub use query::{QueryEngine, SearchRequest, SearchResponse};
pub use registry::SearcherRegistry;
pub use searcher::{RepoStatus, Searcher};
pub use state::SearcherState;
