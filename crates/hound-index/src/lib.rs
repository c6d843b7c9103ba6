pub mod builder;
pub mod candidates;
pub mod confirm;
pub mod file_table;
pub mod manifest;
pub mod query_lower;
pub mod store;
pub mod trigram;
pub mod varint;

pub use builder::IndexBuilder;
pub use candidates::CandidateSet;
pub use confirm::Match;
pub use file_table::{FileId, FileRecord};
pub use query_lower::TrigramQuery;
pub use store::IndexReader;
pub use trigram::Trigram;
