//! Vector index layer — Qdrant client, filter construction, and the
//! collection controller.

pub mod client;
pub mod filter;
pub mod store;

pub use filter::SearchFilters;
pub use store::{
    BatchOutcome, FailedPoint, IndexStats, SearchHit, SearchRequest, UpsertPoint, VectorStore,
};
