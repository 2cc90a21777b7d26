//! Persistent semantic memory for AI agents — an MCP server backed by Qdrant.
//!
//! mnemo stores free-text memories with metadata, retrieves them by
//! natural-language query, and manages their lifecycle. Memories are embedded
//! as dense vectors (remote API or local CPU inference), indexed under two
//! named vector spaces, and filtered by payload fields at query time.
//!
//! # Architecture
//!
//! - **Storage**: a Qdrant collection with named `dense` / `dense_large`
//!   cosine spaces and a full-text payload index on content
//! - **Embeddings**: OpenAI embeddings API (dual vectors, concurrent) or a
//!   local ONNX sentence-transformer, behind a bounded LRU cache with cost
//!   accounting
//! - **Search**: dense similarity, or hybrid dense + full-text merged via
//!   Reciprocal Rank Fusion
//! - **Admission control**: a multi-pattern secret scanner that admits,
//!   warns, or blocks writes
//! - **Transport**: MCP over stdio
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`scanner`] — Secret detection and redaction
//! - [`workspace`] — Workspace slug resolution and validation
//! - [`embedding`] — Embedding providers, LRU cache, and chunked generation
//! - [`index`] — Qdrant client, filter construction, and the collection controller
//! - [`memory`] — The nine tool operations composed from the parts above

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod index;
pub mod memory;
pub mod response;
pub mod retry;
pub mod scanner;
pub mod workspace;
