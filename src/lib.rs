//! Maildex - Local Hybrid Search Index for Mail Archives
//!
//! Persists extracted message content in a single SQLite file, optionally
//! attaches dense embeddings from a pluggable provider, and answers queries
//! through three fallback tiers: vector similarity, FTS5 keyword matching,
//! and a most-recent-first sample so callers with a non-empty index never
//! receive an empty context set.

pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod indexing;
pub mod retrieval;
pub mod storage;

pub use config::Config;
pub use error::{MaildexError, Result};
pub use index::MessageIndex;
pub use indexing::{CancelFlag, IndexProgress, IndexSummary};
pub use retrieval::{SearchResult, SearchTier};
pub use storage::IndexedDocument;
