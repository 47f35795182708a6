//! Embedding provider boundary and vector primitives
//!
//! The index never generates embeddings itself. It talks to a pluggable
//! [`EmbeddingProvider`] (local model server, remote API, or nothing at all)
//! and stores whatever vectors come back as opaque blobs.

mod vector;

pub use vector::{cosine_similarity, decode_vector, encode_vector, ELEMENT_WIDTH};

use crate::error::Result;

/// Trait for embedding providers
///
/// Implementations are external to this crate. Dimensionality is fixed per
/// active provider configuration; an index built with one dimension must be
/// cleared before a provider with another dimension can be used.
pub trait EmbeddingProvider: Send + Sync {
    /// Whether semantic search should be attempted at all
    fn is_available(&self) -> bool;

    /// Generate an embedding for a single text
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in one call
    ///
    /// A `None` entry signals a provider-side failure for that item only;
    /// the call as a whole still succeeds.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>>;

    /// The fixed embedding dimension
    fn dimension(&self) -> usize;
}
