//! Index facade
//!
//! Wires the serial access gate, indexing pipeline, and hybrid search
//! engine together behind the surface the host application consumes.

use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::error::{MaildexError, Result};
use crate::indexing::{CancelFlag, IndexProgress, IndexSummary, IndexingPipeline};
use crate::retrieval::{direct_search, HybridSearchEngine, SearchResult};
use crate::storage::{DocumentStore, IndexedDocument, SerialGate, StoreStats};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A local hybrid search index over extracted messages
pub struct MessageIndex {
    gate: Arc<SerialGate>,
    pipeline: IndexingPipeline,
    engine: HybridSearchEngine,
    direct_limit: usize,
}

impl MessageIndex {
    /// Open (or create) the index described by `config`
    ///
    /// `provider` is the optional embedding collaborator; without one the
    /// index still answers queries through the keyword and sampling tiers.
    pub fn open(config: &Config, provider: Option<Arc<dyn EmbeddingProvider>>) -> Result<Self> {
        config.validate()?;

        if let Some(provider) = &provider {
            if provider.is_available() && provider.dimension() != config.embedding.dimension {
                return Err(MaildexError::Config(format!(
                    "Provider dimension {} does not match configured dimension {}",
                    provider.dimension(),
                    config.embedding.dimension
                )));
            }
        }

        let gate = Arc::new(SerialGate::open(&config.db_path())?);
        let pipeline = IndexingPipeline::new(
            gate.clone(),
            provider.clone(),
            config.embedding.chunk_size,
        );
        let engine = HybridSearchEngine::new(gate.clone(), provider, config.search.clone());

        Ok(Self {
            gate,
            pipeline,
            engine,
            direct_limit: config.search.top_k,
        })
    }

    /// Index a batch of documents, reporting fractional progress per chunk
    pub async fn index_batch(
        &self,
        documents: Vec<IndexedDocument>,
        progress: Option<mpsc::UnboundedSender<IndexProgress>>,
        cancel: &CancelFlag,
    ) -> Result<IndexSummary> {
        self.pipeline.index_batch(documents, progress, cancel).await
    }

    /// Ranked hybrid search over the index
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.engine.search(query).await
    }

    /// Zero-persistence fallback: score an in-memory document list directly
    pub fn direct_search(
        &self,
        query: &str,
        documents: &[IndexedDocument],
    ) -> Vec<SearchResult> {
        direct_search(query, documents, self.direct_limit)
    }

    /// Remove every indexed document and reset indexed state
    ///
    /// Run before indexing a newly opened message collection to prevent
    /// cross-collection contamination.
    pub async fn clear_index(&self) -> Result<()> {
        self.gate.run(|conn| DocumentStore::clear(conn)).await
    }

    /// Fetch every stored document
    pub async fn scan_all(&self) -> Result<Vec<IndexedDocument>> {
        self.gate.run(|conn| DocumentStore::scan_all(conn)).await
    }

    /// Row counts for the index
    pub async fn stats(&self) -> Result<StoreStats> {
        self.gate.run(|conn| DocumentStore::stats(conn)).await
    }
}
