//! Batched indexing pipeline
//!
//! Splits incoming documents into fixed-size chunks, requests embeddings
//! for each chunk in one provider call, and writes every document through
//! the serial access gate. Provider failures degrade to embedding-less
//! rows; only storage failures abort the batch.

use crate::embedding::EmbeddingProvider;
use crate::error::{MaildexError, Result};
use crate::storage::{DocumentStore, IndexedDocument, SerialGate};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Fractional progress emitted after each chunk
#[derive(Debug, Clone, Copy)]
pub struct IndexProgress {
    pub processed: usize,
    pub total: usize,
}

impl IndexProgress {
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.processed as f32 / self.total as f32
        }
    }
}

/// Outcome of an indexing run
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexSummary {
    /// Documents written to the store
    pub indexed: usize,
    /// Documents stored with an embedding
    pub embedded: usize,
    /// Documents stored without one because the provider failed or was absent
    pub without_embedding: usize,
    /// Whether the run stopped early on cancellation
    pub cancelled: bool,
}

/// Cooperative cancellation flag, checked between chunks
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Chunked indexing over the gate and the embedding provider
pub struct IndexingPipeline {
    gate: Arc<SerialGate>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    chunk_size: usize,
}

impl IndexingPipeline {
    pub fn new(
        gate: Arc<SerialGate>,
        provider: Option<Arc<dyn EmbeddingProvider>>,
        chunk_size: usize,
    ) -> Self {
        Self {
            gate,
            provider,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Index a batch of documents
    ///
    /// Progress (`processed / total`) is reported after each chunk on the
    /// optional channel. The cancellation flag is honored between chunks;
    /// partial progress is kept, never rolled back. A full FTS rebuild runs
    /// after the last written chunk.
    pub async fn index_batch(
        &self,
        documents: Vec<IndexedDocument>,
        progress: Option<mpsc::UnboundedSender<IndexProgress>>,
        cancel: &CancelFlag,
    ) -> Result<IndexSummary> {
        let total = documents.len();
        let mut summary = IndexSummary::default();

        if total == 0 {
            return Ok(summary);
        }

        let recorded = self
            .gate
            .run(|conn| DocumentStore::recorded_dimension(conn))
            .await?;
        let provider_dim = self
            .provider
            .as_ref()
            .filter(|p| p.is_available())
            .map(|p| p.dimension());

        // Mixed dimensionality is never permitted; the caller must clear the
        // index before switching models
        if let (Some(existing), Some(dimension)) = (recorded, provider_dim) {
            if existing != dimension {
                return Err(MaildexError::DimensionMismatch {
                    expected: existing,
                    actual: dimension,
                });
            }
        }

        let mut expected_dim = provider_dim.or(recorded);
        let mut dimension_recorded = recorded.is_some();

        tracing::info!("Indexing batch of {} documents", total);

        let mut iter = documents.into_iter();
        loop {
            if cancel.is_cancelled() {
                tracing::info!(
                    "Indexing cancelled after {} of {} documents",
                    summary.indexed,
                    total
                );
                summary.cancelled = true;
                break;
            }

            let chunk: Vec<IndexedDocument> = iter.by_ref().take(self.chunk_size).collect();
            if chunk.is_empty() {
                break;
            }

            let chunk = self.embed_chunk(chunk);
            let chunk = enforce_dimension(chunk, &mut expected_dim);
            let chunk_len = chunk.len();
            summary.embedded += chunk.iter().filter(|d| d.embedding.is_some()).count();
            summary.without_embedding += chunk.iter().filter(|d| d.embedding.is_none()).count();

            // One gate job per chunk keeps the whole chunk's writes serialized
            // against any concurrent searches
            self.gate
                .run(move |conn| {
                    for doc in &chunk {
                        DocumentStore::upsert(conn, doc)?;
                    }
                    Ok(())
                })
                .await?;

            summary.indexed += chunk_len;

            // Recording only after a chunk commits keeps a cancelled-before-
            // any-work batch from touching index metadata
            if !dimension_recorded {
                if let Some(dimension) = expected_dim {
                    self.gate
                        .run(move |conn| DocumentStore::record_dimension(conn, dimension))
                        .await?;
                    dimension_recorded = true;
                }
            }

            if let Some(progress_tx) = &progress {
                let _ = progress_tx.send(IndexProgress {
                    processed: summary.indexed,
                    total,
                });
            }

            tracing::debug!("Indexed chunk: {}/{}", summary.indexed, total);
        }

        if summary.indexed > 0 {
            self.gate.run(|conn| DocumentStore::rebuild_fts(conn)).await?;
        }

        tracing::info!(
            "Indexing finished: {} indexed, {} embedded, {} without embedding",
            summary.indexed,
            summary.embedded,
            summary.without_embedding
        );

        Ok(summary)
    }

    /// Attach embeddings to a chunk with one bulk provider call
    ///
    /// Any provider-side failure leaves the affected documents without an
    /// embedding; the chunk is always returned in full.
    fn embed_chunk(&self, mut chunk: Vec<IndexedDocument>) -> Vec<IndexedDocument> {
        let provider = match &self.provider {
            Some(provider) if provider.is_available() => provider,
            _ => return chunk,
        };

        let texts: Vec<String> = chunk.iter().map(|d| d.content.clone()).collect();
        let vectors = match provider.embed_batch(&texts) {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::warn!(
                    "Embedding provider failed for chunk of {}, storing without embeddings: {}",
                    chunk.len(),
                    e
                );
                return chunk;
            }
        };

        if vectors.len() != chunk.len() {
            tracing::warn!(
                "Provider returned {} vectors for {} documents, storing without embeddings",
                vectors.len(),
                chunk.len()
            );
            return chunk;
        }

        let expected = provider.dimension();
        for (doc, vector) in chunk.iter_mut().zip(vectors) {
            match vector {
                Some(v) if v.len() == expected => doc.embedding = Some(v),
                Some(v) => {
                    tracing::warn!(
                        "Provider returned {}-dim vector for document {}, expected {}",
                        v.len(),
                        doc.id,
                        expected
                    );
                }
                None => {
                    tracing::debug!("Provider produced no embedding for document {}", doc.id);
                }
            }
        }

        chunk
    }

}

/// Drop embeddings whose length does not match the index dimensionality
///
/// Covers vectors the caller attached before indexing, which never pass
/// through a provider. The first embedding seen fixes the dimension when
/// none is recorded yet.
fn enforce_dimension(
    mut chunk: Vec<IndexedDocument>,
    expected: &mut Option<usize>,
) -> Vec<IndexedDocument> {
    for doc in chunk.iter_mut() {
        let len = match &doc.embedding {
            Some(vector) => vector.len(),
            None => continue,
        };

        match *expected {
            Some(dimension) if len == dimension => {}
            Some(dimension) => {
                tracing::warn!(
                    "Dropping {}-dim embedding for document {}, index dimension is {}",
                    len,
                    doc.id,
                    dimension
                );
                doc.embedding = None;
            }
            None => *expected = Some(len),
        }
    }

    chunk
}
