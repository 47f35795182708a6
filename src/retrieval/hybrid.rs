//! Hybrid search engine: semantic tier, keyword tier, sampling fallback
//!
//! Tiers are evaluated in order and the first non-empty result set wins.
//! Provider failures are caught and logged, never surfaced; a caller only
//! sees an error when the store itself fails, and only sees an empty result
//! set when the store is empty.

use crate::config::SearchConfig;
use crate::embedding::{cosine_similarity, EmbeddingProvider};
use crate::error::{MaildexError, Result};
use crate::retrieval::{build_match_expr, extract_terms, preview, SearchResult, SearchTier};
use crate::storage::{DocumentStore, SerialGate};
use std::cmp::Ordering;
use std::sync::Arc;

/// Fixed confidence assigned to sampling-tier results, signalling that they
/// are context filler rather than true matches
pub const SAMPLE_CONFIDENCE: f32 = 0.05;

/// Query-time orchestrator over the gate and the embedding provider
pub struct HybridSearchEngine {
    gate: Arc<SerialGate>,
    provider: Option<Arc<dyn EmbeddingProvider>>,
    config: SearchConfig,
}

impl HybridSearchEngine {
    pub fn new(
        gate: Arc<SerialGate>,
        provider: Option<Arc<dyn EmbeddingProvider>>,
        config: SearchConfig,
    ) -> Self {
        Self {
            gate,
            provider,
            config,
        }
    }

    /// Answer a query through the tier cascade
    pub async fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        match self.semantic_tier(query).await {
            Ok(results) if !results.is_empty() => {
                tracing::debug!("Semantic tier answered with {} results", results.len());
                return Ok(results);
            }
            Ok(_) => {
                tracing::debug!("Semantic tier empty, trying keyword tier");
            }
            Err(MaildexError::ProviderUnavailable) => {
                tracing::debug!("No semantic capability, trying keyword tier");
            }
            Err(MaildexError::Provider(e)) => {
                tracing::warn!("Semantic tier failed, trying keyword tier: {}", e);
            }
            Err(e) => return Err(e),
        }

        let keyword_results = self.keyword_tier(query).await?;
        if !keyword_results.is_empty() {
            tracing::debug!("Keyword tier answered with {} results", keyword_results.len());
            return Ok(keyword_results);
        }

        tracing::debug!("Keyword tier empty, falling back to recency sample");
        self.sampling_tier().await
    }

    /// Tier 1: embed the query and rank every stored embedding by cosine
    /// similarity
    ///
    /// The full scan is bounded by index size, which is acceptable for a
    /// local single-user index. Rows whose stored vector cannot be compared
    /// are skipped, not fatal.
    async fn semantic_tier(&self, query: &str) -> Result<Vec<SearchResult>> {
        let provider = self
            .provider
            .as_ref()
            .filter(|p| p.is_available())
            .ok_or(MaildexError::ProviderUnavailable)?;

        let query_vector = provider.embed(query)?;

        let candidates = self
            .gate
            .run(|conn| DocumentStore::scan_embedded(conn))
            .await?;

        let mut scored: Vec<(f32, SearchResult)> = Vec::new();
        for doc in candidates {
            let embedding = match &doc.embedding {
                Some(embedding) => embedding,
                // Malformed blobs were already dropped during row mapping
                None => continue,
            };

            match cosine_similarity(&query_vector, embedding) {
                Ok(score) => {
                    let snippet = preview(&doc.content);
                    scored.push((
                        score,
                        SearchResult::from_document(doc, snippet, score, SearchTier::Semantic),
                    ));
                }
                Err(e) => {
                    tracing::warn!("Skipping document {} in semantic scan: {}", doc.id, e);
                }
            }
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
        scored.truncate(self.config.top_k);

        Ok(scored.into_iter().map(|(_, r)| r).collect())
    }

    /// Tier 2: stop-word-stripped disjunctive FTS5 match
    async fn keyword_tier(&self, query: &str) -> Result<Vec<SearchResult>> {
        let terms = extract_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let match_expr = build_match_expr(&terms);
        let limit = self.config.top_k;
        let hits = self
            .gate
            .run(move |conn| DocumentStore::keyword_search(conn, &match_expr, limit))
            .await?;

        Ok(hits
            .into_iter()
            .map(|hit| {
                SearchResult::from_document(hit.document, hit.snippet, hit.score, SearchTier::Keyword)
            })
            .collect())
    }

    /// Tier 3: bounded most-recent-first sample, regardless of relevance
    ///
    /// Guarantees a downstream consumer that needs some context is never
    /// handed an empty set while documents exist.
    async fn sampling_tier(&self) -> Result<Vec<SearchResult>> {
        let limit = self.config.sample_size;
        let sample = self
            .gate
            .run(move |conn| DocumentStore::sample_recent(conn, limit))
            .await?;

        Ok(sample
            .into_iter()
            .map(|doc| {
                let snippet = preview(&doc.content);
                SearchResult::from_document(doc, snippet, SAMPLE_CONFIDENCE, SearchTier::Sampling)
            })
            .collect())
    }
}
