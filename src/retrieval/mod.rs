//! Query-time retrieval
//!
//! The hybrid engine answers queries through three ordered tiers (semantic,
//! keyword, sampling); direct search scores an in-memory document list when
//! no index has been built yet.

mod direct;
mod hybrid;

pub use direct::direct_search;
pub use hybrid::HybridSearchEngine;

use crate::storage::IndexedDocument;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which strategy produced a result set
///
/// Scores are tier-relative: cosine similarity in the semantic tier, a
/// BM25-derived score in the keyword tier, a fixed low constant in the
/// sampling tier. Never compare scores across tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchTier {
    Semantic,
    Keyword,
    Sampling,
    Direct,
}

/// One ranked search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: Uuid,
    pub source_id: Option<String>,
    pub content: String,
    pub sender: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    /// Short preview drawn from the content
    pub snippet: String,
    /// Tier-relative relevance score
    pub score: f32,
    pub tier: SearchTier,
}

impl SearchResult {
    pub(crate) fn from_document(
        doc: IndexedDocument,
        snippet: String,
        score: f32,
        tier: SearchTier,
    ) -> Self {
        Self {
            id: doc.id,
            source_id: doc.source_id,
            content: doc.content,
            sender: doc.sender,
            subject: doc.subject,
            timestamp: doc.timestamp,
            snippet,
            score,
            tier,
        }
    }
}

/// Stop words stripped from raw queries before keyword matching
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "has", "have", "i",
    "in", "is", "it", "me", "my", "of", "on", "or", "that", "the", "this", "to", "was", "were",
    "what", "when", "where", "which", "who", "will", "with", "you",
];

/// Lowercase a raw query, strip punctuation, drop stop words
pub(crate) fn extract_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
        .map(String::from)
        .collect()
}

/// Build an FTS5 MATCH expression: terms quoted and joined disjunctively
pub(crate) fn build_match_expr(terms: &[String]) -> String {
    terms
        .iter()
        .map(|t| format!("\"{}\"", t))
        .collect::<Vec<_>>()
        .join(" OR ")
}

const PREVIEW_CHARS: usize = 160;

/// Content preview for tiers that have no FTS snippet
pub(crate) fn preview(content: &str) -> String {
    let mut out: String = content.chars().take(PREVIEW_CHARS).collect();
    if out.len() < content.len() {
        out.push('…');
    }
    out
}
