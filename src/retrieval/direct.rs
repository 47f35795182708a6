//! Zero-persistence search over an in-memory document list
//!
//! Used before any index has been built: scores plain term occurrences
//! against the documents the caller already holds, with subject matches
//! weighted above body matches.

use crate::retrieval::{extract_terms, preview, SearchResult, SearchTier};
use crate::storage::IndexedDocument;
use std::cmp::Ordering;

const SUBJECT_WEIGHT: f32 = 2.0;

/// Rank `documents` by how many query terms they contain
///
/// Documents matching no terms are dropped; an empty or all-stop-word
/// query yields no results.
pub fn direct_search(
    query: &str,
    documents: &[IndexedDocument],
    limit: usize,
) -> Vec<SearchResult> {
    let terms = extract_terms(query);
    if terms.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(f32, &IndexedDocument)> = documents
        .iter()
        .filter_map(|doc| {
            let score = occurrence_score(&terms, doc);
            (score > 0.0).then_some((score, doc))
        })
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(score, doc)| {
            let snippet = preview(&doc.content);
            SearchResult::from_document(doc.clone(), snippet, score, SearchTier::Direct)
        })
        .collect()
}

/// Fraction of query terms present, with subject hits counted extra
fn occurrence_score(terms: &[String], doc: &IndexedDocument) -> f32 {
    let content = doc.content.to_lowercase();
    let subject = doc.subject.to_lowercase();

    let mut score = 0.0;
    for term in terms {
        if content.contains(term.as_str()) {
            score += 1.0;
        }
        if subject.contains(term.as_str()) {
            score += SUBJECT_WEIGHT;
        }
    }

    score / (terms.len() as f32 * (1.0 + SUBJECT_WEIGHT))
}
