//! End-to-end coverage of the index facade: batch indexing through the
//! serial gate, the three-tier search cascade, clearing, and direct search.

use chrono::Utc;
use maildex::config::Config;
use maildex::embedding::EmbeddingProvider;
use maildex::{CancelFlag, IndexedDocument, MaildexError, MessageIndex, Result, SearchTier};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;

/// Deterministic provider: axis 0 responds to "budget" text, axis 1 to
/// everything else.
struct TopicProvider {
    available: bool,
}

impl EmbeddingProvider for TopicProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if !self.available {
            return Err(MaildexError::ProviderUnavailable);
        }
        if text.to_lowercase().contains("budget") {
            Ok(vec![1.0, 0.1])
        } else {
            Ok(vec![0.1, 1.0])
        }
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>> {
        texts.iter().map(|t| self.embed(t).map(Some)).collect()
    }

    fn dimension(&self) -> usize {
        2
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn test_config(temp: &TempDir) -> Config {
    init_tracing();
    let mut config = Config::default();
    config.storage.data_dir = temp.path().to_path_buf();
    config.embedding.dimension = 2;
    config.embedding.chunk_size = 2;
    config
}

fn message(source_id: &str, subject: &str, content: &str) -> IndexedDocument {
    IndexedDocument::new(
        Some(source_id.to_string()),
        content,
        "alice@example.com",
        subject,
        Utc::now(),
    )
}

fn sample_messages() -> Vec<IndexedDocument> {
    vec![
        message("m1", "Budget Q4", "quarterly budget numbers for the board"),
        message("m2", "Team Outing", "bowling night on thursday"),
        message("m3", "Budget Review", "retrospective on department spending"),
    ]
}

#[tokio::test]
async fn index_then_semantic_search() {
    let temp = TempDir::new().unwrap();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(TopicProvider { available: true });
    let index = MessageIndex::open(&test_config(&temp), Some(provider)).unwrap();

    let summary = index
        .index_batch(sample_messages(), None, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.indexed, 3);
    assert_eq!(summary.embedded, 3);

    let results = index.search("budget forecast").await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.tier == SearchTier::Semantic));
    assert!(results[0].subject.contains("Budget"));
}

#[tokio::test]
async fn keyword_tier_when_capability_disabled() {
    let temp = TempDir::new().unwrap();
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(TopicProvider { available: false });
    let index = MessageIndex::open(&test_config(&temp), Some(provider)).unwrap();

    index
        .index_batch(sample_messages(), None, &CancelFlag::new())
        .await
        .unwrap();

    let results = index.search("budget").await.unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.tier == SearchTier::Keyword));
    let subjects: Vec<&str> = results.iter().map(|r| r.subject.as_str()).collect();
    assert!(subjects.contains(&"Budget Q4"));
    assert!(subjects.contains(&"Budget Review"));
}

#[tokio::test]
async fn keyword_index_finds_exact_substring_after_batch() {
    let temp = TempDir::new().unwrap();
    let index = MessageIndex::open(&test_config(&temp), None).unwrap();

    index
        .index_batch(sample_messages(), None, &CancelFlag::new())
        .await
        .unwrap();

    // A token drawn verbatim from one document's content
    let results = index.search("retrospective").await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].tier, SearchTier::Keyword);
    assert_eq!(results[0].subject, "Budget Review");
    assert!(results[0].snippet.contains("[retrospective]"));
}

#[tokio::test]
async fn sampling_fallback_on_unrelated_query() {
    let temp = TempDir::new().unwrap();
    let index = MessageIndex::open(&test_config(&temp), None).unwrap();

    index
        .index_batch(
            vec![message("m1", "Lone Message", "completely unrelated text")],
            None,
            &CancelFlag::new(),
        )
        .await
        .unwrap();

    let results = index.search("anything unrelated xyzzy").await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tier, SearchTier::Sampling);
    assert!(results[0].score < 0.1);
}

#[tokio::test]
async fn search_on_empty_store_is_empty() {
    let temp = TempDir::new().unwrap();
    let index = MessageIndex::open(&test_config(&temp), None).unwrap();

    let results = index.search("budget").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn clear_index_empties_everything() {
    let temp = TempDir::new().unwrap();
    let index = MessageIndex::open(&test_config(&temp), None).unwrap();

    index
        .index_batch(sample_messages(), None, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(index.stats().await.unwrap().document_count, 3);

    index.clear_index().await.unwrap();

    assert!(index.scan_all().await.unwrap().is_empty());
    assert!(index.search("budget").await.unwrap().is_empty());
    assert_eq!(index.stats().await.unwrap().document_count, 0);
}

#[tokio::test]
async fn reindexing_same_sources_does_not_duplicate() {
    let temp = TempDir::new().unwrap();
    let index = MessageIndex::open(&test_config(&temp), None).unwrap();
    let cancel = CancelFlag::new();

    index
        .index_batch(sample_messages(), None, &cancel)
        .await
        .unwrap();
    index
        .index_batch(sample_messages(), None, &cancel)
        .await
        .unwrap();

    assert_eq!(index.stats().await.unwrap().document_count, 3);
}

#[tokio::test]
async fn progress_is_fractional_and_complete() {
    let temp = TempDir::new().unwrap();
    let index = MessageIndex::open(&test_config(&temp), None).unwrap();

    let (tx, mut rx) = mpsc::unbounded_channel();
    index
        .index_batch(sample_messages(), Some(tx), &CancelFlag::new())
        .await
        .unwrap();

    let mut last = 0.0;
    let mut updates = 0;
    while let Ok(p) = rx.try_recv() {
        assert!(p.fraction() >= last);
        last = p.fraction();
        updates += 1;
    }
    assert_eq!(updates, 2); // chunk_size 2 over 3 documents
    assert!((last - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn direct_search_without_any_index() {
    let temp = TempDir::new().unwrap();
    let index = MessageIndex::open(&test_config(&temp), None).unwrap();

    let in_memory = sample_messages();
    let results = index.direct_search("budget", &in_memory);

    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.tier == SearchTier::Direct));
    // Nothing was persisted
    assert_eq!(index.stats().await.unwrap().document_count, 0);
}

#[tokio::test]
async fn foreign_dimension_embedding_not_stored() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);

    {
        let provider: Arc<dyn EmbeddingProvider> = Arc::new(TopicProvider { available: true });
        let index = MessageIndex::open(&config, Some(provider)).unwrap();
        index
            .index_batch(
                vec![message("m1", "Budget Q4", "quarterly budget numbers")],
                None,
                &CancelFlag::new(),
            )
            .await
            .unwrap();
    }

    // Reopen without a provider and feed a document carrying its own vector
    // of the wrong width
    let index = MessageIndex::open(&config, None).unwrap();
    let mut stray = message("m2", "Imported", "message from another archive");
    stray.embedding = Some(vec![0.3; 5]);
    let summary = index
        .index_batch(vec![stray], None, &CancelFlag::new())
        .await
        .unwrap();
    assert_eq!(summary.indexed, 1);
    assert_eq!(summary.without_embedding, 1);

    let docs = index.scan_all().await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(docs
        .iter()
        .all(|d| d.embedding.as_ref().map_or(true, |v| v.len() == 2)));
    assert_eq!(index.stats().await.unwrap().embedded_count, 1);
}

#[tokio::test]
async fn index_survives_reopen() {
    let temp = TempDir::new().unwrap();
    let config = test_config(&temp);

    {
        let index = MessageIndex::open(&config, None).unwrap();
        index
            .index_batch(sample_messages(), None, &CancelFlag::new())
            .await
            .unwrap();
    }

    let index = MessageIndex::open(&config, None).unwrap();
    assert_eq!(index.stats().await.unwrap().document_count, 3);

    let results = index.search("bowling").await.unwrap();
    assert_eq!(results[0].subject, "Team Outing");
}
