//! Storage layer for the maildex index
//!
//! One SQLite file holds the document table, its FTS5 mirror, and the
//! recorded embedding dimensionality. Every operation goes through the
//! serial access gate; nothing else touches the connection.

pub mod database;
pub mod gate;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub use database::{DocumentStore, KeywordHit, StoreStats};
pub use gate::SerialGate;

/// One indexed message row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Stable unique identifier of the indexed unit
    pub id: Uuid,
    /// The originating message's own identifier, when the source has one
    pub source_id: Option<String>,
    /// Full raw text body; keyword-indexed and used as embedding source text
    pub content: String,
    pub sender: String,
    pub subject: String,
    pub timestamp: DateTime<Utc>,
    /// Opaque provenance payload
    pub metadata: HashMap<String, String>,
    /// Fixed-dimension embedding; absent when no provider was active or
    /// generation failed for this item
    pub embedding: Option<Vec<f32>>,
}

impl IndexedDocument {
    /// Build a document with a fresh id and no embedding
    pub fn new(
        source_id: Option<String>,
        content: impl Into<String>,
        sender: impl Into<String>,
        subject: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            content: content.into(),
            sender: sender.into(),
            subject: subject.into(),
            timestamp,
            metadata: HashMap::new(),
            embedding: None,
        }
    }

    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}
