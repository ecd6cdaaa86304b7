//! Document persistence for picture metadata.
//!
//! Documents are JSON objects addressed by `(collection, id)`. The only write
//! operation is a merge-upsert: a missing document is created, an existing
//! one has the supplied fields overwritten while every other field is kept.
//! Merging follows JSON merge-patch rules (RFC 7396), so a `null` field
//! removes the member and nested objects are merged recursively.
//!
//! Two stores are provided: [`Database`] persists into SQLite through sqlx,
//! [`MemoryDocumentStore`] keeps everything in process memory.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

mod memory;
mod sqlite;

pub use memory::MemoryDocumentStore;
pub use sqlite::Database;

/// Collection holding one document per analysed picture.
pub const PICTURES_COLLECTION: &str = "pictures";

/// A stored document body.
pub type Document = Map<String, Value>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("invalid document body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("document {collection}/{id} is not a JSON object")]
    NotAnObject { collection: String, id: String },
}

/// Key-addressed document storage with merge-upsert writes.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Creates `collection/id` from `fields`, or merges `fields` into the
    /// existing document. Applied atomically per document.
    async fn merge_upsert(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;
}

/// Applies `patch` onto `target` with JSON merge-patch semantics.
pub fn merge_patch(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        match value {
            Value::Null => {
                target.remove(&key);
            }
            Value::Object(nested) => {
                let entry = target
                    .entry(key)
                    .or_insert_with(|| Value::Object(Document::new()));
                if !entry.is_object() {
                    *entry = Value::Object(Document::new());
                }
                if let Value::Object(existing) = entry {
                    merge_patch(existing, nested);
                }
            }
            other => {
                target.insert(key, other);
            }
        }
    }
}

/// Metadata kept for a picture that passed the safety gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureRecord {
    /// Label descriptions, most confident first.
    pub labels: Vec<String>,
    /// Dominant color as `#rrggbb`.
    pub color: String,
    pub created: DateTime<Utc>,
}

impl PictureRecord {
    pub fn new(labels: Vec<String>, color: impl Into<String>) -> Self {
        Self {
            labels,
            color: color.into(),
            created: Utc::now(),
        }
    }

    pub fn to_document(&self) -> Result<Document, StoreError> {
        let mut fields = Document::new();
        fields.insert("labels".into(), serde_json::to_value(&self.labels)?);
        fields.insert("color".into(), Value::String(self.color.clone()));
        fields.insert("created".into(), serde_json::to_value(self.created)?);
        Ok(fields)
    }
}

/// Typed access to the `pictures` collection.
#[derive(Clone)]
pub struct PictureCatalog {
    store: Arc<dyn DocumentStore>,
}

impl PictureCatalog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Merge-upserts `record` under the picture's object name.
    pub async fn save(&self, name: &str, record: &PictureRecord) -> Result<(), StoreError> {
        self.store
            .merge_upsert(PICTURES_COLLECTION, name, record.to_document()?)
            .await
    }

    pub async fn fetch(&self, name: &str) -> Result<Option<PictureRecord>, StoreError> {
        self.store
            .get(PICTURES_COLLECTION, name)
            .await?
            .map(|fields| serde_json::from_value(Value::Object(fields)).map_err(StoreError::from))
            .transpose()
    }
}
