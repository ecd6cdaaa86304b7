use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{merge_patch, Document, DocumentStore, StoreError};

/// In-process document store. Clones share the same documents.
#[derive(Clone, Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<HashMap<(String, String), Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn merge_upsert(
        &self,
        collection: &str,
        id: &str,
        fields: Document,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write();
        let target = documents
            .entry((collection.to_owned(), id.to_owned()))
            .or_default();
        merge_patch(target, fields);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self
            .documents
            .read()
            .get(&(collection.to_owned(), id.to_owned()))
            .cloned())
    }
}
