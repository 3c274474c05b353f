use crate::models::Document;
use crate::traits::DocumentStore;
use crate::ServiceError;
use async_trait::async_trait;
use dashmap::DashMap;

/// Process-local document store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: DashMap<String, Document>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(&self, document: Document) -> Result<(), ServiceError> {
        self.documents.insert(document.id.clone(), document);
        Ok(())
    }

    async fn get(&self, document_id: &str) -> Result<Option<Document>, ServiceError> {
        Ok(self.documents.get(document_id).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, document_id: &str) -> Result<Option<Document>, ServiceError> {
        Ok(self.documents.remove(document_id).map(|(_, document)| document))
    }
}
