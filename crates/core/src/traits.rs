use crate::models::{ChatMessage, Document, GenerationParams};
use crate::ServiceError;
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Name used in logs and error messages.
    fn name(&self) -> &str;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, ServiceError>;
}

/// Lookup of extracted report text owned by the surrounding application.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, document: Document) -> Result<(), ServiceError>;

    async fn get(&self, document_id: &str) -> Result<Option<Document>, ServiceError>;

    async fn remove(&self, document_id: &str) -> Result<Option<Document>, ServiceError>;
}

#[async_trait]
impl<T: EmbeddingService + ?Sized> EmbeddingService for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        (**self).embed(text).await
    }
}

#[async_trait]
impl<T: CompletionService + ?Sized> CompletionService for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, ServiceError> {
        (**self).complete(messages, params).await
    }
}

#[async_trait]
impl<T: DocumentStore + ?Sized> DocumentStore for Arc<T> {
    async fn put(&self, document: Document) -> Result<(), ServiceError> {
        (**self).put(document).await
    }

    async fn get(&self, document_id: &str) -> Result<Option<Document>, ServiceError> {
        (**self).get(document_id).await
    }

    async fn remove(&self, document_id: &str) -> Result<Option<Document>, ServiceError> {
        (**self).remove(document_id).await
    }
}
