use crate::index::{ContextIndex, ContextIndexer};
use crate::models::{Document, RetrievedWindow};
use crate::traits::EmbeddingService;
use crate::ContextError;
use std::sync::Arc;
use tracing::{debug, info};

/// Nearest-window lookup over the per-document indexes built by a [`ContextIndexer`].
pub struct ContextRetriever<E>
where
    E: EmbeddingService,
{
    indexer: Arc<ContextIndexer<E>>,
}

impl<E> ContextRetriever<E>
where
    E: EmbeddingService,
{
    pub fn new(indexer: Arc<ContextIndexer<E>>) -> Self {
        Self { indexer }
    }

    pub fn indexer(&self) -> &Arc<ContextIndexer<E>> {
        &self.indexer
    }

    /// Returns up to `k` windows of `document_id` most similar to `query`.
    ///
    /// When the document has no index yet and `fallback` carries its text, the
    /// index is built on demand first.
    pub async fn retrieve(
        &self,
        document_id: &str,
        query: &str,
        k: usize,
        fallback: Option<&Document>,
    ) -> Result<Vec<RetrievedWindow>, ContextError> {
        if query.trim().is_empty() {
            return Err(ContextError::InvalidArgument("query is empty".to_string()));
        }

        let index = self.resolve_index(document_id, fallback).await?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let embedder = self.indexer.embedder();
        let query_vector = self
            .indexer
            .policy()
            .run("embed query", || embedder.embed(query))
            .await
            .map_err(ContextError::QueryEmbeddingFailed)?;

        let hits = index.search(&query_vector, k)?;
        debug!(
            document_id,
            requested = k,
            returned = hits.len(),
            top_score = hits.first().map(|hit| hit.score).unwrap_or_default(),
            "context retrieved"
        );

        Ok(hits)
    }

    async fn resolve_index(
        &self,
        document_id: &str,
        fallback: Option<&Document>,
    ) -> Result<Arc<ContextIndex>, ContextError> {
        if let Some(index) = self.indexer.registry().get(document_id) {
            return Ok(index);
        }

        let Some(document) = fallback else {
            return Err(ContextError::ContextUnavailable {
                document_id: document_id.to_string(),
                reason: "no index and no document text supplied".to_string(),
            });
        };

        if document.id != document_id {
            return Err(ContextError::InvalidArgument(format!(
                "fallback document {} does not match {document_id}",
                document.id
            )));
        }

        info!(document_id, "no index found, indexing on demand");
        self.indexer
            .index_document(document)
            .await
            .map_err(|error| ContextError::ContextUnavailable {
                document_id: document_id.to_string(),
                reason: error.to_string(),
            })
    }
}
