use crate::chunking::window_document;
use crate::embeddings::cosine_similarity;
use crate::models::{Document, EmbeddingRecord, RetrievedWindow, WindowConfig};
use crate::retry::CallPolicy;
use crate::traits::EmbeddingService;
use crate::ContextError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Embedded windows of one document. Built in one pass from a full window set.
#[derive(Debug, Clone)]
pub struct ContextIndex {
    document_id: String,
    dimensions: usize,
    records: Vec<EmbeddingRecord>,
    built_at: DateTime<Utc>,
}

impl ContextIndex {
    pub fn build(
        document_id: impl Into<String>,
        records: Vec<EmbeddingRecord>,
    ) -> Result<Self, ContextError> {
        let document_id = document_id.into();
        let dimensions = match records.first() {
            Some(record) => record.vector.len(),
            None => return Err(ContextError::EmptyDocument { document_id }),
        };

        if let Some(record) = records.iter().find(|record| record.vector.len() != dimensions) {
            return Err(ContextError::DimensionMismatch {
                expected: dimensions,
                actual: record.vector.len(),
            });
        }

        Ok(Self {
            document_id,
            dimensions,
            records,
            built_at: Utc::now(),
        })
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Top `k` windows by cosine similarity, best first; equal scores keep chunk order.
    pub fn search(
        &self,
        query_vector: &[f32],
        k: usize,
    ) -> Result<Vec<RetrievedWindow>, ContextError> {
        if query_vector.len() != self.dimensions {
            return Err(ContextError::DimensionMismatch {
                expected: self.dimensions,
                actual: query_vector.len(),
            });
        }

        let mut scored = self
            .records
            .iter()
            .map(|record| (cosine_similarity(query_vector, &record.vector), record))
            .collect::<Vec<_>>();

        scored.sort_by(|(left_score, left), (right_score, right)| {
            right_score
                .partial_cmp(left_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| left.chunk_index().cmp(&right.chunk_index()))
        });

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(score, record)| RetrievedWindow {
                chunk: record.chunk.clone(),
                score,
            })
            .collect())
    }
}

/// Process-wide map from document identifier to its current index. Entries are
/// replaced whole, so a reader holds either the old or the new index.
#[derive(Debug, Default)]
pub struct IndexRegistry {
    indexes: DashMap<String, Arc<ContextIndex>>,
    build_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, document_id: &str) -> Option<Arc<ContextIndex>> {
        self.indexes.get(document_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.indexes.contains_key(document_id)
    }

    pub fn insert(&self, index: ContextIndex) -> Arc<ContextIndex> {
        let index = Arc::new(index);
        self.indexes
            .insert(index.document_id().to_string(), Arc::clone(&index));
        index
    }

    /// Drops the index. The build lock entry stays so later builds still queue
    /// behind one already in flight.
    pub fn remove(&self, document_id: &str) -> Option<Arc<ContextIndex>> {
        self.indexes.remove(document_id).map(|(_, index)| index)
    }

    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Lock serializing builds and removal of one document.
    pub fn build_lock(&self, document_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(
            self.build_locks
                .entry(document_id.to_string())
                .or_default()
                .value(),
        )
    }
}

pub struct ContextIndexer<E>
where
    E: EmbeddingService,
{
    embedder: E,
    registry: Arc<IndexRegistry>,
    windows: WindowConfig,
    policy: CallPolicy,
}

impl<E> ContextIndexer<E>
where
    E: EmbeddingService,
{
    pub fn new(
        embedder: E,
        registry: Arc<IndexRegistry>,
        windows: WindowConfig,
        policy: CallPolicy,
    ) -> Self {
        Self {
            embedder,
            registry,
            windows,
            policy,
        }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn policy(&self) -> &CallPolicy {
        &self.policy
    }

    /// Embeds every window of `document` and replaces its index. Any embedding
    /// failure aborts the build and leaves the previous index in place.
    pub async fn index_document(
        &self,
        document: &Document,
    ) -> Result<Arc<ContextIndex>, ContextError> {
        let lock = self.registry.build_lock(&document.id);
        let _guard = lock.lock().await;
        self.build_locked(document).await
    }

    /// Same as [`index_document`](Self::index_document) for a caller that
    /// already holds the document's build lock.
    pub(crate) async fn build_locked(
        &self,
        document: &Document,
    ) -> Result<Arc<ContextIndex>, ContextError> {
        let chunks = window_document(document, self.windows);
        if chunks.is_empty() {
            return Err(ContextError::EmptyDocument {
                document_id: document.id.clone(),
            });
        }

        debug!(
            document_id = %document.id,
            windows = chunks.len(),
            embedder = self.embedder.name(),
            "embedding windows"
        );

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let vector = self
                .policy
                .run("embed window", || self.embedder.embed(&chunk.text))
                .await
                .map_err(|source| {
                    warn!(
                        document_id = %document.id,
                        chunk_index = chunk.index,
                        error = %source,
                        "window embedding failed, aborting index build"
                    );
                    ContextError::IndexingFailed {
                        document_id: document.id.clone(),
                        source,
                    }
                })?;

            records.push(EmbeddingRecord { chunk, vector });
        }

        let index = ContextIndex::build(document.id.clone(), records)?;
        info!(
            document_id = %document.id,
            windows = index.len(),
            dimensions = index.dimensions(),
            "context index built"
        );

        Ok(self.registry.insert(index))
    }
}
