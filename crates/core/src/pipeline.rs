use crate::chat::{ChatAnswer, ReportChat};
use crate::index::{ContextIndexer, IndexRegistry};
use crate::ingest::load_document;
use crate::models::{AnalysisOptions, Document, GenerationParams, WindowConfig};
use crate::orchestrator::{AnalysisOrchestrator, AnalysisReport};
use crate::retriever::ContextRetriever;
use crate::retry::CallPolicy;
use crate::traits::{CompletionService, DocumentStore, EmbeddingService};
use crate::PipelineError;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
    pub document_id: String,
    pub page_count: u32,
    /// `None` when indexing failed; the index is then rebuilt on the first question.
    pub indexed_windows: Option<usize>,
}

pub struct PipelineSettings {
    pub windows: WindowConfig,
    pub analysis: AnalysisOptions,
    pub policy: CallPolicy,
    pub top_k: usize,
    pub chat_params: GenerationParams,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            windows: WindowConfig::default(),
            analysis: AnalysisOptions::default(),
            policy: CallPolicy::default(),
            top_k: 4,
            chat_params: GenerationParams::default(),
        }
    }
}

/// Upload, question, analysis and deletion flows for stored reports.
pub struct ReportPipeline<S, E, C>
where
    S: DocumentStore,
    E: EmbeddingService,
    C: CompletionService,
{
    store: S,
    registry: Arc<IndexRegistry>,
    indexer: Arc<ContextIndexer<E>>,
    chat: ReportChat<E, Arc<C>>,
    orchestrator: AnalysisOrchestrator<Arc<C>>,
}

impl<S, E, C> ReportPipeline<S, E, C>
where
    S: DocumentStore,
    E: EmbeddingService,
    C: CompletionService,
{
    pub fn new(store: S, embedder: E, completion: C, settings: PipelineSettings) -> Self {
        let registry = Arc::new(IndexRegistry::new());
        let completion = Arc::new(completion);
        let indexer = Arc::new(ContextIndexer::new(
            embedder,
            Arc::clone(&registry),
            settings.windows,
            settings.policy,
        ));
        let retriever = Arc::new(ContextRetriever::new(Arc::clone(&indexer)));

        Self {
            store,
            registry,
            chat: ReportChat::new(
                retriever,
                Arc::clone(&completion),
                settings.top_k,
                settings.chat_params,
            ),
            orchestrator: AnalysisOrchestrator::new(completion, settings.analysis, settings.policy),
            indexer,
        }
    }

    pub fn registry(&self) -> &Arc<IndexRegistry> {
        &self.registry
    }

    pub async fn ingest_pdf(
        &self,
        path: &Path,
        owner: &str,
    ) -> Result<IngestOutcome, PipelineError> {
        let document = load_document(path, owner)?;
        self.ingest_document(document).await
    }

    /// Stores the document, then indexes it, both under the document's build
    /// lock. An indexing failure is logged and does not undo the upload.
    pub async fn ingest_document(
        &self,
        document: Document,
    ) -> Result<IngestOutcome, PipelineError> {
        let document_id = document.id.clone();
        let page_count = document.page_count;

        let lock = self.registry.build_lock(&document_id);
        let _guard = lock.lock().await;

        self.store.put(document.clone()).await?;

        let indexed_windows = match self.indexer.build_locked(&document).await {
            Ok(index) => Some(index.len()),
            Err(error) => {
                warn!(document_id = %document_id, error = %error, "indexing on upload failed");
                None
            }
        };

        info!(document_id = %document_id, page_count, ?indexed_windows, "report ingested");

        Ok(IngestOutcome {
            document_id,
            page_count,
            indexed_windows,
        })
    }

    pub async fn ask(
        &self,
        document_id: &str,
        question: &str,
    ) -> Result<ChatAnswer, PipelineError> {
        let document = self.document(document_id).await?;
        self.chat.answer(document_id, question, Some(&document)).await
    }

    pub async fn analyze(&self, document_id: &str) -> Result<AnalysisReport, PipelineError> {
        let document = self.document(document_id).await?;
        Ok(self
            .orchestrator
            .analyze(&document.text, document.page_count)
            .await?)
    }

    /// Deletes the report and drops its index. Waits for an upload of the same
    /// id still in flight. Returns false for unknown ids.
    pub async fn remove(&self, document_id: &str) -> Result<bool, PipelineError> {
        let lock = self.registry.build_lock(document_id);
        let _guard = lock.lock().await;

        let removed = self.store.remove(document_id).await?.is_some();
        let dropped = self.registry.remove(document_id).is_some();
        info!(document_id, removed, dropped_index = dropped, "report removed");
        Ok(removed || dropped)
    }

    async fn document(&self, document_id: &str) -> Result<Document, PipelineError> {
        self.store
            .get(document_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(document_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::models::ChatMessage;
    use crate::orchestrator::AnalysisPath;
    use crate::store::MemoryDocumentStore;
    use crate::ServiceError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct CannedCompletion;

    #[async_trait]
    impl CompletionService for CannedCompletion {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(
            &self,
            _messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<String, ServiceError> {
            Ok("Vitamin D is below range.".to_string())
        }
    }

    struct Offline;

    #[async_trait]
    impl EmbeddingService for Offline {
        fn name(&self) -> &str {
            "offline"
        }

        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ServiceError> {
            Err(ServiceError::Request("embedding service offline".to_string()))
        }
    }

    struct SlowEmbedder;

    #[async_trait]
    impl EmbeddingService for SlowEmbedder {
        fn name(&self) -> &str {
            "slow"
        }

        async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            Ok(CharacterNgramEmbedder::default().embed_text(text))
        }
    }

    fn settings() -> PipelineSettings {
        PipelineSettings {
            policy: CallPolicy::no_retry(Duration::from_secs(5)),
            ..PipelineSettings::default()
        }
    }

    fn report() -> Document {
        Document::with_id("report-1", "patient", "Vitamin D 18 ng/mL (30-100)", 1)
    }

    #[tokio::test]
    async fn uploaded_reports_can_be_asked_and_analyzed() -> Result<(), PipelineError> {
        let pipeline = ReportPipeline::new(
            MemoryDocumentStore::new(),
            CharacterNgramEmbedder::default(),
            CannedCompletion,
            settings(),
        );

        let outcome = pipeline.ingest_document(report()).await?;
        assert_eq!(outcome.indexed_windows, Some(1));

        let answer = pipeline.ask("report-1", "How is my vitamin D?").await?;
        assert_eq!(answer.answer, "Vitamin D is below range.");

        let analysis = pipeline.analyze("report-1").await?;
        assert_eq!(analysis.path, AnalysisPath::SinglePass);
        Ok(())
    }

    #[tokio::test]
    async fn failed_upload_indexing_keeps_the_document() -> Result<(), PipelineError> {
        let store = Arc::new(MemoryDocumentStore::new());
        let pipeline =
            ReportPipeline::new(Arc::clone(&store), Offline, CannedCompletion, settings());

        let outcome = pipeline.ingest_document(report()).await?;

        assert_eq!(outcome.indexed_windows, None);
        assert_eq!(store.len(), 1);
        assert!(!pipeline.registry().contains("report-1"));
        Ok(())
    }

    #[tokio::test]
    async fn removing_a_report_drops_its_index() -> Result<(), PipelineError> {
        let pipeline = ReportPipeline::new(
            MemoryDocumentStore::new(),
            CharacterNgramEmbedder::default(),
            CannedCompletion,
            settings(),
        );
        pipeline.ingest_document(report()).await?;

        assert!(pipeline.remove("report-1").await?);
        assert!(!pipeline.registry().contains("report-1"));
        assert!(matches!(
            pipeline.ask("report-1", "anything?").await,
            Err(PipelineError::NotFound(_))
        ));
        assert!(!pipeline.remove("report-1").await?);
        Ok(())
    }

    #[tokio::test]
    async fn removal_during_upload_indexing_stays_removed() -> Result<(), PipelineError> {
        let store = Arc::new(MemoryDocumentStore::new());
        let pipeline =
            ReportPipeline::new(Arc::clone(&store), SlowEmbedder, CannedCompletion, settings());
        let document = Document::with_id("report-2", "patient", "v".repeat(2_500), 1);

        let (ingested, removed) = tokio::join!(pipeline.ingest_document(document), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            pipeline.remove("report-2").await
        });

        assert_eq!(ingested?.indexed_windows, Some(3));
        assert!(removed?);
        assert!(store.is_empty());
        assert!(!pipeline.registry().contains("report-2"));
        Ok(())
    }
}
