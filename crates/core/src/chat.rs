use crate::models::{Document, GenerationParams, RetrievedWindow};
use crate::prompts;
use crate::retriever::ContextRetriever;
use crate::traits::{CompletionService, EmbeddingService};
use crate::{ContextError, PipelineError};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub context: Vec<RetrievedWindow>,
}

/// Answers questions about one report from its most relevant windows.
pub struct ReportChat<E, C>
where
    E: EmbeddingService,
    C: CompletionService,
{
    retriever: Arc<ContextRetriever<E>>,
    completion: C,
    top_k: usize,
    params: GenerationParams,
}

impl<E, C> ReportChat<E, C>
where
    E: EmbeddingService,
    C: CompletionService,
{
    pub fn new(
        retriever: Arc<ContextRetriever<E>>,
        completion: C,
        top_k: usize,
        params: GenerationParams,
    ) -> Self {
        Self {
            retriever,
            completion,
            top_k,
            params,
        }
    }

    pub async fn answer(
        &self,
        document_id: &str,
        question: &str,
        fallback: Option<&Document>,
    ) -> Result<ChatAnswer, PipelineError> {
        let context = self
            .retriever
            .retrieve(document_id, question, self.top_k, fallback)
            .await?;

        if context.is_empty() {
            return Err(ContextError::ContextUnavailable {
                document_id: document_id.to_string(),
                reason: "no windows matched the question".to_string(),
            }
            .into());
        }

        let messages = prompts::chat_messages(question, &context);
        let answer = self
            .retriever
            .indexer()
            .policy()
            .run("answer question", || self.completion.complete(&messages, &self.params))
            .await?;

        info!(
            document_id,
            windows = context.len(),
            backend = self.completion.name(),
            "question answered"
        );

        Ok(ChatAnswer { answer, context })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::index::{ContextIndexer, IndexRegistry};
    use crate::models::{ChatMessage, WindowConfig};
    use crate::retry::CallPolicy;
    use crate::ServiceError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingCompletion {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionService for RecordingCompletion {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(
            &self,
            messages: &[ChatMessage],
            _params: &GenerationParams,
        ) -> Result<String, ServiceError> {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.extend(messages.iter().map(|message| message.content.clone()));
            }
            Ok("Your TSH is slightly high.".to_string())
        }
    }

    fn chat(
        completion: Arc<RecordingCompletion>,
    ) -> ReportChat<CharacterNgramEmbedder, Arc<RecordingCompletion>> {
        let indexer = ContextIndexer::new(
            CharacterNgramEmbedder::default(),
            Arc::new(IndexRegistry::new()),
            WindowConfig { size: 80, overlap: 0 },
            CallPolicy::no_retry(Duration::from_secs(5)),
        );
        let retriever = Arc::new(ContextRetriever::new(Arc::new(indexer)));
        ReportChat::new(retriever, completion, 1, GenerationParams::default())
    }

    #[tokio::test]
    async fn answer_includes_retrieved_excerpts_in_prompt() {
        let completion = Arc::new(RecordingCompletion::default());
        let chat = chat(Arc::clone(&completion));
        let document = Document::with_id(
            "report-9",
            "patient",
            "Thyroid panel: TSH 6.8 mIU/L.\n\nLipid panel: LDL 162 mg/dL.",
            1,
        );

        let answer = chat
            .answer(&document.id, "What is my TSH level?", Some(&document))
            .await
            .expect("answer succeeds");

        assert_eq!(answer.answer, "Your TSH is slightly high.");
        assert_eq!(answer.context.len(), 1);
        let prompts = completion.prompts.lock().map(|p| p.join("\n")).unwrap_or_default();
        assert!(prompts.contains("TSH 6.8"));
        assert!(prompts.contains("What is my TSH level?"));
    }

    #[tokio::test]
    async fn unknown_report_without_text_is_unavailable() {
        let chat = chat(Arc::new(RecordingCompletion::default()));

        let result = chat.answer("missing", "anything?", None).await;

        assert!(matches!(
            result,
            Err(PipelineError::Context(ContextError::ContextUnavailable { .. }))
        ));
    }
}
