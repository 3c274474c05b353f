use crate::chunking::split_into_chunks;
use crate::models::AnalysisOptions;
use crate::prompts;
use crate::retry::CallPolicy;
use crate::traits::CompletionService;
use crate::{AnalysisError, ServiceError};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum AnalysisStage {
    Received,
    Chunking,
    PerChunkAnalysis,
    Synthesis,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum AnalysisPath {
    SinglePass,
    MultiStage,
}

/// Result of one per-chunk extraction call.
#[derive(Debug)]
pub struct ChunkOutcome {
    pub index: usize,
    pub result: Result<String, ServiceError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub path: AnalysisPath,
    pub summary: String,
    pub chunk_count: usize,
    pub failed_chunks: Vec<usize>,
    /// False when the synthesis call failed and `summary` holds the raw per-chunk findings.
    pub synthesized: bool,
    pub stages: Vec<AnalysisStage>,
}

struct StageTrace {
    stages: Vec<AnalysisStage>,
}

impl StageTrace {
    fn new() -> Self {
        let mut trace = Self { stages: Vec::new() };
        trace.enter(AnalysisStage::Received);
        trace
    }

    fn enter(&mut self, stage: AnalysisStage) {
        debug!(?stage, "analysis stage");
        self.stages.push(stage);
    }
}

/// Picks single-pass or chunked analysis for extracted report text and drives
/// the completion calls for it.
pub struct AnalysisOrchestrator<C>
where
    C: CompletionService,
{
    completion: C,
    options: AnalysisOptions,
    policy: CallPolicy,
}

impl<C> AnalysisOrchestrator<C>
where
    C: CompletionService,
{
    pub fn new(completion: C, options: AnalysisOptions, policy: CallPolicy) -> Self {
        Self {
            completion,
            options,
            policy,
        }
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    pub fn is_single_pass(&self, text: &str, page_count: u32) -> bool {
        page_count == 1 && text.chars().count() < self.options.single_pass_threshold
    }

    pub async fn analyze(
        &self,
        text: &str,
        page_count: u32,
    ) -> Result<AnalysisReport, AnalysisError> {
        let mut trace = StageTrace::new();
        trace.enter(AnalysisStage::Chunking);

        if text.trim().is_empty() {
            trace.enter(AnalysisStage::Failed);
            return Err(AnalysisError::EmptyInput);
        }

        if self.is_single_pass(text, page_count) {
            self.single_pass(text, trace).await
        } else {
            self.multi_stage(text, trace).await
        }
    }

    async fn single_pass(
        &self,
        text: &str,
        mut trace: StageTrace,
    ) -> Result<AnalysisReport, AnalysisError> {
        info!(chars = text.chars().count(), "single-pass analysis");
        trace.enter(AnalysisStage::Synthesis);

        let messages = prompts::summary_messages(text);
        let params = self.options.summary_params;
        match self
            .policy
            .run("summarize report", || self.completion.complete(&messages, &params))
            .await
        {
            Ok(summary) => {
                trace.enter(AnalysisStage::Complete);
                Ok(AnalysisReport {
                    path: AnalysisPath::SinglePass,
                    summary,
                    chunk_count: 1,
                    failed_chunks: Vec::new(),
                    synthesized: true,
                    stages: trace.stages,
                })
            }
            Err(error) => {
                warn!(
                    error = %error,
                    backend = self.completion.name(),
                    "single-pass analysis failed"
                );
                trace.enter(AnalysisStage::Failed);
                Err(AnalysisError::AnalysisUnavailable {
                    attempted: 1,
                    last_error: error.to_string(),
                    stages: trace.stages,
                })
            }
        }
    }

    async fn multi_stage(
        &self,
        text: &str,
        mut trace: StageTrace,
    ) -> Result<AnalysisReport, AnalysisError> {
        let chunks = split_into_chunks(text, self.options.chunk_max_chars);
        let total = chunks.len();
        info!(
            chars = text.chars().count(),
            chunks = total,
            concurrency = self.options.concurrency.max(1),
            "multi-stage analysis"
        );

        trace.enter(AnalysisStage::PerChunkAnalysis);
        let outcomes = self.extract_chunks(&chunks).await;

        let mut findings = Vec::new();
        let mut failed_chunks = Vec::new();
        let mut last_error = None;
        for outcome in outcomes {
            match outcome.result {
                Ok(finding) => findings.push(format!(
                    "### Section {} of {total}\n{}",
                    outcome.index + 1,
                    finding.trim()
                )),
                Err(error) => {
                    warn!(
                        chunk_index = outcome.index,
                        error = %error,
                        "chunk analysis failed, dropping its findings"
                    );
                    failed_chunks.push(outcome.index);
                    last_error = Some(error.to_string());
                }
            }
        }

        if findings.is_empty() {
            trace.enter(AnalysisStage::Synthesis);
            trace.enter(AnalysisStage::Failed);
            return Err(AnalysisError::AnalysisUnavailable {
                attempted: total,
                last_error: last_error.unwrap_or_else(|| "no chunks produced".to_string()),
                stages: trace.stages,
            });
        }

        trace.enter(AnalysisStage::Synthesis);
        let combined = findings.join("\n\n");
        let messages = prompts::synthesis_messages(&combined, findings.len());
        let params = self.options.synthesis_params;

        let (summary, synthesized) = match self
            .policy
            .run("synthesize findings", || self.completion.complete(&messages, &params))
            .await
        {
            Ok(summary) => (summary, true),
            Err(error) => {
                warn!(error = %error, "synthesis failed, returning per-chunk findings");
                (combined, false)
            }
        };

        trace.enter(AnalysisStage::Complete);
        Ok(AnalysisReport {
            path: AnalysisPath::MultiStage,
            summary,
            chunk_count: total,
            failed_chunks,
            synthesized,
            stages: trace.stages,
        })
    }

    /// One extraction call per chunk. `buffered` keeps outcomes in chunk order
    /// whatever the concurrency.
    async fn extract_chunks(&self, chunks: &[String]) -> Vec<ChunkOutcome> {
        let total = chunks.len();
        let params = self.options.extraction_params;

        stream::iter(chunks.iter().enumerate())
            .map(|(index, chunk)| async move {
                let messages = prompts::extraction_messages(chunk, index, total);
                let result = self
                    .policy
                    .run("extract chunk findings", || self.completion.complete(&messages, &params))
                    .await;
                ChunkOutcome { index, result }
            })
            .buffered(self.options.concurrency.max(1))
            .collect()
            .await
    }
}
