use crate::orchestrator::AnalysisStage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

/// Failure of one call to an external embedding or completion service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid response from {backend} ({status}): {details}")]
    BackendResponse {
        backend: String,
        status: u16,
        details: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u128 },

    #[error("unexpected payload from {backend}: {details}")]
    InvalidPayload { backend: String, details: String },

    #[error("service request failed: {0}")]
    Request(String),
}

impl ServiceError {
    /// Transport failures, throttling and server errors are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(error) => error.is_timeout() || error.is_connect() || error.is_request(),
            Self::BackendResponse { status, .. } => *status == 429 || *status >= 500,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("indexing failed for document {document_id}: {source}")]
    IndexingFailed {
        document_id: String,
        #[source]
        source: ServiceError,
    },

    #[error("document {document_id} has no indexable text")]
    EmptyDocument { document_id: String },

    #[error("no context available for document {document_id}: {reason}")]
    ContextUnavailable { document_id: String, reason: String },

    #[error("query embedding failed: {0}")]
    QueryEmbeddingFailed(#[source] ServiceError),

    #[error("embedding dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("document text is empty")]
    EmptyInput,

    #[error("analysis unavailable: all {attempted} call(s) failed, last error: {last_error}")]
    AnalysisUnavailable {
        attempted: usize,
        last_error: String,
        /// Stages traversed before the failure, ending in `Failed`.
        stages: Vec<AnalysisStage>,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration value: {0}")]
    Missing(String),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("document not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::ServiceError;

    #[test]
    fn throttling_and_timeouts_are_retryable() {
        let throttled = ServiceError::BackendResponse {
            backend: "groq".to_string(),
            status: 429,
            details: "rate limited".to_string(),
        };
        let rejected = ServiceError::BackendResponse {
            backend: "groq".to_string(),
            status: 400,
            details: "bad request".to_string(),
        };
        let timeout = ServiceError::Timeout {
            operation: "embed".to_string(),
            after_ms: 10,
        };

        assert!(throttled.is_retryable());
        assert!(!rejected.is_retryable());
        assert!(timeout.is_retryable());
        assert!(!ServiceError::Request("nope".to_string()).is_retryable());
    }
}
