pub mod gemini;
pub mod groq;
pub mod huggingface;

pub use gemini::GeminiClient;
pub use groq::GroqClient;
pub use huggingface::HuggingFaceEmbedder;

use crate::ServiceError;
use reqwest::Response;

/// Passes successful responses through and turns the rest into `BackendResponse`.
pub(crate) async fn ensure_success(
    backend: &str,
    response: Response,
) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let details = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());

    Err(ServiceError::BackendResponse {
        backend: backend.to_string(),
        status: status.as_u16(),
        details,
    })
}
