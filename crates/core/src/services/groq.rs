use super::ensure_success;
use crate::models::{ChatMessage, GenerationParams};
use crate::traits::CompletionService;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1/";
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";

const BACKEND: &str = "groq";

/// Chat completions over Groq's OpenAI-compatible API.
pub struct GroqClient {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

impl GroqClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let base = Url::parse(base_url)?;
        Ok(Self {
            client: Client::new(),
            endpoint: base.join("chat/completions")?,
            api_key: api_key.into(),
            model: model.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

fn request_body(model: &str, messages: &[ChatMessage], params: &GenerationParams) -> Value {
    json!({
        "model": model,
        "messages": messages,
        "temperature": params.temperature,
        "max_tokens": params.max_tokens,
    })
}

fn parse_completion(payload: &Value) -> Result<String, ServiceError> {
    payload
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or_else(|| ServiceError::InvalidPayload {
            backend: BACKEND.to_string(),
            details: "response has no choices[0].message.content".to_string(),
        })
}

#[async_trait]
impl CompletionService for GroqClient {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        params: &GenerationParams,
    ) -> Result<String, ServiceError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&request_body(&self.model, messages, params))
            .send()
            .await?;

        let payload: Value = ensure_success(BACKEND, response).await?.json().await?;
        parse_completion(&payload)
    }
}
