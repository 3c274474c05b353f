use super::ensure_success;
use crate::embeddings::mean_pool;
use crate::traits::EmbeddingService;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_HF_BASE_URL: &str = "https://api-inference.huggingface.co/";
pub const DEFAULT_HF_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

const BACKEND: &str = "huggingface";

/// Feature-extraction embeddings from the Hugging Face inference API.
pub struct HuggingFaceEmbedder {
    client: Client,
    endpoint: Url,
    api_token: String,
}

impl HuggingFaceEmbedder {
    pub fn new(
        base_url: &str,
        api_token: impl Into<String>,
        model: &str,
    ) -> Result<Self, ServiceError> {
        let endpoint = Url::parse(base_url)?.join(&format!("pipeline/feature-extraction/{model}"))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            api_token: api_token.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Accepts a flat sentence vector, or token rows (optionally batch-wrapped) which
/// are mean-pooled.
fn parse_embedding(payload: &Value) -> Result<Vec<f32>, ServiceError> {
    let invalid = |details: &str| ServiceError::InvalidPayload {
        backend: BACKEND.to_string(),
        details: details.to_string(),
    };

    let mut current = payload;
    loop {
        let items = current.as_array().ok_or_else(|| invalid("expected a json array"))?;
        let first = items.first().ok_or_else(|| invalid("empty embedding"))?;

        if first.is_number() {
            return to_vector(items).ok_or_else(|| invalid("non-numeric embedding value"));
        }

        let is_token_rows = first
            .as_array()
            .and_then(|row| row.first())
            .is_some_and(Value::is_number);
        if is_token_rows {
            let rows = items
                .iter()
                .map(|row| row.as_array().and_then(|values| to_vector(values)))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| invalid("ragged token embeddings"))?;
            return mean_pool(&rows).ok_or_else(|| invalid("ragged token embeddings"));
        }

        current = first;
    }
}

fn to_vector(values: &[Value]) -> Option<Vec<f32>> {
    values
        .iter()
        .map(|value| value.as_f64().map(|number| number as f32))
        .collect()
}

#[async_trait]
impl EmbeddingService for HuggingFaceEmbedder {
    fn name(&self) -> &str {
        BACKEND
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_token)
            .json(&json!({
                "inputs": text,
                "options": {"wait_for_model": true},
            }))
            .send()
            .await?;

        let payload: Value = ensure_success(BACKEND, response).await?.json().await?;
        parse_embedding(&payload)
    }
}
