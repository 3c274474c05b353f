use super::ensure_success;
use crate::models::{ChatMessage, GenerationParams, Role};
use crate::traits::CompletionService;
use crate::ServiceError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

const BACKEND: &str = "gemini";

pub struct GeminiClient {
    client: Client,
    endpoint: Url,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        model: &str,
    ) -> Result<Self, ServiceError> {
        let endpoint = Url::parse(base_url)?.join(&format!("models/{model}:generateContent"))?;
        Ok(Self {
            client: Client::new(),
            endpoint,
            api_key: api_key.into(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Gemini takes system text separately and calls the assistant role "model".
fn request_body(messages: &[ChatMessage], params: &GenerationParams) -> Value {
    let system = messages
        .iter()
        .filter(|message| message.role == Role::System)
        .map(|message| message.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let contents = messages
        .iter()
        .filter(|message| message.role != Role::System)
        .map(|message| {
            let role = if message.role == Role::Assistant { "model" } else { "user" };
            json!({"role": role, "parts": [{"text": message.content}]})
        })
        .collect::<Vec<_>>();

    let mut body = json!({
        "contents": contents,
        "generationConfig": {
            "temperature": params.temperature,
            "maxOutputTokens": params.max_tokens,
        },
    });

    if !system.is_empty() {
        body["systemInstruction"] = json!({"parts": [{"text": system}]});
    }

    body
}

fn parse_completion(payload: &Value) -> Result<String, ServiceError> {
    let text = payload
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let reason = payload
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
            .unwrap_or("no candidate text");
        return Err(ServiceError::InvalidPayload {
            backend: BACKEND.to_string(),
            details: reason.to_string(),
        });
    }

    Ok(text.trim().to_string())
}

#[async_trait]
impl CompletionService for GeminiClient {
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
            .query(&[("key", self.api_key.as_str())])
            .json(&request_body(messages, params))
            .send()
            .await?;

        let payload: Value = ensure_success(BACKEND, response).await?.json().await?;
        parse_completion(&payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_names_the_model() {
        let client =
            GeminiClient::new(DEFAULT_GEMINI_BASE_URL, "key", "gemini-pro").expect("valid url");
        assert_eq!(
            client.endpoint().as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-pro:generateContent"
        );
    }

    #[test]
    fn system_messages_become_system_instruction() {
        let body = request_body(
            &[ChatMessage::system("be brief"), ChatMessage::user("summarize")],
            &GenerationParams::default(),
        );

        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["contents"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn candidate_parts_are_concatenated() {
        let payload = json!({
            "candidates": [{"content": {"parts": [{"text": "Iron "}, {"text": "is low."}]}}]
        });
        assert_eq!(parse_completion(&payload).ok().as_deref(), Some("Iron is low."));
    }

    #[test]
    fn blocked_prompts_report_the_reason() {
        let payload = json!({"promptFeedback": {"blockReason": "SAFETY"}});
        match parse_completion(&payload) {
            Err(ServiceError::InvalidPayload { details, .. }) => assert_eq!(details, "SAFETY"),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
