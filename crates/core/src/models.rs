use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Full extracted text of one uploaded report. Never edited after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub owner: String,
    pub text: String,
    pub page_count: u32,
    pub source_path: Option<String>,
    pub checksum: String,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn from_text(owner: impl Into<String>, text: impl Into<String>, page_count: u32) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), owner, text, page_count)
    }

    pub fn with_id(
        id: impl Into<String>,
        owner: impl Into<String>,
        text: impl Into<String>,
        page_count: u32,
    ) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            owner: owner.into(),
            checksum: text_checksum(&text),
            text,
            page_count,
            source_path: None,
            created_at: Utc::now(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

pub fn text_checksum(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Contiguous piece of a document. `index` runs from 0 to `total - 1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    pub document_id: String,
    pub index: usize,
    pub total: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

impl EmbeddingRecord {
    pub fn document_id(&self) -> &str {
        &self.chunk.document_id
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk.index
    }

    pub fn total_chunks(&self) -> usize {
        self.chunk.total
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedWindow {
    pub chunk: Chunk,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 1_024,
        }
    }
}

/// Sizes for the overlapping windows used by the retrieval index.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WindowConfig {
    pub size: usize,
    pub overlap: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            size: 1_000,
            overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Single-page documents shorter than this many chars are summarized in one call.
    pub single_pass_threshold: usize,
    pub chunk_max_chars: usize,
    /// Per-chunk extraction calls in flight at once. 1 means sequential.
    pub concurrency: usize,
    pub summary_params: GenerationParams,
    pub extraction_params: GenerationParams,
    pub synthesis_params: GenerationParams,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            single_pass_threshold: 5_000,
            chunk_max_chars: 6_000,
            concurrency: 1,
            summary_params: GenerationParams::default(),
            extraction_params: GenerationParams {
                temperature: 0.1,
                max_tokens: 800,
            },
            synthesis_params: GenerationParams {
                temperature: 0.3,
                max_tokens: 1_500,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_from_same_text_share_checksum_not_id() {
        let first = Document::from_text("user-1", "Hemoglobin 13.2 g/dL", 1);
        let second = Document::from_text("user-1", "Hemoglobin 13.2 g/dL", 1);

        assert_eq!(first.checksum, second.checksum);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn char_len_counts_scalar_values() {
        let document = Document::with_id("doc", "owner", "µg/dL", 1);
        assert_eq!(document.char_len(), 5);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let message = ChatMessage::system("hi");
        let encoded = serde_json::to_value(&message).expect("message serializes");
        assert_eq!(encoded["role"], "system");
    }
}
