pub mod chat;
pub mod chunking;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod retry;
pub mod services;
pub mod store;
pub mod traits;

pub use chat::{ChatAnswer, ReportChat};
pub use chunking::{
    chunk_document, normalize_page_text, page_marker, split_into_chunks, split_windows,
    window_document,
};
pub use config::{PipelineConfig, ProviderConfig};
pub use embeddings::{cosine_similarity, CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{AnalysisError, ConfigError, ContextError, IngestError, PipelineError, ServiceError};
pub use extractor::{extract_page_texts, join_pages, LopdfExtractor, PageText, PdfExtractor};
pub use index::{ContextIndex, ContextIndexer, IndexRegistry};
pub use ingest::{
    discover_pdf_files, load_document, load_folder_best_effort, load_text_document,
    FolderLoadReport, SkippedPdf,
};
pub use models::{
    AnalysisOptions, ChatMessage, Chunk, Document, EmbeddingRecord, GenerationParams,
    RetrievedWindow, Role, WindowConfig,
};
pub use orchestrator::{
    AnalysisOrchestrator, AnalysisPath, AnalysisReport, AnalysisStage, ChunkOutcome,
};
pub use pipeline::{IngestOutcome, PipelineSettings, ReportPipeline};
pub use retriever::ContextRetriever;
pub use retry::CallPolicy;
pub use services::{GeminiClient, GroqClient, HuggingFaceEmbedder};
pub use store::MemoryDocumentStore;
pub use traits::{CompletionService, DocumentStore, EmbeddingService};
