use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use labreport_context_core::{
    chunk_document, load_document, load_folder_best_effort, load_text_document,
    AnalysisOrchestrator, CharacterNgramEmbedder, CompletionService, Document, EmbeddingService,
    GeminiClient, GroqClient, HuggingFaceEmbedder, MemoryDocumentStore, PipelineConfig,
    PipelineSettings, ReportPipeline,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "labreport-context", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Owner recorded on loaded reports
    #[arg(long, default_value = "local", env = "REPORT_OWNER")]
    owner: String,

    /// Completion provider for analysis and questions
    #[arg(long, value_enum, default_value = "groq")]
    provider: Provider,

    /// Embedding backend for the context index
    #[arg(long, value_enum, default_value = "huggingface")]
    embedder: EmbedderKind,
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Groq,
    Gemini,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    Huggingface,
    Local,
}

#[derive(Subcommand)]
enum Command {
    /// Print the analysis chunks of a report.
    Chunk {
        /// PDF or plain-text report.
        #[arg(long)]
        file: String,
        /// Maximum characters per chunk.
        #[arg(long)]
        max_chars: Option<usize>,
    },
    /// Load every PDF under a folder and build its context index.
    Ingest {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: String,
    },
    /// Ask a question about a report using its most relevant excerpts.
    Ask {
        #[arg(long)]
        file: String,
        #[arg(long)]
        question: String,
        /// Number of excerpts passed to the model.
        #[arg(long)]
        top_k: Option<usize>,
        /// Print the retrieved excerpts.
        #[arg(long, default_value_t = false)]
        show_context: bool,
    },
    /// Summarize a report, chunking it when it is long.
    Analyze {
        #[arg(long)]
        file: String,
        /// Print the full analysis report as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn load_report(path: &Path, owner: &str) -> anyhow::Result<Document> {
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    let document = if is_pdf {
        load_document(path, owner)?
    } else {
        load_text_document(path, owner)?
    };
    Ok(document)
}

fn completion_service(
    config: &PipelineConfig,
    provider: Provider,
) -> anyhow::Result<Arc<dyn CompletionService>> {
    let service: Arc<dyn CompletionService> = match provider {
        Provider::Groq => {
            let key = PipelineConfig::require_key(&config.groq, "GROQ_API_KEY")?;
            Arc::new(GroqClient::new(&config.groq.base_url, key, config.groq.model.clone())?)
        }
        Provider::Gemini => {
            let key = PipelineConfig::require_key(&config.gemini, "GEMINI_API_KEY")?;
            Arc::new(GeminiClient::new(&config.gemini.base_url, key, &config.gemini.model)?)
        }
    };
    Ok(service)
}

fn embedding_service(
    config: &PipelineConfig,
    kind: EmbedderKind,
) -> anyhow::Result<Arc<dyn EmbeddingService>> {
    let service: Arc<dyn EmbeddingService> = match kind {
        EmbedderKind::Huggingface => {
            let token = PipelineConfig::require_key(&config.huggingface, "HF_API_TOKEN")?;
            Arc::new(HuggingFaceEmbedder::new(
                &config.huggingface.base_url,
                token,
                &config.huggingface.model,
            )?)
        }
        EmbedderKind::Local => Arc::new(CharacterNgramEmbedder::default()),
    };
    Ok(service)
}

type CliPipeline =
    ReportPipeline<MemoryDocumentStore, Arc<dyn EmbeddingService>, Arc<dyn CompletionService>>;

fn build_pipeline(
    config: &PipelineConfig,
    cli: &Cli,
    top_k: Option<usize>,
) -> anyhow::Result<CliPipeline> {
    let settings = PipelineSettings {
        windows: config.windows,
        analysis: config.analysis.clone(),
        policy: config.policy,
        top_k: top_k.unwrap_or(config.top_k),
        ..PipelineSettings::default()
    };

    Ok(ReportPipeline::new(
        MemoryDocumentStore::new(),
        embedding_service(config, cli.embedder)?,
        completion_service(config, cli.provider)?,
        settings,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env()?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "labreport-context boot"
    );

    match &cli.command {
        Command::Chunk { file, max_chars } => {
            let document = load_report(Path::new(file), &cli.owner)?;
            let max_chars = max_chars.unwrap_or(config.analysis.chunk_max_chars);

            for chunk in chunk_document(&document, max_chars) {
                println!(
                    "[chunk {}/{}] chars={}",
                    chunk.index + 1,
                    chunk.total,
                    chunk.text.chars().count()
                );
                println!("{}\n", chunk.text);
            }
        }
        Command::Ingest { folder } => {
            let report = load_folder_best_effort(Path::new(folder), &cli.owner)?;

            if !report.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for folder={}",
                    report.skipped_files.len(),
                    folder
                );
                for skipped in &report.skipped_files {
                    warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped pdf");
                }
            }

            let pipeline = build_pipeline(&config, &cli, None)?;
            let mut indexed = 0usize;
            for document in report.documents {
                let source = document.source_path.clone().unwrap_or_default();
                let outcome = pipeline.ingest_document(document).await?;
                match outcome.indexed_windows {
                    Some(windows) => {
                        indexed += 1;
                        println!(
                            "{source}: id={} pages={} windows={windows}",
                            outcome.document_id, outcome.page_count
                        );
                    }
                    None => println!(
                        "{source}: id={} pages={} not indexed",
                        outcome.document_id, outcome.page_count
                    ),
                }
            }

            println!("{indexed} report(s) indexed at {}", Utc::now().to_rfc3339());
        }
        Command::Ask {
            file,
            question,
            top_k,
            show_context,
        } => {
            let pipeline = build_pipeline(&config, &cli, *top_k)?;
            let document = load_report(Path::new(file), &cli.owner)?;
            let outcome = pipeline.ingest_document(document).await?;

            let answer = pipeline.ask(&outcome.document_id, question).await?;
            if *show_context {
                for window in &answer.context {
                    println!(
                        "[excerpt {}/{}] score={:.4}\n{}\n",
                        window.chunk.index + 1,
                        window.chunk.total,
                        window.score,
                        window.chunk.text
                    );
                }
            }
            println!("{}", answer.answer);
        }
        Command::Analyze { file, json } => {
            let document = load_report(Path::new(file), &cli.owner)?;
            let orchestrator = AnalysisOrchestrator::new(
                completion_service(&config, cli.provider)?,
                config.analysis.clone(),
                config.policy,
            );

            let report = orchestrator.analyze(&document.text, document.page_count).await?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                info!(
                    path = ?report.path,
                    chunks = report.chunk_count,
                    failed = report.failed_chunks.len(),
                    synthesized = report.synthesized,
                    "analysis complete"
                );
                println!("{}", report.summary);
            }
        }
    }

    Ok(())
}
