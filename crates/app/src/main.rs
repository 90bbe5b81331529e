use chrono::Utc;
use clap::{Parser, Subcommand};
use paper_rag_core::{
    extract_text_lossy, ChatCompletionClient, LlmProvider, LopdfExtractor, Metadata,
    ResearchConfig, ResearchOrchestrator, RetryPolicy,
};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "paper-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// TOML configuration file. Missing keys keep their defaults.
    #[arg(long, env = "PAPER_RAG_CONFIG")]
    config: Option<PathBuf>,

    /// LLM provider: together or groq.
    #[arg(long, env = "LLM_PROVIDER")]
    provider: Option<LlmProvider>,

    /// Model id; defaults to the provider's first catalog entry.
    #[arg(long)]
    model: Option<String>,

    #[arg(long, env = "TOGETHER_API_KEY", hide_env_values = true)]
    together_api_key: Option<String>,

    #[arg(long, env = "GROQ_API_KEY", hide_env_values = true)]
    groq_api_key: Option<String>,

    #[arg(long, env = "SEMANTIC_SCHOLAR_API_KEY", hide_env_values = true)]
    semantic_scholar_api_key: Option<String>,

    /// Directory holding persisted collections.
    #[arg(long)]
    vector_store_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, segment and index one PDF into a new collection.
    Ingest {
        pdf: PathBuf,
        /// JSON object merged into every chunk's metadata.
        #[arg(long)]
        metadata: Option<String>,
    },
    /// Semantic search over one collection or all of them.
    Search {
        query: String,
        #[arg(long)]
        collection: Option<String>,
        #[arg(long, default_value = "5")]
        limit: usize,
    },
    /// Answer a question from retrieved chunks.
    Ask {
        question: String,
        #[arg(long)]
        collection: Option<String>,
    },
    /// Full analysis of one PDF. Ctrl-C cancels between stages.
    Analyze { pdf: PathBuf },
    /// Related papers from arXiv, Semantic Scholar and Google Scholar.
    Similar {
        /// Paper title; defaults to the PDF file name.
        #[arg(long)]
        title: Option<String>,
        /// PDF whose abstract adds search terms.
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
    /// List persisted collections.
    Collections,
    /// List the model catalog of each provider.
    Models,
}

fn load_config(cli: &Cli) -> anyhow::Result<ResearchConfig> {
    let mut config = match &cli.config {
        Some(path) => ResearchConfig::load(path)?,
        None => ResearchConfig::default(),
    };

    if let Some(provider) = cli.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = &cli.model {
        config.llm.model = Some(model.clone());
    }
    if let Some(key) = &cli.together_api_key {
        config.llm.together_api_key = Some(key.clone());
    }
    if let Some(key) = &cli.groq_api_key {
        config.llm.groq_api_key = Some(key.clone());
    }
    if let Some(key) = &cli.semantic_scholar_api_key {
        config.search.semantic_scholar_api_key = Some(key.clone());
    }
    if let Some(path) = &cli.vector_store_path {
        config.vector_store_path = path.clone();
    }

    config.validate()?;
    Ok(config)
}

fn parse_metadata(raw: Option<&str>) -> anyhow::Result<Option<Metadata>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match serde_json::from_str::<Value>(raw)? {
        Value::Object(map) => Ok(Some(map)),
        _ => anyhow::bail!("--metadata must be a JSON object"),
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling after the current stage");
            cancel.cancel();
        }
    });
    token
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    let retry = RetryPolicy::from(&config.retry);
    let llm = ChatCompletionClient::from_config(&config.llm, retry);
    let provider = llm.provider();
    let model = llm.model().to_string();
    let orchestrator = ResearchOrchestrator::from_config(&config, llm)?;
    info!(
        provider = %provider,
        model = %model,
        embedding_model = orchestrator.index().embedding_model(),
        store = %config.vector_store_path.display(),
        "configuration loaded"
    );

    match cli.command {
        Command::Ingest { pdf, metadata } => {
            let metadata = parse_metadata(metadata.as_deref())?;
            let document = orchestrator.ingest(&pdf, metadata.as_ref()).await?;
            print_json(&json!({
                "collection_id": document.collection_id,
                "chunk_count": document.chunk_count,
                "sections": document.sections,
                "citations": document.citations,
            }))?;
        }
        Command::Search {
            query,
            collection,
            limit,
        } => {
            let results = orchestrator
                .retrieve(&query, collection.as_deref(), limit)
                .await?;
            print_json(&results)?;
        }
        Command::Ask {
            question,
            collection,
        } => {
            let answer = orchestrator
                .query_paper(&question, collection.as_deref())
                .await?;
            print_json(&json!({ "question": question, "answer": answer }))?;
        }
        Command::Analyze { pdf } => {
            let outcome = orchestrator.analyze_paper(&pdf, &cancel_on_ctrl_c()).await;
            print_json(&outcome)?;
            if outcome.is_failed() {
                std::process::exit(1);
            }
        }
        Command::Similar { title, pdf } => {
            let text = pdf
                .as_deref()
                .map(|path| extract_text_lossy(&LopdfExtractor, path));
            let title = title
                .or_else(|| pdf.as_deref().and_then(file_title))
                .ok_or_else(|| anyhow::anyhow!("either --title or --pdf is required"))?;
            let papers = orchestrator.find_similar(&title, text.as_deref()).await;
            print_json(&papers)?;
        }
        Command::Collections => {
            print_json(&orchestrator.index().list_collections().await?)?;
        }
        Command::Models => {
            let catalog = LlmProvider::ALL
                .iter()
                .map(|provider| {
                    let models = provider
                        .models()
                        .iter()
                        .map(|(id, name)| json!({ "id": id, "name": name }))
                        .collect::<Vec<_>>();
                    (provider.name().to_string(), Value::from(models))
                })
                .collect::<serde_json::Map<_, _>>();
            print_json(&catalog)?;
        }
    }

    Ok(())
}

fn file_title(path: &Path) -> Option<String> {
    path.file_stem().map(|stem| stem.to_string_lossy().into_owned())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "paper-rag boot"
    );

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        print_json(&json!({ "error": format!("{error:#}") }))?;
        std::process::exit(1);
    }
    Ok(())
}
