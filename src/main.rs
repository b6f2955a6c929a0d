//! # FineLaw — fine lookup chat over a legal code
//!
//! Parses the code once, builds (or reopens) the article index, then answers
//! questions from stdin until EOF or interrupt. Each input line is trimmed
//! and blank lines are skipped without a remote call.
//!
//! Usage:
//!   finelaw --code-path koap.txt --save-path ./index --api-key sk-...
//!   finelaw --code-path koap.txt --top-k 5 --verbose
//!   finelaw --config ./finelaw.toml

use anyhow::{Context, Result};
use clap::Parser;
use finelaw_agent::FineChat;
use finelaw_core::config::{FineLawConfig, expand_path};
use finelaw_knowledge::{HttpEmbedder, KnowledgeStore, ParserOptions, parse_file};
use tokio::io::AsyncBufReadExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "finelaw",
    version,
    about = "⚖️ FineLaw — administrative fine Q&A over a legal code"
)]
struct Cli {
    /// Path to the txt file with the legal code
    #[arg(long)]
    code_path: Option<String>,

    /// Directory for the vector index
    #[arg(long)]
    save_path: Option<String>,

    /// Embedding model used for the index
    #[arg(long)]
    vector_model_name: Option<String>,

    /// OpenAI-compatible embeddings endpoint
    #[arg(long)]
    embedding_endpoint: Option<String>,

    /// API key for the chat service (falls back to OPENAI_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Articles retrieved per question
    #[arg(long)]
    top_k: Option<usize>,

    /// Config file (default: ~/.finelaw/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut FineLawConfig) {
        if let Some(path) = &self.code_path {
            config.parser.code_path = path.clone();
        }
        if let Some(path) = &self.save_path {
            config.retrieval.save_path = path.clone();
        }
        if let Some(model) = &self.vector_model_name {
            config.retrieval.embedding_model = model.clone();
        }
        if let Some(endpoint) = &self.embedding_endpoint {
            config.retrieval.embedding_endpoint = endpoint.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = key.clone();
        }
        if let Some(k) = self.top_k {
            config.retrieval.top_k = k;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "finelaw=debug" } else { "finelaw=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => FineLawConfig::load_from(&expand_path(path)?)?,
        None => FineLawConfig::load()?,
    };
    cli.apply(&mut config);

    if config.parser.code_path.is_empty() {
        anyhow::bail!("no legal code given: pass --code-path or set parser.code_path in the config");
    }
    let code_path = expand_path(&config.parser.code_path)?;
    let save_path = expand_path(&config.retrieval.save_path)?;

    let articles = parse_file(&code_path, &ParserOptions::from(&config.parser))
        .with_context(|| format!("failed to load {}", code_path.display()))?;

    let embedder = HttpEmbedder::from_config(&config.retrieval);
    let store = KnowledgeStore::build(&articles, &save_path, &config.retrieval.collection, Box::new(embedder))
        .await
        .with_context(|| format!("failed to build index at {}", save_path.display()))?;
    drop(articles);

    tracing::info!(
        "⚖️ FineLaw v{} ready: {} articles in '{}' ({}), top-k {}",
        env!("CARGO_PKG_VERSION"),
        store.count()?,
        store.collection_name(),
        store.embedding_model(),
        config.retrieval.top_k
    );

    let chat = FineChat::from_config(&config, store)?;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!("{}", config.chat.greeting);
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        match chat.respond(query).await {
            Ok(answer) => println!("{answer}"),
            Err(e) => tracing::error!("❌ Failed to answer '{}': {}", query, e),
        }
    }

    Ok(())
}
