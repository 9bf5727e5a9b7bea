//! embed-cli: embed documents with Mistral and print the vectors. Config from env and optional CLI args.

use std::io::{self, BufRead};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use embedding::{EmbeddingService, EnvEmbeddingConfig};
use mistral_embedding::MistralEmbedding;
use tracing::info;

#[derive(Parser)]
#[command(name = "embed-cli")]
#[command(about = "Embed documents with the Mistral embeddings API", long_about = None)]
#[command(version)]
struct Cli {
    /// Documents to embed; one per stdin line when omitted.
    docs: Vec<String>,

    /// Embedding model (overrides EMBEDDING_MODEL).
    #[arg(short, long)]
    model: Option<String>,

    /// Mistral API key (overrides MISTRALAI_API_KEY).
    #[arg(long)]
    api_key: Option<String>,

    /// Similarity threshold reported with the vectors (overrides EMBEDDING_SCORE_THRESHOLD).
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Mistral API base URL (overrides MISTRAL_BASE_URL).
    #[arg(long)]
    base_url: Option<String>,

    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// JSON array with one vector per document.
    Json,
    /// Count, dimension and threshold only.
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logs go to stderr so stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = EnvEmbeddingConfig::from_env()
        .context("Load embedding config from .env (EMBEDDING_MODEL, MISTRALAI_API_KEY, MISTRAL_BASE_URL)")?;
    let service = build_service(&cli, &config)?;

    let docs = if cli.docs.is_empty() {
        read_documents(io::stdin().lock())?
    } else {
        cli.docs.clone()
    };
    if docs.is_empty() {
        anyhow::bail!("No documents given: pass them as arguments or one per line on stdin");
    }

    info!(count = docs.len(), model = %service.model(), "embedding documents");
    let vectors = service.embed_batch(&docs).await?;

    println!("{}", render(&vectors, service.score_threshold(), cli.format)?);
    Ok(())
}

/// CLI flags override env config; the merged config is validated before the service is built.
fn build_service(cli: &Cli, config: &EnvEmbeddingConfig) -> Result<MistralEmbedding> {
    let mut config = config.clone();
    if let Some(model) = &cli.model {
        config.embedding_model = Some(model.clone());
    }
    if let Some(threshold) = cli.threshold {
        config.score_threshold = threshold;
    }
    if let Some(api_key) = &cli.api_key {
        config.mistral_api_key = Some(api_key.clone());
    }
    if let Some(base_url) = &cli.base_url {
        config.mistral_base_url = Some(base_url.clone());
    }
    MistralEmbedding::from_config(&config).context("Create Mistral embedding service")
}

/// One document per non-blank line.
fn read_documents(reader: impl BufRead) -> Result<Vec<String>> {
    let mut docs = Vec::new();
    for line in reader.lines() {
        let line = line.context("Read documents from stdin")?;
        if !line.trim().is_empty() {
            docs.push(line);
        }
    }
    Ok(docs)
}

fn render(vectors: &[Vec<f32>], score_threshold: f32, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(vectors)?),
        OutputFormat::Summary => {
            let dimension = vectors.first().map(|v| v.len()).unwrap_or(0);
            Ok(format!(
                "Vectors: {}, Dimension: {}, Score threshold: {}",
                vectors.len(),
                dimension,
                score_threshold
            ))
        }
    }
}
