//! `tutor-retrieve`: hybrid retrieval over a pre-built index snapshot.
//!
//! ```bash
//! tutor-retrieve "What is photosynthesis?"
//! tutor-retrieve "krebs cycle" --top-k 8 --no-external --json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use tutor_core::config::{resolve_with_base, Config};
use tutor_core::settings::Settings;
use tutor_embed::{EmbedBackend, OllamaGenerator};
use tutor_external::{ExternalKnowledgeClient, ExternalServices};
use tutor_hybrid::{Deduplicator, HybridOrchestrator, QueryExpander, RetrievalOutcome, RetrieveOptions};
use tutor_text::{LexicalSearcher, LexicalSnapshot};
use tutor_vector::{StoredIndex, VectorSearcher};

#[derive(Parser)]
#[command(name = "tutor-retrieve", version, about = "Retrieve fused context for a question")]
struct Cli {
    /// Question to retrieve context for
    query: String,

    /// Number of local results to keep
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Search with the original query only
    #[arg(long)]
    no_multi_query: bool,

    /// Vector search only, no BM25 fusion
    #[arg(long)]
    no_hybrid: bool,

    /// Never consult the external knowledge source
    #[arg(long)]
    no_external: bool,

    /// Print the outcome as JSON
    #[arg(long)]
    json: bool,

    /// Directory holding config.toml
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,
}

fn expander(config: &Config, settings: &Settings) -> Result<QueryExpander> {
    match config.get::<String>("llm.model") {
        Ok(model) if !model.is_empty() => {
            let url = config.get::<String>("llm.ollama_url").unwrap_or_else(|_| settings.index.ollama_url.clone());
            Ok(QueryExpander::new(Arc::new(OllamaGenerator::new(url, model)?)))
        }
        _ => Ok(QueryExpander::heuristic()),
    }
}

fn build(cli: &Cli, config: &Config, settings: &Settings) -> Result<HybridOrchestrator> {
    let index_dir = resolve_with_base(&cli.config_dir, &settings.index.dir);
    let stored = StoredIndex::load(&index_dir).with_context(|| format!("loading index from {}", index_dir.display()))?;

    let backend = EmbedBackend::from_settings(&settings.index)?;
    let backend_name = backend.name();
    let embedder = backend.build();
    stored
        .check_drift(backend_name, &settings.index.embed_model, embedder.dim())
        .context("index does not match the embedding backend; re-ingest required")?;

    let vector = VectorSearcher::new(embedder, stored.vector_snapshot()?)?;
    let lexical = LexicalSearcher::new(LexicalSnapshot::from_chunks(stored.chunks.clone()));
    let mut orchestrator = HybridOrchestrator::new(
        Arc::new(vector),
        Arc::new(lexical),
        expander(config, settings)?,
        Deduplicator::from_settings(&settings.retrieval.dedup),
    );

    if settings.external.enabled && !cli.no_external {
        match ExternalKnowledgeClient::new(&settings.external, ExternalServices::from_settings(settings)) {
            Ok(client) => orchestrator = orchestrator.with_external(Arc::new(client)),
            Err(e) => warn!(error = %e, "external knowledge disabled"),
        }
    }
    Ok(orchestrator)
}

fn print_human(outcome: &RetrievalOutcome) {
    println!("{}", outcome.context());
    if let Some(record) = &outcome.external {
        println!("\n{}", record.attribution());
    }
    if outcome.variants.len() > 1 {
        println!("\nQuery variants:");
        for v in &outcome.variants {
            println!("  - {v}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Config::load_from(&cli.config_dir).context("loading configuration")?;
    let settings = config.settings()?;
    let orchestrator = build(&cli, &config, &settings)?;

    let mut opts = RetrieveOptions::from_settings(&settings);
    if let Some(k) = cli.top_k {
        opts.top_k = k.max(1);
    }
    opts.multi_query &= !cli.no_multi_query;
    opts.hybrid &= !cli.no_hybrid;
    opts.external &= !cli.no_external;

    let outcome = orchestrator.retrieve(&cli.query, &opts).await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_human(&outcome);
    }
    Ok(())
}
