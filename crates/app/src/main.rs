use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use policy_rag_core::state::clear_state;
use policy_rag_core::{
    format_contexts, CharacterNgramEmbedder, Embedder, EmbeddingSettings, HttpEmbedder,
    InMemoryVectorStore, IndexBuilder, IndexReport, IndexSettings, IngestionOptions,
    OcrEndpointConfig, OcrFallbackExtractor, QdrantSettings, QdrantStore, Retriever,
    TextExtractor, VectorStore, DEFAULT_BATCH_SIZE, DEFAULT_TOP_K,
};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "policy-rag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Qdrant base URL
    #[arg(long, env = "QDRANT_URL", default_value = "http://localhost:6333")]
    qdrant_url: String,

    /// Qdrant collection
    #[arg(long, env = "QDRANT_COLLECTION", default_value = "university_policies")]
    qdrant_collection: String,

    /// Embedding model served by the embedding endpoint.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "BAAI/bge-base-en-v1.5")]
    embedding_model: String,

    /// Base URL of an OpenAI-compatible embeddings API.
    #[arg(long, env = "EMBEDDING_URL", default_value = "http://localhost:8080/v1")]
    embedding_url: String,

    #[arg(long, env = "EMBEDDING_API_KEY", hide_env_values = true)]
    embedding_api_key: Option<String>,

    /// Folder with the source PDFs.
    #[arg(long, env = "RAW_DIR", default_value = "data/raw")]
    raw_dir: PathBuf,

    /// Folder for the chunk file and the index state.
    #[arg(long, env = "PROCESSED_DIR", default_value = "data/processed")]
    processed_dir: PathBuf,

    #[arg(long, env = "CHUNK_WORDS", default_value_t = IngestionOptions::default().chunk_words)]
    chunk_words: usize,

    #[arg(long, env = "CHUNK_OVERLAP", default_value_t = IngestionOptions::default().chunk_overlap)]
    chunk_overlap: usize,

    /// Chunks embedded and upserted per committed batch.
    #[arg(long, env = "BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// OCR endpoint used for PDFs without a text layer.
    #[arg(long, env = "LLM_OCR_ENDPOINT")]
    ocr_endpoint: Option<String>,

    #[arg(long, env = "LLM_OCR_API_KEY", hide_env_values = true)]
    ocr_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, embed and upsert every PDF, resuming from the last committed batch.
    Index {
        /// Delete the collection, the chunk file and the checkpoint, then build from scratch.
        #[arg(long, default_value_t = false)]
        restart: bool,
        /// Dry run with the trigram embedder and an in-memory store.
        #[arg(long, default_value_t = false)]
        offline: bool,
    },
    /// Retrieve the chunks closest to a question.
    Search {
        #[arg(long)]
        query: String,
        /// Number of hits to return.
        #[arg(long, env = "TOP_K", default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Delete the collection and the index state.
    Reset,
}

impl Cli {
    fn index_settings(&self) -> IndexSettings {
        IndexSettings {
            raw_dir: self.raw_dir.clone(),
            processed_dir: self.processed_dir.clone(),
            ingestion: IngestionOptions {
                chunk_words: self.chunk_words,
                chunk_overlap: self.chunk_overlap,
            },
            batch_size: self.batch_size,
            ..IndexSettings::default()
        }
    }

    fn qdrant(&self) -> anyhow::Result<QdrantStore> {
        let settings = QdrantSettings {
            url: self.qdrant_url.clone(),
            collection: self.qdrant_collection.clone(),
        };
        QdrantStore::new(&settings).context("invalid Qdrant settings")
    }

    fn embedder(&self) -> anyhow::Result<HttpEmbedder> {
        let settings = EmbeddingSettings {
            model: self.embedding_model.clone(),
            base_url: self.embedding_url.clone(),
            api_key: self.embedding_api_key.clone(),
            ..EmbeddingSettings::default()
        };
        HttpEmbedder::new(settings).context("invalid embedding settings")
    }

    fn extractor(&self) -> OcrFallbackExtractor {
        let ocr = self
            .ocr_endpoint
            .as_deref()
            .and_then(|endpoint| OcrEndpointConfig::new(endpoint, self.ocr_api_key.as_deref()));
        if ocr.is_none() {
            info!("no OCR endpoint configured; scanned PDFs will yield no text");
        }
        OcrFallbackExtractor::new(ocr)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "policy-rag boot"
    );

    match &cli.command {
        Command::Index { restart, offline } => {
            let report = if *offline {
                let mut settings = cli.index_settings();
                settings.processed_dir = settings.processed_dir.join("offline");
                let builder = IndexBuilder::new(
                    settings,
                    cli.extractor(),
                    CharacterNgramEmbedder::default(),
                    InMemoryVectorStore::new(cli.qdrant_collection.clone()),
                );
                // The in-memory store starts empty, so progress from an earlier dry run is void.
                builder.reset_progress()?;
                run_index(builder, *restart).await?
            } else {
                let builder = IndexBuilder::new(
                    cli.index_settings(),
                    cli.extractor(),
                    cli.embedder()?,
                    cli.qdrant()?,
                );
                run_index(builder, *restart).await?
            };

            println!(
                "{} chunks ({}), {} dims, resumed at batch {} of {}, {} batches committed",
                report.chunk_count,
                if report.chunks_loaded_from_file { "loaded from chunk file" } else { "freshly built" },
                report.dimensions,
                report.start_batch,
                report.total_batches,
                report.batches_committed
            );
        }
        Command::Search { query, top_k } => {
            if query.trim().is_empty() {
                bail!("--query must not be blank");
            }
            let retriever = Retriever::new(cli.embedder()?, cli.qdrant()?);
            let hits = retriever.retrieve(query, *top_k).await?;
            if hits.is_empty() {
                println!("no matching chunks in collection {}", cli.qdrant_collection);
                return Ok(());
            }

            let (context, citations) = format_contexts(&hits);
            println!("{context}\n");
            for (index, (hit, citation)) in hits.iter().zip(&citations).enumerate() {
                println!(
                    "#{} score={:.4} source_pdf={} page={} chunk_id={}",
                    index + 1,
                    hit.score,
                    citation.source_document,
                    citation.page_number,
                    citation.chunk_id
                );
            }
        }
        Command::Reset => {
            let store = cli.qdrant()?;
            store.delete_collection().await?;
            let settings = cli.index_settings();
            let removed = clear_state(&settings.state_file_path())?;
            info!(
                collection = store.collection(),
                state_removed = removed,
                "reset complete"
            );
            println!("deleted collection {}", store.collection());
        }
    }

    Ok(())
}

async fn run_index<X, E, S>(builder: IndexBuilder<X, E, S>, restart: bool) -> anyhow::Result<IndexReport>
where
    X: TextExtractor,
    E: Embedder,
    S: VectorStore,
{
    if restart {
        builder
            .discard()
            .await
            .context("discarding the previous build")?;
    }

    let report = builder.run().await?;
    if report.batches_committed == 0 {
        warn!(
            collection = builder.store().collection(),
            "index already complete; use --restart to rebuild"
        );
    }
    Ok(report)
}
