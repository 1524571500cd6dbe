use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use kbsearch_cache::{open_backend, Invalidation, ResultCache};
use kbsearch_core::config::{expand_path, Config, Settings};
use kbsearch_core::file_store::LocalFileStore;
use kbsearch_core::types::{ImageChunk, ImageInput, RankedList, TextChunk};
use kbsearch_embed::{image_embedder, text_embedder};
use kbsearch_hybrid::{RetrievalPipeline, SearchOptions};
use kbsearch_rerank::Reranker;
use kbsearch_text::TerminologyExpander;
use kbsearch_vector::LanceVectorIndex;

#[derive(Parser)]
#[command(name = "kbsearch", about = "Hybrid retrieval over a technical knowledge base")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a retrieval query
    Search {
        query: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        /// Image file to search with
        #[arg(long)]
        image: Option<PathBuf>,
        #[arg(long)]
        no_rerank: bool,
        #[arg(long)]
        no_cache: bool,
        #[arg(long)]
        no_expand: bool,
        #[arg(long)]
        no_hybrid: bool,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the terminology expansion of a query
    Expand { query: String },
    /// Index text chunks from a JSON array file
    Index { file: PathBuf },
    /// Index one image file
    IndexImage {
        file: PathBuf,
        #[arg(long)]
        id: String,
        #[arg(long)]
        document_id: String,
        #[arg(long, default_value = "")]
        document_name: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Remove every chunk of a document
    DeleteDocument { document_id: String },
    /// Inspect or clear the result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    Stats,
    Clear {
        /// Glob over cache keys, e.g. "query:*"
        #[arg(long)]
        pattern: Option<String>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn build_pipeline(settings: &Settings) -> anyhow::Result<RetrievalPipeline> {
    let storage = &settings.storage;
    let lancedb_dir = expand_path(&storage.lancedb_dir);
    std::fs::create_dir_all(&lancedb_dir)
        .with_context(|| format!("creating {}", lancedb_dir.display()))?;
    let index = LanceVectorIndex::open(
        &lancedb_dir.to_string_lossy(),
        &storage.text_collection,
        settings.embedding.text.dim,
        &storage.image_collection,
        settings.embedding.image.dim,
    )
    .await?;

    let cache_backend = open_backend(&settings.cache).context("opening result cache")?;

    let timeout = settings.retrieval.embed_timeout();
    let text = text_embedder(&settings.embedding, timeout)?;
    let mut pipeline = RetrievalPipeline::new(text, Arc::new(index), settings)
        .with_reranker(Arc::new(Reranker::from_settings(&settings.rerank)))
        .with_cache(Arc::new(ResultCache::new(cache_backend, settings.cache.ttl())))
        .with_file_store(Arc::new(LocalFileStore::new(expand_path(&storage.documents_dir))));
    match image_embedder(&settings.embedding, timeout) {
        Ok(images) => pipeline = pipeline.with_image_embedder(images),
        Err(e) => tracing::warn!(error = %e, "image channel disabled"),
    }
    Ok(pipeline)
}

fn print_results(results: &RankedList) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "\n  {}. score={:.4}  id={}  {}  document={}",
            i + 1,
            r.score(),
            r.id(),
            r.chunk.modality(),
            r.chunk.document_name()
        );
        if r.rerank_fallback {
            println!("     (rerank fallback)");
        }
        let text: String = r.chunk.text().chars().take(160).collect();
        println!("     {}", text.replace('\n', " "));
        if let Some(url) = &r.file_url {
            println!("     {}", url);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let settings = Config::load()?.settings()?;

    match cli.command {
        Command::Expand { query } => {
            println!("{}", TerminologyExpander::default().expand(&query));
        }
        Command::Search { query, top_k, image, no_rerank, no_cache, no_expand, no_hybrid, json } => {
            let image = match image {
                Some(path) => Some(ImageInput::Bytes(
                    std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?,
                )),
                None => None,
            };
            if query.is_none() && image.is_none() {
                anyhow::bail!("provide a query, --image, or both");
            }
            let opts = SearchOptions {
                use_hybrid: !no_hybrid,
                use_rerank: !no_rerank,
                use_cache: !no_cache,
                use_expansion: !no_expand,
            };
            let top_k = top_k.unwrap_or(settings.retrieval.default_top_k);
            let pipeline = build_pipeline(&settings).await?;
            let results = pipeline.search(query.as_deref(), image.as_ref(), top_k, &opts).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
        }
        Command::Index { file } => {
            let raw = std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let chunks: Vec<TextChunk> = serde_json::from_str(&raw)?;
            let pipeline = build_pipeline(&settings).await?;
            let n = pipeline.index_text_chunks(&chunks).await?;
            println!("Indexed {} text chunks", n);
        }
        Command::IndexImage { file, id, document_id, document_name, description } => {
            let bytes = std::fs::read(&file).with_context(|| format!("reading {}", file.display()))?;
            let document_name = if document_name.is_empty() {
                file.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
            } else {
                document_name
            };
            let chunk = ImageChunk {
                id,
                document_id,
                document_name,
                image_payload: ImageInput::Bytes(bytes).to_base64(),
                description,
            };
            let pipeline = build_pipeline(&settings).await?;
            pipeline.index_image_chunk(chunk).await?;
            println!("Indexed image");
        }
        Command::DeleteDocument { document_id } => {
            let pipeline = build_pipeline(&settings).await?;
            let removed = pipeline.delete_document(&document_id).await?;
            println!("Removed {} chunks of {}", removed, document_id);
        }
        Command::Cache { action } => {
            let pipeline = build_pipeline(&settings).await?;
            let cache = pipeline.cache().context("result cache is not configured")?;
            match action {
                CacheAction::Stats => println!("{}", serde_json::to_string_pretty(&cache.stats().await)?),
                CacheAction::Clear { pattern } => {
                    let removed = match pattern {
                        Some(p) => cache.invalidate(Invalidation::Pattern(p)).await,
                        None => cache.clear_all().await,
                    };
                    println!("Removed {} cache entries", removed);
                }
            }
        }
    }
    Ok(())
}
