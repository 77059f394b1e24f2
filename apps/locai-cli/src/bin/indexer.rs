use std::path::PathBuf;

use clap::Parser;
use locai_core::config::resolve_with_base;
use locai_embed::get_default_embedder;
use locai_vector::IndexBuilder;

#[derive(Parser)]
#[command(name = "locai-indexer")]
#[command(about = "Build the document index used for retrieval", long_about = None)]
struct Cli {
    /// Folder to ingest (defaults to data.documents_dir)
    folder: Option<PathBuf>,
    /// Snapshot directory (defaults to data.index_dir)
    #[arg(long)]
    index_dir: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    no_progress: bool,
}

fn main() -> anyhow::Result<()> {
    locai_cli::init_tracing();
    let cli = Cli::parse();
    let settings = locai_cli::load_settings(cli.config.as_deref())?;
    let cwd = std::env::current_dir()?;
    let folder = cli.folder.map(|p| resolve_with_base(&cwd, p.to_string_lossy())).unwrap_or(settings.data.documents_dir);
    let index_dir = cli.index_dir.map(|p| resolve_with_base(&cwd, p.to_string_lossy())).unwrap_or(settings.data.index_dir);

    println!("LocAI Indexer\n=============");
    println!("Documents: {}", folder.display());
    println!("Index:     {}", index_dir.display());
    println!("Chunking:  {} words, {} overlap", settings.chunking.chunk_size, settings.chunking.overlap);

    let embedder = get_default_embedder(&settings.embedding)?;
    let builder = IndexBuilder::new(embedder, settings.chunking)
        .with_batch_size(settings.embedding.batch_size)
        .with_progress(!cli.no_progress);
    let (_, report) = builder.build_and_save(&folder, &index_dir)?;

    println!("\nIndexed {} chunks from {} documents (dim {})", report.chunks, report.documents, report.dim);
    println!("To search, use: locai-search '<query>'");
    Ok(())
}
