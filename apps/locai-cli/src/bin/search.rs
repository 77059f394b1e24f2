use std::path::PathBuf;

use clap::Parser;
use locai_core::build_prompt;
use locai_embed::get_default_embedder;
use locai_vector::{Retriever, SnapshotHandle};

#[derive(Parser)]
#[command(name = "locai-search")]
#[command(about = "Print the chunks retrieved for a query", long_about = None)]
struct Cli {
    query: String,
    /// Number of chunks (defaults to rag.top_k)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,
    /// Print the assembled prompt instead of the chunks
    #[arg(long)]
    prompt: bool,
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    locai_cli::init_tracing();
    let cli = Cli::parse();
    let settings = locai_cli::load_settings(cli.config.as_deref())?;

    let handle = SnapshotHandle::load_or_empty(&settings.data.index_dir)?;
    let snapshot = handle.require()?;
    let embedder = get_default_embedder(&settings.embedding)?;
    let retriever = Retriever::new(snapshot, embedder);
    let top_k = cli.top_k.unwrap_or(settings.rag.top_k);
    let hits = retriever.retrieve_hits(&cli.query, top_k)?;

    if cli.prompt {
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        println!("{}", build_prompt(&texts, &cli.query));
        return Ok(());
    }
    println!("Query: {}\n{} hits", cli.query, hits.len());
    for (rank, hit) in hits.iter().enumerate() {
        println!("\n#{} {} [chunk {}] distance {:.4}", rank + 1, hit.source_path, hit.ordinal, hit.distance);
        println!("{}", "-".repeat(30));
        println!("{}", hit.text);
    }
    Ok(())
}
