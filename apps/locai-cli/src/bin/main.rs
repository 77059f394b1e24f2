use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use locai_chat::ChatSession;
use locai_core::config::{GenerationSettings, Settings};
use locai_core::traits::Generator;
use locai_core::Error;
use locai_embed::{get_default_embedder, CachedEmbedder};
use locai_cli::CurrentTurn;
use locai_vector::SnapshotHandle;
use tracing::warn;

#[derive(Parser)]
#[command(name = "locai")]
#[command(about = "Personal AI assistant over your local documents", long_about = None)]
struct Cli {
    #[arg(long)]
    config: Option<PathBuf>,
    /// Start with document context disabled
    #[arg(long)]
    no_rag: bool,
}

const QUERY_CACHE_SIZE: usize = 1024;
const HELP: &str =
    "Commands: quit | /rag on|off | /clear | /context <id> | /memory <pairs> | /reindex | /help (Ctrl-C stops a reply)";

fn main() -> anyhow::Result<()> {
    locai_cli::init_tracing();
    let cli = Cli::parse();
    let settings = locai_cli::load_settings(cli.config.as_deref())?;

    println!("Personal AI Assistant - Console Version");
    println!("{}", "=".repeat(40));
    println!("Loading AI model...");
    let generator = load_generator(&settings.generation)?;
    let embedder = Arc::new(CachedEmbedder::new(get_default_embedder(&settings.embedding)?, QUERY_CACHE_SIZE));
    let snapshots = Arc::new(SnapshotHandle::load_or_empty(&settings.data.index_dir)?);
    if snapshots.current().is_none() {
        println!("No index found at {}; run /reindex to build one.", settings.data.index_dir.display());
    }
    let mut session = ChatSession::new(generator, embedder, snapshots, &settings);
    if cli.no_rag {
        session.set_rag_enabled(false);
    }
    println!("{HELP}");
    let turn = CurrentTurn::new();
    locai_cli::cancel_on_ctrl_c(turn.clone())?;

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("\nYou: ");
        io::stdout().flush()?;
        let Some(line) = lines.next() else { break };
        let input = line?;
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }
        if input.starts_with('/') {
            run_command(&mut session, input, &settings);
            continue;
        }
        let cancel = turn.begin();
        let result = session.send(input, &cancel);
        turn.end();
        match result {
            Ok(reply) => {
                let marker = if reply.used_context { format!(" [context #{}]", reply.message_id) } else { String::new() };
                println!("AI{marker}: {}", reply.text.trim());
            }
            Err(Error::Cancelled) => println!("Generation stopped."),
            Err(e) => println!("Error generating response: {e}"),
        }
    }
    Ok(())
}

fn run_command(session: &mut ChatSession, input: &str, settings: &Settings) {
    let mut parts = input.split_whitespace();
    let command = parts.next().unwrap_or_default();
    let arg = parts.next();
    match (command, arg) {
        ("/rag", Some("on")) => session.set_rag_enabled(true),
        ("/rag", Some("off")) => session.set_rag_enabled(false),
        ("/rag", _) => println!("RAG is {}", if session.rag_enabled() { "on" } else { "off" }),
        ("/clear", _) => {
            session.clear();
            println!("Chat cleared. How can I help you?");
        }
        ("/context", Some(id)) => match id.parse::<u64>().ok().and_then(|id| session.context(id)) {
            Some(record) if record.chunks.is_empty() => println!("No context chunks found for this query."),
            Some(record) => {
                println!("Query: {}\n{}", record.query, "=".repeat(50));
                for (i, chunk) in record.chunks.iter().enumerate() {
                    println!("\nContext Chunk {} ({} #{}):\n{}", i + 1, chunk.source_path, chunk.ordinal, "-".repeat(30));
                    println!("{}", chunk.text);
                }
            }
            None => println!("No context available for this message."),
        },
        ("/memory", Some(n)) => match n.parse::<usize>() {
            Ok(pairs) => match session.set_history_pairs(pairs) {
                Ok(()) => println!("Remembering the last {pairs} exchanges."),
                Err(e) => println!("{e}"),
            },
            Err(_) => println!("Usage: /memory <pairs>"),
        },
        ("/memory", None) => println!("Remembering the last {} exchanges.", session.history_pairs()),
        ("/reindex", _) => match session.update_index(&settings.data.documents_dir) {
            Ok(report) => println!("RAG data updated: {} chunks from {} documents.", report.chunks, report.documents),
            Err(e) => println!("Index update failed: {e}"),
        },
        _ => println!("{HELP}"),
    }
}

#[cfg(feature = "llama")]
fn load_generator(generation: &GenerationSettings) -> anyhow::Result<Arc<dyn Generator>> {
    match &generation.model_path {
        Some(path) => Ok(Arc::new(locai_chat::LlamaGenerator::load(path, generation.context_size)?)),
        None => {
            warn!("generation.model_path is not set; replies will echo the prompt");
            Ok(Arc::new(locai_chat::EchoGenerator::new()))
        }
    }
}

#[cfg(not(feature = "llama"))]
fn load_generator(generation: &GenerationSettings) -> anyhow::Result<Arc<dyn Generator>> {
    if generation.model_path.is_some() {
        warn!("Built without the `llama` feature; ignoring generation.model_path");
    }
    Ok(Arc::new(locai_chat::EchoGenerator::new()))
}
