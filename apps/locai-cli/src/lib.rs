use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use locai_core::config::{Config, Settings};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Log to stderr, `info` unless `RUST_LOG` says otherwise.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Load settings from `config` if given, else `./config.toml` (+ env overlays).
pub fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    let config = match config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    Ok(config.settings()?)
}

/// Cancellation token of the chat turn in flight, if any.
#[derive(Debug, Clone, Default)]
pub struct CurrentTurn(Arc<Mutex<Option<CancellationToken>>>);

impl CurrentTurn {
    pub fn new() -> Self { Self::default() }

    /// Start a turn with a fresh token.
    pub fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.slot() = Some(token.clone());
        token
    }

    pub fn end(&self) {
        self.slot().take();
    }

    /// Cancel the running turn. `false` when no turn is running.
    pub fn interrupt(&self) -> bool {
        match self.slot().as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Route Ctrl-C to `turn`: it stops a running generation, and exits the
/// process when the console is idle.
pub fn cancel_on_ctrl_c(turn: CurrentTurn) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    std::thread::Builder::new().name("ctrl-c".to_string()).spawn(move || {
        runtime.block_on(async {
            while tokio::signal::ctrl_c().await.is_ok() {
                if turn.interrupt() {
                    debug!("Ctrl-C: cancelling current turn");
                } else {
                    println!("\nGoodbye!");
                    std::process::exit(130);
                }
            }
        })
    })?;
    Ok(())
}
