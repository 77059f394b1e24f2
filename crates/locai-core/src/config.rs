//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`APP_RAG__TOP_K=3` sets `rag.top_k`). Provides helpers to
//! expand `~` and `${VAR}` and to resolve relative paths against a base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::chunker::ChunkingConfig;
use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load from the working directory, honouring `RUST_ENV` for the overlay file.
    pub fn load() -> anyhow::Result<Self> {
        let base_dir = env::current_dir()?;
        Self::load_from(&base_dir.join("config.toml"))
    }

    /// Load with `path` as the main file; the env overlay is looked up next to it.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file(path));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir })
    }

    /// Build from an in-memory TOML document (defaults still apply underneath).
    pub fn from_toml_str(toml: &str, base_dir: &Path) -> Self {
        let figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::string(toml));
        Self { figment, base_dir: base_dir.to_path_buf() }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Extract, resolve and validate the typed settings.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.resolve_paths(&self.base_dir);
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingSettings,
    pub rag: RagSettings,
    pub generation: GenerationSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Folder ingested by a rebuild.
    pub documents_dir: PathBuf,
    /// Folder holding `index.bin` and `metadata.json`.
    pub index_dir: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self { documents_dir: PathBuf::from("documents"), index_dir: PathBuf::from("index") }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Directory with `config.json`, `tokenizer.json` and weights. Empty means auto-detect.
    pub model_dir: Option<PathBuf>,
    pub batch_size: usize,
    pub max_len: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self { model_dir: None, batch_size: 32, max_len: 256 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    pub enabled: bool,
    pub top_k: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self { enabled: true, top_k: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    /// GGUF model used by the llama backend.
    pub model_path: Option<PathBuf>,
    pub max_tokens: usize,
    pub threads: usize,
    pub context_size: usize,
    /// Conversation memory, in user/assistant message pairs.
    pub history_pairs: usize,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model_path: None,
            max_tokens: 256,
            threads: (available_cpus() / 2).max(1),
            context_size: 4096,
            history_pairs: 10,
        }
    }
}

pub const MAX_TOKENS_LIMIT: usize = 2048;
pub const HISTORY_PAIRS_LIMIT: usize = 50;

pub fn available_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;
        let generation = &self.generation;
        if generation.max_tokens == 0 || generation.max_tokens > MAX_TOKENS_LIMIT {
            return Err(Error::InvalidConfig(format!("max_tokens must be between 1 and {MAX_TOKENS_LIMIT}")));
        }
        let cpus = available_cpus();
        if generation.threads == 0 || generation.threads > cpus {
            return Err(Error::InvalidConfig(format!("threads must be between 1 and {cpus}")));
        }
        if generation.history_pairs == 0 || generation.history_pairs > HISTORY_PAIRS_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "conversation memory must be between 1 and {HISTORY_PAIRS_LIMIT} pairs"
            )));
        }
        if self.rag.top_k == 0 {
            return Err(Error::InvalidConfig("rag.top_k must be at least 1".to_string()));
        }
        if self.embedding.batch_size == 0 || self.embedding.max_len == 0 {
            return Err(Error::InvalidConfig("embedding batch_size and max_len must be at least 1".to_string()));
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.data.documents_dir = resolve_with_base(base, self.data.documents_dir.to_string_lossy());
        self.data.index_dir = resolve_with_base(base, self.data.index_dir.to_string_lossy());
        if let Some(dir) = self.embedding.model_dir.take() {
            self.embedding.model_dir = Some(resolve_with_base(base, dir.to_string_lossy()));
        }
        if let Some(path) = self.generation.model_path.take() {
            self.generation.model_path = Some(resolve_with_base(base, path.to_string_lossy()));
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
