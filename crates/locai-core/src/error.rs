use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No input: {0}")]
    NoInput(String),

    #[error("No index available at {0}")]
    IndexNotFound(String),

    #[error("Incompatible snapshot: {0}")]
    IncompatibleSnapshot(String),

    #[error("Row {row} out of bounds for {len} entries")]
    OutOfBounds { row: usize, len: usize },

    #[error("Failed to extract text from {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("Backend failure: {0}")]
    Backend(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an embedding or generation backend failure, keeping the full cause chain.
    pub fn backend(err: anyhow::Error) -> Self {
        Self::Backend(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
