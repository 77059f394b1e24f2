//! Row → `(source_path, ordinal)` store, persisted as versioned JSON.
//!
//! Entry `i` describes row `i` of the flat index. Chunk text is deliberately
//! absent: the retriever re-derives it with the chunking config recorded here.

use serde::{Deserialize, Serialize};
use std::path::Path;

use locai_core::chunker::ChunkingConfig;
use locai_core::error::{Error, Result};
use locai_core::types::ChunkRef;

pub const METADATA_FORMAT: &str = "locai-metadata";
pub const METADATA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MetadataStore {
    chunking: ChunkingConfig,
    embedder_id: String,
    records: Vec<ChunkRef>,
}

#[derive(Deserialize)]
struct FileHeader {
    format: String,
    version: u32,
}

#[derive(Serialize, Deserialize)]
struct MetadataFile {
    format: String,
    version: u32,
    chunking: ChunkingConfig,
    embedder_id: String,
    records: Vec<ChunkRef>,
}

impl MetadataStore {
    pub fn new(chunking: ChunkingConfig, embedder_id: impl Into<String>) -> Self {
        Self { chunking, embedder_id: embedder_id.into(), records: Vec::new() }
    }

    pub fn append(&mut self, source_path: impl Into<String>, ordinal: usize) {
        self.records.push(ChunkRef::new(source_path, ordinal));
    }

    pub fn resolve(&self, row: usize) -> Result<&ChunkRef> {
        self.records.get(row).ok_or(Error::OutOfBounds { row, len: self.records.len() })
    }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn records(&self) -> &[ChunkRef] { &self.records }

    /// Chunking configuration the snapshot was built with.
    pub fn chunking(&self) -> &ChunkingConfig { &self.chunking }

    pub fn embedder_id(&self) -> &str { &self.embedder_id }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let file = MetadataFile {
            format: METADATA_FORMAT.to_string(),
            version: METADATA_VERSION,
            chunking: self.chunking,
            embedder_id: self.embedder_id.clone(),
            records: self.records.clone(),
        };
        Ok(serde_json::to_vec(&file)?)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let header: FileHeader = serde_json::from_slice(bytes)
            .map_err(|e| Error::IncompatibleSnapshot(format!("unreadable metadata file: {e}")))?;
        if header.format != METADATA_FORMAT {
            return Err(Error::IncompatibleSnapshot(format!("unexpected metadata format '{}'", header.format)));
        }
        if header.version != METADATA_VERSION {
            return Err(Error::IncompatibleSnapshot(format!(
                "metadata version {} is not supported (expected {})",
                header.version, METADATA_VERSION
            )));
        }
        let file: MetadataFile = serde_json::from_slice(bytes)
            .map_err(|e| Error::IncompatibleSnapshot(format!("malformed metadata records: {e}")))?;
        file.chunking.validate()?;
        Ok(Self { chunking: file.chunking, embedder_id: file.embedder_id, records: file.records })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read(path)?)
    }
}
