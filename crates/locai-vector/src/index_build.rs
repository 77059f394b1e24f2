//! Full rebuild: load → chunk → embed → flat index + metadata → disk.
//!
//! Typical flow:
//! 1) Load every supported file under the documents folder (sorted)
//! 2) Chunk each document and record `(source_path, ordinal)` per chunk
//! 3) Embed chunks in batches, appending rows in lockstep with the records
//! 4) Write `index.bin` and `metadata.json` as one snapshot

use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use locai_core::chunker::{chunk_text, ChunkingConfig};
use locai_core::error::{Error, Result};
use locai_core::loader::DocumentLoader;
use locai_core::traits::Embedder;

use crate::flat::FlatIndex;
use crate::metadata::MetadataStore;
use crate::snapshot::{Snapshot, SnapshotHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub dim: usize,
}

pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    chunking: ChunkingConfig,
    batch_size: usize,
    loader: DocumentLoader,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, chunking: ChunkingConfig) -> Self {
        Self { embedder, chunking, batch_size: 32, loader: DocumentLoader::new(), show_progress: false }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Build an in-memory snapshot of every document under `root`.
    pub fn build(&self, root: &Path) -> Result<(Snapshot, BuildReport)> {
        self.chunking.validate()?;
        let start = Instant::now();
        let documents = self.loader.load_folder(root)?;

        let mut metadata = MetadataStore::new(self.chunking, self.embedder.embedder_id());
        let mut texts = Vec::new();
        for doc in &documents {
            let chunks = chunk_text(&doc.text, &self.chunking)?;
            debug!("{}: {} chunks", doc.path, chunks.len());
            for (ordinal, chunk) in chunks.into_iter().enumerate() {
                metadata.append(doc.path.clone(), ordinal);
                texts.push(chunk);
            }
        }
        if texts.is_empty() {
            return Err(Error::NoInput(format!("no chunks produced from {}", root.display())));
        }
        info!("Embedding {} chunks from {} documents with {}", texts.len(), documents.len(), self.embedder.embedder_id());

        let index = self.embed_all(&texts)?;
        let report = BuildReport { documents: documents.len(), chunks: texts.len(), dim: index.dim().unwrap_or(0) };
        let snapshot = Snapshot::new(index, metadata)?;
        info!("Built index of {} rows (dim {}) in {:?}", report.chunks, report.dim, start.elapsed());
        Ok((snapshot, report))
    }

    /// Build from `root` and persist to `index_dir`. On failure the previously
    /// saved snapshot stays current.
    pub fn build_and_save(&self, root: &Path, index_dir: &Path) -> Result<(Snapshot, BuildReport)> {
        let (snapshot, report) = self.build(root)?;
        snapshot.save(index_dir)?;
        Ok((snapshot, report))
    }

    /// Rebuild into the handle's directory and swap the new snapshot in.
    pub fn rebuild(&self, root: &Path, handle: &SnapshotHandle) -> Result<BuildReport> {
        let (snapshot, report) = self.build_and_save(root, handle.dir())?;
        handle.replace(snapshot);
        Ok(report)
    }

    fn embed_all(&self, texts: &[String]) -> Result<FlatIndex> {
        let pb = self.progress_bar(texts.len());
        let expected_dim = self.embedder.dim();
        let mut index = FlatIndex::new();
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embedder.embed_batch(batch).map_err(Error::backend)?;
            if vectors.len() != batch.len() {
                return Err(Error::Backend(format!("embedder returned {} vectors for {} chunks", vectors.len(), batch.len())));
            }
            if let Some(v) = vectors.iter().find(|v| v.len() != expected_dim) {
                return Err(Error::InvalidConfig(format!("embedder declared dim {expected_dim} but produced {}", v.len())));
            }
            index.add(&vectors)?;
            pb.inc(batch.len() as u64);
        }
        pb.finish_with_message("done");
        Ok(index)
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");
        pb.set_style(style);
        pb
    }
}
