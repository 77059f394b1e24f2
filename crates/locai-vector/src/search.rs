//! Query-time retrieval: embed → flat search → resolve rows → re-chunk sources.
//!
//! Chunk text is not stored in the snapshot. Each hit is rematerialised by
//! loading its source file again and chunking it with the configuration the
//! snapshot was built with. If a source file changes after a build, its hits
//! may resolve to different text (or be skipped when the ordinal no longer
//! exists) until the next rebuild.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use locai_core::chunker::chunk_text;
use locai_core::error::{Error, Result};
use locai_core::loader::DocumentLoader;
use locai_core::traits::Embedder;
use locai_core::types::RetrievedChunk;

use crate::snapshot::Snapshot;

pub struct Retriever {
    snapshot: Arc<Snapshot>,
    embedder: Arc<dyn Embedder>,
    loader: DocumentLoader,
}

impl Retriever {
    pub fn new(snapshot: Arc<Snapshot>, embedder: Arc<dyn Embedder>) -> Self {
        let built_with = snapshot.metadata().embedder_id();
        if built_with != embedder.embedder_id() {
            warn!("Snapshot was built with '{}' but queries use '{}'", built_with, embedder.embedder_id());
        }
        Self { snapshot, embedder, loader: DocumentLoader::new() }
    }

    pub fn snapshot(&self) -> &Arc<Snapshot> { &self.snapshot }

    /// Texts of the `top_k` closest chunks, closest first.
    pub fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self.retrieve_hits(query, top_k)?.into_iter().map(|c| c.text).collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps provenance and distance.
    ///
    /// Hits whose source is missing, unreadable or now too short are logged
    /// and dropped, so the result may hold fewer than `top_k` entries.
    pub fn retrieve_hits(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedChunk>> {
        if top_k == 0 || self.snapshot.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed_batch(&[query.to_string()])
            .map_err(Error::backend)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend("embedder returned no vector for the query".to_string()))?;
        let hits = self.snapshot.index().search(&query_vec, top_k)?;
        debug!("Query matched {} rows", hits.len());

        let chunking = self.snapshot.metadata().chunking();
        // One load per source file per call; `None` marks a file that failed.
        let mut rechunked: HashMap<&str, Option<Vec<String>>> = HashMap::new();
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let chunk_ref = self.snapshot.metadata().resolve(hit.row)?;
            let chunks = rechunked.entry(chunk_ref.source_path.as_str()).or_insert_with(|| {
                let loaded = self
                    .loader
                    .load_document(Path::new(&chunk_ref.source_path))
                    .and_then(|doc| chunk_text(&doc.text, chunking));
                match loaded {
                    Ok(chunks) => Some(chunks),
                    Err(e) => {
                        warn!("Skipping hits from {}: {}", chunk_ref.source_path, e);
                        None
                    }
                }
            });
            let Some(chunks) = chunks else { continue };
            match chunks.get(chunk_ref.ordinal) {
                Some(text) => results.push(RetrievedChunk {
                    source_path: chunk_ref.source_path.clone(),
                    ordinal: chunk_ref.ordinal,
                    distance: hit.distance,
                    text: text.clone(),
                }),
                None => warn!(
                    "Stale hit: {} now has {} chunks, index refers to chunk {}",
                    chunk_ref.source_path,
                    chunks.len(),
                    chunk_ref.ordinal
                ),
            }
        }
        Ok(results)
    }
}
