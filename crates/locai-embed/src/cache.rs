//! Write-through embedding cache keyed by blake3 content hash.
//!
//! Purely an optimisation: cached and uncached embedders return identical
//! vectors because the wrapped embedder is a pure function of its input.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow, bail};
use tracing::debug;

use locai_core::traits::Embedder;

fn hash_content(s: &str) -> String { blake3::hash(s.as_bytes()).to_hex().to_string() }

pub struct CachedEmbedder {
    inner: Arc<dyn Embedder>,
    entries: Mutex<HashMap<String, Vec<f32>>>,
    capacity: usize,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn Embedder>, capacity: usize) -> Self {
        Self { inner, entries: Mutex::new(HashMap::new()), capacity }
    }

    pub fn len(&self) -> usize { self.entries.lock().map(|e| e.len()).unwrap_or(0) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Embedder for CachedEmbedder {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let hashes: Vec<String> = texts.iter().map(|t| hash_content(t)).collect();
        let mut miss_texts = Vec::new();
        let mut miss_hashes: Vec<&str> = Vec::new();
        {
            let entries = self.entries.lock().map_err(|_| anyhow!("embedding cache lock poisoned"))?;
            for (text, h) in texts.iter().zip(&hashes) {
                if !entries.contains_key(h) && !miss_hashes.contains(&h.as_str()) {
                    miss_texts.push(text.clone());
                    miss_hashes.push(h);
                }
            }
        }
        debug!("Embedding cache: {} hits, {} misses", texts.len() - miss_texts.len(), miss_texts.len());
        let fresh = if miss_texts.is_empty() { Vec::new() } else { self.inner.embed_batch(&miss_texts)? };
        if fresh.len() != miss_texts.len() { bail!("embedder returned {} vectors for {} texts", fresh.len(), miss_texts.len()); }

        let mut entries = self.entries.lock().map_err(|_| anyhow!("embedding cache lock poisoned"))?;
        let mut fresh_by_hash: HashMap<&str, Vec<f32>> = miss_hashes.iter().copied().zip(fresh).collect();
        let mut out = Vec::with_capacity(texts.len());
        for h in &hashes {
            let v = match entries.get(h) {
                Some(v) => v.clone(),
                None => fresh_by_hash.get(h.as_str()).cloned().ok_or_else(|| anyhow!("missing vector for {h}"))?,
            };
            out.push(v);
        }
        if entries.len() + fresh_by_hash.len() > self.capacity { entries.clear(); }
        for (h, v) in fresh_by_hash.drain() {
            if entries.len() < self.capacity { entries.insert(h.to_string(), v); }
        }
        Ok(out)
    }
}
