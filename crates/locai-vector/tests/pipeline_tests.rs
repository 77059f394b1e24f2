use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use locai_core::chunker::ChunkingConfig;
use locai_core::Error;
use locai_embed::{Embedder, FakeEmbedder};
use locai_vector::{IndexBuilder, Retriever, SnapshotHandle};
use tempfile::TempDir;

/// Counts calls and forwards to the fake embedder.
struct CountingEmbedder {
    inner: FakeEmbedder,
    calls: AtomicUsize,
}

impl Embedder for CountingEmbedder {
    fn embedder_id(&self) -> &str { self.inner.embedder_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

/// Returns vectors of the wrong width.
struct LyingEmbedder;

impl Embedder for LyingEmbedder {
    fn embedder_id(&self) -> &str { "lying" }
    fn dim(&self) -> usize { 8 }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embedder_id(&self) -> &str { "failing" }
    fn dim(&self) -> usize { 4 }
    fn max_len(&self) -> usize { 512 }
    fn embed_batch(&self, _texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        anyhow::bail!("model not loaded")
    }
}

#[test]
fn embedding_is_batched() {
    let docs = TempDir::new().unwrap();
    let body: String = (0..100).map(|i| format!("w{i} ")).collect();
    fs::write(docs.path().join("a.txt"), body).unwrap();

    let counting = Arc::new(CountingEmbedder { inner: FakeEmbedder::new(16), calls: AtomicUsize::new(0) });
    let builder = IndexBuilder::new(counting.clone(), ChunkingConfig::new(10, 0).unwrap()).with_batch_size(4);
    let (_, report) = builder.build(docs.path()).unwrap();
    assert_eq!(report.chunks, 10);
    assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn dimension_mismatch_fails_the_build() {
    let docs = TempDir::new().unwrap();
    fs::write(docs.path().join("a.txt"), "some words").unwrap();
    let res = IndexBuilder::new(Arc::new(LyingEmbedder), ChunkingConfig::default()).build(docs.path());
    assert!(matches!(res, Err(Error::InvalidConfig(_))));
}

#[test]
fn backend_failure_propagates_and_writes_nothing() {
    let docs = TempDir::new().unwrap();
    fs::write(docs.path().join("a.txt"), "some words").unwrap();
    let index_dir = TempDir::new().unwrap();
    let res = IndexBuilder::new(Arc::new(FailingEmbedder), ChunkingConfig::default())
        .build_and_save(docs.path(), index_dir.path());
    match res {
        Err(Error::Backend(msg)) => assert!(msg.contains("model not loaded")),
        other => panic!("expected backend error, got {other:?}"),
    }
    assert_eq!(fs::read_dir(index_dir.path()).unwrap().count(), 0);
}

#[test]
fn rebuild_swaps_the_handle() {
    let docs = TempDir::new().unwrap();
    let index_dir = TempDir::new().unwrap();
    fs::write(docs.path().join("a.txt"), "wood stove maintenance").unwrap();

    let handle = SnapshotHandle::load_or_empty(index_dir.path()).unwrap();
    assert!(handle.current().is_none());

    let builder = IndexBuilder::new(Arc::new(FakeEmbedder::new(64)), ChunkingConfig::default());
    builder.rebuild(docs.path(), &handle).unwrap();
    let first = handle.require().unwrap();
    assert_eq!(first.len(), 1);

    fs::write(docs.path().join("b.txt"), "chimney sweeping schedule").unwrap();
    builder.rebuild(docs.path(), &handle).unwrap();
    assert_eq!(first.len(), 1, "old readers keep their snapshot");
    assert_eq!(handle.require().unwrap().len(), 2);

    let reopened = SnapshotHandle::load_or_empty(index_dir.path()).unwrap();
    let retriever = Retriever::new(reopened.require().unwrap(), Arc::new(FakeEmbedder::new(64)));
    assert_eq!(retriever.retrieve("chimney sweeping", 1).unwrap(), vec!["chimney sweeping schedule"]);
}
