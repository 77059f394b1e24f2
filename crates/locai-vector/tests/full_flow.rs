use std::fs;
use std::sync::Arc;

use locai_core::chunker::{chunk_text, ChunkingConfig};
use locai_core::types::ChunkRef;
use locai_core::Error;
use locai_embed::{Embedder, FakeEmbedder};
use locai_vector::{IndexBuilder, Retriever, Snapshot};
use tempfile::TempDir;

fn fake() -> Arc<dyn Embedder> {
    Arc::new(FakeEmbedder::new(384))
}

#[test]
fn single_document_end_to_end() {
    let docs = TempDir::new().expect("tmp");
    fs::write(docs.path().join("note.txt"), "machine learning is great").unwrap();

    let builder = IndexBuilder::new(fake(), ChunkingConfig::default());
    let (snapshot, report) = builder.build(docs.path()).expect("build");
    assert_eq!(report.documents, 1);
    assert_eq!(report.chunks, 1);
    assert_eq!(report.dim, 384);

    let retriever = Retriever::new(Arc::new(snapshot), fake());
    let results = retriever.retrieve("what is machine learning?", 1).expect("retrieve");
    assert_eq!(results, vec!["machine learning is great"]);
}

#[test]
fn rows_line_up_with_embedded_chunks() {
    let docs = TempDir::new().unwrap();
    let body_a: String = (0..40).map(|i| format!("alpha{i} ")).collect();
    let body_b: String = (0..25).map(|i| format!("beta{i} ")).collect();
    fs::write(docs.path().join("a.txt"), &body_a).unwrap();
    fs::write(docs.path().join("b.md"), &body_b).unwrap();

    let chunking = ChunkingConfig::new(10, 2).unwrap();
    let (snapshot, report) = IndexBuilder::new(fake(), chunking).with_batch_size(3).build(docs.path()).unwrap();

    let expected_a = chunk_text(&body_a, &chunking).unwrap();
    let expected_b = chunk_text(&body_b, &chunking).unwrap();
    assert_eq!(report.chunks, expected_a.len() + expected_b.len());
    assert_eq!(snapshot.index().len(), snapshot.metadata().len());

    let embedder = FakeEmbedder::new(384);
    let all: Vec<String> = expected_a.iter().chain(expected_b.iter()).cloned().collect();
    let vectors = embedder.embed_batch(&all).unwrap();
    for (row, vector) in vectors.iter().enumerate() {
        assert_eq!(snapshot.index().row(row), Some(vector.as_slice()), "row {row}");
    }
    let a_path = fs::canonicalize(docs.path().join("a.txt")).unwrap().to_string_lossy().to_string();
    assert_eq!(snapshot.metadata().resolve(0).unwrap(), &ChunkRef::new(a_path, 0));
    assert_eq!(snapshot.metadata().resolve(expected_a.len()).unwrap().ordinal, 0);
    assert_eq!(snapshot.metadata().embedder_id(), "fake:xxhash64:d384");
}

#[test]
fn saved_snapshot_answers_like_the_original() {
    let docs = TempDir::new().unwrap();
    fs::write(docs.path().join("garden.txt"), "tomatoes need full sun and steady watering").unwrap();
    fs::write(docs.path().join("bread.txt"), "sourdough starter needs flour and water daily").unwrap();
    fs::write(docs.path().join("bikes.md"), "check tyre pressure before every long ride").unwrap();
    let index_dir = TempDir::new().unwrap();

    let builder = IndexBuilder::new(fake(), ChunkingConfig::default());
    let (built, _) = builder.build_and_save(docs.path(), index_dir.path()).unwrap();
    let loaded = Snapshot::load(index_dir.path()).unwrap().expect("snapshot present");
    assert_eq!(loaded, built);

    let query = "how often to water the starter";
    let a = Retriever::new(Arc::new(built), fake()).retrieve_hits(query, 3).unwrap();
    let b = Retriever::new(Arc::new(loaded), fake()).retrieve_hits(query, 3).unwrap();
    assert_eq!(a, b);
    assert!(a.windows(2).all(|w| w[0].distance <= w[1].distance), "ascending distance");
}

#[test]
fn top_k_beyond_row_count_returns_every_row() {
    let docs = TempDir::new().unwrap();
    fs::write(docs.path().join("one.txt"), "first file").unwrap();
    fs::write(docs.path().join("two.txt"), "second file").unwrap();
    let (snapshot, _) = IndexBuilder::new(fake(), ChunkingConfig::default()).build(docs.path()).unwrap();
    let results = Retriever::new(Arc::new(snapshot), fake()).retrieve("file", 10).unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn deleted_source_is_skipped() {
    let docs = TempDir::new().unwrap();
    fs::write(docs.path().join("keep.txt"), "solar panels charge the battery bank").unwrap();
    fs::write(docs.path().join("gone.txt"), "solar panels face south").unwrap();
    let (snapshot, _) = IndexBuilder::new(fake(), ChunkingConfig::default()).build(docs.path()).unwrap();

    fs::remove_file(docs.path().join("gone.txt")).unwrap();
    let results = Retriever::new(Arc::new(snapshot), fake()).retrieve("solar panels", 2).expect("still succeeds");
    assert_eq!(results, vec!["solar panels charge the battery bank"]);
}

#[test]
fn shrunk_source_drops_out_of_range_ordinals() {
    let docs = TempDir::new().unwrap();
    let path = docs.path().join("log.txt");
    let long: String = (0..30).map(|i| format!("entry{i} ")).collect();
    fs::write(&path, long).unwrap();
    let chunking = ChunkingConfig::new(10, 0).unwrap();
    let (snapshot, report) = IndexBuilder::new(fake(), chunking).build(docs.path()).unwrap();
    assert_eq!(report.chunks, 3);

    fs::write(&path, "entry0 entry1").unwrap();
    let hits = Retriever::new(Arc::new(snapshot), fake()).retrieve_hits("entry25", 3).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].ordinal, 0);
    assert_eq!(hits[0].text, "entry0 entry1");
}

#[test]
fn nothing_to_index_writes_nothing() {
    let docs = TempDir::new().unwrap();
    fs::write(docs.path().join("blank.txt"), "   \n\t ").unwrap();
    let index_dir = TempDir::new().unwrap();
    let res = IndexBuilder::new(fake(), ChunkingConfig::default()).build_and_save(docs.path(), index_dir.path());
    assert!(matches!(res, Err(Error::NoInput(_))));
    assert!(Snapshot::load(index_dir.path()).unwrap().is_none());
}
