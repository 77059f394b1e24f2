//! Flat L2 vector index, row metadata and retrieval over an on-disk snapshot.

pub mod flat;
pub mod index_build;
pub mod metadata;
pub mod search;
pub mod snapshot;

pub use flat::FlatIndex;
pub use index_build::{BuildReport, IndexBuilder};
pub use metadata::MetadataStore;
pub use search::Retriever;
pub use snapshot::{Snapshot, SnapshotHandle, CURRENT_FILE, INDEX_FILE, METADATA_FILE};
