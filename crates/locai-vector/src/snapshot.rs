//! On-disk index snapshot: `index.bin` + `metadata.json` in one generation.
//!
//! Each save writes both files into a fresh `snapshot-*` directory and then
//! commits it by renaming a new `CURRENT` pointer over the old one. Until that
//! single rename lands, readers keep seeing the previous generation, so the
//! two files of a snapshot always come from the same build.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use locai_core::error::{Error, Result};

use crate::flat::FlatIndex;
use crate::metadata::MetadataStore;

pub const INDEX_FILE: &str = "index.bin";
pub const METADATA_FILE: &str = "metadata.json";
/// Pointer naming the committed generation directory.
pub const CURRENT_FILE: &str = "CURRENT";
const GENERATION_PREFIX: &str = "snapshot-";

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    index: FlatIndex,
    metadata: MetadataStore,
}

impl Snapshot {
    pub fn new(index: FlatIndex, metadata: MetadataStore) -> Result<Self> {
        if index.len() != metadata.len() {
            return Err(Error::IncompatibleSnapshot(format!(
                "index has {} rows but metadata has {} records",
                index.len(),
                metadata.len()
            )));
        }
        Ok(Self { index, metadata })
    }

    pub fn index(&self) -> &FlatIndex { &self.index }

    pub fn metadata(&self) -> &MetadataStore { &self.metadata }

    pub fn len(&self) -> usize { self.index.len() }

    pub fn is_empty(&self) -> bool { self.index.is_empty() }

    /// Write a new generation under `dir` and flip `CURRENT` to it.
    ///
    /// On error the previously committed generation stays current.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let generation = self.write_generation(dir)?;
        if let Err(e) = flip_current(dir, &generation) {
            let _ = std::fs::remove_dir_all(dir.join(&generation));
            return Err(e);
        }
        prune_generations(dir, &generation);
        info!("Saved snapshot with {} rows to {}", self.len(), dir.join(&generation).display());
        Ok(())
    }

    /// Stage both files in a new generation directory; returns its name.
    fn write_generation(&self, dir: &Path) -> Result<String> {
        let staging = tempfile::Builder::new().prefix(GENERATION_PREFIX).tempdir_in(dir)?;
        write_synced(staging.path(), INDEX_FILE, &self.index.to_bytes()?)?;
        write_synced(staging.path(), METADATA_FILE, &self.metadata.to_json()?)?;
        let path = staging.keep();
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::IncompatibleSnapshot(format!("bad generation path {}", path.display())))
    }

    /// `Ok(None)` when the directory holds no committed snapshot.
    pub fn load(dir: &Path) -> Result<Option<Self>> {
        let Some(generation) = current_generation(dir)? else {
            debug!("No snapshot in {}", dir.display());
            return Ok(None);
        };
        let index_path = generation.join(INDEX_FILE);
        let metadata_path = generation.join(METADATA_FILE);
        match (index_path.exists(), metadata_path.exists()) {
            (true, true) => {
                let snapshot = Self::new(FlatIndex::load(&index_path)?, MetadataStore::load(&metadata_path)?)?;
                info!("Loaded snapshot with {} rows from {}", snapshot.len(), generation.display());
                Ok(Some(snapshot))
            }
            (has_index, _) => {
                let missing = if has_index { METADATA_FILE } else { INDEX_FILE };
                Err(Error::IncompatibleSnapshot(format!("{} is missing {missing}", generation.display())))
            }
        }
    }
}

/// Directory named by `dir/CURRENT`, if a snapshot was ever committed.
fn current_generation(dir: &Path) -> Result<Option<PathBuf>> {
    let pointer = dir.join(CURRENT_FILE);
    if !pointer.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&pointer)?;
    let name = contents.trim();
    if !name.starts_with(GENERATION_PREFIX) || name.contains(['/', '\\']) {
        return Err(Error::IncompatibleSnapshot(format!("{} names {name:?}", pointer.display())));
    }
    Ok(Some(dir.join(name)))
}

fn flip_current(dir: &Path, generation: &str) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    writeln!(tmp, "{generation}")?;
    tmp.as_file().sync_all()?;
    tmp.persist(dir.join(CURRENT_FILE)).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn write_synced(dir: &Path, name: &str, bytes: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(dir.join(name))?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

/// Remove every generation except `keep`; failures are only logged.
fn prune_generations(dir: &Path, keep: &str) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Could not list {} for cleanup: {e}", dir.display());
            return;
        }
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == keep || !name.starts_with(GENERATION_PREFIX) || !entry.path().is_dir() {
            continue;
        }
        if let Err(e) = std::fs::remove_dir_all(entry.path()) {
            warn!("Could not remove old snapshot {}: {e}", entry.path().display());
        }
    }
}

/// Shared, swappable view of the current snapshot.
///
/// Readers clone the inner `Arc`, so a `replace` never disturbs a retrieval
/// that is already running against the previous snapshot.
#[derive(Debug)]
pub struct SnapshotHandle {
    dir: PathBuf,
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotHandle {
    /// Open `dir`, treating "no snapshot yet" as an empty handle.
    pub fn load_or_empty(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let current = Snapshot::load(&dir)?.map(Arc::new);
        Ok(Self { dir, current: RwLock::new(current) })
    }

    pub fn empty(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), current: RwLock::new(None) }
    }

    pub fn dir(&self) -> &Path { &self.dir }

    pub fn current(&self) -> Option<Arc<Snapshot>> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn require(&self) -> Result<Arc<Snapshot>> {
        self.current().ok_or_else(|| Error::IndexNotFound(self.dir.display().to_string()))
    }

    pub fn replace(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        let mut guard = match self.current.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Some(snapshot.clone());
        snapshot
    }

    /// Re-read the snapshot from disk; an unreadable snapshot keeps the old one.
    pub fn reload(&self) -> Result<Option<Arc<Snapshot>>> {
        match Snapshot::load(&self.dir) {
            Ok(Some(snapshot)) => Ok(Some(self.replace(snapshot))),
            Ok(None) => Ok(self.current()),
            Err(e) => {
                warn!("Keeping previous snapshot, reload of {} failed: {e}", self.dir.display());
                Err(e)
            }
        }
    }
}
