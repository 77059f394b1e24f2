//! Exact nearest-neighbour index over f32 rows using squared L2 distance.
//!
//! Rows are stored contiguously in insertion order; row `i` of the index is the
//! `i`-th vector ever added. Search is a full scan with no I/O.

use bincode::Options;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use locai_core::error::{Error, Result};
use locai_core::types::SearchHit;

const INDEX_MAGIC: [u8; 8] = *b"LOCAIFL2";
const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dim: Option<usize>,
    data: Vec<f32>,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    magic: [u8; 8],
    version: u32,
    dim: u64,
    rows: u64,
    data: Vec<f32>,
}

fn l2_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| { let d = x - y; d * d }).sum()
}

fn by_distance_then_row(a: &SearchHit, b: &SearchHit) -> Ordering {
    a.distance.total_cmp(&b.distance).then(a.row.cmp(&b.row))
}

impl FlatIndex {
    pub fn new() -> Self { Self::default() }

    /// Dimensionality, fixed by the first non-empty `add`.
    pub fn dim(&self) -> Option<usize> { self.dim }

    pub fn len(&self) -> usize {
        match self.dim { Some(d) => self.data.len() / d, None => 0 }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Append rows in call order. All vectors are checked before any is added.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let Some(first) = vectors.first() else { return Ok(()) };
        let dim = self.dim.unwrap_or(first.len());
        if dim == 0 {
            return Err(Error::InvalidConfig("vectors must have at least one dimension".to_string()));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::InvalidConfig(format!("vector has {} dimensions, index expects {}", bad.len(), dim)));
        }
        self.dim = Some(dim);
        self.data.reserve(vectors.len() * dim);
        for v in vectors { self.data.extend_from_slice(v); }
        Ok(())
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        let dim = self.dim?;
        self.data.get(row * dim..(row + 1) * dim)
    }

    /// The `k` rows closest to `query`, ascending by distance, lowest row first on ties.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let Some(dim) = self.dim else { return Ok(Vec::new()) };
        if query.len() != dim {
            return Err(Error::InvalidConfig(format!("query has {} dimensions, index expects {}", query.len(), dim)));
        }
        if k == 0 { return Ok(Vec::new()); }
        let mut hits: Vec<SearchHit> = self
            .data
            .chunks_exact(dim)
            .enumerate()
            .map(|(row, v)| SearchHit { row, distance: l2_squared(v, query) })
            .collect();
        if k < hits.len() {
            hits.select_nth_unstable_by(k - 1, by_distance_then_row);
            hits.truncate(k);
        }
        hits.sort_unstable_by(by_distance_then_row);
        Ok(hits)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let file = IndexFile {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            dim: self.dim.unwrap_or(0) as u64,
            rows: self.len() as u64,
            data: self.data.clone(),
        };
        bincode::options().serialize(&file).map_err(|e| Error::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let file: IndexFile = bincode::options()
            .with_limit(bytes.len() as u64)
            .deserialize(bytes)
            .map_err(|e| Error::IncompatibleSnapshot(format!("unreadable index file: {e}")))?;
        if file.magic != INDEX_MAGIC {
            return Err(Error::IncompatibleSnapshot("not a flat L2 index file".to_string()));
        }
        if file.version != INDEX_VERSION {
            return Err(Error::IncompatibleSnapshot(format!("index version {} is not supported (expected {})", file.version, INDEX_VERSION)));
        }
        let (dim, rows) = (file.dim as usize, file.rows as usize);
        if dim.checked_mul(rows) != Some(file.data.len()) || (dim == 0 && rows > 0) {
            return Err(Error::IncompatibleSnapshot(format!("index header says {rows}x{dim} but holds {} values", file.data.len())));
        }
        Ok(Self { dim: (dim > 0).then_some(dim), data: file.data })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_of(rows: &[[f32; 2]]) -> FlatIndex {
        let mut idx = FlatIndex::new();
        idx.add(&rows.iter().map(|r| r.to_vec()).collect::<Vec<_>>()).unwrap();
        idx
    }

    #[test]
    fn search_orders_by_distance() {
        let idx = index_of(&[[0.0, 0.0], [3.0, 4.0], [1.0, 0.0], [0.0, 2.0]]);
        let hits = idx.search(&[0.0, 0.0], 3).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![0, 2, 3]);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].distance, 4.0);
    }

    #[test]
    fn ties_prefer_lowest_row() {
        let idx = index_of(&[[5.0, 5.0], [1.0, 0.0], [0.0, 1.0], [-1.0, 0.0]]);
        let rows: Vec<usize> = idx.search(&[0.0, 0.0], 2).unwrap().iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![1, 2]);
        let rows: Vec<usize> = idx.search(&[0.0, 0.0], 4).unwrap().iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![1, 2, 3, 0]);
    }

    #[test]
    fn k_larger_than_rows_returns_everything() {
        let idx = index_of(&[[0.0, 1.0], [1.0, 1.0]]);
        assert_eq!(idx.search(&[0.0, 0.0], 10).unwrap().len(), 2);
        assert!(idx.search(&[0.0, 0.0], 0).unwrap().is_empty());
        assert!(FlatIndex::new().search(&[1.0, 2.0, 3.0], 5).unwrap().is_empty());
    }

    #[test]
    fn dimension_is_fixed_by_first_add() {
        let mut idx = index_of(&[[0.0, 1.0]]);
        let err = idx.add(&[vec![1.0, 2.0], vec![1.0, 2.0, 3.0]]);
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
        assert_eq!(idx.len(), 1, "rejected batch is not partially applied");
        assert!(matches!(idx.search(&[0.0], 1), Err(Error::InvalidConfig(_))));
        assert!(matches!(FlatIndex::new().add(&[vec![]]), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn bytes_round_trip_and_reject_garbage() {
        let idx = index_of(&[[0.25, -1.5], [3.0, 4.0]]);
        let back = FlatIndex::from_bytes(&idx.to_bytes().unwrap()).unwrap();
        assert_eq!(back, idx);
        assert_eq!(back.row(1), Some(&[3.0f32, 4.0][..]));
        assert!(matches!(FlatIndex::from_bytes(b"definitely not an index"), Err(Error::IncompatibleSnapshot(_))));
        let empty = FlatIndex::from_bytes(&FlatIndex::new().to_bytes().unwrap()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.dim(), None);
    }
}
