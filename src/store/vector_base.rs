use std::io::{self, BufRead};

use fxhash::FxHashMap;
use log::info;

use super::{StoreError, StoreResult};
use crate::core::float::SprFloat;
use crate::vector::parse::{sparse_from_json, KeyMapFn};
use crate::vector::sparse::SparseVector;

/// Id-keyed sparse vector store. The clustering core only ever consumes
/// vectors through this read interface; it never owns storage itself.
pub struct VectorBase<F: SprFloat> {
    storage: FxHashMap<u64, SparseVector<F>>,
}

impl<F: SprFloat> Default for VectorBase<F> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F: SprFloat> VectorBase<F> {
    pub fn new() -> Self {
        Self {
            storage: FxHashMap::default(),
        }
    }

    /// Loads one keyed-weight record per line, assigning the line number as
    /// the vector id. Malformed lines become zero vectors (and are logged by
    /// the parser) rather than aborting the load.
    pub fn from_jsonl_reader<R: BufRead>(
        reader: R,
        dim: usize,
        key_fn: Option<&KeyMapFn>,
    ) -> io::Result<Self> {
        let mut base = Self::new();
        for (id, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            base.insert(id as u64, sparse_from_json(&line, dim, key_fn));
        }
        info!("loaded {} vectors", base.len());
        Ok(base)
    }

    pub fn insert(&mut self, id: u64, v: SparseVector<F>) {
        self.storage.insert(id, v);
    }

    pub fn get(&self, id: u64) -> Option<&SparseVector<F>> {
        self.storage.get(&id)
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Bulk lookup; fails on the first unknown id.
    pub fn get_vectors(&self, ids: &[u64]) -> StoreResult<Vec<&SparseVector<F>>> {
        ids.iter()
            .map(|&id| self.get(id).ok_or(StoreError::UnknownId(id)))
            .collect()
    }

    /// Owned variant of [`get_vectors`](Self::get_vectors).
    pub fn export_vectors(&self, ids: &[u64]) -> StoreResult<Vec<SparseVector<F>>> {
        ids.iter()
            .map(|&id| self.get(id).cloned().ok_or(StoreError::UnknownId(id)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_lookup() {
        let mut base: VectorBase<f64> = VectorBase::new();
        base.insert(3, SparseVector::from_pairs(4, vec![(0, 1.0)]));

        assert_eq!(base.len(), 1);
        assert!(base.get(3).is_some());
        assert!(base.get(4).is_none());
    }

    #[test]
    fn test_bulk_lookup_reports_unknown_id() {
        let mut base: VectorBase<f64> = VectorBase::new();
        base.insert(0, SparseVector::new(4));

        let err = base.get_vectors(&[0, 9]).unwrap_err();
        assert!(matches!(err, StoreError::UnknownId(9)));
        assert_eq!(base.get_vectors(&[0]).unwrap().len(), 1);
    }

    #[test]
    fn test_from_jsonl_reader_assigns_line_ids() {
        let data: &[u8] = b"{\"0\": 1.5}\n{\"1\": 2.5}\n";
        let base: VectorBase<f64> = VectorBase::from_jsonl_reader(data, 2, None).unwrap();

        assert_eq!(base.len(), 2);
        assert_eq!(base.get(0).unwrap().get(0), 1.5);
        assert_eq!(base.get(1).unwrap().get(1), 2.5);
    }

    #[test]
    fn test_from_jsonl_reader_keeps_malformed_lines_as_zero_vectors() {
        let data: &[u8] = b"{\"0\": 1.0}\n{\"oops\": 1.0}\n";
        let base: VectorBase<f64> = VectorBase::from_jsonl_reader(data, 2, None).unwrap();

        assert_eq!(base.len(), 2);
        assert_eq!(base.get(1).unwrap().nnz(), 0);
    }
}
