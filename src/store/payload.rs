use std::sync::Arc;

use fxhash::FxHashMap;
use log::{debug, warn};

use super::vector_base::VectorBase;
use super::{StoreError, StoreResult};
use crate::core::float::SprFloat;
use crate::vector::sparse::SparseVector;

/// Capability set every concrete leaf storage must implement. The tree
/// builder only ever holds these as opaque handles: it creates fresh
/// instances through [`new_payload`](Self::new_payload) and tears them down
/// through [`dispose`](Self::dispose), exactly once, during recursive
/// disposal.
pub trait LeafPayload<F: SprFloat>: Send + Sync {
    /// Count of stored entries.
    fn size(&self) -> usize;

    /// Adds an entry.
    fn insert(&mut self, id: u64, weight: F, vector: &SparseVector<F>) -> StoreResult<()>;

    /// Enumerates stored vectors; order is not guaranteed.
    fn all_vectors(&self) -> Vec<SparseVector<F>>;

    /// Enumerates stored ids, ascending.
    fn all_ids(&self) -> Vec<u64>;

    /// Factory: a fresh, same-configuration payload.
    fn new_payload(&self) -> Box<dyn LeafPayload<F>>;

    /// Explicit teardown hook.
    fn dispose(&mut self);
}

/// Map-backed leaf payload: keeps an id-to-weight score map and resolves the
/// actual vectors through a shared [`VectorBase`].
pub struct MapPayload<F: SprFloat> {
    max_size: usize,
    scores: FxHashMap<u64, F>,
    base: Arc<VectorBase<F>>,
}

impl<F: SprFloat> MapPayload<F> {
    pub fn new(base: Arc<VectorBase<F>>, max_size: usize) -> Self {
        Self {
            max_size,
            scores: FxHashMap::default(),
            base,
        }
    }
}

impl<F: SprFloat> LeafPayload<F> for MapPayload<F> {
    fn size(&self) -> usize {
        self.scores.len()
    }

    fn insert(&mut self, id: u64, weight: F, _vector: &SparseVector<F>) -> StoreResult<()> {
        if self.scores.len() >= self.max_size && !self.scores.contains_key(&id) {
            return Err(StoreError::CapacityExceeded { max: self.max_size });
        }
        self.scores.insert(id, weight);
        Ok(())
    }

    fn all_vectors(&self) -> Vec<SparseVector<F>> {
        let mut vectors = Vec::with_capacity(self.scores.len());
        for &id in self.scores.keys() {
            match self.base.get(id) {
                Some(v) => vectors.push(v.clone()),
                None => warn!("payload entry {} is missing from the vector store", id),
            }
        }
        vectors
    }

    fn all_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.scores.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn new_payload(&self) -> Box<dyn LeafPayload<F>> {
        Box::new(MapPayload {
            max_size: self.max_size,
            scores: FxHashMap::default(),
            base: Arc::clone(&self.base),
        })
    }

    fn dispose(&mut self) {
        debug!("disposing payload with {} entries", self.scores.len());
        self.scores.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_with(ids: &[u64]) -> Arc<VectorBase<f64>> {
        let mut base = VectorBase::new();
        for &id in ids {
            base.insert(id, SparseVector::from_pairs(2, vec![(0, id as f64)]));
        }
        Arc::new(base)
    }

    #[test]
    fn test_insert_and_enumerate() {
        let mut payload = MapPayload::new(base_with(&[5, 9]), 10);
        let v = SparseVector::new(2);
        payload.insert(9, 1.0, &v).unwrap();
        payload.insert(5, 2.0, &v).unwrap();

        assert_eq!(payload.size(), 2);
        assert_eq!(payload.all_ids(), vec![5, 9]);
        assert_eq!(payload.all_vectors().len(), 2);
    }

    #[test]
    fn test_capacity_is_enforced() {
        let mut payload = MapPayload::new(base_with(&[]), 1);
        let v = SparseVector::new(2);
        payload.insert(0, 1.0, &v).unwrap();

        let err = payload.insert(1, 1.0, &v).unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { max: 1 }));

        // re-inserting a known id is an update, not growth
        payload.insert(0, 3.0, &v).unwrap();
        assert_eq!(payload.size(), 1);
    }

    #[test]
    fn test_missing_store_entry_is_skipped() {
        let mut payload = MapPayload::new(base_with(&[1]), 10);
        let v = SparseVector::new(2);
        payload.insert(1, 1.0, &v).unwrap();
        payload.insert(2, 1.0, &v).unwrap();

        assert_eq!(payload.all_vectors().len(), 1);
    }

    #[test]
    fn test_new_payload_is_empty_with_same_configuration() {
        let mut payload = MapPayload::new(base_with(&[1]), 3);
        payload.insert(1, 1.0, &SparseVector::new(2)).unwrap();

        let fresh = payload.new_payload();
        assert_eq!(fresh.size(), 0);
    }

    #[test]
    fn test_dispose_clears_entries() {
        let mut payload = MapPayload::new(base_with(&[1]), 3);
        payload.insert(1, 1.0, &SparseVector::new(2)).unwrap();
        payload.dispose();

        assert_eq!(payload.size(), 0);
    }
}
