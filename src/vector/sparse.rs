use ndarray::{Array1, ArrayView1};

use crate::core::float::SprFloat;

/// A cluster center is a dense combination of samples, so centers are the one
/// place the crate materializes full-dimension vectors.
pub type DenseVector<F> = Array1<F>;

/// A fixed-dimension sparse vector: only nonzero entries are materialized,
/// kept sorted by dimension index. Absent indices are implicitly zero.
///
/// Immutable once built; mutation happens in the external store, not here.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector<F> {
    dim: usize,
    entries: Vec<(u32, F)>,
}

impl<F: SprFloat> SparseVector<F> {
    /// The zero vector of the given dimension.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: Vec::new(),
        }
    }

    /// Builds a vector from arbitrary (index, weight) pairs: sorts by index,
    /// keeps the last weight for a duplicated index and drops explicit zeros.
    ///
    /// # Panics
    /// Panics if any index is outside `0..dim`.
    pub fn from_pairs(dim: usize, pairs: Vec<(u32, F)>) -> Self {
        let mut pending = pairs;
        pending.retain(|&(_, w)| w != F::zero());
        // stable sort keeps insertion order among duplicates, so last wins below
        pending.sort_by_key(|&(i, _)| i);

        let mut entries: Vec<(u32, F)> = Vec::with_capacity(pending.len());
        for (index, weight) in pending {
            assert!(
                (index as usize) < dim,
                "entry index {} outside dimension {}",
                index,
                dim
            );
            match entries.last_mut() {
                Some(last) if last.0 == index => last.1 = weight,
                _ => entries.push((index, weight)),
            }
        }

        Self { dim, entries }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of materialized (nonzero) entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn get(&self, index: u32) -> F {
        match self.entries.binary_search_by_key(&index, |&(i, _)| i) {
            Ok(pos) => self.entries[pos].1,
            Err(_) => F::zero(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, F)> + '_ {
        self.entries.iter().copied()
    }

    /// Dense projection, used when a sample is promoted to a cluster center.
    pub fn to_dense(&self) -> DenseVector<F> {
        let mut dense = Array1::zeros(self.dim);
        for (index, weight) in self.iter() {
            dense[index as usize] = weight;
        }
        dense
    }

    pub fn norm_sq(&self) -> F {
        self.entries.iter().map(|&(_, w)| w * w).sum()
    }
}

/// Inner product of a dense center with a sparse sample, walking only the
/// sample's nonzero entries.
///
/// # Panics
/// Debug-panics if the dimensions disagree.
pub fn dense_sparse_dot<F: SprFloat>(dense: &ArrayView1<F>, sparse: &SparseVector<F>) -> F {
    debug_assert_eq!(dense.len(), sparse.dim(), "dimension mismatch");
    sparse.iter().map(|(i, w)| dense[i as usize] * w).sum()
}

/// `acc += w * sparse`, touching only the sample's nonzero entries.
pub fn scaled_add_sparse<F: SprFloat>(acc: &mut Array1<F>, w: F, sparse: &SparseVector<F>) {
    debug_assert_eq!(acc.len(), sparse.dim(), "dimension mismatch");
    for (index, weight) in sparse.iter() {
        acc[index as usize] += w * weight;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_pairs_normalizes() {
        let v: SparseVector<f64> =
            SparseVector::from_pairs(10, vec![(7, 2.0), (1, 1.0), (7, 3.0), (4, 0.0)]);

        assert_eq!(v.nnz(), 2);
        assert_eq!(v.get(1), 1.0);
        assert_eq!(v.get(7), 3.0); // last duplicate wins
        assert_eq!(v.get(4), 0.0); // explicit zero dropped
    }

    #[test]
    #[should_panic(expected = "outside dimension")]
    fn test_from_pairs_rejects_out_of_range() {
        let _ = SparseVector::<f64>::from_pairs(4, vec![(4, 1.0)]);
    }

    #[test]
    fn test_to_dense() {
        let v: SparseVector<f64> = SparseVector::from_pairs(4, vec![(0, 1.0), (3, 2.0)]);
        assert_eq!(v.to_dense(), array![1.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_dense_sparse_dot() {
        let dense = array![1.0, 2.0, 3.0, 4.0];
        let sparse: SparseVector<f64> = SparseVector::from_pairs(4, vec![(1, 10.0), (3, 0.5)]);

        let result = dense_sparse_dot(&dense.view(), &sparse);
        assert!((result - 22.0).abs() < 1e-9); // 2*10 + 4*0.5
    }

    #[test]
    fn test_scaled_add_sparse() {
        let mut acc = array![1.0, 1.0, 1.0];
        let sparse: SparseVector<f64> = SparseVector::from_pairs(3, vec![(0, 2.0), (2, 4.0)]);

        scaled_add_sparse(&mut acc, 0.5, &sparse);
        assert_eq!(acc, array![2.0, 1.0, 3.0]);
    }

    #[test]
    fn test_norm_sq() {
        let v: SparseVector<f64> = SparseVector::from_pairs(100, vec![(10, 3.0), (20, 4.0)]);
        assert!((v.norm_sq() - 25.0).abs() < 1e-9);
    }
}
