use ndarray::ArrayView1;

use crate::core::float::SprFloat;
use crate::vector::sparse::{dense_sparse_dot, SparseVector};

/// Trait defining the interface for center-to-sample distance scoring.
/// Smaller is closer; every comparison in the clustering engine relies on
/// this convention.
pub trait DenseSparseDistance<F: SprFloat>: Send + Sync {
    /// Scores a dense center against a sparse sample. Panics if the
    /// dimensions disagree.
    fn compute(&self, center: &ArrayView1<F>, sample: &SparseVector<F>) -> F;
}

const DOT_EPSILON: f64 = 1e-6;

/// Inverted inner product: `1 / (dot + ε)`. High similarity maps to a small
/// score, matching the smaller-is-closer convention.
#[derive(Debug, Clone, Copy)]
pub struct InvertedDotDistance;

impl<F: SprFloat> DenseSparseDistance<F> for InvertedDotDistance {
    #[inline]
    fn compute(&self, center: &ArrayView1<F>, sample: &SparseVector<F>) -> F {
        let dot = dense_sparse_dot(center, sample);
        F::one() / (dot + F::from(DOT_EPSILON).unwrap())
    }
}

/// [Squared Euclidean distance](https://en.wikipedia.org/wiki/Euclidean_distance),
/// computed as `‖c‖² − 2·(c·s) + ‖s‖²` so the sample is never densified.
#[derive(Debug, Clone, Copy)]
pub struct SquaredEuclideanDistance;

impl<F: SprFloat> DenseSparseDistance<F> for SquaredEuclideanDistance {
    #[inline]
    fn compute(&self, center: &ArrayView1<F>, sample: &SparseVector<F>) -> F {
        let center_sq = center.iter().map(|&c| c * c).sum::<F>();
        let dot = dense_sparse_dot(center, sample);
        center_sq - (dot + dot) + sample.norm_sq()
    }
}
