pub mod distance;

pub use distance::{DenseSparseDistance, InvertedDotDistance, SquaredEuclideanDistance};
