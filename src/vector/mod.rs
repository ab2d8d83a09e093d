pub mod parse;
pub mod sparse;

pub use parse::{sparse_from_json, KeyMapFn};
pub use sparse::{dense_sparse_dot, scaled_add_sparse, DenseVector, SparseVector};
