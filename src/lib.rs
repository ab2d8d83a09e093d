//! sprann: a hierarchical k-means routing index over sparse vectors.
//!
//! Partitions a large sparse-vector collection into small, searchable leaf
//! groups by recursively clustering a sample set and routing queries through
//! the fitted centers of each node.
//!
//! # Modules
//! - `clustering`: the k-means engine, the partition tree and the bounded
//!   top-k selector.
//! - `distances`: dense-center / sparse-sample distance strategies.
//! - `store`: the id-keyed vector store and leaf payload adapters.
//! - `vector`: sparse and dense vector model plus literal parsing.
pub mod clustering;
pub mod core;
pub mod distances;
pub mod store;
pub mod vector;
