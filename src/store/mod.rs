//! External collaborators of the clustering core: the id-keyed vector store
//! and the leaf payload adapters.

pub mod payload;
pub mod vector_base;

pub use payload::{LeafPayload, MapPayload};
pub use vector_base::VectorBase;

use std::error::Error;
use std::fmt;

/// Error types for store and payload operations.
#[derive(Debug)]
pub enum StoreError {
    /// No vector is stored under the requested identifier.
    UnknownId(u64),
    /// The payload is at capacity.
    CapacityExceeded { max: usize },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::UnknownId(id) => write!(f, "no vector stored under id {}", id),
            StoreError::CapacityExceeded { max } => {
                write!(f, "payload is full ({} entries max)", max)
            }
        }
    }
}

impl Error for StoreError {}

pub type StoreResult<T> = Result<T, StoreError>;
