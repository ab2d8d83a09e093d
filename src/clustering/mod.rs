//! Clustering engine and the recursive partition tree built from it.

pub mod config;
pub mod kmeans;
pub mod topk;
pub mod tree;

pub use config::Config;
pub use kmeans::{ConstantDegree, FitOutcome, ModelParams, SampleDegree, SparseKMeansModel};
pub use topk::TopK;
pub use tree::{KMeansNode, SparseKMeansTree, TreeParams};

use std::error::Error;
use std::fmt;

/// Failures of a single model fit. None of these are recovered from: a
/// failing fit aborts whatever build depends on it.
#[derive(Debug)]
pub enum ClusterError {
    /// The configured center initialization mode is not recognized.
    UnknownInitMode(String),
    /// Seeding needs more samples than the sample set holds.
    NotEnoughSamples { needed: usize, got: usize },
    /// The per-sample bookkeeping does not cover the sample set.
    AssignmentSizeMismatch { samples: usize, tracked: usize },
    /// A center accumulated no mass during an update step.
    EmptyCenter(usize),
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterError::UnknownInitMode(mode) => {
                write!(f, "unknown center initialization mode: {:?}", mode)
            }
            ClusterError::NotEnoughSamples { needed, got } => {
                write!(f, "seeding needs {} samples but only {} were given", needed, got)
            }
            ClusterError::AssignmentSizeMismatch { samples, tracked } => {
                write!(
                    f,
                    "{} samples do not match {} assignment records",
                    samples, tracked
                )
            }
            ClusterError::EmptyCenter(cid) => {
                write!(f, "center {} accumulated no mass during the update step", cid)
            }
        }
    }
}

impl Error for ClusterError {}

/// Failures of tree construction and traversal.
#[derive(Debug)]
pub enum TreeError {
    /// A non-leaf node has no fitted model to route through.
    MissingModel,
    /// A leaf node has no payload attached (the tree was disposed).
    MissingPayload,
    /// The model predicted a cluster id outside the node's child list.
    ClusterIdOutOfRange { cid: usize, len: usize },
    /// Partitioning below the root is only defined for exclusive assignment.
    SoftPartitionUnsupported,
    /// A node's model fit failed, aborting the build.
    Cluster(ClusterError),
}

impl fmt::Display for TreeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TreeError::MissingModel => write!(f, "non-leaf node has no model"),
            TreeError::MissingPayload => write!(f, "leaf node has no payload"),
            TreeError::ClusterIdOutOfRange { cid, len } => {
                write!(f, "predicted cluster id {} outside child list of {}", cid, len)
            }
            TreeError::SoftPartitionUnsupported => {
                write!(f, "tree partitioning requires exclusive assignment")
            }
            TreeError::Cluster(e) => write!(f, "model fit failed: {}", e),
        }
    }
}

impl Error for TreeError {}

impl From<ClusterError> for TreeError {
    fn from(e: ClusterError) -> Self {
        TreeError::Cluster(e)
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;
pub type TreeResult<T> = Result<T, TreeError>;
