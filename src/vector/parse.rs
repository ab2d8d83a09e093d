use log::error;
use serde_json::Value;

use super::sparse::SparseVector;
use crate::core::float::SprFloat;

/// Maps a textual key of a vector literal to a dimension index. Returning
/// `None` marks the key as unmappable.
pub type KeyMapFn = dyn Fn(&str) -> Option<u32> + Send + Sync;

/// Parses a keyed-weight JSON record (`{"1": 0.798, "513": 776.09}`) into a
/// sparse vector of the given dimension.
///
/// Without a `key_fn`, keys must be numeric dimension indices. Any malformed
/// record — an unparseable key, an index outside `dim`, a non-numeric
/// weight — voids the whole record: the error is logged and the zero vector
/// is returned instead of aborting the caller.
pub fn sparse_from_json<F: SprFloat>(
    text: &str,
    dim: usize,
    key_fn: Option<&KeyMapFn>,
) -> SparseVector<F> {
    let record: serde_json::Map<String, Value> = match serde_json::from_str(text) {
        Ok(record) => record,
        Err(e) => {
            error!("malformed vector literal: {}", e);
            return SparseVector::new(dim);
        }
    };

    let mut pairs = Vec::with_capacity(record.len());
    for (key, value) in &record {
        let index = match key_fn {
            Some(map) => match map(key) {
                Some(index) => index,
                None => {
                    error!("vector key {:?} has no index mapping", key);
                    return SparseVector::new(dim);
                }
            },
            None => match key.parse::<u32>() {
                Ok(index) => index,
                Err(_) => {
                    error!("non-numeric vector key {:?}", key);
                    return SparseVector::new(dim);
                }
            },
        };

        if index as usize >= dim {
            error!("vector key {} outside dimension {}", index, dim);
            return SparseVector::new(dim);
        }

        let weight = match value.as_f64().and_then(|w| F::from(w)) {
            Some(weight) => weight,
            None => {
                error!("non-numeric weight for vector key {:?}", key);
                return SparseVector::new(dim);
            }
        };

        pairs.push((index, weight));
    }

    SparseVector::from_pairs(dim, pairs)
}
