//! Identity Merge
//!
//! Folds incrementally fetched pages into a list that is already on screen
//! without reordering or duplicating what is there.

use std::collections::HashSet;
use std::hash::Hash;

use crate::models::{DueItem, OrderSummaryEntry};

/// Records that carry a stable identity key
pub trait Identified {
    /// The type of the record's identity key
    type Key: Eq + Hash + Clone;

    /// `None` when the backend sent no usable key
    fn identity(&self) -> Option<Self::Key>;
}

impl Identified for DueItem {
    type Key = u32;

    fn identity(&self) -> Option<u32> {
        (self.row_index != 0).then_some(self.row_index)
    }
}

impl Identified for OrderSummaryEntry {
    type Key = String;

    fn identity(&self) -> Option<String> {
        let id = self.order_id.trim();
        (!id.is_empty()).then(|| id.to_string())
    }
}

/// Keep all of `base` in order, then append the entries of `incoming` whose
/// key is not yet present. Incoming entries without a key are dropped.
pub fn merge_by_identity<T, K, F>(base: Vec<T>, incoming: Vec<T>, key_of: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> Option<K>,
{
    if incoming.is_empty() {
        return base;
    }
    let mut seen: HashSet<K> = base.iter().filter_map(&key_of).collect();
    let mut out = base;
    for entry in incoming {
        if let Some(key) = key_of(&entry) {
            if seen.insert(key) {
                out.push(entry);
            }
        }
    }
    out
}

/// `merge_by_identity` keyed by the record's own identity
pub fn merge_unique<T: Identified>(base: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    merge_by_identity(base, incoming, T::identity)
}
