//! Stable lexicographic sort over typed key tuples.

use std::cmp::Ordering;

use super::typed_key::TypedValue;

/// One item of a batch being sorted.
#[derive(Debug, Clone)]
pub struct SortTuple<T> {
    /// One key per order-spec entry, major key first.
    pub keys: Vec<TypedValue>,
    /// Position of the item in the input batch.
    pub index: usize,
    pub item: T,
}

impl<T> SortTuple<T> {
    pub fn new(keys: Vec<TypedValue>, index: usize, item: T) -> Self {
        Self { keys, index, item }
    }
}

fn compare<T>(a: &SortTuple<T>, b: &SortTuple<T>, descending: &[bool]) -> Ordering {
    for (i, (ka, kb)) in a.keys.iter().zip(&b.keys).enumerate() {
        let mut ord = ka.cmp(kb);
        if descending.get(i).copied().unwrap_or(false) {
            ord = ord.reverse();
        }
        if ord != Ordering::Equal {
            return ord;
        }
    }
    a.index.cmp(&b.index)
}

/// Sort `tuples` by their keys.
///
/// `descending[i]` reverses the comparison of key position `i` only. Ties on
/// every key are broken by `index` ascending, so equal-keyed items keep their
/// input order.
pub fn sort_tuples<T>(mut tuples: Vec<SortTuple<T>>, descending: &[bool]) -> Vec<SortTuple<T>> {
    tuples.sort_by(|a, b| compare(a, b, descending));
    tuples
}
