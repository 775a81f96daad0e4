//! Orderings and one-sided queries over index keys
//!
//! A [`Collation`] is the total order the index was written with. An
//! [`IndexQuery`] compares itself against a single key and drives
//! [`SortedIndex::find_all`](crate::SortedIndex::find_all): it returns
//! `Greater` while the keys are still below what it wants, `Equal` for every
//! key it matches and `Less` once the keys have passed it. The answers must
//! follow that order as keys ascend.

use std::cmp::Ordering;
use std::ops::{Bound, RangeBounds};

/// Total order over index keys
pub trait Collation<K> {
    /// Compare two keys
    fn compare(&self, left: &K, right: &K) -> Ordering;
}

/// The key type's own `Ord`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NaturalOrder;

impl<K: Ord> Collation<K> for NaturalOrder {
    fn compare(&self, left: &K, right: &K) -> Ordering {
        left.cmp(right)
    }
}

impl<K, F> Collation<K> for F
where
    F: Fn(&K, &K) -> Ordering,
{
    fn compare(&self, left: &K, right: &K) -> Ordering {
        self(left, right)
    }
}

/// One-sided comparison used to search an index
pub trait IndexQuery<K> {
    /// Position of the query relative to `key`
    fn compare_to(&self, key: &K) -> Ordering;
}

impl<K, F> IndexQuery<K> for F
where
    F: Fn(&K) -> Ordering,
{
    fn compare_to(&self, key: &K) -> Ordering {
        self(key)
    }
}

/// Matches keys equal to a given key under a collation
#[derive(Debug, Clone, Copy)]
pub struct ExactKey<'a, K, C> {
    key: &'a K,
    collation: &'a C,
}

impl<'a, K, C> ExactKey<'a, K, C> {
    /// Create an exact-match query
    pub const fn new(key: &'a K, collation: &'a C) -> Self {
        Self { key, collation }
    }
}

impl<K, C: Collation<K>> IndexQuery<K> for ExactKey<'_, K, C> {
    fn compare_to(&self, key: &K) -> Ordering {
        self.collation.compare(self.key, key)
    }
}

/// Matches keys inside a pair of bounds under a collation
#[derive(Debug, Clone)]
pub struct KeyRange<'a, K, C> {
    start: Bound<K>,
    end: Bound<K>,
    collation: &'a C,
}

impl<'a, K: Clone, C> KeyRange<'a, K, C> {
    /// Create a range query from any `RangeBounds`
    pub fn new<R: RangeBounds<K>>(range: &R, collation: &'a C) -> Self {
        Self {
            start: range.start_bound().cloned(),
            end: range.end_bound().cloned(),
            collation,
        }
    }
}

impl<K, C: Collation<K>> IndexQuery<K> for KeyRange<'_, K, C> {
    fn compare_to(&self, key: &K) -> Ordering {
        let below_start = match &self.start {
            Bound::Included(start) => self.collation.compare(key, start) == Ordering::Less,
            Bound::Excluded(start) => self.collation.compare(key, start) != Ordering::Greater,
            Bound::Unbounded => false,
        };
        if below_start {
            return Ordering::Greater;
        }

        let above_end = match &self.end {
            Bound::Included(end) => self.collation.compare(key, end) == Ordering::Greater,
            Bound::Excluded(end) => self.collation.compare(key, end) != Ordering::Less,
            Bound::Unbounded => false,
        };
        if above_end {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_natural_order() {
        assert_eq!(NaturalOrder.compare(&1u32, &2u32), Ordering::Less);
        assert_eq!(NaturalOrder.compare(&"b", &"a"), Ordering::Greater);
    }

    #[test]
    fn test_closure_collation() {
        let reverse = |a: &u32, b: &u32| b.cmp(a);
        assert_eq!(reverse.compare(&1, &2), Ordering::Greater);
    }

    #[test]
    fn test_exact_key() {
        let query = ExactKey::new(&10u32, &NaturalOrder);
        assert_eq!(query.compare_to(&5), Ordering::Greater);
        assert_eq!(query.compare_to(&10), Ordering::Equal);
        assert_eq!(query.compare_to(&15), Ordering::Less);
    }

    #[test]
    fn test_closure_query() {
        let query = |key: &u32| 7u32.cmp(key);
        assert_eq!(query.compare_to(&7), Ordering::Equal);
    }

    #[test]
    fn test_inclusive_range() {
        let query = KeyRange::new(&(10u32..=20), &NaturalOrder);
        assert_eq!(query.compare_to(&9), Ordering::Greater);
        assert_eq!(query.compare_to(&10), Ordering::Equal);
        assert_eq!(query.compare_to(&20), Ordering::Equal);
        assert_eq!(query.compare_to(&21), Ordering::Less);
    }

    #[test]
    fn test_half_open_range() {
        let query = KeyRange::new(&(10u32..20), &NaturalOrder);
        assert_eq!(query.compare_to(&19), Ordering::Equal);
        assert_eq!(query.compare_to(&20), Ordering::Less);

        let query = KeyRange::new(&(Bound::Excluded(10u32), Bound::Unbounded), &NaturalOrder);
        assert_eq!(query.compare_to(&10), Ordering::Greater);
        assert_eq!(query.compare_to(&u32::MAX), Ordering::Equal);
    }

    #[test]
    fn test_unbounded_range_matches_everything() {
        let query = KeyRange::<u32, _>::new(&(..), &NaturalOrder);
        assert_eq!(IndexQuery::<u32>::compare_to(&query, &0), Ordering::Equal);
    }
}
