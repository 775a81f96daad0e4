//! Property tests: traversal results do not depend on tree shape

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use discette_ntfs::index::{ExactKey, IndexImageBuilder, NaturalOrder, NodeSpec};
use discette_ntfs::{Result, SortedIndex};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::io::Cursor;

type U16Index = SortedIndex<u16, u32, Cursor<Vec<u8>>>;

/// Sorted records with many duplicate keys; data values are unique
fn sorted_records() -> impl Strategy<Value = Vec<(u16, u32)>> {
    prop::collection::vec(0u16..64, 0..400).prop_map(|mut keys| {
        keys.sort_unstable();
        keys.into_iter()
            .enumerate()
            .map(|(position, key)| (key, position as u32))
            .collect()
    })
}

fn open_bulk(records: &[(u16, u32)], fanout: usize) -> std::result::Result<U16Index, TestCaseError> {
    let image = IndexImageBuilder::new()
        .build(&NodeSpec::bulk_load(records.to_vec(), fanout))
        .map_err(|e| TestCaseError::fail(e.to_string()))?;
    image
        .open(NaturalOrder)
        .map_err(|e| TestCaseError::fail(e.to_string()))
}

fn drain(
    iter: impl Iterator<Item = Result<(u16, u32)>>,
) -> std::result::Result<Vec<(u16, u32)>, TestCaseError> {
    iter.collect::<Result<Vec<_>>>()
        .map_err(|e| TestCaseError::fail(e.to_string()))
}

proptest! {
    /// Enumeration returns every record in input order
    #[test]
    fn enumeration_matches_input(records in sorted_records(), fanout in 1usize..12) {
        let index = open_bulk(&records, fanout)?;
        prop_assert_eq!(drain(index.entries())?, records.clone());
        prop_assert_eq!(index.count().map_err(|e| TestCaseError::fail(e.to_string()))?, records.len());
    }

    /// Exact-key search equals the filtered enumeration, duplicates included
    #[test]
    fn find_all_matches_filter(
        records in sorted_records(),
        fanout in 1usize..12,
        target in 0u16..70,
    ) {
        let index = open_bulk(&records, fanout)?;
        let expected: Vec<(u16, u32)> = records.iter().copied().filter(|(key, _)| *key == target).collect();

        prop_assert_eq!(drain(index.find_all(ExactKey::new(&target, &NaturalOrder)))?, expected.clone());

        let first = index
            .find_first(|key: &u16| target.cmp(key))
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(first, expected.first().copied());
    }

    /// Range search equals the filtered enumeration
    #[test]
    fn range_matches_filter(
        records in sorted_records(),
        fanout in 1usize..12,
        low in 0u16..70,
        span in 0u16..20,
    ) {
        let index = open_bulk(&records, fanout)?;
        let high = low + span;
        let expected: Vec<(u16, u32)> = records
            .iter()
            .copied()
            .filter(|(key, _)| (low..high).contains(key))
            .collect();

        prop_assert_eq!(drain(index.range(low..high))?, expected);
    }
}
