//! Assertions over split outputs.

use crate::testing::fixtures::record_starts;
use std::collections::HashSet;

/// Assert that `parts`, concatenated in order, equal `file`, and that every
/// part begins and ends on a record boundary.
///
/// # Panics
///
/// Panics if the parts don't reassemble the file or a part boundary falls
/// inside a record.
pub fn assert_splits_partition(file: &[u8], parts: &[Vec<u8>]) {
    let joined: Vec<u8> = parts.concat();
    assert_eq!(
        joined.len(),
        file.len(),
        "split outputs total {} bytes, file has {}",
        joined.len(),
        file.len()
    );
    assert!(joined == file, "split outputs don't reassemble the file");

    let starts: HashSet<usize> = record_starts(file).into_iter().collect();
    let mut at = 0;
    for (i, part) in parts.iter().enumerate() {
        if !part.is_empty() {
            assert!(
                starts.contains(&at),
                "split {i} starts at {at}, inside a record"
            );
        }
        at += part.len();
    }
}
