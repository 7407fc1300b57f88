/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Local, append-only store of index entries, and the leader's sequence number allocator.
//!
//! ## Index store
//!
//! Every peer keeps an [`IndexStore`]: an ordered collection of [`IndexEntry`]s keyed by their
//! [`SequenceNumber`]. Entries are never modified or removed once appended. The store supports the
//! three operations the protocols need:
//! 1. [`append`](IndexStore::append), which is idempotent on the sequence number, so that duplicate or
//!    reordered exchange responses cannot create duplicate entries.
//! 2. [`range_since`](IndexStore::range_since), which returns the entries an exchange partner is
//!    missing.
//! 3. [`max_sequence`](IndexStore::max_sequence), which never decreases.
//!
//! It additionally supports a simple keyword [`query`](IndexStore::query) for manual inspection.
//!
//! ## Sequence number allocation
//!
//! Only the peer that currently believes itself to be the leader assigns sequence numbers, using its
//! [`SequenceAllocator`]. When a peer wins an election it adopts the highest sequence number reported
//! by its voters, so that a new leader continues where the old one stopped.

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use borsh::{BorshDeserialize, BorshSerialize};

use crate::types::data_types::SequenceNumber;

/// Maximum number of entries returned by a [query](IndexStore::query).
pub const QUERY_HITS: usize = 10;

/// A single immutable entry of the replicated index.
#[derive(Clone, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct IndexEntry {
    pub sequence: SequenceNumber,
    pub key: String,
    pub value: String,
}

impl IndexEntry {
    pub fn new(sequence: SequenceNumber, key: String, value: String) -> Self {
        Self {
            sequence,
            key,
            value,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct IndexStore {
    entries: BTreeMap<SequenceNumber, IndexEntry>,
    max_sequence: SequenceNumber,
}

impl IndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `entry` to the store, raising the max sequence number if the entry's sequence number is
    /// higher.
    ///
    /// Returns `false` and leaves the store untouched if an entry with the same sequence number is
    /// already held.
    pub fn append(&mut self, entry: IndexEntry) -> bool {
        if self.entries.contains_key(&entry.sequence) {
            return false;
        }
        if entry.sequence > self.max_sequence {
            self.max_sequence = entry.sequence;
        }
        self.entries.insert(entry.sequence, entry);
        true
    }

    /// Get all entries with a sequence number in `(since, upper_bound]`, in ascending order.
    pub fn range_since(&self, since: SequenceNumber, upper_bound: SequenceNumber) -> Vec<IndexEntry> {
        if since >= upper_bound {
            return Vec::new();
        }
        self.entries
            .range(since + 1..=upper_bound)
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    /// Get the highest sequence number held, or [`SequenceNumber::init`] if the store is empty.
    pub fn max_sequence(&self) -> SequenceNumber {
        self.max_sequence
    }

    pub fn get(&self, sequence: SequenceNumber) -> Option<&IndexEntry> {
        self.entries.get(&sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Find the entries with a key word equal to any of the whitespace-separated terms of `query`,
    /// ignoring case.
    ///
    /// Hits are ranked by the number of matched terms, then by recency (highest sequence number first),
    /// and at most [`QUERY_HITS`] are returned.
    pub fn query(&self, query: &str) -> Result<Vec<IndexEntry>, QueryError> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|term| term.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        let mut hits: Vec<(usize, &IndexEntry)> = self
            .entries
            .values()
            .filter_map(|entry| {
                let key = entry.key.to_lowercase();
                let matched = terms
                    .iter()
                    .filter(|term| key.split_whitespace().any(|word| word == term.as_str()))
                    .count();
                (matched > 0).then_some((matched, entry))
            })
            .collect();

        hits.sort_by(|(left_matched, left), (right_matched, right)| {
            right_matched
                .cmp(left_matched)
                .then(right.sequence.cmp(&left.sequence))
        });

        Ok(hits
            .into_iter()
            .take(QUERY_HITS)
            .map(|(_, entry)| entry.clone())
            .collect())
    }
}

/// Single-writer allocator of index sequence numbers, used by the leader.
#[derive(Clone, Copy, Debug, Default)]
pub struct SequenceAllocator {
    next_id: SequenceNumber,
}

impl SequenceAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment the allocator and return the new sequence number. The first sequence number handed out
    /// is 1.
    pub fn next(&mut self) -> SequenceNumber {
        self.next_id += 1;
        self.next_id
    }

    /// Get the last sequence number handed out (or adopted).
    pub fn current(&self) -> SequenceNumber {
        self.next_id
    }

    /// Make sure that the allocator never hands out `seen` or anything lower.
    pub fn adopt(&mut self, seen: SequenceNumber) {
        if seen > self.next_id {
            self.next_id = seen;
        }
    }
}

/// Enumerates the ways an [`IndexStore::query`] can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The query contained no terms.
    EmptyQuery,
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::EmptyQuery => f.write_str("query contains no terms"),
        }
    }
}

impl std::error::Error for QueryError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(sequence: u64, key: &str) -> IndexEntry {
        IndexEntry::new(SequenceNumber::new(sequence), key.to_string(), format!("v{}", sequence))
    }

    #[test]
    fn append_is_idempotent_on_sequence_number() {
        let mut store = IndexStore::new();
        assert!(store.append(entry(2, "beta")));
        assert!(store.append(entry(1, "alpha")));
        assert!(!store.append(IndexEntry::new(
            SequenceNumber::new(2),
            "other".to_string(),
            "other".to_string()
        )));

        assert_eq!(store.len(), 2);
        assert_eq!(store.max_sequence(), SequenceNumber::new(2));
        assert_eq!(store.get(SequenceNumber::new(2)).map(|e| e.key.as_str()), Some("beta"));
    }

    #[test]
    fn max_sequence_never_decreases() {
        let mut store = IndexStore::new();
        store.append(entry(5, "e"));
        store.append(entry(3, "c"));
        assert_eq!(store.max_sequence(), SequenceNumber::new(5));
    }

    #[test]
    fn range_since_is_exclusive_below_and_inclusive_above() {
        let mut store = IndexStore::new();
        for sequence in 1..=6 {
            store.append(entry(sequence, "k"));
        }

        let range: Vec<u64> = store
            .range_since(SequenceNumber::new(2), SequenceNumber::new(5))
            .iter()
            .map(|e| e.sequence.int())
            .collect();
        assert_eq!(range, vec![3, 4, 5]);

        assert!(store
            .range_since(SequenceNumber::new(6), SequenceNumber::new(99999))
            .is_empty());
    }

    #[test]
    fn query_ranks_by_matches_then_recency() {
        let mut store = IndexStore::new();
        store.append(entry(1, "The Art of Computer Programming"));
        store.append(entry(2, "Art History"));
        store.append(entry(3, "Computer Art"));
        store.append(entry(4, "Cooking"));

        let hits: Vec<u64> = store
            .query("computer ART")
            .unwrap()
            .iter()
            .map(|e| e.sequence.int())
            .collect();
        assert_eq!(hits, vec![3, 1, 2]);

        assert_eq!(store.query("   "), Err(QueryError::EmptyQuery));
    }

    #[test]
    fn query_returns_at_most_ten_hits() {
        let mut store = IndexStore::new();
        for sequence in 1..=15 {
            store.append(entry(sequence, "book"));
        }
        let hits = store.query("book").unwrap();
        assert_eq!(hits.len(), QUERY_HITS);
        assert_eq!(hits[0].sequence, SequenceNumber::new(15));
    }

    #[test]
    fn allocator_starts_at_one_and_adopts_higher_values() {
        let mut allocator = SequenceAllocator::new();
        assert_eq!(allocator.next(), SequenceNumber::new(1));
        allocator.adopt(SequenceNumber::new(7));
        allocator.adopt(SequenceNumber::new(3));
        assert_eq!(allocator.current(), SequenceNumber::new(7));
        assert_eq!(allocator.next(), SequenceNumber::new(8));
    }
}
