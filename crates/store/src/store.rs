//! The ordered store and its OCC commit path.

use std::collections::{BTreeMap, HashSet};
use std::ops::Bound;

use metakv_types::{CommitOutcome, Entry, Put, ReadRange};
use parking_lot::RwLock;
use snafu::Snafu;

/// A value together with its per-key version counter.
#[derive(Debug, Clone)]
struct VersionedValue {
    value: Vec<u8>,
    ver: u64,
}

/// Client errors detected by [`Store::commit`] before validation.
///
/// Conflicts are not errors — they are the [`CommitOutcome::Conflict`]
/// outcome. This type covers requests no correct client produces.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CommitError {
    /// The same key appears in both the puts and the deletes of one
    /// commit. The client runtime folds its write buffer so this can only
    /// come from a broken client.
    #[snafu(display("put and delete overlap on key {key:02x?}"))]
    OverlappingWrite {
        /// The offending key.
        key: Vec<u8>,
    },
}

/// Ordered in-memory key-value store with per-key versioning.
///
/// Suitable as the canonical store of a single-partition metakv server;
/// all state lives behind one reader-writer lock.
#[derive(Debug, Default)]
pub struct Store {
    entries: RwLock<BTreeMap<Vec<u8>, VersionedValue>>,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Point lookup. Returns the value and version, or `None` when absent.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<(Vec<u8>, u64)> {
        self.entries.read().get(key).map(|v| (v.value.clone(), v.ver))
    }

    /// The current version of `key`, with `0` meaning absent.
    #[must_use]
    pub fn version_of(&self, key: &[u8]) -> u64 {
        self.entries.read().get(key).map_or(0, |v| v.ver)
    }

    /// Ascending scan over `[start, end)`.
    ///
    /// An empty `end` means unbounded above. `limit > 0` caps the result;
    /// `limit == 0` means unbounded. With `keys_only` the returned entries
    /// carry no values.
    #[must_use]
    pub fn range(&self, start: &[u8], end: &[u8], keys_only: bool, limit: u64) -> Vec<Entry> {
        let map = self.entries.read();
        scan(&map, start, end, limit)
            .into_iter()
            .map(|(key, v)| Entry {
                key: key.clone(),
                value: (!keys_only).then(|| v.value.clone()),
                ver: v.ver,
            })
            .collect()
    }

    /// The OCC commit critical section: validate, then apply, atomically.
    ///
    /// Each read range is re-scanned against the current state with the
    /// limit it was originally read under. Any difference in the observed
    /// prefix — count, keys, or (for value-sensitive ranges) versions —
    /// yields [`CommitOutcome::Conflict`] and leaves the store untouched.
    /// Otherwise puts are applied (present: bump version; absent: create
    /// at version 1) followed by deletes (absent keys are ignored).
    ///
    /// # Errors
    ///
    /// Returns [`CommitError::OverlappingWrite`] when a key appears in
    /// both `puts` and `dels`; nothing is validated or applied.
    pub fn commit(
        &self,
        reads: &[ReadRange],
        puts: &[Put],
        dels: &[Vec<u8>],
    ) -> Result<CommitOutcome, CommitError> {
        let deleted: HashSet<&[u8]> = dels.iter().map(Vec::as_slice).collect();
        if let Some(put) = puts.iter().find(|p| deleted.contains(p.key.as_slice())) {
            return OverlappingWriteSnafu { key: put.key.clone() }.fail();
        }

        let mut map = self.entries.write();

        for range in reads {
            if !range_still_valid(&map, range) {
                return Ok(CommitOutcome::Conflict);
            }
        }

        for put in puts {
            match map.get_mut(&put.key) {
                Some(entry) => {
                    entry.ver += 1;
                    entry.value = put.value.clone();
                }
                None => {
                    map.insert(
                        put.key.clone(),
                        VersionedValue { value: put.value.clone(), ver: 1 },
                    );
                }
            }
        }

        for key in dels {
            map.remove(key);
        }

        Ok(CommitOutcome::Applied)
    }

    /// Removes every entry in one critical section.
    pub fn reset(&self) {
        self.entries.write().clear();
    }

    /// Number of present keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

/// Collects `[start, end)` in ascending key order, honoring `limit`.
///
/// The caller holds the lock; the guard on `start > end` keeps
/// `BTreeMap::range` from panicking on inverted bounds (such a request is
/// simply empty).
fn scan<'a>(
    map: &'a BTreeMap<Vec<u8>, VersionedValue>,
    start: &[u8],
    end: &[u8],
    limit: u64,
) -> Vec<(&'a Vec<u8>, &'a VersionedValue)> {
    let upper: Bound<&[u8]> = if end.is_empty() {
        Bound::Unbounded
    } else if start > end {
        return Vec::new();
    } else {
        Bound::Excluded(end)
    };
    let cap = if limit == 0 { usize::MAX } else { limit as usize };
    map.range::<[u8], _>((Bound::Included(start), upper)).take(cap).collect()
}

/// Re-checks one read range against the current state.
fn range_still_valid(map: &BTreeMap<Vec<u8>, VersionedValue>, range: &ReadRange) -> bool {
    let current = scan(map, &range.start, &range.end, range.limit);
    if current.len() != range.entries.len() {
        return false;
    }
    current.iter().zip(&range.entries).all(|((key, entry), observed)| {
        key.as_slice() == observed.key.as_slice()
            && (range.keys_only || entry.ver == observed.ver)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use metakv_types::ObservedEntry;

    use super::*;

    fn put(key: &[u8], value: &[u8]) -> Put {
        Put { key: key.to_vec(), value: value.to_vec() }
    }

    /// Commit with no read-set; must always apply.
    fn blind_put(store: &Store, key: &[u8], value: &[u8]) {
        let outcome = store.commit(&[], &[put(key, value)], &[]).unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);
    }

    #[test]
    fn get_absent_reports_version_zero() {
        let store = Store::new();
        assert_eq!(store.get(b"nope"), None);
        assert_eq!(store.version_of(b"nope"), 0);
    }

    #[test]
    fn put_creates_at_version_one() {
        let store = Store::new();
        blind_put(&store, b"key1", b"val1");
        assert_eq!(store.get(b"key1"), Some((b"val1".to_vec(), 1)));
    }

    #[test]
    fn re_put_bumps_version_by_one() {
        let store = Store::new();
        blind_put(&store, b"key1", b"val1");
        blind_put(&store, b"key1", b"val2");
        assert_eq!(store.get(b"key1"), Some((b"val2".to_vec(), 2)));
    }

    #[test]
    fn delete_then_recreate_starts_at_version_one() {
        let store = Store::new();
        blind_put(&store, b"k", b"a");
        blind_put(&store, b"k", b"b");
        assert_eq!(store.version_of(b"k"), 2);

        store.commit(&[], &[], &[b"k".to_vec()]).unwrap();
        assert_eq!(store.get(b"k"), None);

        blind_put(&store, b"k", b"c");
        assert_eq!(store.get(b"k"), Some((b"c".to_vec(), 1)));
    }

    #[test]
    fn delete_of_absent_key_is_a_noop() {
        let store = Store::new();
        let outcome = store.commit(&[], &[], &[b"ghost".to_vec()]).unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);
        assert!(store.is_empty());
    }

    #[test]
    fn empty_value_is_stored_verbatim() {
        let store = Store::new();
        blind_put(&store, b"k", b"");
        assert_eq!(store.get(b"k"), Some((Vec::new(), 1)));
    }

    #[test]
    fn range_is_sorted_and_half_open() {
        let store = Store::new();
        for key in [&b"b"[..], b"a", b"d", b"c"] {
            blind_put(&store, key, b"x");
        }
        let entries = store.range(b"a", b"d", false, 0);
        let keys: Vec<&[u8]> = entries.iter().map(|e| e.key.as_slice()).collect();
        assert_eq!(keys, vec![&b"a"[..], b"b", b"c"]);
    }

    #[test]
    fn range_honors_limit() {
        let store = Store::new();
        for key in [&b"a"[..], b"b", b"c", b"d"] {
            blind_put(&store, key, b"x");
        }
        let entries = store.range(b"a", b"z", false, 2);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, b"a");
        assert_eq!(entries[1].key, b"b");
        // limit == 0 is unbounded
        assert_eq!(store.range(b"a", b"z", false, 0).len(), 4);
    }

    #[test]
    fn keys_only_range_suppresses_values() {
        let store = Store::new();
        blind_put(&store, b"a", b"value-a");
        for entry in store.range(b"a", b"z", true, 0) {
            assert_eq!(entry.value, None);
            assert!(entry.ver >= 1);
        }
        // value-carrying scan of an empty value stays Some
        blind_put(&store, b"e", b"");
        let entries = store.range(b"e", b"f", false, 0);
        assert_eq!(entries[0].value, Some(Vec::new()));
    }

    #[test]
    fn empty_end_means_unbounded() {
        let store = Store::new();
        blind_put(&store, b"a", b"1");
        blind_put(&store, &[0xFF, 0xFF], b"2");
        let entries = store.range(b"a", b"", false, 0);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].key, vec![0xFF, 0xFF]);
    }

    #[test]
    fn inverted_bounds_yield_empty_range() {
        let store = Store::new();
        blind_put(&store, b"m", b"1");
        assert!(store.range(b"z", b"a", false, 0).is_empty());
        assert!(store.range(b"m", b"m", false, 0).is_empty());
    }

    #[test]
    fn conflicting_commit_mutates_nothing() {
        let store = Store::new();
        blind_put(&store, b"a", b"1");

        // Stale read: claims `a` was observed at version 2.
        let stale = ReadRange {
            start: b"a".to_vec(),
            end: b"b".to_vec(),
            keys_only: false,
            limit: 0,
            entries: vec![ObservedEntry { key: b"a".to_vec(), ver: 2 }],
        };
        let outcome = store
            .commit(&[stale], &[put(b"a", b"clobbered"), put(b"new", b"x")], &[b"a".to_vec()])
            .unwrap_err();
        // put+delete overlap short-circuits even before validation
        assert!(matches!(outcome, CommitError::OverlappingWrite { .. }));

        let stale = ReadRange {
            start: b"a".to_vec(),
            end: b"b".to_vec(),
            keys_only: false,
            limit: 0,
            entries: vec![ObservedEntry { key: b"a".to_vec(), ver: 2 }],
        };
        let outcome =
            store.commit(&[stale], &[put(b"a", b"clobbered"), put(b"new", b"x")], &[]).unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
        assert_eq!(store.get(b"a"), Some((b"1".to_vec(), 1)));
        assert_eq!(store.get(b"new"), None);
    }

    #[test]
    fn point_range_protects_against_creation() {
        let store = Store::new();
        // T1 observed `k` absent.
        let observed_absent = ReadRange::point(b"k", 0);

        // Interleaved commit creates `k`.
        blind_put(&store, b"k", b"x");

        let outcome = store.commit(&[observed_absent], &[put(b"k", b"y")], &[]).unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);
        assert_eq!(store.get(b"k"), Some((b"x".to_vec(), 1)));
    }

    #[test]
    fn reset_wipes_everything() {
        let store = Store::new();
        blind_put(&store, b"a", b"1");
        blind_put(&store, b"b", b"2");
        assert_eq!(store.len(), 2);
        store.reset();
        assert!(store.is_empty());
        assert_eq!(store.version_of(b"a"), 0);
    }

    #[test]
    fn commit_applies_puts_before_deletes() {
        let store = Store::new();
        blind_put(&store, b"a", b"1");
        // One commit updates `a` and deletes `b` (absent) — fine.
        let outcome =
            store.commit(&[], &[put(b"a", b"2")], &[b"b".to_vec()]).unwrap();
        assert_eq!(outcome, CommitOutcome::Applied);
        assert_eq!(store.get(b"a"), Some((b"2".to_vec(), 2)));
    }
}
