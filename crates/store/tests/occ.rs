//! OCC validation scenarios against the store's commit critical section.
//!
//! Each test models one transaction's recorded read-set and an
//! interleaved commit from another writer, then checks which side wins.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use metakv_store::Store;
use metakv_types::{CommitOutcome, ObservedEntry, Put, ReadRange};

fn put(key: &[u8], value: &[u8]) -> Put {
    Put { key: key.to_vec(), value: value.to_vec() }
}

fn apply(store: &Store, puts: &[Put]) {
    assert_eq!(store.commit(&[], puts, &[]).unwrap(), CommitOutcome::Applied);
}

fn observed(key: &[u8], ver: u64) -> ObservedEntry {
    ObservedEntry { key: key.to_vec(), ver }
}

#[test]
fn put_then_get() {
    let store = Store::new();
    apply(&store, &[put(b"key1", b"val1")]);
    assert_eq!(store.get(b"key1"), Some((b"val1".to_vec(), 1)));
}

#[test]
fn re_put_bumps_version() {
    let store = Store::new();
    apply(&store, &[put(b"key1", b"val1")]);
    apply(&store, &[put(b"key1", b"val2")]);
    assert_eq!(store.get(b"key1"), Some((b"val2".to_vec(), 2)));
}

#[test]
fn point_read_conflict() {
    let store = Store::new();
    apply(&store, &[put(b"k", b"orig")]);

    // T1 reads k at version 1.
    let read = ReadRange::point(b"k", store.version_of(b"k"));

    // Interleaved writer bumps k to version 2.
    apply(&store, &[put(b"k", b"x")]);
    assert_eq!(store.version_of(b"k"), 2);

    // T1's commit must fail validation.
    let outcome = store.commit(&[read], &[put(b"k", b"y")], &[]).unwrap();
    assert_eq!(outcome, CommitOutcome::Conflict);
    assert_eq!(store.get(b"k"), Some((b"x".to_vec(), 2)));
}

#[test]
fn phantom_insert_conflict() {
    let store = Store::new();
    apply(&store, &[put(b"a", b"1"), put(b"c", b"1")]);

    // T1 scanned [a, d) and saw a@1, c@1.
    let read = ReadRange {
        start: b"a".to_vec(),
        end: b"d".to_vec(),
        keys_only: false,
        limit: 0,
        entries: vec![observed(b"a", 1), observed(b"c", 1)],
    };

    // Interleaved writer inserts b — a phantom for T1's range.
    apply(&store, &[put(b"b", b"2")]);

    let outcome = store.commit(&[read], &[put(b"a", b"updated")], &[]).unwrap();
    assert_eq!(outcome, CommitOutcome::Conflict);
    assert_eq!(store.get(b"a"), Some((b"1".to_vec(), 1)));
}

#[test]
fn keys_only_permits_value_only_updates() {
    let store = Store::new();
    apply(&store, &[put(b"a", b"1")]);
    apply(&store, &[put(b"b", b"1"), put(b"b", b"2")]);
    assert_eq!(store.version_of(b"b"), 2);

    // T1 scanned [a, c) keys-only and saw a@1, b@2.
    let read = ReadRange {
        start: b"a".to_vec(),
        end: b"c".to_vec(),
        keys_only: true,
        limit: 0,
        entries: vec![observed(b"a", 1), observed(b"b", 2)],
    };

    // Interleaved writer updates a's value (version changes, key set does not).
    apply(&store, &[put(b"a", b"updated")]);

    let outcome = store.commit(&[read], &[put(b"b", b"new-b")], &[]).unwrap();
    assert_eq!(outcome, CommitOutcome::Applied);
    assert_eq!(store.get(b"b"), Some((b"new-b".to_vec(), 3)));
}

#[test]
fn keys_only_still_conflicts_on_membership_change() {
    let store = Store::new();
    apply(&store, &[put(b"a", b"1")]);

    let read = ReadRange {
        start: b"a".to_vec(),
        end: b"c".to_vec(),
        keys_only: true,
        limit: 0,
        entries: vec![observed(b"a", 1)],
    };

    // Key-set change inside the range: a new key appears.
    apply(&store, &[put(b"b", b"2")]);

    let outcome = store.commit(&[read], &[put(b"a", b"x")], &[]).unwrap();
    assert_eq!(outcome, CommitOutcome::Conflict);
}

#[test]
fn limit_one_insert_before_conflicts() {
    let store = Store::new();
    apply(&store, &[put(b"b", b"1"), put(b"c", b"1")]);

    // T1: scan [a, z) limit=1 saw b@1.
    let read = ReadRange {
        start: b"a".to_vec(),
        end: b"z".to_vec(),
        keys_only: false,
        limit: 1,
        entries: vec![observed(b"b", 1)],
    };

    // Case A: insert before the observed prefix — `a` now heads the range.
    apply(&store, &[put(b"a", b"1")]);

    let outcome = store.commit(&[read], &[put(b"d", b"4")], &[]).unwrap();
    assert_eq!(outcome, CommitOutcome::Conflict);
    assert_eq!(store.get(b"d"), None);
}

#[test]
fn limit_one_insert_after_does_not_conflict() {
    let store = Store::new();
    apply(&store, &[put(b"b", b"1"), put(b"c", b"1")]);

    let read = ReadRange {
        start: b"a".to_vec(),
        end: b"z".to_vec(),
        keys_only: false,
        limit: 1,
        entries: vec![observed(b"b", 1)],
    };

    // Case B: insert past the limit — the observed prefix is unchanged.
    apply(&store, &[put(b"d", b"4")]);

    let outcome = store.commit(&[read], &[put(b"c", b"3")], &[]).unwrap();
    assert_eq!(outcome, CommitOutcome::Applied);
    assert_eq!(store.get(b"c"), Some((b"3".to_vec(), 2)));
}

#[test]
fn two_writers_on_one_observation_cannot_both_win() {
    let store = Store::new();
    apply(&store, &[put(b"counter", b"0")]);

    // Both transactions observed counter@1.
    let t1_read = ReadRange::point(b"counter", 1);
    let t2_read = ReadRange::point(b"counter", 1);

    let first = store.commit(&[t1_read], &[put(b"counter", b"1")], &[]).unwrap();
    let second = store.commit(&[t2_read], &[put(b"counter", b"2")], &[]).unwrap();

    assert_eq!(first, CommitOutcome::Applied);
    assert_eq!(second, CommitOutcome::Conflict);
    assert_eq!(store.get(b"counter"), Some((b"1".to_vec(), 2)));
}
