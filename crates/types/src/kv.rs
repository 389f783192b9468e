//! Key-value entry and read-set shapes.
//!
//! These are the domain-side counterparts of the wire messages: the server
//! store validates commits against [`ReadRange`] records, and the client
//! transaction runtime produces them from its observed reads.

/// The commit error string signalling read-set invalidation.
///
/// This exact string travels on the wire in `CommitResponse.error`; both
/// sides match on it, so it must never change.
pub const WRITE_CONFLICT: &str = "write conflict";

/// One entry returned by a range listing.
///
/// `value` is `None` when the listing was keys-only; a present-but-empty
/// value is a legitimate stored value and is distinct from "not returned".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The entry key.
    pub key: Vec<u8>,
    /// The entry value, absent in keys-only listings.
    pub value: Option<Vec<u8>>,
    /// The entry version (≥ 1).
    pub ver: u64,
}

/// A single observed `(key, version)` pair inside a read range.
///
/// `ver == 0` never appears here: absent keys are expressed by the key
/// simply not being listed in the range's observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedEntry {
    /// The observed key.
    pub key: Vec<u8>,
    /// The version observed at read time.
    pub ver: u64,
}

/// A record of one range observation made during a transaction.
///
/// Describes what the transaction saw over `[start, end)` at the time the
/// read was issued. At commit the server re-scans the interval with the
/// same `limit` and conflicts if the result differs:
/// - a different number of entries, or a different key at any position,
///   always conflicts (phantom protection);
/// - a different version at any position conflicts unless `keys_only` is
///   set, in which case the transaction only depended on key membership
///   and value-only mutations are permitted.
///
/// A point read of key `k` is a degenerate range `[k, k ⧺ 0x00)` with zero
/// or one observed entries. An empty `end` means unbounded above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadRange {
    /// Inclusive lower bound of the scanned interval.
    pub start: Vec<u8>,
    /// Exclusive upper bound; empty means unbounded.
    pub end: Vec<u8>,
    /// Whether the observation is sensitive to keys only, not versions.
    pub keys_only: bool,
    /// The limit used for the original read; `0` means unbounded.
    pub limit: u64,
    /// The entries observed, in ascending key order.
    pub entries: Vec<ObservedEntry>,
}

impl ReadRange {
    /// Builds the read range recording a point read of `key`.
    ///
    /// `ver == 0` (the key was absent) records an empty observation, which
    /// makes the commit conflict if the key has since been created.
    #[must_use]
    pub fn point(key: &[u8], ver: u64) -> Self {
        let entries = if ver == 0 {
            Vec::new()
        } else {
            vec![ObservedEntry { key: key.to_vec(), ver }]
        };
        ReadRange {
            start: key.to_vec(),
            end: crate::key::point_upper_bound(key),
            keys_only: false,
            limit: 0,
            entries,
        }
    }
}

/// A buffered write shipped in a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Put {
    /// The key to write.
    pub key: Vec<u8>,
    /// The value to store, possibly empty.
    pub value: Vec<u8>,
}

/// The outcome of an OCC commit.
///
/// A conflict is a normal outcome, not an error: it signals that the
/// read-set was invalidated and the transaction should be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// All puts and deletes were applied atomically.
    Applied,
    /// A read range failed validation; the store is untouched.
    Conflict,
}
