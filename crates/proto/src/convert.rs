//! Bidirectional conversions between domain and wire types.
//!
//! The server store validates commits against domain
//! [`ReadRange`](metakv_types::ReadRange) records; the SDK records domain
//! observations and serializes them at commit. Legacy point-only
//! [`Observed`](crate::wire::Observed) entries fold into degenerate point
//! ranges so the store has a single validation path.

use metakv_types as types;

use crate::wire;

impl From<wire::Entry> for types::Entry {
    fn from(e: wire::Entry) -> Self {
        types::Entry { key: e.key, value: e.value, ver: e.ver }
    }
}

impl From<types::Entry> for wire::Entry {
    fn from(e: types::Entry) -> Self {
        wire::Entry { key: e.key, value: e.value, ver: e.ver }
    }
}

impl From<wire::ReadEntry> for types::ObservedEntry {
    fn from(e: wire::ReadEntry) -> Self {
        types::ObservedEntry { key: e.key, ver: e.ver }
    }
}

impl From<types::ObservedEntry> for wire::ReadEntry {
    fn from(e: types::ObservedEntry) -> Self {
        wire::ReadEntry { key: e.key, ver: e.ver }
    }
}

impl From<wire::ReadRange> for types::ReadRange {
    fn from(r: wire::ReadRange) -> Self {
        types::ReadRange {
            start: r.start,
            end: r.end,
            keys_only: r.keys_only,
            limit: r.limit,
            entries: r.entries.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<types::ReadRange> for wire::ReadRange {
    fn from(r: types::ReadRange) -> Self {
        wire::ReadRange {
            start: r.start,
            end: r.end,
            keys_only: r.keys_only,
            limit: r.limit,
            entries: r.entries.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<wire::Put> for types::Put {
    fn from(p: wire::Put) -> Self {
        types::Put { key: p.key, value: p.value }
    }
}

impl From<types::Put> for wire::Put {
    fn from(p: types::Put) -> Self {
        wire::Put { key: p.key, value: p.value }
    }
}

/// Folds a legacy point observation into an equivalent point read range.
///
/// `ver == 0` (key observed absent) becomes an empty observation over the
/// degenerate range, which validates exactly like the legacy rule: the
/// commit conflicts iff the key's current version differs from `ver`.
#[must_use]
pub fn observed_to_point_range(obs: wire::Observed) -> types::ReadRange {
    types::ReadRange::point(&obs.key, obs.ver)
}
