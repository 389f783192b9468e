//! Byte-string key ordering helpers.
//!
//! Keys are compared as unsigned lexicographic byte strings. The helpers
//! here construct the exclusive upper bounds used for prefix scans and
//! point reads.

/// Returns the smallest byte string strictly greater than every key with
/// the given prefix, or `None` when no such bound exists (the prefix is
/// empty or all `0xFF`).
///
/// The successor is formed by incrementing the last non-`0xFF` byte and
/// truncating everything after it, so `[prefix, successor)` covers exactly
/// the keys sharing `prefix`.
#[must_use]
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.last_mut() {
        if *last < 0xFF {
            *last += 1;
            return Some(end);
        }
        end.pop();
    }
    None
}

/// Like [`prefix_successor`], but encodes the unbounded case as an empty
/// byte string — the wire representation of "no upper bound".
#[must_use]
pub fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    prefix_successor(prefix).unwrap_or_default()
}

/// Returns the exclusive upper bound of the degenerate range containing
/// exactly `key`: the key with a `0x00` byte appended.
///
/// `[key, key ⧺ 0x00)` holds `key` and nothing else, which is how point
/// reads are expressed as read ranges.
#[must_use]
pub fn point_upper_bound(key: &[u8]) -> Vec<u8> {
    let mut end = Vec::with_capacity(key.len() + 1);
    end.extend_from_slice(key);
    end.push(0x00);
    end
}
