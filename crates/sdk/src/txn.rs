//! The client-side transaction: buffered writes and an observed read-set.
//!
//! Reads are synchronous RPCs that record `(key, version)` observations;
//! writes never leave the process until commit. The handle reads its own
//! buffered writes back (without recording observations for them), so a
//! body can `set` then `get` the same key and see its own effect.
//!
//! At commit the observations are partitioned into one read range per
//! range scan and one degenerate point range per point get, and shipped
//! with the folded write buffer in a single `CommitRequest`.

use std::collections::BTreeMap;
use std::sync::Arc;

use metakv_proto::wire;
use metakv_types::{ObservedEntry, ReadRange, counter, key};
use parking_lot::Mutex;
use snafu::ResultExt;

use crate::client::ClientInner;
use crate::error::{ConflictSnafu, CounterSnafu, RejectedSnafu, Result};

/// A transaction handle.
///
/// Cheap to clone — all clones share one buffer and read-set, which is
/// what lets the transaction body be an ordinary `async` closure.
#[derive(Clone)]
pub struct Txn {
    inner: Arc<TxnInner>,
}

struct TxnInner {
    client: Arc<ClientInner>,
    state: Mutex<TxnState>,
}

/// Mutable transaction state. Point observations dedupe by key (a re-read
/// records the latest version); the write buffer folds naturally because
/// it is a map — a delete after a put leaves a single delete, a put after
/// a delete leaves a single put.
#[derive(Default)]
struct TxnState {
    points: BTreeMap<Vec<u8>, u64>,
    ranges: Vec<ReadRange>,
    buffer: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Txn {
    pub(crate) fn new(client: Arc<ClientInner>) -> Self {
        Txn { inner: Arc::new(TxnInner { client, state: Mutex::new(TxnState::default()) }) }
    }

    /// Reads one key.
    ///
    /// A buffered write wins without any RPC (and without recording an
    /// observation — the commit does not need to validate what this
    /// transaction itself will write). Otherwise the server is asked and
    /// the observed version recorded, `0` for absent.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(buffered) = self.inner.state.lock().buffer.get(key) {
            return Ok(buffered.clone());
        }
        let resp = self.inner.client.get_rpc(key.to_vec()).await?;
        let mut state = self.inner.state.lock();
        state.points.insert(key.to_vec(), resp.ver);
        if resp.found { Ok(Some(resp.value.unwrap_or_default())) } else { Ok(None) }
    }

    /// Reads several keys in order.
    ///
    /// # Errors
    ///
    /// Fails on the first transport error.
    pub async fn gets(&self, keys: &[&[u8]]) -> Result<Vec<Option<Vec<u8>>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    /// Scans `[start, end)` in ascending key order.
    ///
    /// Every returned entry is recorded in the range's observation —
    /// including entries past a handler early-stop, since commit
    /// validation re-scans the whole interval. The handler receives
    /// `(key, value)` where the value is `None` for keys-only scans, and
    /// may return `false` to stop iterating.
    ///
    /// Buffered writes are NOT folded into the results; scan before
    /// mutating the range.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn scan<F>(
        &self,
        start: &[u8],
        end: &[u8],
        keys_only: bool,
        mut handler: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], Option<&[u8]>) -> bool,
    {
        let resp =
            self.inner.client.list_rpc(start.to_vec(), end.to_vec(), keys_only, 0).await?;
        {
            let mut state = self.inner.state.lock();
            state.ranges.push(ReadRange {
                start: start.to_vec(),
                end: end.to_vec(),
                keys_only,
                limit: 0,
                entries: resp
                    .entries
                    .iter()
                    .map(|e| ObservedEntry { key: e.key.clone(), ver: e.ver })
                    .collect(),
            });
        }
        for entry in &resp.entries {
            if !handler(&entry.key, entry.value.as_deref()) {
                break;
            }
        }
        Ok(())
    }

    /// Whether any key with the given prefix exists.
    ///
    /// Issues a keys-only, limit-1 listing over `[prefix, succ(prefix))`
    /// and records it as such, so the commit only conflicts when prefix
    /// *membership* changes under it — not when some value under the
    /// prefix is updated.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn exists(&self, prefix: &[u8]) -> Result<bool> {
        let end = key::prefix_range_end(prefix);
        let resp = self.inner.client.list_rpc(prefix.to_vec(), end.clone(), true, 1).await?;
        let mut state = self.inner.state.lock();
        state.ranges.push(ReadRange {
            start: prefix.to_vec(),
            end,
            keys_only: true,
            limit: 1,
            entries: resp
                .entries
                .iter()
                .map(|e| ObservedEntry { key: e.key.clone(), ver: e.ver })
                .collect(),
        });
        Ok(!resp.entries.is_empty())
    }

    /// Buffers a put. No RPC until commit.
    pub fn set(&self, key: &[u8], value: &[u8]) {
        self.inner.state.lock().buffer.insert(key.to_vec(), Some(value.to_vec()));
    }

    /// Buffers a delete. No RPC until commit.
    pub fn delete(&self, key: &[u8]) {
        self.inner.state.lock().buffer.insert(key.to_vec(), None);
    }

    /// Appends bytes to a value: read (your own writes included), then
    /// buffer the concatenation.
    ///
    /// # Errors
    ///
    /// Fails on transport errors from the read.
    pub async fn append(&self, key: &[u8], tail: &[u8]) -> Result<()> {
        let mut value = self.get(key).await?.unwrap_or_default();
        value.extend_from_slice(tail);
        self.set(key, &value);
        Ok(())
    }

    /// Adjusts a fixed-width counter and returns the new value.
    ///
    /// Counters are unsigned 64-bit little-endian; an absent or empty
    /// value counts as `0`. With `delta == 0` this is a plain read.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or when the stored value is not a valid
    /// counter.
    pub async fn incr_by(&self, key: &[u8], delta: i64) -> Result<u64> {
        let stored = self.get(key).await?;
        let current = counter::decode(stored.as_deref()).context(CounterSnafu)?;
        if delta == 0 {
            return Ok(current);
        }
        let updated = current.wrapping_add_signed(delta);
        self.set(key, &counter::encode(updated));
        Ok(updated)
    }

    /// Commits the transaction.
    ///
    /// Read-only transactions (empty buffer) skip the RPC entirely. The
    /// read-set and buffer are consumed either way, so a retry starts
    /// clean.
    pub(crate) async fn commit(&self) -> Result<()> {
        let parts = {
            let mut state = self.inner.state.lock();
            if state.buffer.is_empty() {
                None
            } else {
                Some(state.take_commit_parts())
            }
        };
        let Some((reads, puts, dels)) = parts else {
            return Ok(());
        };

        let resp = self.inner.client.commit_rpc(reads, puts, dels).await?;
        if resp.ok {
            Ok(())
        } else if resp.error == metakv_types::WRITE_CONFLICT {
            ConflictSnafu.fail()
        } else {
            RejectedSnafu { message: resp.error }.fail()
        }
    }
}

impl TxnState {
    /// Consumes the state into wire shape: one read range per recorded
    /// scan, one point range per point get, puts and deletes partitioned
    /// from the folded buffer.
    fn take_commit_parts(&mut self) -> (Vec<wire::ReadRange>, Vec<wire::Put>, Vec<Vec<u8>>) {
        let points = std::mem::take(&mut self.points);
        let ranges = std::mem::take(&mut self.ranges);
        let buffer = std::mem::take(&mut self.buffer);

        let mut reads: Vec<wire::ReadRange> = ranges.into_iter().map(Into::into).collect();
        reads.extend(points.into_iter().map(|(key, ver)| ReadRange::point(&key, ver).into()));

        let mut puts = Vec::new();
        let mut dels = Vec::new();
        for (key, value) in buffer {
            match value {
                Some(value) => puts.push(wire::Put { key, value }),
                None => dels.push(key),
            }
        }
        (reads, puts, dels)
    }
}
