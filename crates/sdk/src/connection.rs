//! Connection multiplexer: one ordered duplex channel, many callers.
//!
//! Every outgoing request gets a fresh 64-bit id from a monotonic counter;
//! a single reader task demultiplexes inbound frames by the echoed id and
//! hands each to its waiter. Outbound writes are serialized through an
//! async mutex so frames are never interleaved. When the channel dies,
//! every pending waiter fails with a terminal closed-channel signal and
//! the next send fails fast; the owner may later rebind a replacement
//! channel without disturbing the pending-map bookkeeping (epochs keep a
//! stale reader from tearing down its successor).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use metakv_proto::envelope::Msg;
use metakv_proto::frame;
use metakv_proto::wire::Envelope;
use parking_lot::Mutex;
use prost::Message as _;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{oneshot, watch};
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};

use crate::client::InitInfo;

type Writer = FramedWrite<OwnedWriteHalf, LengthDelimitedCodec>;
type Reader = FramedRead<OwnedReadHalf, LengthDelimitedCodec>;

/// How a send attempt failed, as seen by the multiplexer.
///
/// The commit path must distinguish "the frame never left this process"
/// from "the frame may have reached the server": the former is safe to
/// retry, the latter makes a commit indeterminate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SendError {
    /// No live channel; nothing was written.
    NotSent,
    /// The write failed partway; the frame may or may not have arrived.
    MaybeSent,
    /// The frame was written but the channel died before the response.
    SentNoReply,
    /// The frame was written but no response arrived in time.
    TimedOut,
}

#[derive(Default)]
struct PendingState {
    /// Channel generation; bumped on every bind and on close.
    epoch: u64,
    /// In-flight requests awaiting their response frame.
    waiters: HashMap<u64, oneshot::Sender<Envelope>>,
}

struct WriterSlot {
    epoch: u64,
    sink: Option<Writer>,
}

/// The multiplexer over one (replaceable) framed duplex channel.
pub(crate) struct Connection {
    next_id: AtomicU64,
    pending: Mutex<PendingState>,
    writer: tokio::sync::Mutex<WriterSlot>,
    init_tx: watch::Sender<Option<InitInfo>>,
    link_tx: watch::Sender<bool>,
}

impl Connection {
    pub(crate) fn new() -> Self {
        let (init_tx, _) = watch::channel(None);
        let (link_tx, _) = watch::channel(false);
        Connection {
            next_id: AtomicU64::new(0),
            pending: Mutex::new(PendingState::default()),
            writer: tokio::sync::Mutex::new(WriterSlot { epoch: 0, sink: None }),
            init_tx,
            link_tx,
        }
    }

    /// Allocates a fresh request id. Ids start at 1 and never repeat for
    /// the lifetime of the client, across reconnects.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Installs `stream` as the active channel and starts its reader.
    pub(crate) async fn bind(conn: &Arc<Connection>, stream: TcpStream) {
        if let Err(err) = stream.set_nodelay(true) {
            tracing::debug!(error = %err, "set_nodelay failed");
        }
        let (read_half, write_half) = stream.into_split();

        let epoch = {
            let mut pending = conn.pending.lock();
            pending.epoch += 1;
            pending.epoch
        };
        {
            let mut slot = conn.writer.lock().await;
            slot.epoch = epoch;
            slot.sink = Some(FramedWrite::new(write_half, frame::codec()));
        }

        let reader_conn = Arc::clone(conn);
        let reader = FramedRead::new(read_half, frame::codec());
        tokio::spawn(async move { reader_conn.read_loop(reader, epoch).await });

        conn.link_tx.send_replace(true);
    }

    /// Sends a request frame and waits for the response with the echoed id.
    pub(crate) async fn send(
        &self,
        id: u64,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<Envelope, SendError> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().waiters.insert(id, tx);

        let bytes = Bytes::from(envelope.encode_to_vec());
        {
            let mut slot = self.writer.lock().await;
            let Some(sink) = slot.sink.as_mut() else {
                self.pending.lock().waiters.remove(&id);
                return Err(SendError::NotSent);
            };
            match sink.send(bytes).await {
                Ok(()) => {}
                Err(err) => {
                    tracing::debug!(id, error = %err, "frame write failed");
                    slot.sink = None;
                    self.pending.lock().waiters.remove(&id);
                    return Err(SendError::MaybeSent);
                }
            }
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(SendError::SentNoReply),
            Err(_) => {
                self.pending.lock().waiters.remove(&id);
                Err(SendError::TimedOut)
            }
        }
    }

    /// Sends a notification frame: no id, no response expected.
    pub(crate) async fn notify(&self, envelope: Envelope) -> Result<(), SendError> {
        let bytes = Bytes::from(envelope.encode_to_vec());
        let mut slot = self.writer.lock().await;
        let Some(sink) = slot.sink.as_mut() else {
            return Err(SendError::NotSent);
        };
        match sink.send(bytes).await {
            Ok(()) => Ok(()),
            Err(err) => {
                tracing::debug!(error = %err, "notification write failed");
                slot.sink = None;
                Err(SendError::MaybeSent)
            }
        }
    }

    /// The latest storage identity announced by the peer, if any.
    pub(crate) fn init_info(&self) -> Option<InitInfo> {
        self.init_tx.borrow().clone()
    }

    /// Waits until an `InitNotification` has been observed on any channel
    /// generation. Returns `None` on timeout.
    pub(crate) async fn wait_for_init(&self, timeout: Duration) -> Option<InitInfo> {
        let mut rx = self.init_tx.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|init| init.is_some())).await {
            Ok(Ok(guard)) => (*guard).clone(),
            _ => None,
        }
    }

    /// A watch over channel liveness, for the reconnect supervisor.
    pub(crate) fn link(&self) -> watch::Receiver<bool> {
        self.link_tx.subscribe()
    }

    /// Whether a channel is currently bound.
    pub(crate) fn is_connected(&self) -> bool {
        *self.link_tx.borrow()
    }

    /// Permanently tears down the channel; pending requests fail and no
    /// reader generation can resurrect the connection state.
    pub(crate) async fn close(&self) {
        let waiters = {
            let mut pending = self.pending.lock();
            pending.epoch += 1;
            std::mem::take(&mut pending.waiters)
        };
        {
            let mut slot = self.writer.lock().await;
            slot.sink = None;
        }
        drop(waiters);
        self.link_tx.send_replace(false);
    }

    async fn read_loop(self: Arc<Self>, mut frames: Reader, epoch: u64) {
        loop {
            match frames.next().await {
                Some(Ok(buf)) => match Envelope::decode(buf.as_ref()) {
                    Ok(envelope) => {
                        if !self.route(envelope) {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "malformed frame from server, closing channel");
                        break;
                    }
                },
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "channel read failed");
                    break;
                }
                None => {
                    tracing::debug!("channel closed by peer");
                    break;
                }
            }
        }
        self.channel_down(epoch).await;
    }

    /// Routes one inbound frame. Returns false when the frame is a
    /// protocol violation and the channel must be dropped.
    fn route(&self, envelope: Envelope) -> bool {
        let Some(msg) = envelope.msg else {
            tracing::warn!("frame with unknown case from server, closing channel");
            return false;
        };
        match msg {
            Msg::InitNotify(init) => {
                self.init_tx.send_replace(Some(InitInfo::from(init)));
                true
            }
            msg => match msg.response_id() {
                Some(id) => {
                    let waiter = self.pending.lock().waiters.remove(&id);
                    match waiter {
                        Some(tx) => {
                            let _ = tx.send(Envelope::from(msg));
                        }
                        None => {
                            // Waiter gave up (timeout) or this is a duplicate.
                            tracing::debug!(id, "response with no waiter");
                        }
                    }
                    true
                }
                None => {
                    tracing::warn!(case = msg.case_name(), "unexpected case from server, closing channel");
                    false
                }
            },
        }
    }

    /// Fails all waiters of generation `epoch` and clears its writer.
    /// A stale generation (already superseded by bind or close) is a no-op.
    async fn channel_down(&self, epoch: u64) {
        let waiters = {
            let mut pending = self.pending.lock();
            if pending.epoch != epoch {
                return;
            }
            std::mem::take(&mut pending.waiters)
        };
        {
            let mut slot = self.writer.lock().await;
            if slot.epoch == epoch {
                slot.sink = None;
            }
        }
        // Dropping the senders wakes every pending receiver with a
        // closed-channel failure.
        drop(waiters);
        self.link_tx.send_replace(false);
    }
}
