//! Per-connection session: frame loop and request dispatch.
//!
//! A session owns one framed TCP connection. It sends the bootstrap
//! `InitNotification` first, then services frames strictly in arrival
//! order — each request is handled to completion before the next frame is
//! read, which is what gives a single-threaded caller a causally
//! consistent view. Malformed frames and unknown cases are fatal: the
//! session logs and closes the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use metakv_proto::convert::observed_to_point_range;
use metakv_proto::envelope::Msg;
use metakv_proto::frame;
use metakv_proto::wire::{
    CommitRequest, CommitResponse, Envelope, GetRequest, GetResponse, InitNotification,
    ListRequest, ListResponse, ResetRequest, ResetResponse,
};
use metakv_store::Store;
use metakv_types::{CommitOutcome, Put, ReadRange, WRITE_CONFLICT};
use prost::Message as _;
use snafu::{ResultExt, Snafu};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// Fatal session errors. Any of these closes the connection.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    /// Frame-level I/O failed (includes oversized frames).
    #[snafu(display("frame transport error: {source}"))]
    Transport {
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A frame did not decode as an envelope.
    #[snafu(display("malformed frame: {source}"))]
    Malformed {
        /// Underlying decode error.
        source: prost::DecodeError,
    },

    /// A frame decoded but carried no recognized case.
    #[snafu(display("frame with unknown or empty case"))]
    UnknownCase,

    /// A case arrived that a server never accepts (responses, init).
    #[snafu(display("unexpected {case} frame from client"))]
    UnexpectedCase {
        /// The offending case name.
        case: &'static str,
    },
}

/// Runs one session to completion.
///
/// Returns `Ok(())` on orderly disconnect (peer closed the channel) and a
/// [`SessionError`] on any protocol violation, after which the connection
/// is dropped.
pub async fn run(
    stream: TcpStream,
    peer: SocketAddr,
    store: Arc<Store>,
    init: InitNotification,
) -> Result<(), SessionError> {
    let mut framed = Framed::new(stream, frame::codec());

    // Bootstrap: the mount configures its data plane from this frame.
    send(&mut framed, Envelope::from(Msg::InitNotify(init))).await?;
    tracing::debug!(%peer, "session started, init sent");

    while let Some(frame) = framed.next().await {
        let buf = frame.context(TransportSnafu)?;
        let envelope = Envelope::decode(buf.as_ref()).context(MalformedSnafu)?;
        let Some(msg) = envelope.msg else {
            return UnknownCaseSnafu.fail();
        };

        let response = match msg {
            Msg::GetReq(req) => handle_get(&store, req),
            Msg::ListReq(req) => handle_list(&store, req),
            Msg::CommitReq(req) => handle_commit(&store, req),
            Msg::ResetReq(req) => handle_reset(&store, req),
            Msg::ReadyNotify(_) => {
                // One-shot mount-is-live signal; never answered.
                tracing::debug!(%peer, "mount ready");
                continue;
            }
            other => {
                return UnexpectedCaseSnafu { case: other.case_name() }.fail();
            }
        };

        send(&mut framed, response).await?;
    }

    tracing::debug!(%peer, "session closed by peer");
    Ok(())
}

async fn send(
    framed: &mut Framed<TcpStream, tokio_util::codec::LengthDelimitedCodec>,
    envelope: Envelope,
) -> Result<(), SessionError> {
    framed.send(Bytes::from(envelope.encode_to_vec())).await.context(TransportSnafu)
}

fn handle_get(store: &Store, req: GetRequest) -> Envelope {
    let resp = match store.get(&req.key) {
        Some((value, ver)) => {
            GetResponse { id: req.id, value: Some(value), ver, found: true }
        }
        None => GetResponse { id: req.id, value: None, ver: 0, found: false },
    };
    Envelope::from(Msg::GetResp(resp))
}

fn handle_list(store: &Store, req: ListRequest) -> Envelope {
    let entries = store
        .range(&req.start, &req.end, req.keys_only, req.limit)
        .into_iter()
        .map(Into::into)
        .collect();
    Envelope::from(Msg::ListResp(ListResponse { id: req.id, entries }))
}

fn handle_commit(store: &Store, req: CommitRequest) -> Envelope {
    let id = req.id;
    let mut reads: Vec<ReadRange> = req.reads.into_iter().map(Into::into).collect();
    // Legacy clients send flat point observations; fold them into the
    // same validation path.
    reads.extend(req.observed.into_iter().map(observed_to_point_range));
    let puts: Vec<Put> = req.puts.into_iter().map(Into::into).collect();

    let resp = match store.commit(&reads, &puts, &req.dels) {
        Ok(CommitOutcome::Applied) => {
            CommitResponse { id, ok: true, error: String::new() }
        }
        Ok(CommitOutcome::Conflict) => {
            tracing::debug!(id, reads = reads.len(), "commit conflict");
            CommitResponse { id, ok: false, error: WRITE_CONFLICT.to_string() }
        }
        Err(err) => {
            tracing::warn!(id, error = %err, "commit rejected");
            CommitResponse { id, ok: false, error: err.to_string() }
        }
    };
    Envelope::from(Msg::CommitResp(resp))
}

fn handle_reset(store: &Store, req: ResetRequest) -> Envelope {
    store.reset();
    tracing::info!(id = req.id, "store reset");
    Envelope::from(Msg::ResetResp(ResetResponse { id: req.id, ok: true, error: String::new() }))
}
