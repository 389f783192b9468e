//! The metakv client: channel ownership, bootstrap, reconnect, and the
//! transaction entry point.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use metakv_proto::envelope::Msg;
use metakv_proto::wire::{
    CommitRequest, CommitResponse, Envelope, GetRequest, GetResponse, InitNotification,
    ListRequest, ListResponse, Put, ReadRange, ReadyNotification, ResetRequest, ResetResponse,
};
use metakv_types::key;
use snafu::ResultExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::backoff;
use crate::config::ClientConfig;
use crate::connection::{Connection, SendError};
use crate::error::{
    ClosedSnafu, IoSnafu, ProtocolSnafu, RejectedSnafu, Result, SdkError, TimeoutSnafu,
};
use crate::txn::Txn;

/// Retry budget for the internal prefix-reset transaction.
const RESET_PREFIX_RETRIES: u32 = 10;

/// The storage identity announced by the server on channel establishment.
///
/// The mount forwards these to its data-plane subsystems (object storage,
/// chunk cache); the metadata engine itself never interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitInfo {
    /// Object-storage kind, e.g. `"s3"` or `"file"`.
    pub storage: String,
    /// Object-storage bucket.
    pub bucket: String,
    /// Object-storage access key.
    pub access_key: String,
    /// Object-storage secret key.
    pub secret_key: String,
    /// Volume name.
    pub volume_name: String,
}

impl From<InitNotification> for InitInfo {
    fn from(init: InitNotification) -> Self {
        InitInfo {
            storage: init.storage,
            bucket: init.bucket,
            access_key: init.access_key,
            secret_key: init.secret_key,
            volume_name: init.volume_name,
        }
    }
}

/// Client handle to a metakv server.
///
/// Cheap to clone; all clones share one multiplexed channel. The channel
/// is owned by this handle rather than by module-level state, so tests can
/// run several independent clients in one process.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    config: ClientConfig,
    conn: Arc<Connection>,
    shutdown: CancellationToken,
    ready_declared: AtomicBool,
}

impl Client {
    /// Dials the configured endpoint, waits for the server's
    /// `InitNotification`, and (unless disabled) starts the reconnect
    /// supervisor.
    ///
    /// # Errors
    ///
    /// Fails when the endpoint cannot be reached within the connect
    /// timeout or the server never announces itself.
    pub async fn connect(config: ClientConfig) -> Result<Client> {
        let conn = Arc::new(Connection::new());
        let stream = dial(&config).await?;
        Connection::bind(&conn, stream).await;

        if conn.wait_for_init(config.connect_timeout()).await.is_none() {
            conn.close().await;
            return ProtocolSnafu { message: "server sent no init notification" }.fail();
        }

        let inner = Arc::new(ClientInner {
            config,
            conn,
            shutdown: CancellationToken::new(),
            ready_declared: AtomicBool::new(false),
        });

        if inner.config.auto_reconnect() {
            tokio::spawn(supervise(Arc::clone(&inner)));
        }

        Ok(Client { inner })
    }

    /// The storage identity from the most recent `InitNotification`.
    #[must_use]
    pub fn init_info(&self) -> Option<InitInfo> {
        self.inner.conn.init_info()
    }

    /// Whether a channel is currently bound.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.conn.is_connected()
    }

    /// Declares the mount live: sends `ReadyNotification` to the peer.
    ///
    /// After a reconnect the supervisor re-sends it on the new channel.
    ///
    /// # Errors
    ///
    /// Fails with a channel error when no live channel exists.
    pub async fn notify_ready(&self) -> Result<()> {
        self.inner.ensure_open()?;
        self.inner
            .conn
            .notify(Envelope::from(Msg::ReadyNotify(ReadyNotification {})))
            .await
            .map_err(|_| SdkError::ChannelClosed)?;
        self.inner.ready_declared.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Runs a transaction with OCC retry.
    ///
    /// The body `f` receives a [`Txn`] handle; reads go to the server and
    /// record observations, writes are buffered locally. When `f` returns
    /// `Ok`, the runtime commits the buffer (read-only bodies skip the
    /// commit RPC entirely and always succeed). On a write conflict — or
    /// a transient transport failure that happened strictly before the
    /// commit frame was sent — the buffer and observations are discarded
    /// and `f` runs again, up to `max_retry` times, after which the error
    /// surfaces. A non-retryable error from `f` aborts immediately with
    /// no commit.
    ///
    /// # Errors
    ///
    /// Surfaces [`SdkError::Conflict`] once retries are exhausted,
    /// [`SdkError::CommitIndeterminate`] when the channel was lost after
    /// the commit frame was sent, or whatever non-retryable error the
    /// body returned.
    pub async fn transaction<F, Fut>(&self, max_retry: u32, mut f: F) -> Result<()>
    where
        F: FnMut(Txn) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut attempt = 0u32;
        loop {
            let txn = Txn::new(Arc::clone(&self.inner));
            let outcome = match f(txn.clone()).await {
                Ok(()) => txn.commit().await,
                Err(err) => Err(err),
            };
            match outcome {
                Ok(()) => return Ok(()),
                Err(err) if err.is_retryable() && attempt < max_retry => {
                    attempt += 1;
                    let delay = backoff::conflict_delay(attempt);
                    tracing::debug!(
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "transaction retry"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Non-transactional listing of every entry under `prefix`.
    ///
    /// The handler receives `(key, value)` in ascending key order and may
    /// return `false` to stop early. No observations are recorded — this
    /// is a tooling read, not part of any transaction.
    ///
    /// # Errors
    ///
    /// Fails on transport errors.
    pub async fn scan_prefix<F>(&self, prefix: &[u8], mut handler: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let end = key::prefix_range_end(prefix);
        let resp = self.inner.list_rpc(prefix.to_vec(), end, false, 0).await?;
        for entry in &resp.entries {
            if !handler(&entry.key, entry.value.as_deref().unwrap_or_default()) {
                break;
            }
        }
        Ok(())
    }

    /// Wipes the entire store in one server-side critical section.
    ///
    /// # Errors
    ///
    /// Fails on transport errors or a server-side rejection.
    pub async fn reset_all(&self) -> Result<()> {
        let resp = self.inner.reset_rpc().await?;
        if resp.ok {
            Ok(())
        } else {
            RejectedSnafu { message: resp.error }.fail()
        }
    }

    /// Deletes every key under `prefix` in one transaction.
    ///
    /// This is the client-side compound form of reset: scan
    /// `[prefix, succ(prefix))` and delete each key, validated by the
    /// scan's read range at commit.
    ///
    /// # Errors
    ///
    /// Surfaces a conflict once the internal retry budget is exhausted.
    pub async fn reset_prefix(&self, prefix: &[u8]) -> Result<()> {
        let prefix = prefix.to_vec();
        self.transaction(RESET_PREFIX_RETRIES, |txn| {
            let prefix = prefix.clone();
            async move {
                let end = key::prefix_range_end(&prefix);
                let mut keys = Vec::new();
                txn.scan(&prefix, &end, true, |key, _value| {
                    keys.push(key.to_vec());
                    true
                })
                .await?;
                for key in keys {
                    txn.delete(&key);
                }
                Ok(())
            }
        })
        .await
    }

    /// Closes the client: stops the reconnect supervisor, fails all
    /// pending requests, and makes every subsequent call return
    /// [`SdkError::Closed`].
    pub async fn close(&self) {
        self.inner.shutdown.cancel();
        self.inner.conn.close().await;
    }
}

impl ClientInner {
    fn ensure_open(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            ClosedSnafu.fail()
        } else {
            Ok(())
        }
    }

    pub(crate) async fn get_rpc(&self, key: Vec<u8>) -> Result<GetResponse> {
        self.ensure_open()?;
        let id = self.conn.next_id();
        let envelope = Envelope::from(Msg::GetReq(GetRequest { id, key }));
        let resp = self
            .conn
            .send(id, envelope, self.config.request_timeout())
            .await
            .map_err(|err| self.read_failure(err))?;
        match resp.msg {
            Some(Msg::GetResp(resp)) => Ok(resp),
            other => unexpected_case("get", other),
        }
    }

    pub(crate) async fn list_rpc(
        &self,
        start: Vec<u8>,
        end: Vec<u8>,
        keys_only: bool,
        limit: u64,
    ) -> Result<ListResponse> {
        self.ensure_open()?;
        let id = self.conn.next_id();
        let envelope =
            Envelope::from(Msg::ListReq(ListRequest { id, start, end, keys_only, limit }));
        let resp = self
            .conn
            .send(id, envelope, self.config.request_timeout())
            .await
            .map_err(|err| self.read_failure(err))?;
        match resp.msg {
            Some(Msg::ListResp(resp)) => Ok(resp),
            other => unexpected_case("list", other),
        }
    }

    pub(crate) async fn commit_rpc(
        &self,
        reads: Vec<ReadRange>,
        puts: Vec<Put>,
        dels: Vec<Vec<u8>>,
    ) -> Result<CommitResponse> {
        self.ensure_open()?;
        let id = self.conn.next_id();
        let envelope = Envelope::from(Msg::CommitReq(CommitRequest {
            id,
            observed: Vec::new(),
            puts,
            dels,
            reads,
        }));
        let resp = self
            .conn
            .send(id, envelope, self.config.request_timeout())
            .await
            .map_err(commit_failure)?;
        match resp.msg {
            Some(Msg::CommitResp(resp)) => Ok(resp),
            other => unexpected_case("commit", other),
        }
    }

    pub(crate) async fn reset_rpc(&self) -> Result<ResetResponse> {
        self.ensure_open()?;
        let id = self.conn.next_id();
        let envelope = Envelope::from(Msg::ResetReq(ResetRequest { id }));
        let resp = self
            .conn
            .send(id, envelope, self.config.request_timeout())
            .await
            .map_err(|err| self.read_failure(err))?;
        match resp.msg {
            Some(Msg::ResetResp(resp)) => Ok(resp),
            other => unexpected_case("reset", other),
        }
    }

    /// Failure mapping for idempotent requests: any channel loss is
    /// retryable, a timeout keeps its own variant.
    fn read_failure(&self, err: SendError) -> SdkError {
        match err {
            SendError::TimedOut => SdkError::Timeout {
                duration_ms: self.config.request_timeout().as_millis() as u64,
            },
            SendError::NotSent | SendError::MaybeSent | SendError::SentNoReply => {
                SdkError::ChannelClosed
            }
        }
    }
}

/// Failure mapping for the commit RPC. Only a frame that provably never
/// left the client is safe to retry; anything after that point is
/// indeterminate because the server may have applied the commit.
fn commit_failure(err: SendError) -> SdkError {
    match err {
        SendError::NotSent => SdkError::ChannelClosed,
        SendError::MaybeSent | SendError::SentNoReply | SendError::TimedOut => {
            SdkError::CommitIndeterminate
        }
    }
}

fn unexpected_case<T>(rpc: &str, msg: Option<Msg>) -> Result<T> {
    let case = msg.map_or("empty", |m| m.case_name());
    ProtocolSnafu { message: format!("unexpected {case} response to {rpc} request") }.fail()
}

async fn dial(config: &ClientConfig) -> Result<TcpStream> {
    let connect = TcpStream::connect(config.endpoint());
    match tokio::time::timeout(config.connect_timeout(), connect).await {
        Ok(stream) => stream.context(IoSnafu),
        Err(_) => TimeoutSnafu { duration_ms: config.connect_timeout().as_millis() as u64 }.fail(),
    }
}

/// Reconnect supervisor: waits for channel loss, then redials with
/// exponential backoff (1s doubling to a 10s cap) until the client is
/// closed. On rebind the multiplexer is pointed at the new channel and,
/// if readiness had been declared, `ReadyNotification` is re-sent.
async fn supervise(inner: Arc<ClientInner>) {
    loop {
        let mut link = inner.conn.link();
        tokio::select! {
            () = inner.shutdown.cancelled() => return,
            down = link.wait_for(|up| !*up) => {
                if down.is_err() {
                    return;
                }
            }
        }

        tracing::info!("channel lost, reconnecting");
        let mut attempt = 0u32;
        loop {
            let delay = backoff::reconnect_delay(inner.config.reconnect(), attempt);
            tokio::select! {
                () = inner.shutdown.cancelled() => return,
                () = tokio::time::sleep(delay) => {}
            }
            match dial(&inner.config).await {
                Ok(stream) => {
                    Connection::bind(&inner.conn, stream).await;
                    if inner.ready_declared.load(Ordering::Relaxed) {
                        let ready = Envelope::from(Msg::ReadyNotify(ReadyNotification {}));
                        if let Err(err) = inner.conn.notify(ready).await {
                            tracing::debug!(?err, "ready re-send failed, will retry on next loss");
                        }
                    }
                    tracing::info!(attempts = attempt + 1, "reconnected");
                    break;
                }
                Err(err) => {
                    tracing::debug!(
                        attempt,
                        backoff_ms = delay.as_millis() as u64,
                        error = %err,
                        "reconnect attempt failed"
                    );
                    attempt = attempt.saturating_add(1);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn read_failures_are_all_retryable_channel_errors() {
        // Any loss around an idempotent read maps to ChannelClosed.
        for err in [SendError::NotSent, SendError::MaybeSent, SendError::SentNoReply] {
            let config = ClientConfig::builder().with_endpoint("127.0.0.1:1").build().unwrap();
            let inner = ClientInner {
                config,
                conn: Arc::new(Connection::new()),
                shutdown: CancellationToken::new(),
                ready_declared: AtomicBool::new(false),
            };
            assert!(matches!(inner.read_failure(err), SdkError::ChannelClosed));
        }
    }

    #[test]
    fn commit_failure_is_indeterminate_once_the_frame_may_have_left() {
        assert!(matches!(commit_failure(SendError::NotSent), SdkError::ChannelClosed));
        assert!(matches!(
            commit_failure(SendError::MaybeSent),
            SdkError::CommitIndeterminate
        ));
        assert!(matches!(
            commit_failure(SendError::SentNoReply),
            SdkError::CommitIndeterminate
        ));
        assert!(matches!(
            commit_failure(SendError::TimedOut),
            SdkError::CommitIndeterminate
        ));
    }

    #[test]
    fn indeterminate_commit_never_retries() {
        assert!(!commit_failure(SendError::SentNoReply).is_retryable());
    }
}
