//! TCP listener and session supervision.

use std::net::SocketAddr;
use std::sync::Arc;

use metakv_store::Store;
use snafu::{ResultExt, Snafu};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::session;

/// Errors binding or running the server.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ServerError {
    /// Binding the listen address failed.
    #[snafu(display("failed to bind {addr}: {source}"))]
    Bind {
        /// The requested listen address.
        addr: SocketAddr,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Accepting a connection failed.
    #[snafu(display("accept failed: {source}"))]
    Accept {
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// The metakv server: one shared store, one session task per connection.
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    store: Arc<Store>,
    config: Config,
    shutdown: CancellationToken,
}

impl Server {
    /// Binds the listen address and prepares an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] when the address cannot be bound.
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        let listener =
            TcpListener::bind(config.listen).await.context(BindSnafu { addr: config.listen })?;
        let local_addr = listener.local_addr().context(BindSnafu { addr: config.listen })?;
        Ok(Server {
            listener,
            local_addr,
            store: Arc::new(Store::new()),
            config,
            shutdown: CancellationToken::new(),
        })
    }

    /// The bound address (useful with an ephemeral port).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Handle to the shared store, for embedding and tests.
    #[must_use]
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Token that stops the accept loop and tears down live sessions.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts connections until the shutdown token fires.
    ///
    /// Each connection gets its own session task; on shutdown the accept
    /// loop stops and all session tasks are aborted, which closes their
    /// connections.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Accept`] when the listener itself fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let mut sessions: JoinSet<()> = JoinSet::new();
        tracing::info!(addr = %self.local_addr, "accepting mount connections");

        let result = loop {
            tokio::select! {
                () = self.shutdown.cancelled() => break Ok(()),
                accepted = self.listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(source) => break Err(ServerError::Accept { source }),
                    };
                    if let Err(err) = stream.set_nodelay(true) {
                        tracing::debug!(%peer, error = %err, "set_nodelay failed");
                    }
                    tracing::info!(%peer, "mount connected");
                    let store = Arc::clone(&self.store);
                    let init = self.config.init_notification();
                    sessions.spawn(async move {
                        match session::run(stream, peer, store, init).await {
                            Ok(()) => tracing::info!(%peer, "mount disconnected"),
                            Err(err) => {
                                tracing::warn!(%peer, error = %err, "session terminated");
                            }
                        }
                    });
                }
                // Reap finished sessions so the set does not grow unbounded.
                Some(_) = sessions.join_next(), if !sessions.is_empty() => {}
            }
        };

        sessions.abort_all();
        while sessions.join_next().await.is_some() {}
        tracing::info!("server stopped");
        result
    }
}
