//! In-process test server harness.

use std::net::SocketAddr;
use std::sync::Arc;

use metakv_server::{Config, Server};
use metakv_store::Store;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A metakv server running as a background task on an ephemeral port.
///
/// Dropping the harness does not stop the server; call [`stop`](Self::stop)
/// for a clean teardown (reconnect tests rely on stopping one instance and
/// spawning another at the same address).
pub struct TestServer {
    addr: SocketAddr,
    store: Arc<Store>,
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Spawns a server on an ephemeral localhost port.
    #[allow(clippy::expect_used)]
    pub async fn spawn() -> Self {
        let mut config = Config::for_test();
        config.listen = "127.0.0.1:0".parse().expect("loopback addr");
        Self::spawn_with_config(config).await
    }

    /// Spawns a server at a fixed address (reconnect tests reuse a port).
    #[allow(clippy::expect_used)]
    pub async fn spawn_at(addr: SocketAddr) -> Self {
        let mut config = Config::for_test();
        config.listen = addr;
        Self::spawn_with_config(config).await
    }

    /// Spawns a server with the given configuration.
    #[allow(clippy::expect_used)]
    pub async fn spawn_with_config(config: Config) -> Self {
        let server = Server::bind(config).await.expect("bind test server");
        let addr = server.local_addr();
        let store = server.store();
        let shutdown = server.shutdown_token();
        let handle = tokio::spawn(async move {
            if let Err(err) = server.serve().await {
                tracing::error!(error = %err, "test server failed");
            }
        });
        TestServer { addr, store, shutdown, handle }
    }

    /// The bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The address formatted for client configuration.
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    /// Direct handle to the server's store for white-box assertions.
    pub fn store(&self) -> Arc<Store> {
        Arc::clone(&self.store)
    }

    /// Stops the server and waits for the accept loop to exit. Live
    /// connections are torn down.
    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}
