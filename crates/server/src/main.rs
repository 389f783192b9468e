//! metakv server binary.
//!
//! Binds the listen address, then services mount connections until
//! Ctrl-C/SIGTERM.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port with a local storage identity
//! metakv-server --listen 0.0.0.0:9876 --storage file --bucket /var/jfs
//!
//! # Environment variables work for every flag
//! METAKV_LISTEN=0.0.0.0:9876 METAKV_STORAGE=s3 METAKV_BUCKET=meta metakv-server
//! ```

use std::io::IsTerminal;

use clap::Parser;
use metakv_server::config::{Config, LogFormat};
use metakv_server::{Server, shutdown};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), metakv_server::ServerError> {
    let config = Config::parse();

    init_logging(&config);

    tracing::info!(
        listen = %config.listen,
        storage = %config.storage,
        bucket = %config.bucket,
        volume = %config.volume_name,
        "Starting metakv server"
    );

    let server = Server::bind(config).await?;

    // Wire the signal handler to the server's shutdown token.
    let shutdown_token = server.shutdown_token();
    let signal_handle = tokio::spawn(async move {
        shutdown::shutdown_signal().await;
        shutdown_token.cancel();
    });

    let result = server.serve().await;
    signal_handle.abort();

    tracing::info!("Server shutdown complete");
    result
}

/// Initializes the logging system based on configuration.
///
/// Supports three formats:
/// - `Text`: Human-readable format (development)
/// - `Json`: JSON structured logging (production)
/// - `Auto`: JSON for non-TTY stdout, text otherwise
fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = match config.log_format {
        LogFormat::Json => true,
        LogFormat::Text => false,
        LogFormat::Auto => !std::io::stdout().is_terminal(),
    };

    if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().flatten_event(true).with_current_span(false))
            .init();
    } else {
        tracing_subscriber::registry().with(env_filter).with(fmt::layer()).init();
    }
}
