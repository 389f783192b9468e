//! Server configuration.
//!
//! All settings come from CLI flags with environment-variable fallbacks
//! (`METAKV_*`). The storage identity fields are forwarded verbatim to
//! each connecting mount in the `InitNotification` bootstrap frame; the
//! server itself never interprets them.

use std::net::SocketAddr;

use clap::{Parser, ValueEnum};
use metakv_proto::wire::InitNotification;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format (development).
    Text,
    /// JSON structured logging (production).
    Json,
    /// JSON for non-TTY stdout, text otherwise.
    Auto,
}

/// Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "metakv-server", version, about = "Transactional metadata KV server")]
pub struct Config {
    /// Address to listen on for mount connections.
    #[arg(long, env = "METAKV_LISTEN", default_value = "127.0.0.1:9876")]
    pub listen: SocketAddr,

    /// Object-storage kind handed to mounts (e.g. "s3", "file").
    #[arg(long, env = "METAKV_STORAGE", default_value = "file")]
    pub storage: String,

    /// Object-storage bucket handed to mounts.
    #[arg(long, env = "METAKV_BUCKET", default_value = "")]
    pub bucket: String,

    /// Object-storage access key handed to mounts.
    #[arg(long, env = "METAKV_ACCESS_KEY", default_value = "", hide_env_values = true)]
    pub access_key: String,

    /// Object-storage secret key handed to mounts. Never logged.
    #[arg(long, env = "METAKV_SECRET_KEY", default_value = "", hide_env_values = true)]
    pub secret_key: String,

    /// Volume name handed to mounts.
    #[arg(long = "volume", env = "METAKV_VOLUME", default_value = "metakv")]
    pub volume_name: String,

    /// Log output format.
    #[arg(long, env = "METAKV_LOG_FORMAT", value_enum, default_value_t = LogFormat::Auto)]
    pub log_format: LogFormat,
}

impl Config {
    /// Builds the bootstrap frame sent to every freshly connected mount.
    #[must_use]
    pub fn init_notification(&self) -> InitNotification {
        InitNotification {
            storage: self.storage.clone(),
            bucket: self.bucket.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            volume_name: self.volume_name.clone(),
        }
    }

    /// Configuration for in-process test servers: ephemeral port, dummy
    /// storage identity.
    #[must_use]
    pub fn for_test() -> Self {
        Config {
            listen: "127.0.0.1:0".parse().unwrap_or_else(|_| unreachable!()),
            storage: "file".to_string(),
            bucket: "/tmp/metakv-test".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            volume_name: "metakv-test".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
