//! SDK error types with retryability classification.
//!
//! Two tiers of failure flow through the SDK:
//! - **Transport errors**: dialing, channel loss, timeouts
//! - **Transaction outcomes**: write conflicts, server rejections,
//!   commit indeterminacy
//!
//! The transaction runtime consults [`SdkError::is_retryable`] to decide
//! whether to re-run the body; everything else surfaces to the caller.

use snafu::{Location, Snafu};

/// Result type alias for SDK operations.
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SdkError {
    /// Failed to establish a connection.
    #[snafu(display("connection error at {location}: {message}"))]
    Connection {
        /// Error description.
        message: String,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// Transport-level I/O failure.
    #[snafu(display("I/O error at {location}: {source}"))]
    Io {
        /// Underlying I/O error.
        source: std::io::Error,
        /// Source location.
        #[snafu(implicit)]
        location: Location,
    },

    /// The channel died before or while a request waited for its reply,
    /// or no live channel existed when the request was sent. Safe to
    /// retry: reads never mutate, and a commit that maps here never left
    /// the client.
    #[snafu(display("channel closed"))]
    ChannelClosed,

    /// The channel died after the commit frame was written but before the
    /// response arrived. The commit may or may not have been applied;
    /// the runtime never silently retries this.
    #[snafu(display("commit outcome indeterminate: channel lost after commit was sent"))]
    CommitIndeterminate,

    /// Commit validation failed — the read-set was invalidated by a
    /// concurrent writer. Normal OCC outcome; retried by the runtime.
    #[snafu(display("write conflict"))]
    Conflict,

    /// The server rejected the commit for a non-conflict reason (e.g. a
    /// put and delete of the same key). Not retryable: retrying would
    /// send the same broken request.
    #[snafu(display("commit rejected by server: {message}"))]
    Rejected {
        /// The server's reason.
        message: String,
    },

    /// The peer violated the protocol (unexpected case, missing init).
    #[snafu(display("protocol error: {message}"))]
    Protocol {
        /// Description of the violation.
        message: String,
    },

    /// A stored counter value has an invalid width.
    #[snafu(display("invalid counter value: {source}"))]
    Counter {
        /// Underlying decode error.
        source: metakv_types::counter::CounterError,
    },

    /// A request did not complete in time.
    #[snafu(display("operation timed out after {duration_ms}ms"))]
    Timeout {
        /// Timeout duration in milliseconds.
        duration_ms: u64,
    },

    /// The client was explicitly closed.
    #[snafu(display("client closed"))]
    Closed,

    /// The transaction body aborted with a domain error.
    #[snafu(display("transaction aborted: {message}"))]
    Aborted {
        /// The caller's reason.
        message: String,
    },

    /// Configuration validation error.
    #[snafu(display("configuration error: {message}"))]
    Config {
        /// Error description.
        message: String,
    },
}

impl SdkError {
    /// Returns true if the transaction runtime may retry after this error.
    ///
    /// Retryable:
    /// - `Conflict`: the whole point of OCC — re-run and re-validate
    /// - `ChannelClosed`, `Connection`, `Io`, `Timeout`: transient
    ///   transport failures that happened strictly before a commit frame
    ///   was sent
    ///
    /// Non-retryable:
    /// - `CommitIndeterminate`: the commit may have been applied
    /// - `Rejected`, `Protocol`, `Counter`, `Config`: retrying resends
    ///   the same broken request
    /// - `Closed`, `Aborted`: terminal by definition
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Conflict
                | Self::ChannelClosed
                | Self::Connection { .. }
                | Self::Io { .. }
                | Self::Timeout { .. }
        )
    }

    /// Constructs a caller abort for use inside transaction bodies.
    #[must_use]
    pub fn aborted(message: impl Into<String>) -> Self {
        Self::Aborted { message: message.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_retryable() {
        assert!(SdkError::Conflict.is_retryable());
    }

    #[test]
    fn channel_closed_is_retryable() {
        assert!(SdkError::ChannelClosed.is_retryable());
    }

    #[test]
    fn timeout_is_retryable() {
        assert!(SdkError::Timeout { duration_ms: 100 }.is_retryable());
    }

    #[test]
    fn indeterminate_commit_is_not_retryable() {
        assert!(!SdkError::CommitIndeterminate.is_retryable());
    }

    #[test]
    fn rejection_and_abort_are_not_retryable() {
        assert!(!SdkError::Rejected { message: "overlap".into() }.is_retryable());
        assert!(!SdkError::aborted("no such inode").is_retryable());
        assert!(!SdkError::Closed.is_retryable());
        assert!(!SdkError::Protocol { message: "bad case".into() }.is_retryable());
    }

    #[test]
    fn conflict_display_matches_wire_error() {
        assert_eq!(SdkError::Conflict.to_string(), metakv_types::WRITE_CONFLICT);
    }
}
