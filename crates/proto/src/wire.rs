//! Protocol message definitions.
//!
//! One tagged-union [`Envelope`] carries exactly one case per frame.
//! Request cases carry a 64-bit `id` echoed by the matching response case;
//! the two notification cases carry no `id` and get no response. Unknown
//! fields are ignored on decode (prost default); a frame whose `msg` oneof
//! is empty or unrecognized is a fatal protocol error for the session.
//!
//! Field numbers are frozen — changing any tag breaks wire compatibility.

#![allow(clippy::all)]
#![allow(missing_docs)]

/// Point read request.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub key: Vec<u8>,
}

/// Point read response. Absent keys report `found = false` and `ver = 0`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetResponse {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub value: Option<Vec<u8>>,
    #[prost(uint64, tag = "3")]
    pub ver: u64,
    #[prost(bool, tag = "4")]
    pub found: bool,
}

/// Range listing request over `[start, end)`.
///
/// An empty `end` means unbounded above. `limit == 0` means unbounded;
/// `keys_only` suppresses values on the wire.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListRequest {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(bytes = "vec", tag = "2")]
    pub start: Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub end: Vec<u8>,
    #[prost(bool, tag = "4")]
    pub keys_only: bool,
    #[prost(uint64, tag = "5")]
    pub limit: u64,
}

/// One listed entry. `value` is unset (not empty) in keys-only listings.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Entry {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub value: Option<Vec<u8>>,
    #[prost(uint64, tag = "3")]
    pub ver: u64,
}

/// Range listing response; entries are in ascending key order.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListResponse {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(message, repeated, tag = "2")]
    pub entries: Vec<Entry>,
}

/// A `(key, version)` pair observed inside a [`ReadRange`].
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadEntry {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub ver: u64,
}

/// One range observation carried in a commit's read-set.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadRange {
    #[prost(bytes = "vec", tag = "1")]
    pub start: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub end: Vec<u8>,
    #[prost(message, repeated, tag = "3")]
    pub entries: Vec<ReadEntry>,
    #[prost(bool, tag = "4")]
    pub keys_only: bool,
    #[prost(uint64, tag = "5")]
    pub limit: u64,
}

/// Legacy point-only observation, kept for backward compatibility.
///
/// Cannot express phantom protection or limit-aware validation; new
/// clients emit [`ReadRange`] instead. The server still honors it by
/// folding each entry into a point range.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Observed {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(uint64, tag = "2")]
    pub ver: u64,
}

/// A buffered write shipped in a commit.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Put {
    #[prost(bytes = "vec", tag = "1")]
    pub key: Vec<u8>,
    #[prost(bytes = "vec", tag = "2")]
    pub value: Vec<u8>,
}

/// Atomic commit request: read-set validation plus puts and deletes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommitRequest {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    /// Legacy flat read-set; superseded by `reads`.
    #[prost(message, repeated, tag = "2")]
    pub observed: Vec<Observed>,
    #[prost(message, repeated, tag = "3")]
    pub puts: Vec<Put>,
    #[prost(bytes = "vec", repeated, tag = "4")]
    pub dels: Vec<Vec<u8>>,
    #[prost(message, repeated, tag = "5")]
    pub reads: Vec<ReadRange>,
}

/// Commit response; `ok = false` carries the failure reason in `error`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CommitResponse {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(bool, tag = "2")]
    pub ok: bool,
    #[prost(string, tag = "3")]
    pub error: String,
}

/// Wipes every entry in the store.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResetRequest {
    #[prost(uint64, tag = "1")]
    pub id: u64,
}

/// Reset response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ResetResponse {
    #[prost(uint64, tag = "1")]
    pub id: u64,
    #[prost(bool, tag = "2")]
    pub ok: bool,
    #[prost(string, tag = "3")]
    pub error: String,
}

/// One-shot server → client bootstrap carrying the storage identity the
/// mount uses to configure its data-plane subsystems. Carries no `id` and
/// gets no response.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitNotification {
    #[prost(string, tag = "1")]
    pub storage: String,
    #[prost(string, tag = "2")]
    pub bucket: String,
    #[prost(string, tag = "3")]
    pub access_key: String,
    #[prost(string, tag = "4")]
    pub secret_key: String,
    #[prost(string, tag = "5")]
    pub volume_name: String,
}

/// One-shot client → server signal that the mount is live. Carries no
/// `id`; the server MUST NOT respond to it.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ReadyNotification {}

/// The envelope: every frame is exactly one serialized `Envelope`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Envelope {
    #[prost(oneof = "envelope::Msg", tags = "1, 2, 3, 4, 5, 6, 7, 8, 9, 10")]
    pub msg: Option<envelope::Msg>,
}

/// Nested message types for [`Envelope`].
pub mod envelope {
    /// The envelope cases.
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Msg {
        #[prost(message, tag = "1")]
        GetReq(super::GetRequest),
        #[prost(message, tag = "2")]
        GetResp(super::GetResponse),
        #[prost(message, tag = "3")]
        ListReq(super::ListRequest),
        #[prost(message, tag = "4")]
        ListResp(super::ListResponse),
        #[prost(message, tag = "5")]
        CommitReq(super::CommitRequest),
        #[prost(message, tag = "6")]
        CommitResp(super::CommitResponse),
        #[prost(message, tag = "7")]
        ResetReq(super::ResetRequest),
        #[prost(message, tag = "8")]
        ResetResp(super::ResetResponse),
        #[prost(message, tag = "9")]
        InitNotify(super::InitNotification),
        #[prost(message, tag = "10")]
        ReadyNotify(super::ReadyNotification),
    }

    impl Msg {
        /// Returns the request `id` for request cases, `None` otherwise.
        pub fn request_id(&self) -> Option<u64> {
            match self {
                Msg::GetReq(m) => Some(m.id),
                Msg::ListReq(m) => Some(m.id),
                Msg::CommitReq(m) => Some(m.id),
                Msg::ResetReq(m) => Some(m.id),
                _ => None,
            }
        }

        /// Returns the echoed `id` for response cases, `None` otherwise.
        pub fn response_id(&self) -> Option<u64> {
            match self {
                Msg::GetResp(m) => Some(m.id),
                Msg::ListResp(m) => Some(m.id),
                Msg::CommitResp(m) => Some(m.id),
                Msg::ResetResp(m) => Some(m.id),
                _ => None,
            }
        }

        /// Short case name for logging.
        pub fn case_name(&self) -> &'static str {
            match self {
                Msg::GetReq(_) => "get_req",
                Msg::GetResp(_) => "get_resp",
                Msg::ListReq(_) => "list_req",
                Msg::ListResp(_) => "list_resp",
                Msg::CommitReq(_) => "commit_req",
                Msg::CommitResp(_) => "commit_resp",
                Msg::ResetReq(_) => "reset_req",
                Msg::ResetResp(_) => "reset_resp",
                Msg::InitNotify(_) => "init_notify",
                Msg::ReadyNotify(_) => "ready_notify",
            }
        }
    }
}

impl From<envelope::Msg> for Envelope {
    fn from(msg: envelope::Msg) -> Self {
        Envelope { msg: Some(msg) }
    }
}
