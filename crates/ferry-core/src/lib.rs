//! Core types shared by the Ferry RPC stack and the REST gateway.
//!
//! This crate provides:
//! - RPC failure codes and the structured `Status`
//! - The fixed failure code to HTTP status table
//! - Call metadata and response headers/trailers
//! - Per-call context with deadlines
//! - The `rpc-timeout` header codec

pub mod context;
pub mod metadata;
pub mod status;
pub mod timeout;

pub use context::{CallContext, Reply};
pub use metadata::{MetadataMap, ServerMetadata};
pub use status::{Code, ErrorBody, Status};
pub use timeout::{encode_timeout, parse_timeout, TimeoutError, TIMEOUT_HEADER};

/// Content type of RPC request and response messages
pub const PROTO_CONTENT_TYPE: &str = "application/proto";

/// Content type of RPC error bodies
pub const STATUS_CONTENT_TYPE: &str = "application/json";

/// Transport headers that are never treated as call metadata
pub const RESERVED_HEADERS: &[&str] = &[
    "accept",
    "accept-encoding",
    "connection",
    "content-encoding",
    "content-length",
    "content-type",
    "date",
    "host",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "user-agent",
    TIMEOUT_HEADER,
];

/// Whether a header name is transport-only
pub fn is_reserved_header(name: &str) -> bool {
    RESERVED_HEADERS
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(name))
}
