//! Per-call context and the dispatcher's reply type.

use crate::metadata::{MetadataMap, ServerMetadata};
use crate::status::Status;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Context for one RPC invocation.
///
/// Carries the full method name, inbound call metadata, an optional
/// deadline, and a transport stream that local handlers use to attach
/// response headers and trailers. Clones share the transport stream.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    method: String,
    metadata: MetadataMap,
    deadline: Option<Instant>,
    stream: Arc<Mutex<ServerMetadata>>,
}

impl CallContext {
    /// Create a context for the given full method name
    /// (e.g. `/controller.api.services.v1.AuthMethodService/GetAuthMethod`)
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: MetadataMap) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the deadline relative to now, keeping an earlier existing deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        });
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline. `Some(ZERO)` once it has passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Attach a response header from inside a handler
    pub fn set_header(&self, key: impl AsRef<str>, value: impl Into<String>) {
        self.stream().header.append(key, value);
    }

    /// Attach a response trailer from inside a handler
    pub fn set_trailer(&self, key: impl AsRef<str>, value: impl Into<String>) {
        self.stream().trailer.append(key, value);
    }

    /// Take whatever headers and trailers handlers attached so far
    pub fn take_transport_metadata(&self) -> ServerMetadata {
        std::mem::take(&mut *self.stream())
    }

    fn stream(&self) -> MutexGuard<'_, ServerMetadata> {
        // A poisoned lock only means a handler panicked mid-append.
        self.stream.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Outcome of one dispatched call.
///
/// Exactly one of response or failure is present; metadata is always
/// valid, and empty for local dispatch.
#[derive(Debug)]
pub struct Reply<T> {
    pub metadata: ServerMetadata,
    pub result: Result<T, Status>,
}

impl<T> Reply<T> {
    pub fn new(metadata: ServerMetadata, result: Result<T, Status>) -> Self {
        Self { metadata, result }
    }

    /// Reply for an in-process call, which has no transport metadata of its own
    pub fn local(result: Result<T, Status>) -> Self {
        Self::new(ServerMetadata::default(), result)
    }

    /// Reply for a call that failed before reaching the backend
    pub fn failed(status: Status) -> Self {
        Self::local(Err(status))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        Reply {
            metadata: self.metadata,
            result: self.result.map(f),
        }
    }

    /// Replace a successful result with a fallible transformation of it
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Result<U, Status>) -> Reply<U> {
        Reply {
            metadata: self.metadata,
            result: self.result.and_then(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::Code;

    #[test]
    fn test_transport_metadata_shared_between_clones() {
        let ctx = CallContext::new("/svc/Method");
        let handler_view = ctx.clone();
        handler_view.set_header("x-a", "1");
        handler_view.set_trailer("x-b", "2");

        let md = ctx.take_transport_metadata();
        assert_eq!(md.header.get("x-a"), Some("1"));
        assert_eq!(md.trailer.get("x-b"), Some("2"));
        assert!(ctx.take_transport_metadata().is_empty());
    }

    #[test]
    fn test_with_timeout_keeps_earlier_deadline() {
        let ctx = CallContext::new("/svc/Method").with_timeout(Duration::from_millis(10));
        let first = ctx.deadline().unwrap();
        let ctx = ctx.with_timeout(Duration::from_secs(60));
        assert_eq!(ctx.deadline(), Some(first));
        assert!(ctx.remaining().unwrap() <= Duration::from_millis(10));
    }

    #[test]
    fn test_local_reply_has_empty_metadata() {
        let reply: Reply<u32> = Reply::local(Ok(7));
        assert!(reply.metadata.is_empty());
        assert_eq!(reply.map(|v| v * 2).result.unwrap(), 14);

        let failed: Reply<u32> = Reply::failed(Status::not_found("gone"));
        assert_eq!(failed.result.unwrap_err().code(), Code::NotFound);
    }
}
