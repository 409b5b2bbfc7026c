//! HTTP router for RPC methods
//!
//! Routes match the pattern: /{package}.{Service}/{Method}

use bytes::Bytes;
use ferry_core::{
    is_reserved_header, parse_timeout, CallContext, MetadataMap, ServerMetadata, Status,
    PROTO_CONTENT_TYPE, STATUS_CONTENT_TYPE, TIMEOUT_HEADER,
};
use futures_util::future::BoxFuture;
use http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::{combinators::BoxBody, BodyExt, StreamBody};
use hyper::body::{Frame, Incoming};
use std::collections::HashMap;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Response body type produced by the router
pub type RpcBody = BoxBody<Bytes, Infallible>;

/// Type alias for async handler functions
pub type HandlerFn =
    Arc<dyn Fn(CallContext, Bytes) -> BoxFuture<'static, Result<Bytes, Status>> + Send + Sync>;

/// RPC Router
pub struct RpcRouter {
    routes: HashMap<String, HandlerFn>,
}

impl RpcRouter {
    /// Create a new router
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
        }
    }

    /// Register a handler for a specific service method
    /// Path format: "{package}.{Service}/{Method}"
    pub fn register<F, Fut>(&mut self, path: impl Into<String>, handler: F)
    where
        F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes, Status>> + Send + 'static,
    {
        let handler: HandlerFn = Arc::new(move |ctx, req| Box::pin(handler(ctx, req)));
        self.routes.insert(path.into(), handler);
    }

    /// Whether a handler is registered for the path
    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    /// Route an incoming request
    pub async fn route(&self, req: Request<Incoming>) -> Response<RpcBody> {
        let (parts, body) = req.into_parts();

        if parts.method != Method::POST {
            return Self::status_response(
                StatusCode::METHOD_NOT_ALLOWED,
                &Status::unimplemented("only POST is supported for RPC calls"),
                ServerMetadata::default(),
            );
        }

        let path = parts.uri.path();
        let path = path.strip_prefix('/').unwrap_or(path);

        // Find handler
        let handler = match self.routes.get(path) {
            Some(h) => Arc::clone(h),
            None => {
                let status =
                    Status::unimplemented(format!("no handler registered for path: /{}", path));
                return Self::status_response(
                    status.http_status(),
                    &status,
                    ServerMetadata::default(),
                );
            }
        };

        let ctx = match Self::call_context(path, &parts.headers) {
            Ok(ctx) => ctx,
            Err(status) => {
                return Self::status_response(
                    status.http_status(),
                    &status,
                    ServerMetadata::default(),
                )
            }
        };

        // Read request body
        let request = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                let status = Status::invalid_argument(format!("failed to read request body: {}", e));
                return Self::status_response(
                    status.http_status(),
                    &status,
                    ServerMetadata::default(),
                );
            }
        };

        debug!(method = %ctx.method(), bytes = request.len(), "dispatching rpc");

        // Call handler, bounded by the caller's deadline
        let call = handler(ctx.clone(), request);
        let result = match ctx.remaining() {
            Some(remaining) => tokio::time::timeout(remaining, call)
                .await
                .unwrap_or_else(|_| Err(Status::deadline_exceeded("handler deadline exceeded"))),
            None => call.await,
        };

        let metadata = ctx.take_transport_metadata();
        match result {
            Ok(response_bytes) => Self::message_response(response_bytes, metadata),
            Err(status) => {
                warn!(method = %ctx.method(), code = %status.code(), "rpc failed: {}", status.message());
                Self::status_response(status.http_status(), &status, metadata)
            }
        }
    }

    /// Build the call context from request headers
    fn call_context(path: &str, headers: &HeaderMap) -> Result<CallContext, Status> {
        let metadata: MetadataMap = headers
            .iter()
            .filter(|(name, _)| !is_reserved_header(name.as_str()))
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v.to_string())))
            .collect();

        let mut ctx = CallContext::new(format!("/{}", path)).with_metadata(metadata);

        if let Some(value) = headers.get(TIMEOUT_HEADER) {
            let value = value
                .to_str()
                .map_err(|_| Status::invalid_argument("malformed rpc-timeout header"))?;
            let timeout = parse_timeout(value)
                .map_err(|e| Status::invalid_argument(format!("malformed rpc-timeout header: {}", e)))?;
            ctx = ctx.with_timeout(timeout);
        }

        Ok(ctx)
    }

    /// Successful response: headers, message body, then trailers
    fn message_response(body: Bytes, metadata: ServerMetadata) -> Response<RpcBody> {
        Self::framed_response(StatusCode::OK, PROTO_CONTENT_TYPE, body, metadata)
    }

    /// Failure response carrying the JSON error body
    fn status_response(
        http_status: StatusCode,
        status: &Status,
        metadata: ServerMetadata,
    ) -> Response<RpcBody> {
        let json = status
            .to_body()
            .to_json()
            .unwrap_or_else(|_| r#"{"code":13,"message":"failed to encode status"}"#.to_string());
        Self::framed_response(http_status, STATUS_CONTENT_TYPE, Bytes::from(json), metadata)
    }

    fn framed_response(
        http_status: StatusCode,
        content_type: &'static str,
        body: Bytes,
        metadata: ServerMetadata,
    ) -> Response<RpcBody> {
        let mut frames: Vec<Result<Frame<Bytes>, Infallible>> = vec![Ok(Frame::data(body))];
        let trailers = header_map(&metadata.trailer);
        if !trailers.is_empty() {
            frames.push(Ok(Frame::trailers(trailers)));
        }

        let mut response = Response::new(StreamBody::new(futures_util::stream::iter(frames)).boxed());
        *response.status_mut() = http_status;
        let headers = response.headers_mut();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        for (name, value) in header_map(&metadata.header) {
            if let Some(name) = name {
                headers.append(name, value);
            }
        }
        response
    }
}

impl Default for RpcRouter {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert metadata to a header map, dropping entries that are not valid HTTP
fn header_map(metadata: &MetadataMap) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in metadata.iter() {
        match (HeaderName::try_from(key), HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => warn!(key, "dropping metadata entry that is not a valid header"),
        }
    }
    map
}

/// Parse a Ferry RPC path into (service, method)
/// Expected format: "{package}.{Service}/{Method}"
pub fn parse_rpc_path(path: &str) -> Option<(String, String)> {
    // Strip leading slash
    let path = path.strip_prefix('/').unwrap_or(path);

    let (service, method) = path.split_once('/')?;
    if service.is_empty() || method.is_empty() || method.contains('/') {
        return None;
    }

    Some((service.to_string(), method.to_string()))
}
