//! Request multiplexer: routes HTTP requests to registered patterns.

use crate::context::METADATA_HEADER_PREFIX;
use crate::error::GatewayError;
use crate::forward::http_error;
use crate::marshal::{Marshaler, MarshalerRegistry};
use crate::pattern::{split_path, PathParams, Pattern};
use axum::body::Body;
use axum::Router;
use ferry_core::ServerMetadata;
use futures_util::future::BoxFuture;
use http::{header, HeaderValue, Method, Request, Response};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Options shared by every handler on a mux. Fixed once the mux is built.
#[derive(Debug, Clone)]
pub struct MuxOptions {
    pub marshalers: MarshalerRegistry,
    /// Inbound metadata header prefix, also used for outbound header metadata
    pub metadata_prefix: String,
    /// Deadline for calls that don't carry `rpc-timeout`
    pub default_timeout: Option<Duration>,
    /// Ignore query parameters that name no field (otherwise 400)
    pub ignore_unknown_query: bool,
}

impl Default for MuxOptions {
    fn default() -> Self {
        Self {
            marshalers: MarshalerRegistry::default(),
            metadata_prefix: METADATA_HEADER_PREFIX.to_string(),
            default_timeout: None,
            ignore_unknown_query: true,
        }
    }
}

/// Type alias for route handlers
pub type HandlerFn = Arc<
    dyn Fn(Arc<MuxOptions>, Request<Body>, PathParams) -> BoxFuture<'static, Response<Body>>
        + Send
        + Sync,
>;

struct Handler {
    pattern: Pattern,
    handler: HandlerFn,
}

/// REST-to-RPC request multiplexer.
///
/// Handlers for one HTTP method are tried in registration order; the
/// first matching pattern wins.
pub struct ServeMux {
    handlers: HashMap<Method, Vec<Handler>>,
    options: Arc<MuxOptions>,
}

impl ServeMux {
    /// Create a mux with default options
    pub fn new() -> Self {
        ServeMuxBuilder::new().build()
    }

    /// Create a builder for configuring the mux
    pub fn builder() -> ServeMuxBuilder {
        ServeMuxBuilder::new()
    }

    pub fn options(&self) -> &MuxOptions {
        &self.options
    }

    /// Register a handler for `method` requests matching `pattern`
    pub fn handle<F, Fut>(&mut self, method: Method, pattern: Pattern, handler: F)
    where
        F: Fn(Arc<MuxOptions>, Request<Body>, PathParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response<Body>> + Send + 'static,
    {
        debug!(%method, %pattern, "registering route");
        let handler: HandlerFn = Arc::new(move |opts, req, params| Box::pin(handler(opts, req, params)));
        self.handlers
            .entry(method)
            .or_default()
            .push(Handler { pattern, handler });
    }

    /// Find the handler for a request
    fn lookup(&self, method: &Method, path: &str) -> Result<(HandlerFn, PathParams), GatewayError> {
        let not_found = || GatewayError::RouteNotFound(path.to_string());
        let (components, verb) = split_path(path).ok_or_else(not_found)?;

        if let Some(handlers) = self.handlers.get(method) {
            for h in handlers {
                if let Some(params) = h.pattern.match_path(&components, verb) {
                    debug!(%method, path, pattern = %h.pattern, "route matched");
                    return Ok((Arc::clone(&h.handler), params));
                }
            }
        }

        let mut allowed: Vec<Method> = self
            .handlers
            .iter()
            .filter(|(m, _)| *m != method)
            .filter(|(_, hs)| hs.iter().any(|h| h.pattern.match_path(&components, verb).is_some()))
            .map(|(m, _)| m.clone())
            .collect();
        if allowed.is_empty() {
            return Err(not_found());
        }
        allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Err(GatewayError::MethodNotAllowed {
            method: method.clone(),
            path: path.to_string(),
            allowed,
        })
    }

    /// Serve one request
    pub async fn serve(&self, req: Request<Body>) -> Response<Body> {
        match self.lookup(req.method(), req.uri().path()) {
            Ok((handler, params)) => handler(Arc::clone(&self.options), req, params).await,
            Err(err) => self.routing_error(&req, err),
        }
    }

    fn routing_error(&self, req: &Request<Body>, err: GatewayError) -> Response<Body> {
        debug!("routing failed: {}", err);
        let (_, outbound) = self.options.marshalers.for_request(req.headers());
        let mut response = http_error(
            outbound.as_ref(),
            &err.to_status(),
            &ServerMetadata::new(),
            &self.options.metadata_prefix,
        );
        *response.status_mut() = err.status_code();
        if let GatewayError::MethodNotAllowed { allowed, .. } = &err {
            let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                response.headers_mut().insert(header::ALLOW, value);
            }
        }
        response
    }

    /// Wrap the mux in an axum Router that sends every request to it
    pub fn into_router(self) -> Router {
        let mux = Arc::new(self);
        Router::new().fallback(move |req: Request<Body>| {
            let mux = Arc::clone(&mux);
            async move { mux.serve(req).await }
        })
    }
}

impl Default for ServeMux {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating a ServeMux
pub struct ServeMuxBuilder {
    options: MuxOptions,
}

impl ServeMuxBuilder {
    /// Create a new mux builder
    pub fn new() -> Self {
        Self {
            options: MuxOptions::default(),
        }
    }

    /// Register a marshaler for a MIME type, or `*` to replace the fallback
    pub fn marshaler(mut self, mime: &str, marshaler: impl Marshaler) -> Self {
        self.options.marshalers.insert(mime, marshaler);
        self
    }

    /// Set the metadata header prefix (default `rpc-metadata-`)
    pub fn metadata_prefix(mut self, prefix: &str) -> Self {
        self.options.metadata_prefix = prefix.to_ascii_lowercase();
        self
    }

    /// Set the deadline for calls that don't carry one
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.options.default_timeout = Some(timeout);
        self
    }

    /// Reject query parameters that name no field instead of ignoring them
    pub fn reject_unknown_query_parameters(mut self) -> Self {
        self.options.ignore_unknown_query = false;
        self
    }

    /// Build the mux
    pub fn build(self) -> ServeMux {
        ServeMux {
            handlers: HashMap::new(),
            options: Arc::new(self.options),
        }
    }
}

impl Default for ServeMuxBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn reply(
        tag: &'static str,
    ) -> impl Fn(Arc<MuxOptions>, Request<Body>, PathParams) -> BoxFuture<'static, Response<Body>>
           + Send
           + Sync
           + 'static {
        move |_opts, _req, params| {
            Box::pin(async move {
                let id = params.get("id").unwrap_or("-").to_string();
                Response::new(Body::from(format!("{}:{}", tag, id)))
            })
        }
    }

    fn mux() -> ServeMux {
        let mut mux = ServeMux::new();
        mux.handle(Method::GET, Pattern::parse("/v1/items/{id}").unwrap(), reply("first"));
        mux.handle(Method::GET, Pattern::parse("/v1/items/{name}").unwrap(), reply("second"));
        mux.handle(Method::POST, Pattern::parse("/v1/items").unwrap(), reply("create"));
        mux.handle(Method::POST, Pattern::parse("/v1/items/{id}:touch").unwrap(), reply("touch"));
        mux
    }

    async fn call(router: Router, method: Method, uri: &str) -> (StatusCode, Option<HeaderValue>, String) {
        let response = router
            .oneshot(Request::builder().method(method).uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let allow = response.headers().get(header::ALLOW).cloned();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, allow, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_first_registered_wins() {
        let (status, _, body) = call(mux().into_router(), Method::GET, "/v1/items/abc").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "first:abc");
    }

    #[tokio::test]
    async fn test_verb_routes() {
        let (_, _, body) = call(mux().into_router(), Method::POST, "/v1/items/abc:touch").await;
        assert_eq!(body, "touch:abc");
    }

    #[tokio::test]
    async fn test_method_not_allowed() {
        let (status, allow, body) = call(mux().into_router(), Method::DELETE, "/v1/items").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(allow.unwrap(), "POST");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["code"], 12);
    }

    #[tokio::test]
    async fn test_not_found() {
        for path in ["/v2/items", "/v1/items/a/b", "/v1/:verb"] {
            let (status, _, body) = call(mux().into_router(), Method::GET, path).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{path}");
            let json: serde_json::Value = serde_json::from_str(&body).unwrap();
            assert_eq!(json["code"], 5);
        }
    }
}
