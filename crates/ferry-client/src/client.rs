//! Ferry client implementation

use bytes::Bytes;
use ferry_core::{
    encode_timeout, is_reserved_header, CallContext, Code, ErrorBody, MetadataMap, Reply,
    ServerMetadata, Status, PROTO_CONTENT_TYPE, TIMEOUT_HEADER,
};
use http::{header, HeaderMap, Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Client construction errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("base_url is required")]
    MissingBaseUrl,

    #[error("invalid base_url {0:?}: expected http://host[:port]")]
    InvalidBaseUrl(String),
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Connection pool idle timeout
    pub pool_idle_timeout: Option<Duration>,
    /// Max idle connections per host
    pub pool_max_idle_per_host: usize,
    /// HTTP/2 keep alive interval
    pub http2_keep_alive_interval: Option<Duration>,
    /// HTTP/2 keep alive timeout
    pub http2_keep_alive_timeout: Option<Duration>,
    /// Timeout applied when the call context carries no deadline
    pub default_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            pool_idle_timeout: Some(Duration::from_secs(90)),
            pool_max_idle_per_host: 32,
            http2_keep_alive_interval: Some(Duration::from_secs(10)),
            http2_keep_alive_timeout: Some(Duration::from_secs(20)),
            default_timeout: None,
        }
    }
}

/// Ferry RPC client.
///
/// Calls are multiplexed over pooled HTTP/2 connections; clones share the pool.
#[derive(Clone)]
pub struct FerryClient {
    base_url: String,
    client: Client<HttpConnector, Full<Bytes>>,
    config: ClientConfig,
}

impl FerryClient {
    /// Create a new client with the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::builder().base_url(base_url).build()
    }

    /// Create a builder for configuring the client
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build an HTTP/2 (prior knowledge) client from configuration
    fn build_client(config: &ClientConfig) -> Client<HttpConnector, Full<Bytes>> {
        let mut builder = Client::builder(TokioExecutor::new());

        builder.timer(TokioTimer::new());
        builder.pool_timer(TokioTimer::new());
        builder.http2_only(true);
        builder.pool_idle_timeout(config.pool_idle_timeout.unwrap_or(Duration::from_secs(90)));
        builder.pool_max_idle_per_host(config.pool_max_idle_per_host);

        if let Some(interval) = config.http2_keep_alive_interval {
            builder.http2_keep_alive_interval(interval);
        }
        if let Some(timeout) = config.http2_keep_alive_timeout {
            builder.http2_keep_alive_timeout(timeout);
        }

        builder.build_http()
    }

    /// Make a unary RPC call
    ///
    /// # Arguments
    /// * `ctx` - Call context; its metadata is sent as request headers and its
    ///   deadline both bounds the call and travels as `rpc-timeout`
    /// * `service` - The service name (e.g., "controller.api.services.v1.AuthMethodService")
    /// * `method` - The method name (e.g., "GetAuthMethod")
    /// * `request` - The protobuf-encoded request bytes
    ///
    /// # Returns
    /// The protobuf-encoded response bytes or the failure, plus the response
    /// headers and trailers in either case.
    ///
    /// Dropping the returned future aborts the in-flight request.
    #[instrument(
        skip(self, ctx, request),
        fields(
            rpc.service = service,
            rpc.method = method,
            rpc.system = "ferry",
            otel.kind = "client"
        )
    )]
    pub async fn call(
        &self,
        ctx: &CallContext,
        service: &str,
        method: &str,
        request: Bytes,
    ) -> Reply<Bytes> {
        let timeout = ctx.remaining().or(self.config.default_timeout);
        if timeout == Some(Duration::ZERO) {
            return Reply::failed(Status::deadline_exceeded("deadline exceeded before call"));
        }

        let exchange = self.exchange(ctx, service, method, request, timeout);
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, exchange)
                .await
                .unwrap_or_else(|_| {
                    Reply::failed(Status::deadline_exceeded(format!(
                        "deadline exceeded after {:?}",
                        timeout
                    )))
                }),
            None => exchange.await,
        }
    }

    async fn exchange(
        &self,
        ctx: &CallContext,
        service: &str,
        method: &str,
        request: Bytes,
        timeout: Option<Duration>,
    ) -> Reply<Bytes> {
        // Build the full URL
        let url = format!("{}/{}/{}", self.base_url, service, method);

        let mut req_builder = Request::builder()
            .method(Method::POST)
            .uri(&url)
            .header(header::CONTENT_TYPE, PROTO_CONTENT_TYPE)
            .header(header::ACCEPT, PROTO_CONTENT_TYPE)
            .header(header::TE, "trailers");

        if let Some(timeout) = timeout {
            req_builder = req_builder.header(TIMEOUT_HEADER, encode_timeout(timeout));
        }
        for (key, value) in ctx.metadata().iter() {
            if !is_reserved_header(key) {
                req_builder = req_builder.header(key, value);
            }
        }

        let req = match req_builder.body(Full::new(request)) {
            Ok(req) => req,
            Err(e) => {
                return Reply::failed(Status::internal(format!("failed to build request: {}", e)))
            }
        };

        // Send the request
        let resp = match self.client.request(req).await {
            Ok(resp) => resp,
            Err(e) => {
                return Reply::failed(Status::unavailable(format!(
                    "failed to send request: {}",
                    e
                )))
            }
        };

        let status = resp.status();
        let mut metadata = ServerMetadata {
            header: metadata_from_headers(resp.headers()),
            trailer: MetadataMap::new(),
        };

        let collected = match resp.into_body().collect().await {
            Ok(collected) => collected,
            Err(e) => {
                return Reply::new(
                    metadata,
                    Err(Status::unavailable(format!("failed to read response: {}", e))),
                )
            }
        };
        if let Some(trailers) = collected.trailers() {
            metadata.trailer = metadata_from_headers(trailers);
        }
        let body_bytes = collected.to_bytes();

        if status.is_success() {
            debug!(bytes = body_bytes.len(), "rpc call succeeded");
            return Reply::new(metadata, Ok(body_bytes));
        }

        Reply::new(metadata, Err(status_from_error_response(status, &body_bytes)))
    }
}

/// Copy non-transport headers into call metadata
fn metadata_from_headers(headers: &HeaderMap) -> MetadataMap {
    headers
        .iter()
        .filter(|(name, _)| !is_reserved_header(name.as_str()))
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v.to_string())))
        .collect()
}

/// Decode a failed response. Servers send an error body; anything else is
/// classified from the HTTP status alone.
fn status_from_error_response(status: StatusCode, body: &[u8]) -> Status {
    if let Ok(error_body) = serde_json::from_slice::<ErrorBody>(body) {
        return Status::from(error_body);
    }

    let code = match status {
        StatusCode::BAD_REQUEST => Code::Internal,
        StatusCode::UNAUTHORIZED => Code::Unauthenticated,
        StatusCode::FORBIDDEN => Code::PermissionDenied,
        StatusCode::NOT_FOUND => Code::Unimplemented,
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => Code::Unavailable,
        _ => Code::Unknown,
    };
    Status::new(
        code,
        format!(
            "rpc failed with status {}: {}",
            status,
            String::from_utf8_lossy(body)
        ),
    )
}

impl fmt::Debug for FerryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FerryClient")
            .field("base_url", &self.base_url)
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for configuring a Ferry client
pub struct ClientBuilder {
    base_url: Option<String>,
    config: ClientConfig,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self {
            base_url: None,
            config: ClientConfig::default(),
        }
    }

    /// Set the base URL for the client
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set connection pool idle timeout
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = Some(timeout);
        self
    }

    /// Set max idle connections per host
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set HTTP/2 keep alive interval
    pub fn http2_keep_alive_interval(mut self, interval: Duration) -> Self {
        self.config.http2_keep_alive_interval = Some(interval);
        self
    }

    /// Set HTTP/2 keep alive timeout
    pub fn http2_keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.config.http2_keep_alive_timeout = Some(timeout);
        self
    }

    /// Bound calls whose context has no deadline
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    /// Build the client
    pub fn build(self) -> Result<FerryClient, ClientError> {
        let base_url = self.base_url.ok_or(ClientError::MissingBaseUrl)?;
        let base_url = base_url.trim_end_matches('/').to_string();
        if !base_url.starts_with("http://") || base_url.len() <= "http://".len() {
            return Err(ClientError::InvalidBaseUrl(base_url));
        }

        let client = FerryClient::build_client(&self.config);

        Ok(FerryClient {
            base_url,
            client,
            config: self.config,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[tokio::test]
    async fn test_client_builder() {
        let client = FerryClient::builder()
            .base_url("http://localhost:8080/")
            .default_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(client.base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_builder_rejects_bad_urls() {
        assert!(matches!(
            FerryClient::builder().build(),
            Err(ClientError::MissingBaseUrl)
        ));
        assert!(matches!(
            FerryClient::new("localhost:8080"),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_deadline_fails_without_sending() {
        // Nothing listens on port 9; the deadline check must short-circuit first.
        let client = FerryClient::new("http://127.0.0.1:9").unwrap();
        let ctx = CallContext::new("/svc/Method").with_timeout(Duration::ZERO);

        let reply = client.call(&ctx, "svc", "Method", Bytes::new()).await;
        assert_eq!(reply.result.unwrap_err().code(), Code::DeadlineExceeded);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let client = FerryClient::new("http://127.0.0.1:9").unwrap();
        let ctx = CallContext::new("/svc/Method");

        let reply = client.call(&ctx, "svc", "Method", Bytes::new()).await;
        assert_eq!(reply.result.unwrap_err().code(), Code::Unavailable);
    }

    #[test]
    fn test_metadata_from_headers_skips_transport_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/proto"));
        headers.insert("x-request-id", HeaderValue::from_static("r-1"));

        let md = metadata_from_headers(&headers);
        assert_eq!(md.len(), 1);
        assert_eq!(md.get("x-request-id"), Some("r-1"));
    }

    #[test]
    fn test_error_response_decoding() {
        let status = status_from_error_response(
            StatusCode::NOT_FOUND,
            br#"{"code":5,"message":"missing","details":[]}"#,
        );
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "missing");

        let status = status_from_error_response(StatusCode::SERVICE_UNAVAILABLE, b"overloaded");
        assert_eq!(status.code(), Code::Unavailable);
    }
}
