//! Ferry server implementation

use crate::router::RpcRouter;
use bytes::Bytes;
use ferry_core::{CallContext, Status};
use http::Request;
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Ferry RPC server
pub struct FerryServer {
    router: Arc<RpcRouter>,
}

impl FerryServer {
    /// Create a new server with a router
    pub fn new(router: RpcRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }

    /// Create a builder for configuring the server
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Bind the address and serve until an accept error occurs
    pub async fn serve(self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_listener(listener).await
    }

    /// Serve connections from an already-bound listener
    pub async fn serve_with_listener(self, listener: TcpListener) -> std::io::Result<()> {
        info!("Ferry server listening on {}", listener.local_addr()?);

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let router = Arc::clone(&self.router);
            debug!(%remote_addr, "accepted connection");

            tokio::spawn(async move {
                let io = TokioIo::new(stream);

                let service = hyper::service::service_fn(move |req: Request<Incoming>| {
                    let router = Arc::clone(&router);
                    async move { Ok::<_, hyper::Error>(router.route(req).await) }
                });

                if let Err(err) = auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await
                {
                    error!("Error serving connection from {}: {}", remote_addr, err);
                }
            });
        }
    }
}

/// Builder for creating a Ferry server
pub struct ServerBuilder {
    router: RpcRouter,
}

impl ServerBuilder {
    /// Create a new server builder
    pub fn new() -> Self {
        Self {
            router: RpcRouter::new(),
        }
    }

    /// Register a unary handler for an RPC method
    /// Path format: "{package}.{Service}/{Method}"
    pub fn register<F, Fut>(mut self, path: impl Into<String>, handler: F) -> Self
    where
        F: Fn(CallContext, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes, Status>> + Send + 'static,
    {
        self.router.register(path, handler);
        self
    }

    /// Build the server
    pub fn build(self) -> FerryServer {
        FerryServer::new(self.router)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_client::FerryClient;
    use ferry_core::{Code, Reply};
    use std::time::Duration;

    const SERVICE: &str = "test.v1.Echo";

    async fn spawn(builder: ServerBuilder) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(builder.build().serve_with_listener(listener));
        addr
    }

    fn echo_server() -> ServerBuilder {
        FerryServer::builder()
            .register(format!("{}/Echo", SERVICE), |ctx: CallContext, req: Bytes| async move {
                if let Some(user) = ctx.metadata().get("x-user") {
                    ctx.set_header("x-echo-user", user.to_string());
                }
                ctx.set_trailer("x-served-by", "echo");
                Ok::<_, Status>(req)
            })
            .register(format!("{}/Fail", SERVICE), |_ctx: CallContext, _req: Bytes| async move {
                Err::<Bytes, _>(Status::not_found("nothing here"))
            })
            .register(format!("{}/Slow", SERVICE), |_ctx: CallContext, req: Bytes| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, Status>(req)
            })
    }

    #[tokio::test]
    async fn test_echo_round_trip_with_metadata() {
        let addr = spawn(echo_server()).await;
        let client = FerryClient::new(format!("http://{}", addr)).unwrap();

        let mut md = ferry_core::MetadataMap::new();
        md.append("x-user", "alice");
        let ctx = CallContext::new(format!("/{}/Echo", SERVICE)).with_metadata(md);

        let Reply { metadata, result } = client
            .call(&ctx, SERVICE, "Echo", Bytes::from_static(b"ping"))
            .await;
        assert_eq!(result.unwrap(), Bytes::from_static(b"ping"));
        assert_eq!(metadata.header.get("x-echo-user"), Some("alice"));
        assert_eq!(metadata.trailer.get("x-served-by"), Some("echo"));
    }

    #[tokio::test]
    async fn test_handler_status_reaches_client() {
        let addr = spawn(echo_server()).await;
        let client = FerryClient::new(format!("http://{}", addr)).unwrap();
        let ctx = CallContext::new(format!("/{}/Fail", SERVICE));

        let reply = client.call(&ctx, SERVICE, "Fail", Bytes::new()).await;
        let status = reply.result.unwrap_err();
        assert_eq!(status.code(), Code::NotFound);
        assert_eq!(status.message(), "nothing here");
    }

    #[tokio::test]
    async fn test_unknown_method_is_unimplemented() {
        let addr = spawn(echo_server()).await;
        let client = FerryClient::new(format!("http://{}", addr)).unwrap();
        let ctx = CallContext::new(format!("/{}/Missing", SERVICE));

        let reply = client.call(&ctx, SERVICE, "Missing", Bytes::new()).await;
        assert_eq!(reply.result.unwrap_err().code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_deadline_bounds_slow_handler() {
        let addr = spawn(echo_server()).await;
        let client = FerryClient::new(format!("http://{}", addr)).unwrap();
        let ctx = CallContext::new(format!("/{}/Slow", SERVICE))
            .with_timeout(Duration::from_millis(100));

        let reply = client.call(&ctx, SERVICE, "Slow", Bytes::new()).await;
        assert_eq!(reply.result.unwrap_err().code(), Code::DeadlineExceeded);
    }
}
