//! Server implementation for Ferry RPC
//!
//! This crate provides:
//! - HTTP/1.1 and HTTP/2 server using hyper
//! - Routing of `POST /{service}/{method}` calls to async handlers
//! - Call metadata and `rpc-timeout` deadlines on every handler context
//! - Response headers up front and trailers after the message

pub mod router;
pub mod server;

pub use router::{parse_rpc_path, HandlerFn, RpcBody, RpcRouter};
pub use server::{FerryServer, ServerBuilder};
