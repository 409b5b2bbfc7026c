//! REST-to-RPC gateway for Ferry services.
//!
//! This crate maps RESTful HTTP requests onto unary RPC calls:
//! - Compiled path patterns with first-registered-wins routing
//! - Parameter binding from path, body, and query string, in that order
//! - Update-mask inference for partial updates
//! - Dispatch to an in-process service or a remote stub
//! - Response forwarding and RPC code to HTTP status mapping

pub mod auth_method;
pub mod context;
pub mod convert;
pub mod double_array;
pub mod error;
pub mod field_mask;
pub mod forward;
pub mod handler;
pub mod marshal;
pub mod mux;
pub mod pattern;
pub mod query;

pub use auth_method::{
    register_auth_method_service_handler, register_auth_method_service_handler_client,
    register_auth_method_service_handler_from_endpoint,
    register_auth_method_service_handler_server, AuthMethodBackend,
};
pub use context::{annotate_context, METADATA_HEADER_PREFIX, METADATA_TRAILER_PREFIX};
pub use error::{GatewayError, GatewayResult};
pub use handler::{handle_unary, BindInput, UnaryRoute};
pub use marshal::{JsonMarshaler, Marshaler, MarshalerRegistry};
pub use mux::{MuxOptions, ServeMux, ServeMuxBuilder};
pub use pattern::{PathParams, Pattern, PatternError};
pub use query::{QueryBind, QueryParams};
