//! Interface definitions for `controller.api.services.v1.AuthMethodService`.
//!
//! This crate provides:
//! - Resource and request/response messages (protobuf on the RPC wire, JSON at the REST surface)
//! - The `AuthMethodService` local-handler trait and its RPC server binding
//! - `AuthMethodServiceClient`, the typed remote stub
//! - `InMemoryAuthMethods`, a reference implementation

pub mod auth_method_service_client;
pub mod auth_method_service_server;
pub mod memory;
pub mod resources;
pub mod services;

pub use auth_method_service_client::AuthMethodServiceClient;
pub use auth_method_service_server::{add_service, AuthMethodService};
pub use memory::InMemoryAuthMethods;
pub use resources::{AuthMethod, ScopeInfo};
pub use services::*;

/// Fully-qualified service name
pub const SERVICE_NAME: &str = "controller.api.services.v1.AuthMethodService";

/// RPC method names
pub mod methods {
    pub const GET_AUTH_METHOD: &str = "GetAuthMethod";
    pub const LIST_AUTH_METHODS: &str = "ListAuthMethods";
    pub const CREATE_AUTH_METHOD: &str = "CreateAuthMethod";
    pub const UPDATE_AUTH_METHOD: &str = "UpdateAuthMethod";
    pub const DELETE_AUTH_METHOD: &str = "DeleteAuthMethod";
    pub const CHANGE_STATE: &str = "ChangeState";

    /// Full method name as recorded on the call context
    pub fn full_name(method: &str) -> String {
        format!("/{}/{}", super::SERVICE_NAME, method)
    }
}
