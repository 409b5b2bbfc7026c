//! Server binding for the AuthMethodService service

use crate::services::*;
use crate::{methods, SERVICE_NAME};
use bytes::Bytes;
use ferry_core::{CallContext, Status};
use ferry_server::ServerBuilder;
use prost::Message;
use std::sync::Arc;

/// Service trait for AuthMethodService
///
/// This is the local-handler capability: the gateway can call an
/// implementation in-process, and `add_service` exposes the same
/// implementation over RPC.
#[async_trait::async_trait]
pub trait AuthMethodService: Send + Sync + 'static {
    /// Handle GetAuthMethod RPC
    async fn get_auth_method(
        &self,
        ctx: &CallContext,
        request: GetAuthMethodRequest,
    ) -> Result<GetAuthMethodResponse, Status>;

    /// Handle ListAuthMethods RPC
    async fn list_auth_methods(
        &self,
        ctx: &CallContext,
        request: ListAuthMethodsRequest,
    ) -> Result<ListAuthMethodsResponse, Status>;

    /// Handle CreateAuthMethod RPC
    async fn create_auth_method(
        &self,
        ctx: &CallContext,
        request: CreateAuthMethodRequest,
    ) -> Result<CreateAuthMethodResponse, Status>;

    /// Handle UpdateAuthMethod RPC
    async fn update_auth_method(
        &self,
        ctx: &CallContext,
        request: UpdateAuthMethodRequest,
    ) -> Result<UpdateAuthMethodResponse, Status>;

    /// Handle DeleteAuthMethod RPC
    async fn delete_auth_method(
        &self,
        ctx: &CallContext,
        request: DeleteAuthMethodRequest,
    ) -> Result<DeleteAuthMethodResponse, Status>;

    /// Handle ChangeState RPC
    async fn change_state(
        &self,
        ctx: &CallContext,
        request: ChangeStateRequest,
    ) -> Result<ChangeStateResponse, Status>;
}

#[async_trait::async_trait]
impl<S: AuthMethodService + ?Sized> AuthMethodService for Arc<S> {
    async fn get_auth_method(
        &self,
        ctx: &CallContext,
        request: GetAuthMethodRequest,
    ) -> Result<GetAuthMethodResponse, Status> {
        (**self).get_auth_method(ctx, request).await
    }

    async fn list_auth_methods(
        &self,
        ctx: &CallContext,
        request: ListAuthMethodsRequest,
    ) -> Result<ListAuthMethodsResponse, Status> {
        (**self).list_auth_methods(ctx, request).await
    }

    async fn create_auth_method(
        &self,
        ctx: &CallContext,
        request: CreateAuthMethodRequest,
    ) -> Result<CreateAuthMethodResponse, Status> {
        (**self).create_auth_method(ctx, request).await
    }

    async fn update_auth_method(
        &self,
        ctx: &CallContext,
        request: UpdateAuthMethodRequest,
    ) -> Result<UpdateAuthMethodResponse, Status> {
        (**self).update_auth_method(ctx, request).await
    }

    async fn delete_auth_method(
        &self,
        ctx: &CallContext,
        request: DeleteAuthMethodRequest,
    ) -> Result<DeleteAuthMethodResponse, Status> {
        (**self).delete_auth_method(ctx, request).await
    }

    async fn change_state(
        &self,
        ctx: &CallContext,
        request: ChangeStateRequest,
    ) -> Result<ChangeStateResponse, Status> {
        (**self).change_state(ctx, request).await
    }
}

fn decode<M: Message + Default>(bytes: Bytes) -> Result<M, Status> {
    M::decode(bytes).map_err(|e| Status::invalid_argument(format!("failed to decode request: {}", e)))
}

fn encode<M: Message>(message: &M) -> Bytes {
    Bytes::from(message.encode_to_vec())
}

macro_rules! route {
    ($builder:expr, $service:expr, $method:expr, $call:ident, $request:ty) => {{
        let service = Arc::clone(&$service);
        $builder.register(
            format!("{}/{}", SERVICE_NAME, $method),
            move |ctx: CallContext, body: Bytes| {
                let service = Arc::clone(&service);
                async move {
                    let request: $request = decode(body)?;
                    let response = service.$call(&ctx, request).await?;
                    Ok::<_, Status>(encode(&response))
                }
            },
        )
    }};
}

/// Register the service implementation with a ServerBuilder
pub fn add_service<S: AuthMethodService>(builder: ServerBuilder, service: S) -> ServerBuilder {
    let service = Arc::new(service);
    let builder = route!(builder, service, methods::GET_AUTH_METHOD, get_auth_method, GetAuthMethodRequest);
    let builder = route!(builder, service, methods::LIST_AUTH_METHODS, list_auth_methods, ListAuthMethodsRequest);
    let builder = route!(builder, service, methods::CREATE_AUTH_METHOD, create_auth_method, CreateAuthMethodRequest);
    let builder = route!(builder, service, methods::UPDATE_AUTH_METHOD, update_auth_method, UpdateAuthMethodRequest);
    let builder = route!(builder, service, methods::DELETE_AUTH_METHOD, delete_auth_method, DeleteAuthMethodRequest);
    route!(builder, service, methods::CHANGE_STATE, change_state, ChangeStateRequest)
}
