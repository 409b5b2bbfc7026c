//! Remote stub for the AuthMethodService service

use crate::services::*;
use crate::{methods, SERVICE_NAME};
use bytes::Bytes;
use ferry_client::FerryClient;
use ferry_core::{CallContext, Reply, Status};
use prost::Message;

/// Typed client for AuthMethodService.
///
/// Every method returns the response headers and trailers alongside the
/// result, so callers can forward them.
#[derive(Clone)]
pub struct AuthMethodServiceClient {
    inner: FerryClient,
}

impl AuthMethodServiceClient {
    pub fn new(inner: FerryClient) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &FerryClient {
        &self.inner
    }

    async fn unary<Req: Message, Resp: Message + Default>(
        &self,
        ctx: &CallContext,
        method: &str,
        request: &Req,
    ) -> Reply<Resp> {
        let body = Bytes::from(request.encode_to_vec());
        self.inner
            .call(ctx, SERVICE_NAME, method, body)
            .await
            .and_then(|bytes| {
                Resp::decode(bytes).map_err(|e| {
                    Status::internal(format!("failed to decode {} response: {}", method, e))
                })
            })
    }

    pub async fn get_auth_method(
        &self,
        ctx: &CallContext,
        request: GetAuthMethodRequest,
    ) -> Reply<GetAuthMethodResponse> {
        self.unary(ctx, methods::GET_AUTH_METHOD, &request).await
    }

    pub async fn list_auth_methods(
        &self,
        ctx: &CallContext,
        request: ListAuthMethodsRequest,
    ) -> Reply<ListAuthMethodsResponse> {
        self.unary(ctx, methods::LIST_AUTH_METHODS, &request).await
    }

    pub async fn create_auth_method(
        &self,
        ctx: &CallContext,
        request: CreateAuthMethodRequest,
    ) -> Reply<CreateAuthMethodResponse> {
        self.unary(ctx, methods::CREATE_AUTH_METHOD, &request).await
    }

    pub async fn update_auth_method(
        &self,
        ctx: &CallContext,
        request: UpdateAuthMethodRequest,
    ) -> Reply<UpdateAuthMethodResponse> {
        self.unary(ctx, methods::UPDATE_AUTH_METHOD, &request).await
    }

    pub async fn delete_auth_method(
        &self,
        ctx: &CallContext,
        request: DeleteAuthMethodRequest,
    ) -> Reply<DeleteAuthMethodResponse> {
        self.unary(ctx, methods::DELETE_AUTH_METHOD, &request).await
    }

    pub async fn change_state(
        &self,
        ctx: &CallContext,
        request: ChangeStateRequest,
    ) -> Reply<ChangeStateResponse> {
        self.unary(ctx, methods::CHANGE_STATE, &request).await
    }
}
