//! REST bindings for `controller.api.services.v1.AuthMethodService`.
//!
//! | Method | Path                                  | RPC              |
//! |--------|---------------------------------------|------------------|
//! | GET    | `/v1/auth-methods/{id}`               | GetAuthMethod    |
//! | GET    | `/v1/auth-methods`                    | ListAuthMethods  |
//! | POST   | `/v1/auth-methods`                    | CreateAuthMethod |
//! | PATCH  | `/v1/auth-methods/{id}`               | UpdateAuthMethod |
//! | DELETE | `/v1/auth-methods/{id}`               | DeleteAuthMethod |
//! | POST   | `/v1/auth-methods/{id}:change-state`  | ChangeState      |

use crate::convert;
use crate::double_array::DoubleArray;
use crate::error::GatewayResult;
use crate::field_mask::{field_mask_from_body, is_empty_mask, FieldKind};
use crate::handler::{decode_value, handle_unary, BindInput, UnaryRoute};
use crate::mux::{MuxOptions, ServeMux};
use crate::pattern::{Pattern, PatternError, OPCODE_VERSION};
use crate::query::{convert_single, QueryBind, QueryError};
use ferry_api::{
    methods, AuthMethod, AuthMethodService, AuthMethodServiceClient, ChangeStateRequest,
    ChangeStateResponse, CreateAuthMethodRequest, CreateAuthMethodResponse,
    DeleteAuthMethodRequest, DeleteAuthMethodResponse, GetAuthMethodRequest,
    GetAuthMethodResponse, ListAuthMethodsRequest, ListAuthMethodsResponse, ScopeInfo,
    UpdateAuthMethodRequest, UpdateAuthMethodResponse,
};
use ferry_client::{ClientConfig, FerryClient};
use ferry_core::{CallContext, Reply, Status};
use http::{Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// `/v1/auth-methods`
const COLLECTION_OPS: &[i32] = &[2, 0, 2, 1];
const COLLECTION_POOL: &[&str] = &["v1", "auth-methods"];

/// `/v1/auth-methods/{id}`
const ITEM_OPS: &[i32] = &[2, 0, 2, 1, 1, 0, 4, 1, 5, 2];
const ITEM_POOL: &[&str] = &["v1", "auth-methods", "id"];

const CHANGE_STATE_VERB: &str = "change-state";

/// Mask inference shape of the `AuthMethod` fields that hold objects
fn item_field_kind(field: &str) -> FieldKind {
    match field {
        "scope" => FieldKind::Message,
        "attributes" => FieldKind::Map,
        _ => FieldKind::Scalar,
    }
}

/// Where auth-method calls go: an in-process implementation or a remote
/// stub. Chosen once, when the routes are registered.
#[derive(Clone)]
pub enum AuthMethodBackend {
    Local(Arc<dyn AuthMethodService>),
    Remote(AuthMethodServiceClient),
}

macro_rules! dispatch {
    ($($rpc:ident($req:ty) -> $resp:ty;)*) => {
        impl AuthMethodBackend {
            $(
                pub async fn $rpc(&self, ctx: &CallContext, request: $req) -> Reply<$resp> {
                    match self {
                        AuthMethodBackend::Local(server) => Reply::local(server.$rpc(ctx, request).await),
                        AuthMethodBackend::Remote(client) => client.$rpc(ctx, request).await,
                    }
                }
            )*
        }
    };
}

dispatch! {
    get_auth_method(GetAuthMethodRequest) -> GetAuthMethodResponse;
    list_auth_methods(ListAuthMethodsRequest) -> ListAuthMethodsResponse;
    create_auth_method(CreateAuthMethodRequest) -> CreateAuthMethodResponse;
    update_auth_method(UpdateAuthMethodRequest) -> UpdateAuthMethodResponse;
    delete_auth_method(DeleteAuthMethodRequest) -> DeleteAuthMethodResponse;
    change_state(ChangeStateRequest) -> ChangeStateResponse;
}

impl QueryBind for ScopeInfo {
    fn bind_query_field(&mut self, path: &[&str], values: &[String]) -> Result<bool, QueryError> {
        match path {
            ["id"] => self.id = convert_single(path, values, convert::string)?,
            ["type"] => self.scope_type = convert_single(path, values, convert::string)?,
            ["parent_scope_id"] | ["parentScopeId"] => {
                self.parent_scope_id = convert_single(path, values, convert::string)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl QueryBind for AuthMethod {
    fn bind_query_field(&mut self, path: &[&str], values: &[String]) -> Result<bool, QueryError> {
        match path {
            ["id"] => self.id = convert_single(path, values, convert::string)?,
            ["scope_id"] | ["scopeId"] => self.scope_id = convert_single(path, values, convert::string)?,
            ["scope", rest @ ..] => {
                let mut scope = self.scope.clone().unwrap_or_default();
                if !scope.bind_query_field(rest, values)? {
                    return Ok(false);
                }
                self.scope = Some(scope);
            }
            ["name"] => self.name = Some(convert_single(path, values, convert::string)?),
            ["description"] => self.description = Some(convert_single(path, values, convert::string)?),
            ["version"] => self.version = convert_single(path, values, convert::uint32)?,
            ["type"] => self.r#type = convert_single(path, values, convert::string)?,
            ["is_primary"] | ["isPrimary"] => {
                self.is_primary = convert_single(path, values, convert::bool_value)?
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl QueryBind for ListAuthMethodsRequest {
    fn bind_query_field(&mut self, path: &[&str], values: &[String]) -> Result<bool, QueryError> {
        match path {
            ["scope_id"] | ["scopeId"] => self.scope_id = convert_single(path, values, convert::string)?,
            ["recursive"] => self.recursive = convert_single(path, values, convert::bool_value)?,
            ["filter"] => self.filter = convert_single(path, values, convert::string)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl QueryBind for UpdateAuthMethodRequest {
    fn bind_query_field(&mut self, path: &[&str], values: &[String]) -> Result<bool, QueryError> {
        match path {
            ["id"] => self.id = convert_single(path, values, convert::string)?,
            ["update_mask"] | ["updateMask"] => {
                self.update_mask = Some(convert_single(path, values, convert::field_mask)?)
            }
            ["item", rest @ ..] => {
                let mut item = self.item.clone().unwrap_or_default();
                if !item.bind_query_field(rest, values)? {
                    return Ok(false);
                }
                self.item = Some(item);
            }
            _ => return Ok(false),
        }
        Ok(true)
    }
}

fn bind_get(msg: &mut GetAuthMethodRequest, input: &BindInput<'_>) -> Result<(), Status> {
    msg.id = input.path_param("id", convert::string)?;
    Ok(())
}

fn bind_list(msg: &mut ListAuthMethodsRequest, input: &BindInput<'_>) -> Result<(), Status> {
    input.populate_query(msg)
}

fn bind_create(msg: &mut CreateAuthMethodRequest, input: &BindInput<'_>) -> Result<(), Status> {
    if let Some(body) = input.body()? {
        msg.item = Some(decode_value(body)?);
    }
    Ok(())
}

fn bind_update(msg: &mut UpdateAuthMethodRequest, input: &BindInput<'_>) -> Result<(), Status> {
    msg.id = input.path_param("id", convert::string)?;
    let body = input.body()?;
    if let Some(body) = &body {
        msg.item = Some(decode_value(body.clone())?);
    }
    input.populate_query(msg)?;

    if is_empty_mask(msg.update_mask.as_ref()) {
        if let Some(body) = &body {
            msg.update_mask = Some(field_mask_from_body(body, item_field_kind));
        }
    }
    Ok(())
}

fn bind_delete(msg: &mut DeleteAuthMethodRequest, input: &BindInput<'_>) -> Result<(), Status> {
    msg.id = input.path_param("id", convert::string)?;
    Ok(())
}

fn bind_change_state(msg: &mut ChangeStateRequest, input: &BindInput<'_>) -> Result<(), Status> {
    msg.id = input.path_param("id", convert::string)?;
    if let Some(body) = input.body()? {
        let body: ChangeStateRequest = decode_value(body)?;
        msg.version = body.version;
        msg.attributes = body.attributes;
    }
    Ok(())
}

fn item_body(item: Option<AuthMethod>) -> Result<Option<Value>, serde_json::Error> {
    serde_json::to_value(item.unwrap_or_default()).map(Some)
}

fn forward_get(resp: GetAuthMethodResponse) -> Result<Option<Value>, serde_json::Error> {
    item_body(resp.item)
}

fn forward_list(resp: ListAuthMethodsResponse) -> Result<Option<Value>, serde_json::Error> {
    serde_json::to_value(resp).map(Some)
}

fn forward_create(resp: CreateAuthMethodResponse) -> Result<Option<Value>, serde_json::Error> {
    item_body(resp.item)
}

fn forward_update(resp: UpdateAuthMethodResponse) -> Result<Option<Value>, serde_json::Error> {
    item_body(resp.item)
}

fn forward_delete(_: DeleteAuthMethodResponse) -> Result<Option<Value>, serde_json::Error> {
    Ok(None)
}

fn forward_change_state(resp: ChangeStateResponse) -> Result<Option<Value>, serde_json::Error> {
    item_body(resp.item)
}

fn collection_pattern() -> Result<Pattern, PatternError> {
    Pattern::new(OPCODE_VERSION, COLLECTION_OPS, COLLECTION_POOL, "")
}

fn item_pattern(verb: &str) -> Result<Pattern, PatternError> {
    Pattern::new(OPCODE_VERSION, ITEM_OPS, ITEM_POOL, verb)
}

macro_rules! unary {
    ($mux:expr, $backend:expr, $method:expr, $pattern:expr, $route:expr, $rpc:ident) => {{
        let route = Arc::new($route);
        let backend = $backend.clone();
        $mux.handle($method, $pattern, move |options: Arc<MuxOptions>, req, params| {
            let route = Arc::clone(&route);
            let backend = backend.clone();
            async move {
                handle_unary(&options, &route, req, params, |ctx, msg| async move {
                    backend.$rpc(&ctx, msg).await
                })
                .await
            }
        });
    }};
}

/// Register every auth-method route on `mux`, dispatching to `backend`
pub fn register_auth_method_service_handler(
    mux: &mut ServeMux,
    backend: AuthMethodBackend,
) -> GatewayResult<()> {
    let full = methods::full_name;

    unary!(
        mux,
        backend,
        Method::GET,
        item_pattern("")?,
        UnaryRoute::new(full(methods::GET_AUTH_METHOD), bind_get, forward_get),
        get_auth_method
    );
    unary!(
        mux,
        backend,
        Method::GET,
        collection_pattern()?,
        UnaryRoute::new(full(methods::LIST_AUTH_METHODS), bind_list, forward_list),
        list_auth_methods
    );
    unary!(
        mux,
        backend,
        Method::POST,
        collection_pattern()?,
        UnaryRoute::new(full(methods::CREATE_AUTH_METHOD), bind_create, forward_create)
            .success(StatusCode::CREATED),
        create_auth_method
    );
    unary!(
        mux,
        backend,
        Method::PATCH,
        item_pattern("")?,
        UnaryRoute::new(full(methods::UPDATE_AUTH_METHOD), bind_update, forward_update)
            .filter(DoubleArray::new(&[&["item"][..], &["id"][..]])),
        update_auth_method
    );
    unary!(
        mux,
        backend,
        Method::DELETE,
        item_pattern("")?,
        UnaryRoute::new(full(methods::DELETE_AUTH_METHOD), bind_delete, forward_delete)
            .success(StatusCode::NO_CONTENT),
        delete_auth_method
    );
    unary!(
        mux,
        backend,
        Method::POST,
        item_pattern(CHANGE_STATE_VERB)?,
        UnaryRoute::new(full(methods::CHANGE_STATE), bind_change_state, forward_change_state),
        change_state
    );
    Ok(())
}

/// Serve the routes from an in-process implementation
pub fn register_auth_method_service_handler_server<S: AuthMethodService>(
    mux: &mut ServeMux,
    server: S,
) -> GatewayResult<()> {
    register_auth_method_service_handler(mux, AuthMethodBackend::Local(Arc::new(server)))
}

/// Forward the routes through an existing client
pub fn register_auth_method_service_handler_client(
    mux: &mut ServeMux,
    client: AuthMethodServiceClient,
) -> GatewayResult<()> {
    register_auth_method_service_handler(mux, AuthMethodBackend::Remote(client))
}

/// Forward the routes to the RPC server at `endpoint` over a pooled client
pub fn register_auth_method_service_handler_from_endpoint(
    mux: &mut ServeMux,
    endpoint: &str,
    config: ClientConfig,
) -> GatewayResult<()> {
    let client = FerryClient::builder().base_url(endpoint).config(config).build()?;
    info!(endpoint, "forwarding auth method routes");
    register_auth_method_service_handler_client(mux, AuthMethodServiceClient::new(client))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{populate_query_parameters, QueryParams};

    #[test]
    fn test_patterns_match_templates() {
        assert_eq!(collection_pattern().unwrap(), Pattern::parse("/v1/auth-methods").unwrap());
        assert_eq!(item_pattern("").unwrap(), Pattern::parse("/v1/auth-methods/{id}").unwrap());
        assert_eq!(
            item_pattern(CHANGE_STATE_VERB).unwrap(),
            Pattern::parse("/v1/auth-methods/{id}:change-state").unwrap()
        );
    }

    #[test]
    fn test_list_query() {
        let mut msg = ListAuthMethodsRequest::default();
        let query = QueryParams::parse(Some("scopeId=o_1&recursive=true&filter=ldap&alt=json&page=2"));
        populate_query_parameters(&mut msg, &query, &DoubleArray::default(), true).unwrap();
        assert_eq!(msg.scope_id, "o_1");
        assert!(msg.recursive);
        assert_eq!(msg.filter, "ldap");
    }

    #[test]
    fn test_update_query_skips_filtered_fields() {
        let filter = DoubleArray::new(&[&["item"][..], &["id"][..]]);
        let mut msg = UpdateAuthMethodRequest {
            id: "ampw_1".into(),
            ..Default::default()
        };
        let query = QueryParams::parse(Some("id=456&item.name=x&update_mask=name,attributes.clientId"));
        populate_query_parameters(&mut msg, &query, &filter, true).unwrap();
        assert_eq!(msg.id, "ampw_1");
        assert!(msg.item.is_none());
        assert_eq!(
            msg.update_mask.unwrap().paths,
            vec!["name".to_string(), "attributes.client_id".to_string()]
        );
    }

    #[test]
    fn test_nested_item_fields() {
        let mut item = AuthMethod::default();
        let query = QueryParams::parse(Some("scope.type=org&version=3&isPrimary=1&attributes=x"));
        populate_query_parameters(&mut item, &query, &DoubleArray::default(), true).unwrap();
        assert_eq!(item.scope.unwrap().scope_type, "org");
        assert_eq!(item.version, 3);
        assert!(item.is_primary);
        assert!(item.attributes.is_empty());

        let err = populate_query_parameters(
            &mut AuthMethod::default(),
            &QueryParams::parse(Some("name=a&name=b")),
            &DoubleArray::default(),
            true,
        )
        .unwrap_err();
        assert!(matches!(err, QueryError::TooManyValues { .. }));
    }
}
