//! In-memory AuthMethodService, used by `ferry backend` and in tests.

use crate::auth_method_service_server::AuthMethodService;
use crate::resources::{AuthMethod, ScopeInfo};
use crate::services::*;
use ferry_core::{CallContext, Status};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

const GLOBAL_SCOPE: &str = "global";

const STATES: &[&str] = &["inactive", "active-private", "active-public"];

/// Fields an update mask may name
const UPDATABLE: &[&str] = &["name", "description", "attributes"];

/// Auth methods kept in a map keyed by id
#[derive(Debug, Default)]
pub struct InMemoryAuthMethods {
    items: RwLock<BTreeMap<String, AuthMethod>>,
    next_id: AtomicU64,
}

impl InMemoryAuthMethods {
    pub fn new() -> Self {
        Self::default()
    }

    fn mint_id(&self, kind: &str) -> Result<String, Status> {
        let prefix = match kind {
            "password" => "ampw",
            "oidc" => "amoidc",
            "ldap" => "amldap",
            "" => return Err(Status::invalid_argument("item.type is required")),
            other => {
                return Err(Status::invalid_argument(format!(
                    "unknown auth method type {:?}",
                    other
                )))
            }
        };
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(format!("{}_{:010}", prefix, n))
    }
}

fn not_found(id: &str) -> Status {
    Status::not_found(format!("auth method {} not found", id))
        .with_detail(json!({"@type": "ferry.ResourceInfo", "id": id}))
}

fn scope_info(scope_id: &str) -> ScopeInfo {
    let scope_type = if scope_id == GLOBAL_SCOPE {
        "global"
    } else if scope_id.starts_with("p_") {
        "project"
    } else {
        "org"
    };
    ScopeInfo {
        id: scope_id.to_string(),
        scope_type: scope_type.to_string(),
        parent_scope_id: String::new(),
    }
}

fn parse_attributes(text: &str) -> Result<Map<String, Value>, Status> {
    if text.is_empty() {
        return Ok(Map::new());
    }
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Ok(map),
        _ => Err(Status::invalid_argument("attributes must be a JSON object")),
    }
}

fn name_taken(items: &BTreeMap<String, AuthMethod>, candidate: &AuthMethod) -> bool {
    let Some(name) = candidate.name.as_deref() else {
        return false;
    };
    items.values().any(|am| {
        am.id != candidate.id && am.scope_id == candidate.scope_id && am.name.as_deref() == Some(name)
    })
}

fn check_version(stored: &AuthMethod, version: u32) -> Result<(), Status> {
    if version == 0 {
        return Err(Status::invalid_argument("version is required"));
    }
    if version != stored.version {
        return Err(Status::failed_precondition(format!(
            "version {} does not match current version {}",
            version, stored.version
        )));
    }
    Ok(())
}

/// Copy the masked fields of `patch` onto `target`.
///
/// `attributes.<key>` paths patch a single attribute; a null or absent
/// value removes it.
fn apply_mask(target: &mut AuthMethod, patch: &AuthMethod, paths: &[String]) -> Result<(), Status> {
    let mut attributes = parse_attributes(&target.attributes)?;
    let patch_attributes = parse_attributes(&patch.attributes)?;

    for path in paths {
        match path.as_str() {
            // checked against the stored version, never copied
            "version" => {}
            "name" => target.name = patch.name.clone().filter(|s| !s.is_empty()),
            "description" => target.description = patch.description.clone().filter(|s| !s.is_empty()),
            "attributes" => attributes = patch_attributes.clone(),
            other => match other.strip_prefix("attributes.") {
                Some(key) if !key.is_empty() => match patch_attributes.get(key) {
                    Some(Value::Null) | None => {
                        attributes.remove(key);
                    }
                    Some(value) => {
                        attributes.insert(key.to_string(), value.clone());
                    }
                },
                _ => {
                    return Err(Status::invalid_argument(format!(
                        "update_mask path {:?} is not updatable; expected one of {:?}",
                        other, UPDATABLE
                    )))
                }
            },
        }
    }

    target.attributes = if attributes.is_empty() {
        String::new()
    } else {
        Value::Object(attributes).to_string()
    };
    Ok(())
}

#[async_trait::async_trait]
impl AuthMethodService for InMemoryAuthMethods {
    async fn get_auth_method(
        &self,
        _ctx: &CallContext,
        request: GetAuthMethodRequest,
    ) -> Result<GetAuthMethodResponse, Status> {
        let items = self.items.read().await;
        let item = items.get(&request.id).cloned().ok_or_else(|| not_found(&request.id))?;
        Ok(GetAuthMethodResponse { item: Some(item) })
    }

    async fn list_auth_methods(
        &self,
        _ctx: &CallContext,
        request: ListAuthMethodsRequest,
    ) -> Result<ListAuthMethodsResponse, Status> {
        let scope_id = if request.scope_id.is_empty() {
            GLOBAL_SCOPE
        } else {
            request.scope_id.as_str()
        };

        let items = self.items.read().await;
        let items = items
            .values()
            .filter(|am| request.recursive || am.scope_id == scope_id)
            .filter(|am| {
                request.filter.is_empty()
                    || am.name.as_deref().is_some_and(|n| n.contains(&request.filter))
                    || am
                        .description
                        .as_deref()
                        .is_some_and(|d| d.contains(&request.filter))
            })
            .cloned()
            .collect();
        Ok(ListAuthMethodsResponse { items })
    }

    async fn create_auth_method(
        &self,
        _ctx: &CallContext,
        request: CreateAuthMethodRequest,
    ) -> Result<CreateAuthMethodResponse, Status> {
        let mut item = request
            .item
            .ok_or_else(|| Status::invalid_argument("item is required"))?;
        if !item.id.is_empty() {
            return Err(Status::invalid_argument("item.id is output only"));
        }
        if item.version != 0 {
            return Err(Status::invalid_argument("item.version cannot be set on create"));
        }
        parse_attributes(&item.attributes)?;

        if item.scope_id.is_empty() {
            item.scope_id = GLOBAL_SCOPE.to_string();
        }
        item.id = self.mint_id(&item.r#type)?;
        item.scope = Some(scope_info(&item.scope_id));
        item.version = 1;

        let mut items = self.items.write().await;
        if name_taken(&items, &item) {
            return Err(Status::already_exists(format!(
                "an auth method named {:?} already exists in scope {}",
                item.name.as_deref().unwrap_or_default(),
                item.scope_id
            )));
        }
        item.is_primary = !items.values().any(|am| am.scope_id == item.scope_id);
        items.insert(item.id.clone(), item.clone());
        debug!(id = %item.id, "created auth method");

        Ok(CreateAuthMethodResponse {
            uri: format!("auth-methods/{}", item.id),
            item: Some(item),
        })
    }

    async fn update_auth_method(
        &self,
        _ctx: &CallContext,
        request: UpdateAuthMethodRequest,
    ) -> Result<UpdateAuthMethodResponse, Status> {
        let patch = request
            .item
            .ok_or_else(|| Status::invalid_argument("item is required"))?;
        let paths = request.update_mask.map(|m| m.paths).unwrap_or_default();
        if paths.is_empty() {
            return Err(Status::invalid_argument("update_mask is required"));
        }

        let mut items = self.items.write().await;
        let stored = items.get(&request.id).ok_or_else(|| not_found(&request.id))?;
        check_version(stored, patch.version)?;

        let mut updated = stored.clone();
        apply_mask(&mut updated, &patch, &paths)?;
        if name_taken(&items, &updated) {
            return Err(Status::already_exists(format!(
                "an auth method named {:?} already exists in scope {}",
                updated.name.as_deref().unwrap_or_default(),
                updated.scope_id
            )));
        }
        updated.version += 1;
        items.insert(updated.id.clone(), updated.clone());
        debug!(id = %updated.id, version = updated.version, "updated auth method");

        Ok(UpdateAuthMethodResponse {
            item: Some(updated),
        })
    }

    async fn delete_auth_method(
        &self,
        _ctx: &CallContext,
        request: DeleteAuthMethodRequest,
    ) -> Result<DeleteAuthMethodResponse, Status> {
        let mut items = self.items.write().await;
        items.remove(&request.id).ok_or_else(|| not_found(&request.id))?;
        debug!(id = %request.id, "deleted auth method");
        Ok(DeleteAuthMethodResponse {})
    }

    async fn change_state(
        &self,
        _ctx: &CallContext,
        request: ChangeStateRequest,
    ) -> Result<ChangeStateResponse, Status> {
        let requested = parse_attributes(&request.attributes)?;
        let state = match requested.get("state") {
            Some(Value::String(s)) if STATES.contains(&s.as_str()) => s.clone(),
            _ => {
                return Err(Status::invalid_argument(format!(
                    "attributes.state must be one of {:?}",
                    STATES
                )))
            }
        };

        let mut items = self.items.write().await;
        let stored = items.get_mut(&request.id).ok_or_else(|| not_found(&request.id))?;
        check_version(stored, request.version)?;
        if stored.r#type != "oidc" {
            return Err(Status::failed_precondition(format!(
                "{} auth methods have no state",
                stored.r#type
            )));
        }

        let mut attributes = parse_attributes(&stored.attributes)?;
        attributes.insert("state".to_string(), Value::String(state));
        stored.attributes = Value::Object(attributes).to_string();
        stored.version += 1;

        Ok(ChangeStateResponse {
            item: Some(stored.clone()),
        })
    }
}
