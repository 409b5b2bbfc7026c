//! Request and response messages: `controller.api.services.v1`

use crate::resources::AuthMethod;
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, prost::Message)]
pub struct GetAuthMethodRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
pub struct GetAuthMethodResponse {
    #[prost(message, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<AuthMethod>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListAuthMethodsRequest {
    #[prost(string, tag = "1")]
    pub scope_id: String,
    #[prost(bool, tag = "20")]
    pub recursive: bool,
    #[prost(string, tag = "30")]
    pub filter: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
pub struct ListAuthMethodsResponse {
    #[prost(message, repeated, tag = "1")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<AuthMethod>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct CreateAuthMethodRequest {
    #[prost(message, optional, tag = "1")]
    pub item: Option<AuthMethod>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
pub struct CreateAuthMethodResponse {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uri: String,
    #[prost(message, optional, tag = "2")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<AuthMethod>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct UpdateAuthMethodRequest {
    #[prost(string, tag = "1")]
    pub id: String,
    #[prost(message, optional, tag = "2")]
    pub item: Option<AuthMethod>,
    #[prost(message, optional, tag = "3")]
    pub update_mask: Option<prost_types::FieldMask>,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
pub struct UpdateAuthMethodResponse {
    #[prost(message, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<AuthMethod>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct DeleteAuthMethodRequest {
    #[prost(string, tag = "1")]
    pub id: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
pub struct DeleteAuthMethodResponse {}

/// Body of `POST /v1/auth-methods/{id}:change-state`
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChangeStateRequest {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[prost(uint32, tag = "2")]
    pub version: u32,
    /// JSON object; `state` selects the new state.
    #[prost(string, tag = "4")]
    #[serde(
        with = "crate::resources::json_object",
        skip_serializing_if = "String::is_empty"
    )]
    pub attributes: String,
}

#[derive(Clone, PartialEq, prost::Message, Serialize)]
pub struct ChangeStateResponse {
    #[prost(message, optional, tag = "1")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<AuthMethod>,
}
