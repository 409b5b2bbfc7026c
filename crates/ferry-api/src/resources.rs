//! Resource messages: `controller.api.resources.authmethods.v1`
//!
//! Each message carries its protobuf encoding (used on the RPC wire) and
//! its JSON mapping (used at the REST surface). JSON field names are the
//! proto field names; empty fields are omitted.

use serde::{Deserialize, Serialize};

/// Scope an auth method belongs to
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeInfo {
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[prost(string, tag = "2")]
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub scope_type: String,
    #[prost(string, tag = "3")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub parent_scope_id: String,
}

/// An auth method resource
#[derive(Clone, PartialEq, prost::Message, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthMethod {
    /// Output only.
    #[prost(string, tag = "1")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[prost(string, tag = "2")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scope_id: String,
    /// Output only.
    #[prost(message, optional, tag = "3")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeInfo>,
    #[prost(string, optional, tag = "4")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[prost(string, optional, tag = "5")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Incremented on every successful update; updates must echo the current value.
    #[prost(uint32, tag = "8")]
    #[serde(skip_serializing_if = "is_zero")]
    pub version: u32,
    /// `password`, `oidc` or `ldap`. Immutable after creation.
    #[prost(string, tag = "9")]
    #[serde(skip_serializing_if = "String::is_empty")]
    pub r#type: String,
    /// Type-specific attributes, a JSON object.
    #[prost(string, tag = "10")]
    #[serde(with = "json_object", skip_serializing_if = "String::is_empty")]
    pub attributes: String,
    /// Output only.
    #[prost(bool, tag = "12")]
    #[serde(skip_serializing_if = "is_false")]
    pub is_primary: bool,
}

fn is_zero(v: &u32) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !*v
}

/// Serde adapter for `google.protobuf.Struct`-valued fields kept as JSON text
/// on the wire: the REST surface sees an object, the message holds its text.
pub mod json_object {
    use serde::{de, ser, Deserialize, Deserializer, Serialize, Serializer};
    use serde_json::Value;

    pub fn serialize<S: Serializer>(text: &str, serializer: S) -> Result<S::Ok, S::Error> {
        if text.is_empty() {
            return serializer.serialize_none();
        }
        let value: Value = serde_json::from_str(text).map_err(ser::Error::custom)?;
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(String::new()),
            value @ Value::Object(_) => Ok(value.to_string()),
            other => Err(de::Error::invalid_type(
                de::Unexpected::Other(json_kind(&other)),
                &"a JSON object",
            )),
        }
    }

    fn json_kind(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}
