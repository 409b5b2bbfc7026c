//! Update-mask inference for partial updates

use crate::convert::camel_to_snake;
use prost_types::FieldMask;
use serde_json::Value;

/// How mask inference treats a body field holding a JSON object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Emitted as a single path
    Scalar,
    /// Expanded one level; nested JSON names become field names
    Message,
    /// Struct or map valued; expanded one level with keys kept verbatim
    Map,
}

/// Derive an update mask from a decoded request body.
///
/// Emits one path per top-level key, in body order. A key whose field is
/// a message or map (per `kind_of`) and holds a non-empty object is
/// expanded one level instead, e.g. `scope` becomes `scope.id`. JSON names
/// are mapped to field names (`scopeId` -> `scope_id`), except for map keys.
///
/// A body that is not an object yields an empty mask.
pub fn field_mask_from_body(body: &Value, kind_of: impl Fn(&str) -> FieldKind) -> FieldMask {
    let mut paths = Vec::new();
    let Value::Object(fields) = body else {
        return FieldMask { paths };
    };

    for (key, value) in fields {
        let name = camel_to_snake(key);
        match (value, kind_of(&name)) {
            (Value::Object(nested), FieldKind::Message) if !nested.is_empty() => {
                for nested_key in nested.keys() {
                    paths.push(format!("{}.{}", name, camel_to_snake(nested_key)));
                }
            }
            (Value::Object(nested), FieldKind::Map) if !nested.is_empty() => {
                for nested_key in nested.keys() {
                    paths.push(format!("{}.{}", name, nested_key));
                }
            }
            _ => paths.push(name),
        }
    }
    FieldMask { paths }
}

/// Whether a mask is absent or has no paths
pub fn is_empty_mask(mask: Option<&FieldMask>) -> bool {
    mask.map_or(true, |m| m.paths.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn never(_: &str) -> FieldKind {
        FieldKind::Scalar
    }

    fn item(field: &str) -> FieldKind {
        match field {
            "scope" => FieldKind::Message,
            "attributes" => FieldKind::Map,
            _ => FieldKind::Scalar,
        }
    }

    #[test]
    fn test_top_level_keys_in_body_order() {
        let body: Value =
            serde_json::from_str(r#"{"version": 3, "name": "ldap1", "description": "corp"}"#).unwrap();
        let mask = field_mask_from_body(&body, never);
        assert_eq!(mask.paths, vec!["version", "name", "description"]);
    }

    #[test]
    fn test_message_fields_expand_one_level() {
        let body = json!({"scope": {"id": "o_1", "parentScopeId": "global"}, "attributes": {"issuer": "x"}});
        let mask = field_mask_from_body(&body, |f| {
            if f == "scope" {
                FieldKind::Message
            } else {
                FieldKind::Scalar
            }
        });
        assert_eq!(
            mask.paths,
            vec!["scope.id", "scope.parent_scope_id", "attributes"]
        );
    }

    #[test]
    fn test_map_keys_are_kept_verbatim() {
        let body = json!({"attributes": {"clientId": 1, "issuer": "x"}, "scope": {"parentScopeId": "global"}});
        let mask = field_mask_from_body(&body, item);
        assert_eq!(
            mask.paths,
            vec!["attributes.clientId", "attributes.issuer", "scope.parent_scope_id"]
        );
    }

    #[test]
    fn test_empty_map_replaces_whole_field() {
        let mask = field_mask_from_body(&json!({"attributes": {}}), item);
        assert_eq!(mask.paths, vec!["attributes"]);
    }

    #[test]
    fn test_json_names_become_field_names() {
        let mask = field_mask_from_body(&json!({"isPrimary": true}), never);
        assert_eq!(mask.paths, vec!["is_primary"]);
    }

    #[test]
    fn test_non_object_body_gives_empty_mask() {
        assert!(field_mask_from_body(&json!([1, 2]), never).paths.is_empty());
        assert!(is_empty_mask(None));
        assert!(is_empty_mask(Some(&FieldMask::default())));
        assert!(!is_empty_mask(Some(&FieldMask {
            paths: vec!["name".into()]
        })));
    }
}
