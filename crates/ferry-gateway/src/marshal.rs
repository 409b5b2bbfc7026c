//! Message marshalers and content negotiation

use http::{header, HeaderMap};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// MIME key that matches any content type
pub const MIME_WILDCARD: &str = "*";

/// Converts between message JSON values and HTTP bodies
pub trait Marshaler: Send + Sync + 'static {
    /// Content-Type written on responses
    fn content_type(&self) -> &str;

    fn marshal(&self, value: &Value) -> Result<Vec<u8>, serde_json::Error>;

    fn unmarshal(&self, data: &[u8]) -> Result<Value, serde_json::Error>;
}

/// JSON using field names; `pretty` indents the output
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMarshaler {
    pub pretty: bool,
}

impl JsonMarshaler {
    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl Marshaler for JsonMarshaler {
    fn content_type(&self) -> &str {
        "application/json"
    }

    fn marshal(&self, value: &Value) -> Result<Vec<u8>, serde_json::Error> {
        if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        }
    }

    fn unmarshal(&self, data: &[u8]) -> Result<Value, serde_json::Error> {
        serde_json::from_slice(data)
    }
}

/// MIME type -> marshaler, with a `*` fallback
#[derive(Clone)]
pub struct MarshalerRegistry {
    marshalers: HashMap<String, Arc<dyn Marshaler>>,
}

impl fmt::Debug for MarshalerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.marshalers.keys().collect();
        keys.sort();
        f.debug_struct("MarshalerRegistry").field("mime_types", &keys).finish()
    }
}

impl Default for MarshalerRegistry {
    fn default() -> Self {
        let mut registry = Self {
            marshalers: HashMap::new(),
        };
        registry.insert(MIME_WILDCARD, JsonMarshaler::compact());
        registry
    }
}

impl MarshalerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a marshaler for a MIME type (or `*`)
    pub fn insert(&mut self, mime: &str, marshaler: impl Marshaler) {
        self.marshalers
            .insert(mime.to_ascii_lowercase(), Arc::new(marshaler));
    }

    pub fn get(&self, mime: &str) -> Option<Arc<dyn Marshaler>> {
        self.marshalers.get(&mime.to_ascii_lowercase()).cloned()
    }

    fn fallback(&self) -> Arc<dyn Marshaler> {
        self.get(MIME_WILDCARD)
            .unwrap_or_else(|| Arc::new(JsonMarshaler::compact()))
    }

    /// Select (inbound, outbound) marshalers for a request.
    ///
    /// Inbound follows `Content-Type`; outbound follows the first
    /// registered `Accept` type and otherwise matches inbound.
    pub fn for_request(&self, headers: &HeaderMap) -> (Arc<dyn Marshaler>, Arc<dyn Marshaler>) {
        let outbound = headers
            .get_all(header::ACCEPT)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .find_map(|mime| self.get(essence(mime)));

        let inbound = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|mime| self.get(essence(mime)))
            .unwrap_or_else(|| self.fallback());

        let outbound = outbound.unwrap_or_else(|| Arc::clone(&inbound));
        (inbound, outbound)
    }
}

/// `application/json; charset=utf-8` -> `application/json`
fn essence(mime: &str) -> &str {
    mime.split(';').next().unwrap_or(mime).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use serde_json::json;

    fn registry() -> MarshalerRegistry {
        let mut r = MarshalerRegistry::new();
        r.insert("application/json+pretty", JsonMarshaler::pretty());
        r
    }

    #[test]
    fn test_defaults_to_wildcard() {
        let (inbound, outbound) = registry().for_request(&HeaderMap::new());
        assert_eq!(inbound.content_type(), "application/json");
        assert_eq!(outbound.marshal(&json!({"a": 1})).unwrap(), br#"{"a":1}"#);
    }

    #[test]
    fn test_accept_selects_outbound() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json; charset=utf-8"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html, application/json+pretty"));

        let (inbound, outbound) = registry().for_request(&headers);
        assert_eq!(inbound.marshal(&json!({"a": 1})).unwrap(), br#"{"a":1}"#);
        assert_eq!(
            String::from_utf8(outbound.marshal(&json!({"a": 1})).unwrap()).unwrap(),
            "{\n  \"a\": 1\n}"
        );
    }

    #[test]
    fn test_outbound_follows_inbound_when_accept_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json+pretty"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/xml"));

        let (_, outbound) = registry().for_request(&headers);
        assert!(String::from_utf8(outbound.marshal(&json!({"a": 1})).unwrap())
            .unwrap()
            .contains('\n'));
    }

    #[test]
    fn test_unmarshal_preserves_key_order() {
        let v = JsonMarshaler::compact()
            .unmarshal(br#"{"z": 1, "a": 2}"#)
            .unwrap();
        assert_eq!(v.as_object().unwrap().keys().collect::<Vec<_>>(), vec!["z", "a"]);
    }
}
