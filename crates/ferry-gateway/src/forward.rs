//! Response forwarding and error mapping

use crate::context::METADATA_TRAILER_PREFIX;
use crate::marshal::Marshaler;
use axum::body::Body;
use ferry_core::{MetadataMap, ServerMetadata, Status};
use http::{header, HeaderMap, HeaderName, HeaderValue, Response, StatusCode};
use serde_json::Value;
use tracing::{error, warn};

/// Written when even the error body cannot be marshaled
const FALLBACK_ERROR_BODY: &str = r#"{"code":13,"message":"failed to marshal error message"}"#;

/// Write a successful call's response.
///
/// `body` is the message (or the unwrapped field) as JSON; `None` sends
/// an empty body.
pub fn forward_response_message(
    outbound: &dyn Marshaler,
    status: StatusCode,
    body: Option<Value>,
    metadata: &ServerMetadata,
    header_prefix: &str,
) -> Response<Body> {
    let bytes = match body.as_ref().map(|v| outbound.marshal(v)).transpose() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!("failed to marshal response: {}", e);
            return http_error(
                outbound,
                &Status::internal(format!("failed to marshal response: {}", e)),
                metadata,
                header_prefix,
            );
        }
    };

    let mut response = match bytes {
        Some(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            set_content_type(response.headers_mut(), outbound);
            response
        }
        None => Response::new(Body::empty()),
    };
    *response.status_mut() = status;
    write_metadata(response.headers_mut(), metadata, header_prefix);
    response
}

/// Write a failed call's response: the mapped HTTP status and the
/// `{code, message, details}` body.
pub fn http_error(
    outbound: &dyn Marshaler,
    status: &Status,
    metadata: &ServerMetadata,
    header_prefix: &str,
) -> Response<Body> {
    let encoded = serde_json::to_value(status.to_body()).and_then(|v| outbound.marshal(&v));
    let mut response = match encoded {
        Ok(bytes) => {
            let mut response = Response::new(Body::from(bytes));
            *response.status_mut() = status.http_status();
            response
        }
        Err(e) => {
            error!("failed to marshal error message: {}", e);
            let mut response = Response::new(Body::from(FALLBACK_ERROR_BODY));
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            response
        }
    };
    set_content_type(response.headers_mut(), outbound);
    write_metadata(response.headers_mut(), metadata, header_prefix);
    response
}

fn set_content_type(headers: &mut HeaderMap, outbound: &dyn Marshaler) {
    if let Ok(value) = HeaderValue::from_str(outbound.content_type()) {
        headers.insert(header::CONTENT_TYPE, value);
    }
}

/// Header metadata as `{prefix}{key}`, trailer metadata as `rpc-trailer-{key}`
fn write_metadata(headers: &mut HeaderMap, metadata: &ServerMetadata, header_prefix: &str) {
    append_prefixed(headers, &metadata.header, header_prefix);
    append_prefixed(headers, &metadata.trailer, METADATA_TRAILER_PREFIX);
}

fn append_prefixed(headers: &mut HeaderMap, metadata: &MetadataMap, prefix: &str) {
    for (key, value) in metadata.iter() {
        let name = HeaderName::try_from(format!("{}{}", prefix, key));
        match (name, HeaderValue::try_from(value)) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(key, "dropping metadata entry that is not a valid header"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::METADATA_HEADER_PREFIX;
    use crate::marshal::JsonMarshaler;
    use ferry_core::Code;
    use http_body_util::BodyExt;
    use serde_json::json;

    async fn body_json(response: Response<Body>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_success_with_metadata() {
        let mut md = ServerMetadata::new();
        md.header.append("x-request-id", "r-1");
        md.trailer.append("x-served-by", "backend-1");

        let response = forward_response_message(
            &JsonMarshaler::compact(),
            StatusCode::CREATED,
            Some(json!({"id": "ampw_1"})),
            &md,
            METADATA_HEADER_PREFIX,
        );
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()["rpc-metadata-x-request-id"], "r-1");
        assert_eq!(response.headers()["rpc-trailer-x-served-by"], "backend-1");
        assert_eq!(body_json(response).await, json!({"id": "ampw_1"}));
    }

    #[tokio::test]
    async fn test_empty_body() {
        let response = forward_response_message(
            &JsonMarshaler::compact(),
            StatusCode::NO_CONTENT,
            None,
            &ServerMetadata::new(),
            METADATA_HEADER_PREFIX,
        );
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(header::CONTENT_TYPE).is_none());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_error_body_shape_and_order() {
        let status = Status::not_found("auth method amoidc_1 not found")
            .with_detail(json!({"@type": "ferry.ResourceInfo", "id": "amoidc_1"}));
        let response = http_error(
            &JsonMarshaler::compact(),
            &status,
            &ServerMetadata::new(),
            METADATA_HEADER_PREFIX,
        );
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(
            std::str::from_utf8(&bytes).unwrap(),
            r#"{"code":5,"message":"auth method amoidc_1 not found","details":[{"@type":"ferry.ResourceInfo","id":"amoidc_1"}]}"#
        );
    }

    #[tokio::test]
    async fn test_every_code_maps_through_http_error() {
        for code in Code::ALL {
            if code == Code::Ok {
                continue;
            }
            let response = http_error(
                &JsonMarshaler::compact(),
                &Status::new(code, "x"),
                &ServerMetadata::new(),
                METADATA_HEADER_PREFIX,
            );
            assert_eq!(response.status(), code.http_status());
            let is_500 = response.status() == StatusCode::INTERNAL_SERVER_ERROR;
            assert_eq!(is_500, matches!(code, Code::Internal | Code::Unknown), "{code}");
            assert_eq!(body_json(response).await["code"], code.as_i32());
        }
    }
}
