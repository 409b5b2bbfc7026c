//! Call-context annotation from inbound HTTP requests

use ferry_core::{parse_timeout, CallContext, MetadataMap, Status, TIMEOUT_HEADER};
use http::{header, HeaderMap};
use std::time::Duration;

/// Default inbound/outbound metadata header prefix
pub const METADATA_HEADER_PREFIX: &str = "rpc-metadata-";

/// Prefix for trailer metadata written as response headers
pub const METADATA_TRAILER_PREFIX: &str = "rpc-trailer-";

/// Metadata key carrying the original `Host`
pub const FORWARDED_HOST: &str = "x-forwarded-host";

/// Build the call context for `method` from request headers.
///
/// - `{prefix}{key}` headers become metadata `{key}`
/// - `authorization` is copied as-is
/// - `host` becomes `x-forwarded-host`
/// - `rpc-timeout` sets the deadline, else `default_timeout` does
pub fn annotate_context(
    headers: &HeaderMap,
    method: &str,
    prefix: &str,
    default_timeout: Option<Duration>,
) -> Result<CallContext, Status> {
    let mut metadata = MetadataMap::new();
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        let name = name.as_str();
        if name == header::AUTHORIZATION {
            metadata.append(name, value);
        } else if name == header::HOST {
            metadata.append(FORWARDED_HOST, value);
        } else if let Some(key) = strip_prefix_ignore_case(name, prefix) {
            if !key.is_empty() {
                metadata.append(key, value);
            }
        }
    }

    let timeout = match headers.get(TIMEOUT_HEADER) {
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| Status::invalid_argument("invalid rpc-timeout header"))?;
            Some(
                parse_timeout(value)
                    .map_err(|e| Status::invalid_argument(format!("invalid rpc-timeout: {}", e)))?,
            )
        }
        None => default_timeout,
    };

    let mut ctx = CallContext::new(method).with_metadata(metadata);
    if let Some(timeout) = timeout {
        ctx = ctx.with_timeout(timeout);
    }
    Ok(ctx)
}

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    if name.len() >= prefix.len() && name.is_char_boundary(prefix.len()) && name[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&name[prefix.len()..])
    } else {
        None
    }
}
