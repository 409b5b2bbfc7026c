//! Unary call driver: bind the call message, dispatch it, forward the reply

use crate::context::annotate_context;
use crate::convert::ConvertResult;
use crate::double_array::DoubleArray;
use crate::forward::{forward_response_message, http_error};
use crate::marshal::Marshaler;
use crate::mux::MuxOptions;
use crate::pattern::PathParams;
use crate::query::{populate_query_parameters, QueryBind, QueryParams};
use axum::body::Body;
use bytes::Bytes;
use ferry_core::{CallContext, Reply, ServerMetadata, Status};
use http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use tracing::{debug, error, warn};

/// Populates a default-initialized call message from the request
pub type BindFn<Req> = fn(&mut Req, &BindInput<'_>) -> Result<(), Status>;

/// Turns a response message into the HTTP body; `None` writes no body
pub type ForwardFn<Resp> = fn(Resp) -> Result<Option<Value>, serde_json::Error>;

/// One REST binding of a unary RPC method. Built once at registration.
pub struct UnaryRoute<Req, Resp> {
    /// Full RPC method name, `/{service}/{method}`
    pub method: String,
    /// Fields bound from the path or body; query keys under them are skipped
    pub filter: DoubleArray,
    pub bind: BindFn<Req>,
    pub forward: ForwardFn<Resp>,
    /// Status written on success
    pub success: StatusCode,
}

impl<Req, Resp> UnaryRoute<Req, Resp> {
    pub fn new(method: impl Into<String>, bind: BindFn<Req>, forward: ForwardFn<Resp>) -> Self {
        Self {
            method: method.into(),
            filter: DoubleArray::default(),
            bind,
            forward,
            success: StatusCode::OK,
        }
    }

    pub fn filter(mut self, filter: DoubleArray) -> Self {
        self.filter = filter;
        self
    }

    pub fn success(mut self, status: StatusCode) -> Self {
        self.success = status;
        self
    }
}

/// Everything a binder may read from the request.
pub struct BindInput<'a> {
    pub params: &'a PathParams,
    pub query: &'a QueryParams,
    pub body: Bytes,
    pub inbound: &'a dyn Marshaler,
    pub filter: &'a DoubleArray,
    pub ignore_unknown_query: bool,
}

impl BindInput<'_> {
    /// Convert the captured path variable `name`
    pub fn path_param<T>(&self, name: &str, convert: impl Fn(&str) -> ConvertResult<T>) -> Result<T, Status> {
        let raw = self
            .params
            .get(name)
            .ok_or_else(|| Status::invalid_argument(format!("missing parameter {}", name)))?;
        convert(raw).map_err(|e| {
            Status::invalid_argument(format!("type mismatch, parameter: {}, error: {}", name, e))
        })
    }

    /// The decoded body, or `None` when the request carried no bytes
    pub fn body(&self) -> Result<Option<Value>, Status> {
        if self.body.is_empty() {
            return Ok(None);
        }
        self.inbound
            .unmarshal(&self.body)
            .map(Some)
            .map_err(|e| Status::invalid_argument(format!("failed to decode request body: {}", e)))
    }

    /// Bind the remaining query parameters into `msg`
    pub fn populate_query<M: QueryBind>(&self, msg: &mut M) -> Result<(), Status> {
        populate_query_parameters(msg, self.query, self.filter, self.ignore_unknown_query)
            .map_err(Status::from)
    }
}

/// Deserialize a decoded body (or part of one) into a message field
pub fn decode_value<T: DeserializeOwned>(value: Value) -> Result<T, Status> {
    serde_json::from_value(value)
        .map_err(|e| Status::invalid_argument(format!("failed to decode request body: {}", e)))
}

/// Serve one request for `route`.
///
/// Binding failures are answered without calling `dispatch`. The call runs
/// under the context deadline; dropping the returned future (client
/// disconnect) drops the in-flight call with it.
pub async fn handle_unary<Req, Resp, D, Fut>(
    options: &MuxOptions,
    route: &UnaryRoute<Req, Resp>,
    req: Request<Body>,
    params: PathParams,
    dispatch: D,
) -> Response<Body>
where
    Req: Default,
    D: FnOnce(CallContext, Req) -> Fut,
    Fut: Future<Output = Reply<Resp>>,
{
    let (inbound, outbound) = options.marshalers.for_request(req.headers());
    let prefix = options.metadata_prefix.as_str();
    let fail = |status: &Status, metadata: &ServerMetadata| http_error(outbound.as_ref(), status, metadata, prefix);

    let ctx = match annotate_context(req.headers(), &route.method, prefix, options.default_timeout) {
        Ok(ctx) => ctx,
        Err(status) => return fail(&status, &ServerMetadata::new()),
    };
    let query = QueryParams::parse(req.uri().query());
    let body = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            let status = Status::invalid_argument(format!("failed to read request body: {}", e));
            return fail(&status, &ServerMetadata::new());
        }
    };

    let mut msg = Req::default();
    let input = BindInput {
        params: &params,
        query: &query,
        body,
        inbound: inbound.as_ref(),
        filter: &route.filter,
        ignore_unknown_query: options.ignore_unknown_query,
    };
    if let Err(status) = (route.bind)(&mut msg, &input) {
        debug!(method = %route.method, error = %status, "failed to bind request");
        return fail(&status, &ServerMetadata::new());
    }
    debug!(method = %route.method, "request bound");

    let call = dispatch(ctx.clone(), msg);
    let reply = match ctx.remaining() {
        Some(remaining) => match tokio::time::timeout(remaining, call).await {
            Ok(reply) => reply,
            Err(_) => Reply::failed(Status::deadline_exceeded("deadline exceeded")),
        },
        None => call.await,
    };

    let Reply { mut metadata, result } = reply;
    metadata.join(ctx.take_transport_metadata());

    let response = match result {
        Ok(response) => response,
        Err(status) => {
            warn!(method = %route.method, code = %status.code(), "call failed: {}", status.message());
            return fail(&status, &metadata);
        }
    };
    match (route.forward)(response) {
        Ok(body) => forward_response_message(outbound.as_ref(), route.success, body, &metadata, prefix),
        Err(e) => {
            error!(method = %route.method, "failed to encode response: {}", e);
            fail(&Status::internal(format!("failed to encode response: {}", e)), &metadata)
        }
    }
}
