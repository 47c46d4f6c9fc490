//! Response serialization.
//!
//! The output format follows the request's `Accept` header: JSON when it
//! mentions `application/json`, MessagePack otherwise. Every serialized
//! response carries the elapsed time header; GET responses with a positive
//! cache directive also carry `Cache-Control`.

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderMap, Method, Response, StatusCode};
use http_body_util::Full;

use tango_codec::{json_encode, pack};
use tango_core::{
    ServerContext, Value, EXECUTION_TIME_HEADER, JSON_MIME, MSGPACK_MIME,
};

/// Returns true if the request's `Accept` header asks for JSON.
#[must_use]
pub fn wants_json(request_headers: &HeaderMap) -> bool {
    request_headers
        .get(http::header::ACCEPT)
        .and_then(|accept| accept.to_str().ok())
        .is_some_and(|accept| accept.contains(JSON_MIME))
}

/// Serializes a handler result into the HTTP response.
///
/// Encoding failures degrade to an empty 500.
#[must_use]
pub fn serialize_response(
    ctx: &ServerContext,
    value: &Value,
    method: &Method,
    json: bool,
) -> Response<Full<Bytes>> {
    let body = if json {
        json_encode(value).map(Bytes::from)
    } else {
        pack(value).map(Bytes::from)
    };
    let body = match body {
        Ok(body) => body,
        Err(error) => {
            tracing::error!(%error, "response encoding failed");
            return plain_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        }
    };

    let mut headers = ctx.response_headers();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(if json { JSON_MIME } else { MSGPACK_MIME }),
    );
    insert_execution_time(&mut headers, ctx);

    let cache_seconds = ctx.cache_seconds();
    if method == Method::GET && cache_seconds > 0 {
        if let Ok(value) = HeaderValue::from_str(&format!("public, max-age={cache_seconds}")) {
            headers.insert(CACHE_CONTROL, value);
        }
    }

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = ctx.status();
    *response.headers_mut() = headers;
    response
}

/// Adds the elapsed-time header, a decimal millisecond string.
pub fn insert_execution_time(headers: &mut HeaderMap, ctx: &ServerContext) {
    let elapsed = format!("{:.3}", ctx.elapsed_ms());
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        headers.insert(HeaderName::from_static(EXECUTION_TIME_HEADER), value);
    }
}

/// Builds a plain-text error response.
#[must_use]
pub fn plain_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(message.to_owned())));
    *response.status_mut() = status;
    if !message.is_empty() {
        response.headers_mut().insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
    }
    response
}
