//! The HTTP transport terminal.
//!
//! Builds the request for the call's rpc type (URL, headers, body shape),
//! sends it over one of two paths — buffered, or streaming with progress
//! events when the caller installed a hook — honours the abort token end to
//! end, and decodes the response into the context.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{HeaderMap, Method, StatusCode};
use reqwest::Url;
use uuid::Uuid;

use tango_codec::{base64url_encode, json_encode, pack, unpack};
use tango_core::{
    value::args_to_value, ArgValue, Args, FileUpload, RpcType, Value, MSGPACK_MIME,
};
use tango_middleware::{BoxFuture, Middleware, Next};
use tango_router::route_key;

use crate::context::{ClientContext, ResponseHead};
use crate::error::ClientError;
use crate::progress::{Progress, ProgressCallback, ProgressPhase};

const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// The chain's final stage: performs the HTTP call and populates the
/// context with the response head and the decoded result.
pub(crate) struct Transport {
    pub(crate) http: reqwest::Client,
    pub(crate) base_url: Url,
}

impl Middleware<ClientContext, ClientError> for Transport {
    fn name(&self) -> &'static str {
        "transport"
    }

    fn handle(
        self: Arc<Self>,
        ctx: ClientContext,
        _next: Next<ClientContext, ClientError>,
    ) -> BoxFuture<'static, Result<Value, ClientError>> {
        Box::pin(async move {
            if let Some(token) = ctx.abort_token() {
                if token.is_cancelled() {
                    return Err(ClientError::Aborted);
                }
            }

            let abort = ctx.abort_token().cloned();
            let value = match abort {
                Some(token) => {
                    tokio::select! {
                        () = token.cancelled() => return Err(ClientError::Aborted),
                        outcome = self.send(&ctx) => outcome?,
                    }
                }
                None => self.send(&ctx).await?,
            };

            ctx.set_result(value.clone());
            Ok(value)
        })
    }
}

impl Transport {
    async fn send(&self, ctx: &ClientContext) -> Result<Value, ClientError> {
        let prepared = prepare_request(&self.base_url, ctx)?;
        let progress = ctx.on_progress().cloned();
        tracing::debug!(
            url = %prepared.url,
            rpc_type = %ctx.rpc_type(),
            streaming = progress.is_some(),
            "sending"
        );

        let mut builder = self
            .http
            .request(prepared.method, prepared.url)
            .headers(prepared.headers);
        if let Some(body) = prepared.body {
            builder = match &progress {
                Some(callback) => builder.body(progress_body(body, callback.clone())),
                None => builder.body(body),
            };
        }

        let response = builder.send().await?;
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_owned();
        let headers = response.headers().clone();

        let bytes = match &progress {
            Some(callback) => read_with_progress(response, callback).await?,
            None => response.bytes().await?,
        };

        ctx.set_response(ResponseHead {
            status,
            headers: headers.clone(),
        });
        decode_body(status, &status_text, headers, &bytes)
    }
}

struct PreparedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

/// Builds the request shape for the call's rpc type.
fn prepare_request(base_url: &Url, ctx: &ClientContext) -> Result<PreparedRequest, ClientError> {
    let route = route_key(ctx.path());
    let mut url = join_url(base_url, &route)?;
    let mut headers = ctx.request_headers();
    let args = ctx.args();

    match ctx.rpc_type() {
        RpcType::Get => {
            {
                let mut pairs = url.query_pairs_mut();
                for (key, value) in &args {
                    if let ArgValue::Value(value) = value {
                        if !value.is_nil() {
                            pairs.append_pair(key, &coerce_query_string(value));
                        }
                    }
                }
            }
            Ok(PreparedRequest {
                method: Method::GET,
                url,
                headers,
                body: None,
            })
        }
        RpcType::Query => {
            if !args.is_empty() {
                let packed = pack(&args_to_value(args))?;
                url.query_pairs_mut().append_pair("args", &base64url_encode(&packed));
            }
            Ok(PreparedRequest {
                method: Method::GET,
                url,
                headers,
                body: None,
            })
        }
        RpcType::Command => {
            let (values, uploads) = extract_uploads(args);
            if uploads.is_empty() {
                let body = Bytes::from(pack(&args_to_value(values))?);
                headers.insert(CONTENT_TYPE, HeaderValue::from_static(MSGPACK_MIME));
                Ok(PreparedRequest {
                    method: Method::POST,
                    url,
                    headers,
                    body: Some(body),
                })
            } else {
                let (content_type, body) = encode_multipart(values, uploads)?;
                let content_type = HeaderValue::from_str(&content_type)
                    .map_err(|_| ClientError::InvalidHeader(content_type))?;
                headers.insert(CONTENT_TYPE, content_type);
                Ok(PreparedRequest {
                    method: Method::POST,
                    url,
                    headers,
                    body: Some(body),
                })
            }
        }
    }
}

/// One extracted upload entry.
enum UploadSet {
    Single(FileUpload),
    Many(Vec<FileUpload>),
}

/// Splits command args into plain values and uploads.
///
/// A single file, or a non-empty list of files, moves out of args; an
/// empty file list stays behind as an empty array. A plain `Value::Array`
/// never holds files, so mixed lists cannot occur and always stay in args.
fn extract_uploads(args: Args) -> (Args, Vec<(String, UploadSet)>) {
    let mut values = Args::new();
    let mut uploads = Vec::new();

    for (key, value) in args {
        match value {
            ArgValue::File(file) => uploads.push((key, UploadSet::Single(file))),
            ArgValue::Files(files) if !files.is_empty() => {
                uploads.push((key, UploadSet::Many(files)));
            }
            other => {
                values.insert(key, other);
            }
        }
    }
    (values, uploads)
}

/// Hand-assembles the multipart body: an `args` part carrying the packed
/// plain values, then one part per upload (list entries use a `[]` name
/// suffix, preserving each file name).
fn encode_multipart(
    values: Args,
    uploads: Vec<(String, UploadSet)>,
) -> Result<(String, Bytes), ClientError> {
    let boundary = format!("tango-{}", Uuid::new_v4().simple());
    let mut body = Vec::new();

    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(b"Content-Disposition: form-data; name=\"args\"\r\n");
    body.extend_from_slice(format!("Content-Type: {MSGPACK_MIME}\r\n\r\n").as_bytes());
    body.extend_from_slice(&pack(&args_to_value(values))?);
    body.extend_from_slice(b"\r\n");

    for (name, set) in uploads {
        match set {
            UploadSet::Single(file) => write_file_part(&mut body, &boundary, &name, &file),
            UploadSet::Many(files) => {
                let part_name = format!("{name}[]");
                for file in files {
                    write_file_part(&mut body, &boundary, &part_name, &file);
                }
            }
        }
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    Ok((
        format!("multipart/form-data; boundary={boundary}"),
        Bytes::from(body),
    ))
}

fn write_file_part(body: &mut Vec<u8>, boundary: &str, name: &str, file: &FileUpload) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{}\"\r\n",
            file.file_name()
        )
        .as_bytes(),
    );
    let content_type = file.content_type().unwrap_or("application/octet-stream");
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(&file.data);
    body.extend_from_slice(b"\r\n");
}

/// Wraps the body in a counted chunk stream that reports upload progress.
fn progress_body(bytes: Bytes, callback: ProgressCallback) -> reqwest::Body {
    let total = bytes.len() as u64;
    let chunks: Vec<Bytes> = (0..bytes.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| bytes.slice(start..(start + UPLOAD_CHUNK_SIZE).min(bytes.len())))
        .collect();

    let mut loaded = 0u64;
    let stream = futures_util::stream::iter(chunks.into_iter().map(move |chunk| {
        loaded += chunk.len() as u64;
        callback(Progress::new(loaded, total, ProgressPhase::Upload));
        Ok::<Bytes, std::io::Error>(chunk)
    }));
    reqwest::Body::wrap_stream(stream)
}

/// Reads the response incrementally, reporting download progress when the
/// total is known.
async fn read_with_progress(
    mut response: reqwest::Response,
    callback: &ProgressCallback,
) -> Result<Bytes, ClientError> {
    let total = response.content_length().filter(|total| *total > 0);
    let mut buf = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        buf.extend_from_slice(&chunk);
        if let Some(total) = total {
            callback(Progress::new(buf.len() as u64, total, ProgressPhase::Download));
        }
    }
    Ok(Bytes::from(buf))
}

/// Applies the decode rules to the response body.
fn decode_body(
    status: StatusCode,
    status_text: &str,
    headers: HeaderMap,
    bytes: &[u8],
) -> Result<Value, ClientError> {
    if !status.is_success() {
        if bytes.is_empty() {
            return Err(ClientError::ServerStatus {
                status: status.as_u16(),
                status_text: status_text.to_owned(),
            });
        }
        let data = unpack(bytes).unwrap_or_else(|_| Value::Binary(bytes.to_vec()));
        return Err(ClientError::Server {
            status: status.as_u16(),
            headers,
            data,
        });
    }

    if bytes.is_empty() {
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Nil);
        }
        return Err(ClientError::UnexpectedEmptyResponse);
    }
    Ok(unpack(bytes)?)
}

/// Appends the route to the base URL with exactly one separating slash.
fn join_url(base: &Url, route: &str) -> Result<Url, ClientError> {
    let base_str = base.as_str().trim_end_matches('/');
    Url::parse(&format!("{base_str}/{route}"))
        .map_err(|e| ClientError::InvalidBaseUrl(e.to_string()))
}

/// String coercion for `get` arguments: strings pass through, scalars
/// print, compound values fall back to their JSON form.
fn coerce_query_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.as_str().unwrap_or_default().to_owned(),
        Value::Boolean(b) => b.to_string(),
        Value::Integer(n) => n.to_string(),
        Value::F32(f) => f.to_string(),
        Value::F64(f) => f.to_string(),
        other => json_encode(other).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tango_codec::base64url_decode;

    fn ctx(rpc_type: RpcType, args: Args) -> ClientContext {
        ClientContext::new(
            vec!["users".into(), "getProfile".into()],
            rpc_type,
            args,
            HeaderMap::new(),
            None,
            None,
        )
    }

    fn base() -> Url {
        Url::parse("http://localhost:8080/api").unwrap()
    }

    #[test]
    fn test_get_request_shape() {
        let mut args = Args::new();
        args.insert("id".into(), ArgValue::from("42"));
        args.insert("missing".into(), ArgValue::Value(Value::Nil));
        args.insert("flag".into(), ArgValue::from(true));

        let prepared = prepare_request(&base(), &ctx(RpcType::Get, args)).unwrap();
        assert_eq!(prepared.method, Method::GET);
        assert!(prepared.body.is_none());
        assert_eq!(
            prepared.url.as_str(),
            "http://localhost:8080/api/users.get-profile?id=42&flag=true"
        );
    }

    #[test]
    fn test_query_request_wraps_args() {
        let mut args = Args::new();
        args.insert("page".into(), ArgValue::from(2i64));

        let prepared = prepare_request(&base(), &ctx(RpcType::Query, args)).unwrap();
        assert_eq!(prepared.method, Method::GET);

        let (key, encoded) = prepared.url.query_pairs().next().unwrap();
        assert_eq!(key, "args");
        let value = unpack(&base64url_decode(&encoded).unwrap()).unwrap();
        assert_eq!(
            value,
            Value::Map(vec![(Value::from("page"), Value::from(2))])
        );
    }

    #[test]
    fn test_query_without_args_has_no_parameter() {
        let prepared = prepare_request(&base(), &ctx(RpcType::Query, Args::new())).unwrap();
        assert!(prepared.url.query().is_none());
    }

    #[test]
    fn test_command_without_uploads_is_packed_body() {
        let mut args = Args::new();
        args.insert("title".into(), ArgValue::from("Hi"));

        let prepared = prepare_request(&base(), &ctx(RpcType::Command, args)).unwrap();
        assert_eq!(prepared.method, Method::POST);
        assert_eq!(
            prepared.headers.get(CONTENT_TYPE).unwrap(),
            "application/msgpack"
        );
        let body = prepared.body.unwrap();
        assert_eq!(
            unpack(&body).unwrap(),
            Value::Map(vec![(Value::from("title"), Value::from("Hi"))])
        );
    }

    #[test]
    fn test_command_with_uploads_is_multipart() {
        let mut args = Args::new();
        args.insert("note".into(), ArgValue::from("x"));
        args.insert(
            "files".into(),
            ArgValue::Files(vec![
                FileUpload::new("a.txt", Some("text/plain".into()), &b"AAA"[..]),
                FileUpload::new("b.txt", Some("text/plain".into()), &b"BBB"[..]),
            ]),
        );

        let prepared = prepare_request(&base(), &ctx(RpcType::Command, args)).unwrap();
        let content_type = prepared.headers.get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));

        let body = String::from_utf8_lossy(&prepared.body.unwrap()).into_owned();
        assert!(body.contains("name=\"args\""));
        assert!(body.contains("name=\"files[]\"; filename=\"a.txt\""));
        assert!(body.contains("name=\"files[]\"; filename=\"b.txt\""));
    }

    #[test]
    fn test_mixed_plain_array_stays_in_args() {
        let mut args = Args::new();
        args.insert(
            "items".into(),
            ArgValue::Value(Value::Array(vec![Value::from(1), Value::from("x")])),
        );

        let (values, uploads) = extract_uploads(args);
        assert!(uploads.is_empty());
        assert!(values.contains_key("items"));
    }

    #[test]
    fn test_empty_file_list_stays_in_args() {
        let mut args = Args::new();
        args.insert("files".into(), ArgValue::Files(vec![]));
        let (values, uploads) = extract_uploads(args);
        assert!(uploads.is_empty());
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_decode_rules() {
        let ok = decode_body(
            StatusCode::OK,
            "OK",
            HeaderMap::new(),
            &pack(&Value::from(1)).unwrap(),
        );
        assert_eq!(ok.unwrap(), Value::from(1));

        let no_content = decode_body(StatusCode::NO_CONTENT, "No Content", HeaderMap::new(), b"");
        assert_eq!(no_content.unwrap(), Value::Nil);

        let empty_ok = decode_body(StatusCode::OK, "OK", HeaderMap::new(), b"");
        assert!(matches!(empty_ok, Err(ClientError::UnexpectedEmptyResponse)));

        let empty_fail = decode_body(
            StatusCode::BAD_GATEWAY,
            "Bad Gateway",
            HeaderMap::new(),
            b"",
        );
        match empty_fail {
            Err(ClientError::ServerStatus { status, status_text }) => {
                assert_eq!(status, 502);
                assert_eq!(status_text, "Bad Gateway");
            }
            other => panic!("expected status failure, got {other:?}"),
        }

        let with_payload = decode_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Unprocessable Entity",
            HeaderMap::new(),
            &pack(&Value::Array(vec![Value::from("issue")])).unwrap(),
        );
        match with_payload {
            Err(ClientError::Server { status, data, .. }) => {
                assert_eq!(status, 422);
                assert_eq!(data, Value::Array(vec![Value::from("issue")]));
            }
            other => panic!("expected server failure, got {other:?}"),
        }
    }

    #[test]
    fn test_join_url_single_slash() {
        let url = join_url(&base(), "users.get-profile").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/users.get-profile");

        let trailing = Url::parse("http://localhost:8080/api/").unwrap();
        let url = join_url(&trailing, "ping").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/api/ping");
    }
}
