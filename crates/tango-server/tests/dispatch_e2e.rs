//! Dispatcher behaviour end to end: method gates, content-type gate,
//! argument parsing per rpc type, validation failures, cache headers, and
//! the at-most-once terminal guarantee.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;

use tango_codec::{base64url_encode, json_parse, pack, unpack};
use tango_core::{ArgValue, Args, FnSchema, Issue, ServerContext, TangoError, Value};
use tango_middleware::{from_fn, Next};
use tango_router::{Api, Endpoint};
use tango_server::RpcHandler;

fn request(method: Method, uri: &str) -> Request<Bytes> {
    Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
}

fn post(uri: &str, content_type: &str, body: impl Into<Bytes>) -> Request<Bytes> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(CONTENT_TYPE, content_type)
        .body(body.into())
        .unwrap()
}

async fn body_value(response: http::Response<http_body_util::Full<Bytes>>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    unpack(&bytes).unwrap()
}

fn profile_api(calls: Arc<AtomicUsize>) -> Api {
    Api::new().nest(
        "users",
        Api::new().endpoint(
            "getProfile",
            Endpoint::query(move |_args, _ctx| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Value::Map(vec![
                        (Value::from("id"), Value::from(1)),
                        (Value::from("name"), Value::from("a")),
                    ]))
                }
            }),
        ),
    )
}

#[tokio::test]
async fn test_query_happy_path() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = RpcHandler::new(profile_api(calls.clone())).unwrap();

    let args = Value::Map(vec![(Value::from("page"), Value::from(2))]);
    let encoded = base64url_encode(&pack(&args).unwrap());
    let uri = format!("/api/users.get-profile?args={encoded}");

    let response = handler
        .dispatch(request(Method::GET, &uri), "users.get-profile")
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/msgpack"
    );
    assert!(response.headers().get("x-tango-execution-time").is_some());

    let value = body_value(response).await;
    assert_eq!(
        value,
        Value::Map(vec![
            (Value::from("id"), Value::from(1)),
            (Value::from("name"), Value::from("a")),
        ])
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let handler = RpcHandler::new(Api::new()).unwrap();
    let response = handler.dispatch(request(Method::GET, "/api/nope"), "nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"RPC method not found");
}

#[tokio::test]
async fn test_method_gate_rejects_everything_but_get_and_post() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = RpcHandler::new(profile_api(calls.clone())).unwrap();

    for method in [Method::PUT, Method::DELETE, Method::PATCH, Method::HEAD] {
        let response = handler
            .dispatch(
                request(method, "/api/users.get-profile"),
                "users.get-profile",
            )
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0, "implementation must never run");
}

#[tokio::test]
async fn test_rpc_type_mismatch_names_the_pair() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = RpcHandler::new(profile_api(calls.clone())).unwrap();

    let response = handler
        .dispatch(
            post("/api/users.get-profile", "application/msgpack", Bytes::new()),
            "users.get-profile",
        )
        .await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let message = std::str::from_utf8(&bytes).unwrap();
    assert!(message.contains("POST"));
    assert!(message.contains("query"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_content_type_gate() {
    let calls = Arc::new(AtomicUsize::new(0));
    let inner = calls.clone();
    let api = Api::new().endpoint(
        "create",
        Endpoint::command(move |_args, _ctx| {
            let calls = inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Nil)
            }
        }),
    );
    let handler = RpcHandler::new(api).unwrap();

    let response = handler
        .dispatch(post("/api/create", "text/plain", "hello"), "create")
        .await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Absent content type is gated too.
    let bare = Request::builder()
        .method(Method::POST)
        .uri("/api/create")
        .body(Bytes::new())
        .unwrap();
    let response = handler.dispatch(bare, "create").await;
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_command_with_validation_failure() {
    let api = Api::new().nest(
        "posts",
        Api::new().endpoint(
            "create",
            Endpoint::command(|_args, _ctx| async move { Ok(Value::from("created")) }).schema(
                FnSchema::new(|args: Args| {
                    let ok = args
                        .get("title")
                        .and_then(ArgValue::as_value)
                        .and_then(|v| v.as_str())
                        .is_some_and(|title| title.len() >= 3);
                    if ok {
                        Ok(args)
                    } else {
                        Err(vec![Issue::field("title", "must be at least 3 characters")])
                    }
                }),
            ),
        ),
    );
    let handler = RpcHandler::new(api).unwrap();

    let body = pack(&Value::Map(vec![(Value::from("title"), Value::from("Hi"))])).unwrap();
    let response = handler
        .dispatch(post("/api/posts.create", "application/msgpack", body), "posts.create")
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(
        response.headers().get("x-tango-validation-error").unwrap(),
        "true"
    );
    assert!(response.headers().get(CACHE_CONTROL).is_none());

    let issues = body_value(response).await;
    let Value::Array(items) = issues else {
        panic!("expected issue array, got {issues:?}");
    };
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn test_get_endpoint_with_plain_args() {
    let api = Api::new().nest(
        "posts",
        Api::new().endpoint(
            "getById",
            Endpoint::get(|args: Args, _ctx| async move {
                let id = args
                    .get("id")
                    .and_then(ArgValue::as_value)
                    .cloned()
                    .unwrap_or(Value::Nil);
                Ok(id)
            }),
        ),
    );
    let handler = RpcHandler::new(api).unwrap();

    let response = handler
        .dispatch(
            request(Method::GET, "/api/posts.get-by-id?id=42"),
            "posts.get-by-id",
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    // Plain string, no coercion.
    assert_eq!(body_value(response).await, Value::from("42"));
}

#[tokio::test]
async fn test_cache_header_from_context_directive() {
    let api = Api::new().endpoint(
        "cached",
        Endpoint::get(|_args, ctx: ServerContext| async move {
            ctx.set_cache_seconds(120.0);
            Ok(Value::from("cached"))
        }),
    );
    let handler = RpcHandler::new(api).unwrap();

    let response = handler.dispatch(request(Method::GET, "/api/cached"), "cached").await;
    assert_eq!(
        response.headers().get(CACHE_CONTROL).unwrap(),
        "public, max-age=120"
    );
}

#[tokio::test]
async fn test_handler_error_is_opaque_500() {
    let api = Api::new().endpoint(
        "boom",
        Endpoint::query(|_args, _ctx| async move {
            Err(TangoError::internal(anyhow::anyhow!("db connection refused")))
        }),
    );
    let handler = RpcHandler::new(api).unwrap();

    let response = handler.dispatch(request(Method::GET, "/api/boom"), "boom").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty(), "500 body must be empty");
}

#[tokio::test]
async fn test_json_accept_negotiation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let handler = RpcHandler::new(profile_api(calls)).unwrap();

    let req = Request::builder()
        .method(Method::GET)
        .uri("/api/users.get-profile")
        .header(ACCEPT, "application/json")
        .body(Bytes::new())
        .unwrap();
    let response = handler.dispatch(req, "users.get-profile").await;

    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = json_parse(std::str::from_utf8(&bytes).unwrap()).unwrap();
    assert_eq!(
        value,
        Value::Map(vec![
            (Value::from("id"), Value::from(1)),
            (Value::from("name"), Value::from("a")),
        ])
    );
}

#[tokio::test]
async fn test_middleware_short_circuit_skips_implementation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let inner = calls.clone();

    let gate = from_fn("gate", |_ctx: ServerContext, _next: Next<ServerContext, TangoError>| {
        Box::pin(async move { Ok(Value::from("denied")) })
    });

    let api = Api::new().middleware(gate).endpoint(
        "guarded",
        Endpoint::query(move |_args, _ctx| {
            let calls = inner.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(Value::from("secret"))
            }
        }),
    );
    let handler = RpcHandler::new(api).unwrap();

    let response = handler.dispatch(request(Method::GET, "/api/guarded"), "guarded").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_value(response).await, Value::from("denied"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_msgpack_body_is_400() {
    let api = Api::new().endpoint(
        "create",
        Endpoint::command(|_args, _ctx| async move { Ok(Value::Nil) }),
    );
    let handler = RpcHandler::new(api).unwrap();

    let response = handler
        .dispatch(
            post("/api/create", "application/msgpack", Bytes::from_static(&[0xc1])),
            "create",
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"Invalid MessagePack body");
}

#[tokio::test]
async fn test_status_shortcut_reaches_response() {
    let api = Api::new().endpoint(
        "create",
        Endpoint::command(|_args, ctx: ServerContext| async move {
            ctx.created();
            Ok(Value::from("made"))
        }),
    );
    let handler = RpcHandler::new(api).unwrap();

    let body = pack(&Value::Map(vec![])).unwrap();
    let response = handler
        .dispatch(post("/api/create", "application/msgpack", body), "create")
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}
