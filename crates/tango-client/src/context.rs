//! Per-call client context.
//!
//! A [`ClientContext`] is created for each call and threaded through the
//! middleware chain into the transport terminal. Like the server context it
//! is a cheap-clone handle over one shared state bag.

use std::sync::Arc;
use std::time::Instant;

use http::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use http::StatusCode;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use tango_core::{Args, RpcType, Value, MSGPACK_MIME};

use crate::progress::ProgressCallback;

/// The response head captured by the transport, for middleware and `_ctx`
/// callers to inspect.
#[derive(Debug, Clone)]
pub struct ResponseHead {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
}

/// Per-call mutable state bag.
///
/// Owns the original (pre-kebab) path segments, the args, the rpc type, the
/// request headers (seeded with `Accept: application/msgpack` unless the
/// caller overrides), the optional abort token and progress hook, and —
/// after the transport runs — the response head and the decoded result.
#[derive(Clone)]
pub struct ClientContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    path: Vec<String>,
    rpc_type: RpcType,
    args: Mutex<Args>,
    request_headers: Mutex<HeaderMap>,
    abort: Option<CancellationToken>,
    on_progress: Option<ProgressCallback>,
    response: Mutex<Option<ResponseHead>>,
    result: Mutex<Option<Value>>,
    started_at: Instant,
}

impl ClientContext {
    /// Creates a context for one call.
    ///
    /// `headers` is merged over the default `Accept: application/msgpack`.
    #[must_use]
    pub fn new(
        path: Vec<String>,
        rpc_type: RpcType,
        args: Args,
        headers: HeaderMap,
        abort: Option<CancellationToken>,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        let mut request_headers = HeaderMap::new();
        request_headers.insert(ACCEPT, HeaderValue::from_static(MSGPACK_MIME));
        for (name, value) in &headers {
            request_headers.insert(name.clone(), value.clone());
        }

        Self {
            inner: Arc::new(ContextInner {
                path,
                rpc_type,
                args: Mutex::new(args),
                request_headers: Mutex::new(request_headers),
                abort,
                on_progress,
                response: Mutex::new(None),
                result: Mutex::new(None),
                started_at: Instant::now(),
            }),
        }
    }

    /// Returns the original path segments, pre-normalization.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.inner.path
    }

    /// Returns the call's rpc type.
    #[must_use]
    pub fn rpc_type(&self) -> RpcType {
        self.inner.rpc_type
    }

    /// Materializes the args as a fresh insertion-ordered record.
    #[must_use]
    pub fn args(&self) -> Args {
        self.inner.args.lock().clone()
    }

    /// Replaces the args (middleware may rewrite them before transport).
    pub fn set_args(&self, args: Args) {
        *self.inner.args.lock() = args;
    }

    /// Returns a snapshot of the request headers.
    #[must_use]
    pub fn request_headers(&self) -> HeaderMap {
        self.inner.request_headers.lock().clone()
    }

    /// Inserts a request header, replacing any previous value.
    pub fn insert_request_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.request_headers.lock().insert(name, value);
    }

    /// Returns the abort token, if the caller supplied one.
    #[must_use]
    pub fn abort_token(&self) -> Option<&CancellationToken> {
        self.inner.abort.as_ref()
    }

    /// Returns the progress hook, if the caller supplied one.
    #[must_use]
    pub fn on_progress(&self) -> Option<&ProgressCallback> {
        self.inner.on_progress.as_ref()
    }

    /// Stores the response head. Called by the transport.
    pub fn set_response(&self, response: ResponseHead) {
        *self.inner.response.lock() = Some(response);
    }

    /// Returns the response head, once the transport has run.
    #[must_use]
    pub fn response(&self) -> Option<ResponseHead> {
        self.inner.response.lock().clone()
    }

    /// Stores the decoded result. Called by the transport.
    pub fn set_result(&self, result: Value) {
        *self.inner.result.lock() = Some(result);
    }

    /// Returns the decoded result, once the transport has run.
    #[must_use]
    pub fn result(&self) -> Option<Value> {
        self.inner.result.lock().clone()
    }

    /// Milliseconds elapsed since the call was created.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.inner.started_at.elapsed().as_secs_f64() * 1000.0
    }
}

impl std::fmt::Debug for ClientContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientContext")
            .field("path", &self.inner.path)
            .field("rpc_type", &self.inner.rpc_type)
            .finish_non_exhaustive()
    }
}
