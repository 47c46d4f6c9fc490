//! Per-request server context.
//!
//! A [`ServerContext`] is created for each request and threaded through the
//! middleware pipeline into the endpoint implementation. It is a cheap-clone
//! handle: every clone observes the same underlying state, so pipeline
//! stages, the terminal and the response serializer all see one bag.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use parking_lot::Mutex;

use crate::value::{Args, Value};

/// Builds a [`ServerContext`] from parsed args and the request head.
///
/// The dispatcher invokes this once per request, after argument parsing and
/// before pipeline execution. Override it to seed `env` or attach an
/// adapter handle for middleware.
pub type ContextFactory =
    Arc<dyn Fn(Args, &http::request::Parts) -> ServerContext + Send + Sync>;

/// Per-request mutable state bag.
///
/// Owns the parsed arguments, a read-only view of the request headers, the
/// mutable response headers, the response status (default 200), the cache
/// directive, a scratch `env` map for middleware, and an opaque adapter
/// handle supplied by the host.
///
/// # Example
///
/// ```
/// use tango_core::ServerContext;
///
/// let ctx = ServerContext::new(Default::default(), Default::default());
/// ctx.created();
/// assert_eq!(ctx.status(), http::StatusCode::CREATED);
/// ```
#[derive(Clone)]
pub struct ServerContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    args: Mutex<Args>,
    request_headers: HeaderMap,
    response_headers: Mutex<HeaderMap>,
    status: Mutex<StatusCode>,
    cache_seconds: Mutex<u32>,
    env: Mutex<HashMap<String, Value>>,
    adapter: Mutex<Option<Arc<dyn Any + Send + Sync>>>,
    started_at: Instant,
}

impl ServerContext {
    /// Creates a context with parsed args and the incoming request headers.
    #[must_use]
    pub fn new(args: Args, request_headers: HeaderMap) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                args: Mutex::new(args),
                request_headers,
                response_headers: Mutex::new(HeaderMap::new()),
                status: Mutex::new(StatusCode::OK),
                cache_seconds: Mutex::new(0),
                env: Mutex::new(HashMap::new()),
                adapter: Mutex::new(None),
                started_at: Instant::now(),
            }),
        }
    }

    /// Materializes the args as a fresh insertion-ordered record.
    #[must_use]
    pub fn args(&self) -> Args {
        self.inner.args.lock().clone()
    }

    /// Replaces the stored args (used after schema parsing).
    pub fn set_args(&self, args: Args) {
        *self.inner.args.lock() = args;
    }

    /// Returns the read-only request headers.
    #[must_use]
    pub fn request_headers(&self) -> &HeaderMap {
        &self.inner.request_headers
    }

    /// Inserts a response header, replacing any previous value.
    pub fn insert_response_header(&self, name: HeaderName, value: HeaderValue) {
        self.inner.response_headers.lock().insert(name, value);
    }

    /// Returns a snapshot of the response headers.
    #[must_use]
    pub fn response_headers(&self) -> HeaderMap {
        self.inner.response_headers.lock().clone()
    }

    /// Returns the response status.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        *self.inner.status.lock()
    }

    /// Sets the response status.
    pub fn set_status(&self, status: StatusCode) {
        *self.inner.status.lock() = status;
    }

    /// Returns the cache directive in seconds.
    #[must_use]
    pub fn cache_seconds(&self) -> u32 {
        *self.inner.cache_seconds.lock()
    }

    /// Sets the cache directive, clamped to `max(0, floor(secs))`.
    pub fn set_cache_seconds(&self, secs: f64) {
        let clamped = if secs.is_finite() && secs > 0.0 {
            secs.floor().min(f64::from(u32::MAX)) as u32
        } else {
            0
        };
        *self.inner.cache_seconds.lock() = clamped;
    }

    /// Stores a value in the middleware scratch map.
    pub fn env_insert(&self, key: impl Into<String>, value: Value) {
        self.inner.env.lock().insert(key.into(), value);
    }

    /// Reads a value from the middleware scratch map.
    #[must_use]
    pub fn env_get(&self, key: &str) -> Option<Value> {
        self.inner.env.lock().get(key).cloned()
    }

    /// Attaches an opaque host adapter handle (raw request, cookies, …).
    pub fn set_adapter(&self, adapter: Arc<dyn Any + Send + Sync>) {
        *self.inner.adapter.lock() = Some(adapter);
    }

    /// Retrieves the adapter handle, downcast to the expected type.
    #[must_use]
    pub fn adapter<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let adapter = self.inner.adapter.lock().clone()?;
        adapter.downcast::<T>().ok()
    }

    /// Milliseconds elapsed since the context was created.
    ///
    /// Computed from the start instant at read time.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.inner.started_at.elapsed().as_secs_f64() * 1000.0
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("status", &self.status())
            .field("cache_seconds", &self.cache_seconds())
            .finish_non_exhaustive()
    }
}

macro_rules! status_shortcuts {
    ($($name:ident => $code:ident),+ $(,)?) => {
        /// Status shortcuts. Each method writes its canonical code.
        impl ServerContext {
            $(
                #[doc = concat!("Sets the response status to `", stringify!($code), "`.")]
                pub fn $name(&self) {
                    self.set_status(StatusCode::$code);
                }
            )+
        }
    };
}

status_shortcuts! {
    r#continue => CONTINUE,
    switching_protocols => SWITCHING_PROTOCOLS,
    processing => PROCESSING,
    ok => OK,
    created => CREATED,
    accepted => ACCEPTED,
    no_content => NO_CONTENT,
    reset_content => RESET_CONTENT,
    partial_content => PARTIAL_CONTENT,
    multiple_choices => MULTIPLE_CHOICES,
    moved_permanently => MOVED_PERMANENTLY,
    found => FOUND,
    see_other => SEE_OTHER,
    not_modified => NOT_MODIFIED,
    temporary_redirect => TEMPORARY_REDIRECT,
    permanent_redirect => PERMANENT_REDIRECT,
    bad_request => BAD_REQUEST,
    unauthorized => UNAUTHORIZED,
    payment_required => PAYMENT_REQUIRED,
    forbidden => FORBIDDEN,
    not_found => NOT_FOUND,
    method_not_allowed => METHOD_NOT_ALLOWED,
    not_acceptable => NOT_ACCEPTABLE,
    conflict => CONFLICT,
    gone => GONE,
    length_required => LENGTH_REQUIRED,
    precondition_failed => PRECONDITION_FAILED,
    payload_too_large => PAYLOAD_TOO_LARGE,
    uri_too_long => URI_TOO_LONG,
    bad_content => UNSUPPORTED_MEDIA_TYPE,
    range_not_satisfiable => RANGE_NOT_SATISFIABLE,
    expectation_failed => EXPECTATION_FAILED,
    too_many_requests => TOO_MANY_REQUESTS,
    server_error => INTERNAL_SERVER_ERROR,
    not_implemented => NOT_IMPLEMENTED,
    bad_gateway => BAD_GATEWAY,
    service_unavailable => SERVICE_UNAVAILABLE,
    gateway_timeout => GATEWAY_TIMEOUT,
    http_version_not_supported => HTTP_VERSION_NOT_SUPPORTED,
}

/// The default context factory: args plus a copy of the request headers.
#[must_use]
pub fn default_context_factory() -> ContextFactory {
    Arc::new(|args, parts| ServerContext::new(args, parts.headers.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ArgValue;

    #[test]
    fn test_defaults() {
        let ctx = ServerContext::new(Args::new(), HeaderMap::new());
        assert_eq!(ctx.status(), StatusCode::OK);
        assert_eq!(ctx.cache_seconds(), 0);
        assert!(ctx.args().is_empty());
    }

    #[test]
    fn test_clones_share_state() {
        let ctx = ServerContext::new(Args::new(), HeaderMap::new());
        let other = ctx.clone();
        other.not_found();
        assert_eq!(ctx.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_cache_seconds_clamping() {
        let ctx = ServerContext::new(Args::new(), HeaderMap::new());

        ctx.set_cache_seconds(59.9);
        assert_eq!(ctx.cache_seconds(), 59);

        ctx.set_cache_seconds(-10.0);
        assert_eq!(ctx.cache_seconds(), 0);

        ctx.set_cache_seconds(f64::NAN);
        assert_eq!(ctx.cache_seconds(), 0);
    }

    #[test]
    fn test_args_materialize_in_insertion_order() {
        let mut args = Args::new();
        args.insert("b".into(), ArgValue::from(2i64));
        args.insert("a".into(), ArgValue::from(1i64));
        let ctx = ServerContext::new(args, HeaderMap::new());

        let keys: Vec<String> = ctx.args().keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_status_shortcuts() {
        let ctx = ServerContext::new(Args::new(), HeaderMap::new());
        ctx.r#continue();
        assert_eq!(ctx.status().as_u16(), 100);
        ctx.bad_content();
        assert_eq!(ctx.status().as_u16(), 415);
        ctx.gateway_timeout();
        assert_eq!(ctx.status().as_u16(), 504);
    }

    #[test]
    fn test_env_scratch() {
        let ctx = ServerContext::new(Args::new(), HeaderMap::new());
        ctx.env_insert("user", Value::from("alice"));
        assert_eq!(ctx.env_get("user"), Some(Value::from("alice")));
        assert_eq!(ctx.env_get("missing"), None);
    }

    #[test]
    fn test_adapter_downcast() {
        let ctx = ServerContext::new(Args::new(), HeaderMap::new());
        ctx.set_adapter(Arc::new(String::from("host")));
        assert_eq!(ctx.adapter::<String>().as_deref(), Some(&"host".to_string()));
        assert!(ctx.adapter::<u32>().is_none());
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let ctx = ServerContext::new(Args::new(), HeaderMap::new());
        let first = ctx.elapsed_ms();
        std::thread::sleep(std::time::Duration::from_millis(2));
        assert!(ctx.elapsed_ms() > first);
    }
}
