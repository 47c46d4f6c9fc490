//! Server-side error taxonomy.
//!
//! Routing and content errors are caught by the dispatcher and converted to
//! HTTP responses; validation failures carry their issue list to the 422
//! body; anything else is logged once and becomes an opaque 500.

use http::{Method, StatusCode};
use thiserror::Error;

use crate::rpc::RpcType;
use crate::schema::Issue;

/// Result type alias using [`TangoError`].
pub type TangoResult<T> = Result<T, TangoError>;

/// Errors produced while dispatching and executing a request.
#[derive(Debug, Error)]
pub enum TangoError {
    /// The HTTP method is neither GET nor POST.
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// No endpoint is registered under the requested route key.
    #[error("RPC method not found")]
    RouteNotFound,

    /// The HTTP method does not match the endpoint's rpc type.
    #[error("{method} is not allowed for {rpc_type} endpoints")]
    RpcTypeMismatch {
        /// The offending HTTP method.
        method: Method,
        /// The endpoint's declared rpc type.
        rpc_type: RpcType,
    },

    /// A command body arrived with an unrecognised content type.
    #[error("Unsupported Media Type")]
    UnsupportedMediaType {
        /// The content type the request carried, if any.
        content_type: Option<String>,
    },

    /// The request arguments could not be parsed.
    #[error("{0}")]
    BadRequest(String),

    /// Schema validation rejected the arguments.
    #[error("validation failed with {} issue(s)", .0.len())]
    Validation(Vec<Issue>),

    /// Every pipeline stage called next and none returned a value.
    #[error("pipeline exhausted: make the last stage return without calling next")]
    PipelineExhausted,

    /// An uncaught failure inside a handler or middleware.
    #[error("Internal server error")]
    Internal {
        /// The underlying failure, never exposed to clients.
        #[source]
        source: anyhow::Error,
    },
}

impl TangoError {
    /// Creates a bad-request error with the given message.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Wraps an arbitrary failure as an internal error.
    #[must_use]
    pub fn internal(source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            source: source.into(),
        }
    }

    /// Returns the HTTP status code this error maps to.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MethodNotAllowed | Self::RpcTypeMismatch { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::RouteNotFound => StatusCode::NOT_FOUND,
            Self::UnsupportedMediaType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::PipelineExhausted | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
