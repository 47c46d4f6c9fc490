//! Client-side error taxonomy.

use http::HeaderMap;
use thiserror::Error;

use tango_codec::CodecError;
use tango_core::Value;
use tango_middleware::PipelineExhausted;

/// Errors produced while assembling, sending, or decoding a call.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The call was aborted, before dispatch or mid-flight.
    #[error("call aborted")]
    Aborted,

    /// The HTTP transport failed below the protocol level.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-OK status with an empty body.
    #[error("Server error: {status} {status_text}")]
    ServerStatus {
        /// The HTTP status code.
        status: u16,
        /// The status line reason phrase.
        status_text: String,
    },

    /// Non-OK status with a decoded body.
    ///
    /// Carries the response headers and the decoded payload so callers can
    /// branch on status — notably 422, where `data` is the issue list.
    #[error("server returned {status}")]
    Server {
        /// The HTTP status code.
        status: u16,
        /// The response headers.
        headers: HeaderMap,
        /// The decoded response payload.
        data: Value,
    },

    /// OK status other than 204 with an empty body.
    #[error("Unexpected empty response")]
    UnexpectedEmptyResponse,

    /// Encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// Every pipeline stage called next and none returned a value.
    #[error("pipeline exhausted: make the last stage return without calling next")]
    PipelineExhausted,

    /// The configured base URL is not a valid absolute URL.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// A request header could not be constructed.
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

impl ClientError {
    /// Returns the HTTP status of a server failure, if this is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ServerStatus { status, .. } | Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns the decoded payload of a server failure, if present.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Server { data, .. } => Some(data),
            _ => None,
        }
    }
}

impl From<PipelineExhausted> for ClientError {
    fn from(_: PipelineExhausted) -> Self {
        Self::PipelineExhausted
    }
}
