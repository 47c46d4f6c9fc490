//! Wire codecs shared by the Tango server and client.
//!
//! MessagePack is the primary encoding on both sides; base64url wraps packed
//! bytes for the `query` rpc type's URL parameter; JSON is the fallback body
//! and response encoding.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod base64url;
pub mod json;
pub mod msgpack;

pub use base64url::{base64url_decode, base64url_encode};
pub use json::{json_encode, json_parse, json_to_value, value_to_json};
pub use msgpack::{pack, pack_as, unpack, unpack_as};

use thiserror::Error;

/// Errors produced by the codec layer.
#[derive(Debug, Error)]
pub enum CodecError {
    /// MessagePack encoding failed.
    #[error("MessagePack encode failed: {0}")]
    MsgpackEncode(String),

    /// MessagePack decoding failed.
    #[error("MessagePack decode failed: {0}")]
    MsgpackDecode(String),

    /// The input is not valid base64url.
    #[error("invalid base64url input: {0}")]
    Base64(#[from] base64::DecodeError),

    /// JSON encoding or parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value has no representation in the target encoding.
    #[error("unrepresentable value: {0}")]
    Unrepresentable(&'static str),
}
