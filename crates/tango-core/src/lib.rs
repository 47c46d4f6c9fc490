//! Core types shared by the Tango server and client.
//!
//! This crate defines the vocabulary the rest of the framework speaks:
//!
//! - [`RpcType`] — the three call styles (`query`, `command`, `get`) and
//!   their HTTP method mapping
//! - [`Value`], [`ArgValue`] and [`Args`] — the dynamic argument model that
//!   flows over the wire as MessagePack
//! - [`FileUpload`] — an in-memory file payload carried through multipart
//!   requests
//! - [`ServerContext`] — the per-request mutable state bag, including the
//!   status shortcut set and the cache directive
//! - [`Schema`] and [`Issue`] — the pluggable validation seam
//! - [`TangoError`] — the server-side error taxonomy with HTTP status
//!   mapping

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod context;
pub mod error;
pub mod rpc;
pub mod schema;
pub mod value;

pub use context::{ContextFactory, ServerContext};
pub use error::{TangoError, TangoResult};
pub use rpc::RpcType;
pub use schema::{FnSchema, Issue, Schema};
pub use value::{ArgValue, Args, FileUpload, Value};

/// Response header carrying the handler's elapsed time in milliseconds.
pub const EXECUTION_TIME_HEADER: &str = "x-tango-execution-time";

/// Response header flagging a 422 produced by schema validation.
pub const VALIDATION_ERROR_HEADER: &str = "x-tango-validation-error";

/// The MessagePack media type used for bodies and `Accept` negotiation.
pub const MSGPACK_MIME: &str = "application/msgpack";

/// The JSON media type used as the fallback encoding.
pub const JSON_MIME: &str = "application/json";
