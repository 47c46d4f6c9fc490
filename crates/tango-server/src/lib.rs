//! Server side of the Tango RPC framework.
//!
//! The [`RpcHandler`] is the core: it flattens the API definition once at
//! construction, then dispatches each incoming request through the
//! seven-step contract — method gate, route lookup, rpc-type compatibility,
//! per-type argument parsing, context construction, pipeline execution, and
//! response serialization.
//!
//! The [`Server`] wraps a handler in a hyper listener loop with base-path
//! stripping and graceful shutdown; hosts with their own HTTP stack can
//! call [`RpcHandler::dispatch`] directly with a request and a route
//! string.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod args;
pub mod config;
pub mod dispatch;
pub mod multipart;
pub mod respond;
pub mod server;
pub mod shutdown;

pub use config::{ServerConfig, ServerConfigBuilder};
pub use dispatch::RpcHandler;
pub use server::{BoundServer, Server, ServerError};
pub use shutdown::ShutdownSignal;
