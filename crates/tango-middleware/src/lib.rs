//! Middleware trait and pipeline executor.
//!
//! Both sides of Tango run calls through the same pipeline model: an ordered
//! chain of stages sharing one context handle, each stage free to
//! short-circuit or to delegate to the tail via [`Next`]. The terminal stage
//! (validated implementation on the server, transport on the client) is
//! appended as a regular stage by the caller, so running off the end of the
//! chain is a programming error surfaced as [`PipelineExhausted`].

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod middleware;
pub mod pipeline;

pub use middleware::{from_fn, BoxFuture, FnMiddleware, Middleware, Next, Stage};
pub use pipeline::{run, PipelineExhausted};
