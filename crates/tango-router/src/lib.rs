//! API tree definition and the startup flattener.
//!
//! An API is authored as a nested tree of named branches and endpoint
//! descriptors. At handler construction the tree is flattened once into an
//! immutable table from kebab route key (`users.auth.get-token`) to a
//! precomposed handler closure that already embeds the accumulated
//! middleware chain, the validation step and the implementation.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod flatten;
pub mod kebab;

pub use api::{Api, ApiNode, Endpoint, Implementation, ServerStage};
pub use flatten::{flatten, RouteEntry, RouteTable, RouterError};
pub use kebab::{kebab, route_key};
