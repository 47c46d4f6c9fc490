//! # Tango
//!
//! **Full-stack RPC over HTTP: a server dispatcher and a typed client
//! sharing one wire protocol.**
//!
//! Application code invokes remote procedures as ordinary calls; Tango
//! handles the routing, encoding, and middleware on both sides:
//!
//! - Nested API definitions flatten at startup into a table of
//!   precomposed middleware + validation + implementation pipelines
//! - Kebab-cased, dot-joined route keys (`users.auth.get-token`)
//! - MessagePack bodies with base64url query encoding and a JSON fallback
//! - Multipart upload detection with file parts split out of args
//! - One middleware model on client and server, with short-circuiting and
//!   an explicit terminal stage
//!
//! ## Server
//!
//! ```rust,ignore
//! use tango::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let api = Api::new().nest(
//!         "users",
//!         Api::new().endpoint(
//!             "getProfile",
//!             Endpoint::query(|_args, _ctx| async move {
//!                 Ok(Value::Map(vec![(Value::from("id"), Value::from(1))]))
//!             }),
//!         ),
//!     );
//!
//!     let handler = RpcHandler::new(api)?;
//!     let config = ServerConfig::builder().http_addr("0.0.0.0:8080").build();
//!     Server::new(config, handler).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Client
//!
//! ```rust,ignore
//! use tango::prelude::*;
//!
//! let client = TangoClient::new("http://localhost:8080/api")?;
//! let profile = client.call().at("users").at("getProfile").query(Args::new()).await?;
//! ```

#![doc(html_root_url = "https://docs.rs/tango/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use tango_core as core;

// Re-export the codec layer
pub use tango_codec as codec;

// Re-export the pipeline model
pub use tango_middleware as middleware;

// Re-export API definition and flattening
pub use tango_router as router;

// Re-export the server side
pub use tango_server as server;

// Re-export the client side
pub use tango_client as client;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use tango::prelude::*;
/// ```
pub mod prelude {
    pub use tango_core::{
        ArgValue, Args, FileUpload, FnSchema, Issue, RpcType, Schema, ServerContext, TangoError,
        TangoResult, Value,
    };

    pub use tango_middleware::{from_fn, Middleware, Next};

    pub use tango_router::{kebab, Api, Endpoint};

    pub use tango_server::{RpcHandler, Server, ServerConfig, ShutdownSignal};

    pub use tango_client::{
        ClientContext, ClientError, MiddlewareConfig, Progress, ProgressPhase, TangoClient,
    };
}
