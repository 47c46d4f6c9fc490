//! Startup flattening of the API tree.
//!
//! A depth-first walk carries the accumulated middleware prefix. Each
//! endpoint yields one [`RouteEntry`] whose handler closure embeds
//! `prefix ⧺ endpoint middleware ⧺ terminal`, where the terminal runs the
//! schema (if any) and then the implementation. The resulting table is
//! never mutated after construction.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use tango_core::{RpcType, Schema, ServerContext, TangoError, Value};
use tango_middleware::{BoxFuture, Middleware, Next};

use crate::api::{Api, ApiNode, Implementation, ServerStage};
use crate::kebab::kebab;

/// Errors produced while flattening an API definition.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Two endpoints normalize to the same route key.
    #[error("duplicate route key: {key}")]
    DuplicateRoute {
        /// The colliding kebab route key.
        key: String,
    },
}

/// A precomposed handler: runs the captured chain over a request context.
pub type RouteHandler =
    Arc<dyn Fn(ServerContext) -> BoxFuture<'static, Result<Value, TangoError>> + Send + Sync>;

/// One flattened endpoint.
#[derive(Clone)]
pub struct RouteEntry {
    rpc_type: RpcType,
    handler: RouteHandler,
}

impl RouteEntry {
    /// Returns the endpoint's rpc type.
    #[must_use]
    pub fn rpc_type(&self) -> RpcType {
        self.rpc_type
    }

    /// Runs the precomposed chain over a request context.
    pub fn handle(&self, ctx: ServerContext) -> BoxFuture<'static, Result<Value, TangoError>> {
        (self.handler)(ctx)
    }
}

impl std::fmt::Debug for RouteEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteEntry")
            .field("rpc_type", &self.rpc_type)
            .finish_non_exhaustive()
    }
}

/// The immutable map from kebab route key to handler.
#[derive(Debug, Default)]
pub struct RouteTable {
    entries: HashMap<String, RouteEntry>,
}

impl RouteTable {
    /// Looks up a route key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RouteEntry> {
        self.entries.get(key)
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the registered route keys.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Flattens an API tree into a route table.
///
/// # Errors
///
/// Returns [`RouterError::DuplicateRoute`] when two endpoints normalize to
/// the same key.
pub fn flatten(api: Api) -> Result<RouteTable, RouterError> {
    let mut entries = HashMap::new();
    walk(api, &mut Vec::new(), &[], &mut entries)?;
    Ok(RouteTable { entries })
}

fn walk(
    api: Api,
    segments: &mut Vec<String>,
    prefix: &[ServerStage],
    out: &mut HashMap<String, RouteEntry>,
) -> Result<(), RouterError> {
    let (children, own_middleware) = api.into_parts();

    let mut accumulated = prefix.to_vec();
    accumulated.extend(own_middleware);

    for (name, node) in children {
        match node {
            ApiNode::Branch(branch) => {
                segments.push(name);
                walk(branch, segments, &accumulated, out)?;
                segments.pop();
            }
            ApiNode::Endpoint(endpoint) => {
                let key = if segments.is_empty() {
                    kebab(&name)
                } else {
                    let mut key = segments.iter().map(|s| kebab(s)).collect::<Vec<_>>().join(".");
                    key.push('.');
                    key.push_str(&kebab(&name));
                    key
                };
                if out.contains_key(&key) {
                    return Err(RouterError::DuplicateRoute { key });
                }

                let (rpc_type, implementation, schema, endpoint_middleware) =
                    endpoint.into_parts();

                let mut stages = accumulated.clone();
                stages.extend(endpoint_middleware);
                stages.push(Arc::new(Terminal {
                    schema,
                    implementation,
                }));
                let stages: Arc<[ServerStage]> = Arc::from(stages);

                let handler: RouteHandler =
                    Arc::new(move |ctx| Next::new(stages.clone()).run(ctx));
                out.insert(key, RouteEntry { rpc_type, handler });
            }
        }
    }
    Ok(())
}

/// The chain's final stage: schema, then implementation.
struct Terminal {
    schema: Option<Arc<dyn Schema>>,
    implementation: Implementation,
}

impl Middleware<ServerContext, TangoError> for Terminal {
    fn name(&self) -> &'static str {
        "terminal"
    }

    fn handle(
        self: Arc<Self>,
        ctx: ServerContext,
        _next: Next<ServerContext, TangoError>,
    ) -> BoxFuture<'static, Result<Value, TangoError>> {
        Box::pin(async move {
            let args = ctx.args();
            let args = match &self.schema {
                Some(schema) => schema.parse(args).map_err(TangoError::Validation)?,
                None => args,
            };
            ctx.set_args(args.clone());
            (self.implementation)(args, ctx.clone()).await
        })
    }
}
