//! Nested API tree builders.
//!
//! An [`Api`] maps segment names to branches or endpoint descriptors.
//! Middleware attaches to a dedicated field on branches and endpoints — it
//! is never an entry in the child map, so walking the tree's shape never
//! observes it.

use std::future::Future;
use std::sync::Arc;

use indexmap::IndexMap;

use tango_core::{Args, RpcType, Schema, ServerContext, TangoError, Value};
use tango_middleware::{BoxFuture, Middleware, Stage};

/// A pipeline stage on the server side.
pub type ServerStage = Stage<ServerContext, TangoError>;

/// A type-erased endpoint implementation.
pub type Implementation =
    Arc<dyn Fn(Args, ServerContext) -> BoxFuture<'static, Result<Value, TangoError>> + Send + Sync>;

/// A leaf of the API tree: rpc type, implementation, optional schema, and
/// an attached middleware list.
///
/// Immutable once built except for the middleware list, which is appended
/// to during setup and captured by value at flattening.
pub struct Endpoint {
    rpc_type: RpcType,
    implementation: Implementation,
    schema: Option<Arc<dyn Schema>>,
    middleware: Vec<ServerStage>,
}

impl Endpoint {
    fn with_implementation<F, Fut>(rpc_type: RpcType, implementation: F) -> Self
    where
        F: Fn(Args, ServerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TangoError>> + Send + 'static,
    {
        Self {
            rpc_type,
            implementation: Arc::new(move |args, ctx| Box::pin(implementation(args, ctx))),
            schema: None,
            middleware: Vec::new(),
        }
    }

    /// Declares a `query` endpoint: GET, structured args in the URL.
    pub fn query<F, Fut>(implementation: F) -> Self
    where
        F: Fn(Args, ServerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TangoError>> + Send + 'static,
    {
        Self::with_implementation(RpcType::Query, implementation)
    }

    /// Declares a `command` endpoint: POST, args in the body.
    pub fn command<F, Fut>(implementation: F) -> Self
    where
        F: Fn(Args, ServerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TangoError>> + Send + 'static,
    {
        Self::with_implementation(RpcType::Command, implementation)
    }

    /// Declares a `get` endpoint: GET, plain string args in the query.
    pub fn get<F, Fut>(implementation: F) -> Self
    where
        F: Fn(Args, ServerContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, TangoError>> + Send + 'static,
    {
        Self::with_implementation(RpcType::Get, implementation)
    }

    /// Attaches a validation schema. Its failure becomes a 422 response.
    #[must_use]
    pub fn schema(mut self, schema: impl Schema + 'static) -> Self {
        self.schema = Some(Arc::new(schema));
        self
    }

    /// Appends a middleware stage to this endpoint.
    #[must_use]
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<ServerContext, TangoError>,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Returns the endpoint's rpc type.
    #[must_use]
    pub fn rpc_type(&self) -> RpcType {
        self.rpc_type
    }

    pub(crate) fn into_parts(
        self,
    ) -> (RpcType, Implementation, Option<Arc<dyn Schema>>, Vec<ServerStage>) {
        (self.rpc_type, self.implementation, self.schema, self.middleware)
    }
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("rpc_type", &self.rpc_type)
            .field("schema", &self.schema.is_some())
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// A node of the API tree: a branch or an endpoint.
#[derive(Debug)]
pub enum ApiNode {
    /// A named group of further nodes.
    Branch(Api),
    /// A callable leaf.
    Endpoint(Endpoint),
}

/// A nested API definition.
///
/// Entries keep definition order. Middleware attached to a branch applies
/// to every endpoint beneath it, ahead of deeper attachments.
///
/// # Example
///
/// ```ignore
/// let api = Api::new().nest(
///     "users",
///     Api::new().endpoint(
///         "getProfile",
///         Endpoint::query(|args, _ctx| async move { Ok(Value::from("profile")) }),
///     ),
/// );
/// ```
#[derive(Default)]
pub struct Api {
    entries: IndexMap<String, ApiNode>,
    middleware: Vec<ServerStage>,
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("entries", &self.entries)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl Api {
    /// Creates an empty API tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a named branch. The name is kebab-normalized at flattening.
    #[must_use]
    pub fn nest(mut self, name: impl Into<String>, api: Api) -> Self {
        self.entries.insert(name.into(), ApiNode::Branch(api));
        self
    }

    /// Adds a named endpoint.
    #[must_use]
    pub fn endpoint(mut self, name: impl Into<String>, endpoint: Endpoint) -> Self {
        self.entries.insert(name.into(), ApiNode::Endpoint(endpoint));
        self
    }

    /// Appends a middleware stage applying to everything beneath this node.
    #[must_use]
    pub fn middleware<M>(mut self, middleware: M) -> Self
    where
        M: Middleware<ServerContext, TangoError>,
    {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub(crate) fn into_parts(self) -> (IndexMap<String, ApiNode>, Vec<ServerStage>) {
        (self.entries, self.middleware)
    }
}
