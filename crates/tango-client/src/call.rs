//! Per-call assembly.
//!
//! A [`CallBuilder`] accumulates path segments and per-call options, then
//! materializes the call on one of the six terminal methods: `query`,
//! `command`, `get`, or their `_ctx` variants. Each call composes the
//! middleware chain registered for its path — global list first, then each
//! prefix in ascending depth order — and appends the transport terminal.

use std::sync::Arc;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use tokio_util::sync::CancellationToken;

use tango_core::{Args, RpcType, Value};
use tango_middleware::run;

use crate::context::ClientContext;
use crate::error::ClientError;
use crate::progress::{Progress, ProgressCallback};
use crate::transport::Transport;
use crate::TangoClient;

/// Builds and dispatches one call.
///
/// # Example
///
/// ```ignore
/// let profile = client
///     .call()
///     .at("users")
///     .at("getProfile")
///     .query(args)
///     .await?;
/// ```
#[must_use]
pub struct CallBuilder<'a> {
    client: &'a TangoClient,
    path: Vec<String>,
    headers: HeaderMap,
    abort: Option<CancellationToken>,
    on_progress: Option<ProgressCallback>,
}

impl<'a> CallBuilder<'a> {
    pub(crate) fn new(client: &'a TangoClient) -> Self {
        Self {
            client,
            path: Vec::new(),
            headers: client.default_headers().clone(),
            abort: None,
            on_progress: None,
        }
    }

    /// Appends a path segment, using its original (pre-kebab) identifier.
    pub fn at(mut self, segment: impl Into<String>) -> Self {
        self.path.push(segment.into());
        self
    }

    /// Sets a request header for this call.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Installs a progress hook, switching the transport to the streaming
    /// path.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    /// Attaches an abort token honoured before and during dispatch.
    pub fn abort(mut self, token: CancellationToken) -> Self {
        self.abort = Some(token);
        self
    }

    /// Performs a `query` call and returns the decoded result.
    pub async fn query(self, args: Args) -> Result<Value, ClientError> {
        let ctx = self.invoke(RpcType::Query, args).await?;
        Ok(ctx.result().unwrap_or(Value::Nil))
    }

    /// Performs a `command` call and returns the decoded result.
    pub async fn command(self, args: Args) -> Result<Value, ClientError> {
        let ctx = self.invoke(RpcType::Command, args).await?;
        Ok(ctx.result().unwrap_or(Value::Nil))
    }

    /// Performs a `get` call and returns the decoded result.
    pub async fn get(self, args: Args) -> Result<Value, ClientError> {
        let ctx = self.invoke(RpcType::Get, args).await?;
        Ok(ctx.result().unwrap_or(Value::Nil))
    }

    /// Performs a `query` call and returns the populated context.
    pub async fn query_ctx(self, args: Args) -> Result<ClientContext, ClientError> {
        self.invoke(RpcType::Query, args).await
    }

    /// Performs a `command` call and returns the populated context.
    pub async fn command_ctx(self, args: Args) -> Result<ClientContext, ClientError> {
        self.invoke(RpcType::Command, args).await
    }

    /// Performs a `get` call and returns the populated context.
    pub async fn get_ctx(self, args: Args) -> Result<ClientContext, ClientError> {
        self.invoke(RpcType::Get, args).await
    }

    async fn invoke(self, rpc_type: RpcType, args: Args) -> Result<ClientContext, ClientError> {
        let ctx = ClientContext::new(
            self.path.clone(),
            rpc_type,
            args,
            self.headers,
            self.abort,
            self.on_progress,
        );

        let mut stages = self.client.middleware().chain_for(&self.path);
        stages.push(Arc::new(Transport {
            http: self.client.http().clone(),
            base_url: self.client.base_url().clone(),
        }));

        run(ctx.clone(), &stages).await?;
        Ok(ctx)
    }
}
