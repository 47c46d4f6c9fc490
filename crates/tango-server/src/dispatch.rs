//! The per-request dispatcher.
//!
//! [`RpcHandler`] owns the flattened route table and runs the per-request
//! contract, in order: method gate, route lookup, method/rpc-type
//! compatibility, per-type argument parsing, context construction, pipeline
//! execution, response serialization.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;

use tango_core::context::default_context_factory;
use tango_core::schema::issues_to_value;
use tango_core::{
    Args, ContextFactory, RpcType, ServerContext, TangoError, VALIDATION_ERROR_HEADER,
};
use tango_router::{flatten, Api, RouteTable, RouterError};

use crate::args::{parse_command_args, parse_get_args, parse_query_args};
use crate::respond::{insert_execution_time, plain_error, serialize_response, wants_json};

/// The compiled request handler.
///
/// Built once from an API definition; the flattened table is immutable
/// afterwards and safe to share across concurrent requests.
///
/// # Example
///
/// ```ignore
/// let api = Api::new().nest("users", Api::new().endpoint("getProfile", profile));
/// let handler = RpcHandler::new(api)?;
/// let response = handler.dispatch(request, "users.get-profile").await;
/// ```
#[derive(Clone)]
pub struct RpcHandler {
    table: Arc<RouteTable>,
    context_factory: ContextFactory,
}

impl RpcHandler {
    /// Flattens an API definition into a handler.
    ///
    /// # Errors
    ///
    /// Returns an error when two endpoints normalize to the same route key.
    pub fn new(api: Api) -> Result<Self, RouterError> {
        Ok(Self {
            table: Arc::new(flatten(api)?),
            context_factory: default_context_factory(),
        })
    }

    /// Replaces the context factory.
    ///
    /// The factory receives the parsed args and the request head; use it to
    /// seed `env` or attach a host adapter handle for middleware.
    #[must_use]
    pub fn with_context_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(Args, &http::request::Parts) -> ServerContext + Send + Sync + 'static,
    {
        self.context_factory = Arc::new(factory);
        self
    }

    /// Returns the flattened route table.
    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Dispatches one request.
    ///
    /// `route` is the host-supplied path string, already stripped of the
    /// base URL — the dot-joined kebab route key.
    pub async fn dispatch(&self, req: Request<Bytes>, route: &str) -> Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();

        if parts.method != Method::GET && parts.method != Method::POST {
            return plain_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed");
        }

        let Some(entry) = self.table.get(route) else {
            tracing::debug!(route, "route not found");
            return plain_error(StatusCode::NOT_FOUND, "RPC method not found");
        };

        let rpc_type = entry.rpc_type();
        if !rpc_type.accepts(&parts.method) {
            let error = TangoError::RpcTypeMismatch {
                method: parts.method.clone(),
                rpc_type,
            };
            return plain_error(StatusCode::METHOD_NOT_ALLOWED, &error.to_string());
        }

        let args = match self.parse_args(rpc_type, &parts, body).await {
            Ok(args) => args,
            Err(error) => return error_response(&error),
        };

        let ctx = (self.context_factory)(args, &parts);
        let json = wants_json(&parts.headers);

        tracing::debug!(route, rpc_type = %rpc_type, "dispatching");
        match entry.handle(ctx.clone()).await {
            Ok(value) => serialize_response(&ctx, &value, &parts.method, json),
            Err(TangoError::Validation(issues)) => {
                ctx.insert_response_header(
                    HeaderName::from_static(VALIDATION_ERROR_HEADER),
                    HeaderValue::from_static("true"),
                );
                ctx.set_cache_seconds(0.0);
                ctx.set_status(StatusCode::UNPROCESSABLE_ENTITY);
                serialize_response(&ctx, &issues_to_value(&issues), &parts.method, json)
            }
            Err(error) => {
                tracing::error!(route, error = %display_chain(&error), "handler failed");
                let mut response = plain_error(StatusCode::INTERNAL_SERVER_ERROR, "");
                insert_execution_time(response.headers_mut(), &ctx);
                response
            }
        }
    }

    async fn parse_args(
        &self,
        rpc_type: RpcType,
        parts: &http::request::Parts,
        body: Bytes,
    ) -> Result<Args, TangoError> {
        match rpc_type {
            RpcType::Get => parse_get_args(parts.uri.query()),
            RpcType::Query => parse_query_args(parts.uri.query()),
            RpcType::Command => {
                let content_type = parts
                    .headers
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok());
                parse_command_args(content_type, body).await
            }
        }
    }
}

impl std::fmt::Debug for RpcHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcHandler")
            .field("routes", &self.table.len())
            .finish_non_exhaustive()
    }
}

/// Converts an argument-parsing error into its HTTP response.
fn error_response(error: &TangoError) -> Response<Full<Bytes>> {
    plain_error(error.status_code(), &error.to_string())
}

fn display_chain(error: &TangoError) -> String {
    match error {
        TangoError::Internal { source } => format!("{error}: {source:#}"),
        other => other.to_string(),
    }
}
