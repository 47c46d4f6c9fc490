//! HTTP server harness.
//!
//! Wraps an [`RpcHandler`] in a hyper http1 listener loop: accepts
//! connections, collects request bodies, strips the configured base path to
//! produce the route string, and serves until a shutdown signal drains the
//! in-flight connections.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::dispatch::RpcHandler;
use crate::respond::plain_error;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Errors produced by the server harness.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured address could not be bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// An I/O failure while serving.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The Tango HTTP server.
///
/// # Example
///
/// ```ignore
/// let handler = RpcHandler::new(api)?;
/// let config = ServerConfig::builder().http_addr("0.0.0.0:8080").build();
/// Server::new(config, handler).run().await?;
/// ```
pub struct Server {
    config: ServerConfig,
    handler: Arc<RpcHandler>,
}

impl Server {
    /// Creates a server from a configuration and a compiled handler.
    #[must_use]
    pub fn new(config: ServerConfig, handler: RpcHandler) -> Self {
        Self {
            config,
            handler: Arc::new(handler),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds the listener, returning a [`BoundServer`].
    ///
    /// Binding separately from serving lets tests use port 0 and read the
    /// assigned address.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured address is invalid or cannot be
    /// bound.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("invalid address '{}': {e}", self.config.http_addr()))
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, base_path = self.config.base_path(), "server listening");

        Ok(BoundServer {
            config: self.config,
            handler: self.handler,
            listener,
            local_addr,
        })
    }

    /// Runs the server until SIGINT/SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the listener breaks.
    pub async fn run(self) -> Result<(), ServerError> {
        let shutdown = ShutdownSignal::with_os_signals();
        self.run_with_shutdown(shutdown).await
    }

    /// Runs the server until the given shutdown signal fires.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or the listener breaks.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await
    }
}

/// A server whose listener is bound and ready to serve.
pub struct BoundServer {
    config: ServerConfig,
    handler: Arc<RpcHandler>,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BoundServer {
    /// Returns the bound address (useful with port 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accepts connections until the shutdown signal fires, then waits for
    /// in-flight connections to drain (bounded by the shutdown timeout).
    ///
    /// # Errors
    ///
    /// Returns an error on listener failure.
    pub async fn serve(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let tracker = ConnectionTracker::new();
        let base_path: Arc<str> = Arc::from(self.config.base_path());
        let request_timeout = self.config.request_timeout();

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, remote_addr)) => {
                            let handler = Arc::clone(&self.handler);
                            let base_path = Arc::clone(&base_path);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req: Request<Incoming>| {
                                    let handler = Arc::clone(&handler);
                                    let base_path = Arc::clone(&base_path);
                                    async move {
                                        handle_request(&handler, &base_path, request_timeout, req)
                                            .await
                                    }
                                });
                                let conn = http1::Builder::new().serve_connection(io, service);
                                tokio::select! {
                                    result = conn => {
                                        if let Err(error) = result {
                                            tracing::debug!(%remote_addr, %error, "connection error");
                                        }
                                    }
                                    () = shutdown.recv() => {}
                                }
                                drop(token);
                            });
                        }
                        Err(error) => tracing::error!(%error, "failed to accept connection"),
                    }
                }

                () = shutdown.recv() => {
                    tracing::info!("shutdown signal received");
                    break;
                }
            }
        }

        let timeout = self.config.shutdown_timeout();
        tokio::select! {
            () = tracker.wait_for_drain() => {
                tracing::info!("all connections closed");
            }
            () = tokio::time::sleep(timeout) => {
                tracing::warn!(
                    active = tracker.active_connections(),
                    "shutdown timeout reached with connections still active"
                );
            }
        }
        Ok(())
    }
}

/// Collects the body, extracts the route string, and dispatches.
async fn handle_request(
    handler: &RpcHandler,
    base_path: &str,
    request_timeout: Option<std::time::Duration>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    let Some(route) = route_from_path(base_path, parts.uri.path()) else {
        return Ok(plain_error(StatusCode::NOT_FOUND, "RPC method not found"));
    };
    let route = route.to_owned();

    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            tracing::error!(%error, "failed to read request body");
            return Ok(plain_error(StatusCode::BAD_REQUEST, "Failed to read request body"));
        }
    };

    let request = Request::from_parts(parts, body);
    let dispatched = handler.dispatch(request, &route);

    let response = match request_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, dispatched).await {
            Ok(response) => response,
            Err(_) => {
                tracing::warn!(route, "request timed out");
                plain_error(StatusCode::GATEWAY_TIMEOUT, "Request timed out")
            }
        },
        None => dispatched.await,
    };
    Ok(response)
}

/// Strips the base path and the leading slash from a request path.
///
/// Returns `None` when the path does not live under the base path.
fn route_from_path<'a>(base_path: &str, path: &'a str) -> Option<&'a str> {
    let tail = path.strip_prefix(base_path)?;
    let route = tail.strip_prefix('/').unwrap_or(tail);
    if route.is_empty() {
        None
    } else {
        Some(route)
    }
}
