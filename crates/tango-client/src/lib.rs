//! Client side of the Tango RPC framework.
//!
//! A [`TangoClient`] holds the base URL, the HTTP client, and the
//! middleware configuration. Calls are assembled with [`CallBuilder`]:
//! path segments accumulate on property-style `at` calls, and one of the
//! six terminal methods (`query`, `command`, `get`, or their `_ctx`
//! variants) materializes the call through the middleware chain and the
//! HTTP transport.
//!
//! ```ignore
//! let client = TangoClient::builder("http://localhost:8080/api").build()?;
//! let mut args = Args::new();
//! args.insert("page".into(), ArgValue::from(2i64));
//! let profile = client.call().at("users").at("getProfile").query(args).await?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod call;
pub mod context;
pub mod error;
pub mod middleware_config;
pub mod progress;
mod transport;

pub use call::CallBuilder;
pub use context::{ClientContext, ResponseHead};
pub use error::ClientError;
pub use middleware_config::{ClientStage, MiddlewareConfig};
pub use progress::{Progress, ProgressCallback, ProgressPhase};

use std::time::Duration;

use http::HeaderMap;
use reqwest::Url;

/// The Tango RPC client.
///
/// Construction validates the base URL; middleware is registered during
/// setup via [`TangoClientBuilder::middleware`] or
/// [`TangoClient::middleware_mut`], before the first call.
#[derive(Debug, Clone)]
pub struct TangoClient {
    base_url: Url,
    http: reqwest::Client,
    middleware: MiddlewareConfig,
    default_headers: HeaderMap,
}

impl TangoClient {
    /// Creates a client with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is not a valid absolute URL.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self, ClientError> {
        Self::builder(base_url).build()
    }

    /// Creates a client builder.
    #[must_use]
    pub fn builder(base_url: impl AsRef<str>) -> TangoClientBuilder {
        TangoClientBuilder::new(base_url)
    }

    /// Starts assembling a call.
    #[must_use]
    pub fn call(&self) -> CallBuilder<'_> {
        CallBuilder::new(self)
    }

    /// Returns the middleware configuration for mutation during setup.
    pub fn middleware_mut(&mut self) -> &mut MiddlewareConfig {
        &mut self.middleware
    }

    pub(crate) fn middleware(&self) -> &MiddlewareConfig {
        &self.middleware
    }

    pub(crate) fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn default_headers(&self) -> &HeaderMap {
        &self.default_headers
    }
}

/// Builder for [`TangoClient`].
#[derive(Default)]
pub struct TangoClientBuilder {
    base_url: String,
    timeout: Option<Duration>,
    middleware: MiddlewareConfig,
    default_headers: HeaderMap,
}

impl TangoClientBuilder {
    /// Creates a builder for the given base URL.
    #[must_use]
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self {
            base_url: base_url.as_ref().to_owned(),
            ..Self::default()
        }
    }

    /// Sets an opt-in request timeout. None by default: the framework
    /// imposes no timeouts of its own.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Adds a header sent with every call (callers may override per call).
    #[must_use]
    pub fn default_header(mut self, name: http::header::HeaderName, value: http::HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Configures middleware during setup.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = TangoClient::builder(base)
    ///     .middleware(|cfg| {
    ///         cfg.global(logger);
    ///         cfg.at("posts", group_logger);
    ///     })
    ///     .build()?;
    /// ```
    #[must_use]
    pub fn middleware(mut self, configure: impl FnOnce(&mut MiddlewareConfig)) -> Self {
        configure(&mut self.middleware);
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client
    /// cannot be constructed.
    pub fn build(self) -> Result<TangoClient, ClientError> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|e| ClientError::InvalidBaseUrl(format!("{}: {e}", self.base_url)))?;

        let mut http = reqwest::Client::builder();
        if let Some(timeout) = self.timeout {
            http = http.timeout(timeout);
        }
        let http = http.build()?;

        Ok(TangoClient {
            base_url,
            http,
            middleware: self.middleware,
            default_headers: self.default_headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let result = TangoClient::new("not a url");
        assert!(matches!(result, Err(ClientError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_builder_accepts_absolute_url() {
        let client = TangoClient::builder("http://localhost:8080/api")
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/api");
    }
}
