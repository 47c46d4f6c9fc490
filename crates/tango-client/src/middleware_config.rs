//! Client middleware registration.
//!
//! Middleware lives in an out-of-band map from kebab route key to stage
//! list, never on the call surface itself. The empty key holds global
//! middleware; deeper keys hold group- and endpoint-level middleware. The
//! effective chain for a call is the global list followed by each prefix's
//! list in ascending depth order, with append semantics within each key.

use std::collections::HashMap;
use std::sync::Arc;

use tango_middleware::{Middleware, Stage};
use tango_router::route_key;

use crate::context::ClientContext;
use crate::error::ClientError;

/// A pipeline stage on the client side.
pub type ClientStage = Stage<ClientContext, ClientError>;

/// The map from kebab route key to middleware list.
///
/// Mutate during setup, before the first call; the client reads it when
/// assembling each call's chain.
///
/// # Example
///
/// ```ignore
/// let mut config = MiddlewareConfig::new();
/// config.global(logger);
/// config.at("posts", group_logger);
/// config.at("posts.createPost", endpoint_logger);
/// ```
#[derive(Default, Clone)]
pub struct MiddlewareConfig {
    map: HashMap<String, Vec<ClientStage>>,
}

impl MiddlewareConfig {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends middleware applying to every call.
    pub fn global<M>(&mut self, middleware: M) -> &mut Self
    where
        M: Middleware<ClientContext, ClientError>,
    {
        self.append("", Arc::new(middleware));
        self
    }

    /// Appends middleware under a dotted path of original identifiers.
    ///
    /// The path is kebab-normalized per segment: `"posts.createPost"`
    /// registers under `posts.create-post`. A one-segment path attaches at
    /// group level; the full path attaches at endpoint level.
    pub fn at<M>(&mut self, path: &str, middleware: M) -> &mut Self
    where
        M: Middleware<ClientContext, ClientError>,
    {
        let key = route_key(path.split('.'));
        self.append(&key, Arc::new(middleware));
        self
    }

    fn append(&mut self, key: &str, stage: ClientStage) {
        self.map.entry(key.to_owned()).or_default().push(stage);
    }

    /// Assembles the chain for a call path: global, then each prefix in
    /// ascending depth order.
    #[must_use]
    pub fn chain_for(&self, path: &[String]) -> Vec<ClientStage> {
        let mut chain = Vec::new();
        if let Some(stages) = self.map.get("") {
            chain.extend(stages.iter().cloned());
        }
        for depth in 1..=path.len() {
            let key = route_key(&path[..depth]);
            if let Some(stages) = self.map.get(&key) {
                chain.extend(stages.iter().cloned());
            }
        }
        chain
    }

    /// Returns the number of keys with registered middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if no middleware is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl std::fmt::Debug for MiddlewareConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.map.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("MiddlewareConfig").field("keys", &keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tango_middleware::from_fn;

    fn stage(label: &'static str) -> impl Middleware<ClientContext, ClientError> {
        from_fn(label, |ctx: ClientContext, next| next.run(ctx))
    }

    fn names(chain: &[ClientStage]) -> Vec<&'static str> {
        chain.iter().map(|stage| stage.name()).collect()
    }

    #[test]
    fn test_chain_order_global_then_prefixes() {
        let mut config = MiddlewareConfig::new();
        config.at("posts.createPost", stage("endpoint"));
        config.global(stage("global"));
        config.at("posts", stage("group"));

        let path = vec!["posts".to_string(), "createPost".to_string()];
        assert_eq!(names(&config.chain_for(&path)), vec!["global", "group", "endpoint"]);
    }

    #[test]
    fn test_append_semantics_within_a_key() {
        let mut config = MiddlewareConfig::new();
        config.global(stage("first"));
        config.global(stage("second"));

        let path = vec!["ping".to_string()];
        assert_eq!(names(&config.chain_for(&path)), vec!["first", "second"]);
    }

    #[test]
    fn test_keys_are_kebab_normalized() {
        let mut config = MiddlewareConfig::new();
        config.at("userAccounts.getToken", stage("mw"));

        let path = vec!["userAccounts".to_string(), "getToken".to_string()];
        assert_eq!(names(&config.chain_for(&path)), vec!["mw"]);
    }

    #[test]
    fn test_unrelated_prefixes_do_not_apply() {
        let mut config = MiddlewareConfig::new();
        config.at("posts", stage("posts"));

        let path = vec!["users".to_string(), "getProfile".to_string()];
        assert!(config.chain_for(&path).is_empty());
    }
}
