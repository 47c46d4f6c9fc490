//! RPC call styles and their HTTP method mapping.

use http::Method;
use serde::{Deserialize, Serialize};

/// The three call styles an endpoint can declare.
///
/// The rpc type decides the HTTP verb and where the arguments travel:
///
/// | rpc type | verb | args |
/// |---|---|---|
/// | `Query` | GET | `args` query parameter, base64url(MessagePack) |
/// | `Command` | POST | request body, MessagePack (or JSON / multipart) |
/// | `Get` | GET | plain query string key/value pairs |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcType {
    /// Read-style call with structured arguments in the query string.
    Query,
    /// Write-style call with arguments in the request body.
    Command,
    /// Read-style call with plain string arguments, cacheable by URL.
    Get,
}

impl RpcType {
    /// Returns the HTTP method this rpc type travels over.
    #[must_use]
    pub const fn http_method(self) -> Method {
        match self {
            Self::Query | Self::Get => Method::GET,
            Self::Command => Method::POST,
        }
    }

    /// Returns true if `method` is allowed to invoke this rpc type.
    ///
    /// `GET` carries `query` and `get`; `POST` carries `command`.
    #[must_use]
    pub fn accepts(self, method: &Method) -> bool {
        match self {
            Self::Query | Self::Get => method == Method::GET,
            Self::Command => method == Method::POST,
        }
    }

    /// Returns the wire name of this rpc type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Command => "command",
            Self::Get => "get",
        }
    }
}

impl std::fmt::Display for RpcType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
