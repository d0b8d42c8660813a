use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::types::ChainId;

/// Wire transport used to talk to an RPC node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Transport {
    Http,
    WebSocket,
}

impl Transport {
    /// Name of the capability, used in "not supported" errors.
    pub fn capability(&self) -> &'static str {
        match self {
            Self::Http => "http provider",
            Self::WebSocket => "web socket provider",
        }
    }

    /// Transport implied by a URL scheme.
    pub fn from_url(url: &Url) -> Result<Self> {
        match url.scheme() {
            "http" | "https" => Ok(Self::Http),
            "ws" | "wss" => Ok(Self::WebSocket),
            other => Err(Error::invalid_configuration(format!(
                "unsupported RPC url scheme '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => write!(f, "http"),
            Self::WebSocket => write!(f, "websocket"),
        }
    }
}

/// Transports a source can hand out for one chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSupport {
    pub http: bool,
    pub web_socket: bool,
}

impl ClientSupport {
    pub fn only(transport: Transport) -> Self {
        Self::default().with(transport)
    }

    pub fn with(mut self, transport: Transport) -> Self {
        match transport {
            Transport::Http => self.http = true,
            Transport::WebSocket => self.web_socket = true,
        }
        self
    }

    pub fn supports(&self, transport: Transport) -> bool {
        match transport {
            Transport::Http => self.http,
            Transport::WebSocket => self.web_socket,
        }
    }

    pub fn supports_any(&self) -> bool {
        self.http || self.web_socket
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            http: self.http || other.http,
            web_socket: self.web_socket || other.web_socket,
        }
    }
}

/// Where and how to reach an RPC node for a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcEndpoint {
    pub chain_id: ChainId,
    pub url: Url,
    pub transport: Transport,
}

/// Parse an RPC url, mapping failures to a configuration error.
pub fn parse_rpc_url(raw: &str) -> Result<Url> {
    Url::parse(raw.trim())
        .map_err(|err| Error::invalid_configuration(format!("invalid RPC url '{}': {}", raw, err)))
}
