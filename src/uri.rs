//! WebSocket URIs (`ws://` and `wss://`, RFC 6455 Section 3).

use std::fmt;
use std::str::FromStr;

use url::{Position, Url};

use crate::error::{Error, Result};

/// A parsed and validated WebSocket URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WsUri {
    url: Url,
}

impl WsUri {
    /// Parse a `ws` or `wss` URI.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidUri` if the text is not a URI, the scheme is not
    /// `ws`/`wss`, the host is missing, or a fragment is present.
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input).map_err(|e| Error::InvalidUri(format!("{input}: {e}")))?;

        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(Error::InvalidUri(format!(
                    "Unsupported scheme: {other}"
                )));
            }
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(Error::InvalidUri(format!("Missing host: {input}")));
        }
        if url.fragment().is_some() {
            return Err(Error::InvalidUri(format!(
                "Fragments are not allowed: {input}"
            )));
        }

        Ok(Self { url })
    }

    /// Whether the scheme is `wss`.
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.url.scheme() == "wss"
    }

    /// Host name or address literal.
    #[must_use]
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Port, defaulting to 80 for `ws` and 443 for `wss`.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.url
            .port_or_known_default()
            .unwrap_or(if self.is_secure() { 443 } else { 80 })
    }

    /// Value for the `Host` header; the port is omitted when it is the default.
    #[must_use]
    pub fn host_header(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{port}", self.host()),
            None => self.host().to_string(),
        }
    }

    /// Request target: path plus `?query`, never empty.
    #[must_use]
    pub fn resource(&self) -> String {
        let resource = &self.url[Position::BeforePath..Position::AfterQuery];
        if resource.is_empty() {
            "/".to_string()
        } else {
            resource.to_string()
        }
    }

    /// `host:port` for `TcpStream::connect`.
    #[must_use]
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host(), self.port())
    }

    #[must_use]
    pub fn as_url(&self) -> &Url {
        &self.url
    }
}

impl FromStr for WsUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for WsUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.url, f)
    }
}
