//! WebSocket opening handshake (RFC 6455 Section 4).
//!
//! The client side builds the upgrade request from a [`HandshakeContext`] and
//! validates the server's 101 response against it. The server side parses the
//! request into a [`HandshakeRequest`], validates it and answers with a
//! [`HandshakeResponse`]. Only the slice of HTTP/1.x the handshake needs is
//! implemented here: a start line plus case-insensitive headers.

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::rng::Entropy;
use crate::uri::WsUri;

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this crate speaks.
pub const WS_VERSION: u8 = 13;

/// Headers that may appear at most once in an upgrade request.
const SECURITY_HEADERS: [&str; 5] = [
    "host",
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
];

/// Parse HTTP headers into a map keyed by lowercase header name.
///
/// Repeated non-critical headers are folded into one comma-separated value.
///
/// # Errors
/// Returns `Error::InvalidHandshake` if a header in `unique` is duplicated or
/// a line is not a header.
fn parse_headers<'a, I>(lines: I, unique: &[&str]) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::InvalidHandshake(format!("Malformed header line: {line}")))?;
        let name_lower = name.trim().to_ascii_lowercase();
        let value = value.trim();

        match headers.get_mut(&name_lower) {
            Some(_) if unique.contains(&name_lower.as_str()) => {
                return Err(Error::InvalidHandshake(format!(
                    "Duplicate header: {}",
                    name.trim()
                )));
            }
            Some(existing) => {
                existing.push_str(", ");
                existing.push_str(value);
            }
            None => {
                headers.insert(name_lower, value.to_string());
            }
        }
    }

    Ok(headers)
}

/// Split a comma-separated header value into trimmed, non-empty items.
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether a comma-separated header value contains `token` (case-insensitive).
fn has_token(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|item| item.trim().eq_ignore_ascii_case(token))
}

/// Parse `HTTP/<major>.<minor>`.
fn parse_http_version(version: &str) -> Option<(u8, u8)> {
    let (name, number) = version.split_once('/')?;
    if name != "HTTP" {
        return None;
    }
    let (major, minor) = number.split_once('.')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

/// Require HTTP/1.1 or later.
fn require_http_11(version: &str) -> Result<()> {
    match parse_http_version(version) {
        Some(v) if v >= (1, 1) => Ok(()),
        _ => Err(Error::InvalidHandshake(format!(
            "Expected HTTP/1.1 or later, got {version}"
        ))),
    }
}

fn required<'h>(headers: &'h HashMap<String, String>, name: &str, display: &str) -> Result<&'h str> {
    headers
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidHandshake(format!("Missing {display} header")))
}

/// Check the `Upgrade` and `Connection` headers shared by request and response.
fn check_upgrade_headers(headers: &HashMap<String, String>) -> Result<()> {
    let upgrade = required(headers, "upgrade", "Upgrade")?;
    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Upgrade header: {upgrade}"
        )));
    }

    let connection = required(headers, "connection", "Connection")?;
    if !has_token(connection, "upgrade") {
        return Err(Error::InvalidHandshake(format!(
            "Invalid Connection header: {connection}"
        )));
    }
    Ok(())
}

/// Validate that a header value does not contain CR or LF characters.
///
/// # Errors
/// Returns `Error::InvalidHeaderValue` if the value contains `\r` or `\n`.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains(['\r', '\n']) {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

fn push_header(buf: &mut Vec<u8>, name: &str, value: &str) -> Result<()> {
    validate_header_value(name, value)?;
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(b"\r\n");
    Ok(())
}

/// Position just past the `\r\n\r\n` that ends an HTTP head, if present.
#[must_use]
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|window| window == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsync::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Generate a fresh Sec-WebSocket-Key: 16 random bytes, Base64 encoded.
pub fn generate_key(entropy: &mut dyn Entropy) -> String {
    let mut nonce = [0u8; 16];
    entropy.fill_bytes(&mut nonce);
    BASE64.encode(nonce)
}

/// Validate the Origin header against a list of allowed origins.
///
/// # Errors
/// Returns `Error::OriginNotAllowed` if `allowed` is not empty and `origin`
/// is missing or doesn't match any value.
///
/// If `allowed` is empty, any origin (or no origin) is accepted.
pub fn validate_origin(origin: Option<&str>, allowed: &[String]) -> Result<()> {
    if allowed.is_empty() {
        return Ok(());
    }

    match origin {
        Some(o) if allowed.iter().any(|a| a == o) => Ok(()),
        Some(o) => Err(Error::OriginNotAllowed {
            origin: o.to_string(),
        }),
        None => Err(Error::OriginNotAllowed {
            origin: "(none)".to_string(),
        }),
    }
}

/// Client-side handshake state, alive from the request until the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeContext {
    key: String,
    expected_accept: String,
    resource: String,
    host: String,
    origin: Option<String>,
    protocols: Vec<String>,
    extensions: Option<String>,
}

impl HandshakeContext {
    /// Prepare a handshake for `uri` with a freshly generated key.
    pub fn new(uri: &WsUri, config: &Config, entropy: &mut dyn Entropy) -> Self {
        let key = generate_key(entropy);
        Self {
            expected_accept: compute_accept_key(&key),
            key,
            resource: uri.resource(),
            host: uri.host_header(),
            origin: config.origin.clone(),
            protocols: config.protocols.clone(),
            extensions: config.extensions.clone(),
        }
    }

    /// The Sec-WebSocket-Key sent to the server.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The Sec-WebSocket-Accept value the server must answer with.
    pub fn expected_accept(&self) -> &str {
        &self.expected_accept
    }

    /// Request target: path plus query.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Write the upgrade request.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderValue` if a configured value contains CR/LF.
    pub fn write_request(&self, buf: &mut Vec<u8>) -> Result<()> {
        validate_header_value("Request-Target", &self.resource)?;
        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.resource).as_bytes());
        push_header(buf, "Host", &self.host)?;
        push_header(buf, "Upgrade", "websocket")?;
        push_header(buf, "Connection", "upgrade")?;
        push_header(buf, "Sec-WebSocket-Key", &self.key)?;
        push_header(buf, "Sec-WebSocket-Version", "13")?;

        if let Some(origin) = &self.origin {
            push_header(buf, "Origin", origin)?;
        }
        if !self.protocols.is_empty() {
            push_header(buf, "Sec-WebSocket-Protocol", &self.protocols.join(", "))?;
        }
        if let Some(extensions) = &self.extensions {
            push_header(buf, "Sec-WebSocket-Extensions", extensions)?;
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Check a parsed server response against this handshake.
    ///
    /// # Errors
    /// Returns `Error::InvalidHandshake` if the accept value is wrong, the
    /// server selected a subprotocol that was not requested, or it answered
    /// with extensions when none were offered.
    pub fn validate_response(&self, response: &HandshakeResponse) -> Result<()> {
        if response.accept != self.expected_accept {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Accept mismatch: expected {}, got {}",
                self.expected_accept, response.accept
            )));
        }

        if self.extensions.is_none() && !response.extensions.is_empty() {
            return Err(Error::InvalidHandshake(format!(
                "Server accepted unrequested extensions: {}",
                response.extensions.join(", ")
            )));
        }

        match &response.protocol {
            Some(protocol) if !self.protocols.contains(protocol) => {
                Err(Error::InvalidHandshake(format!(
                    "Server selected unrequested subprotocol: {protocol}"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Parsed WebSocket handshake request from client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request target (e.g., "/chat?room=1").
    pub path: String,
    /// The Host header value.
    pub host: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
    /// The Sec-WebSocket-Version (should be 13).
    pub version: u8,
    /// The Origin header value (optional).
    pub origin: Option<String>,
    /// The Sec-WebSocket-Protocol values (optional).
    pub protocols: Vec<String>,
    /// The Sec-WebSocket-Extensions values (optional).
    pub extensions: Vec<String>,
}

impl HandshakeRequest {
    /// Parse a WebSocket handshake request from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The request line is malformed or missing.
    /// - The HTTP method is not `GET`.
    /// - The HTTP version is older than `HTTP/1.1`.
    /// - A security-critical header is duplicated.
    /// - Any required headers are missing: `Upgrade`, `Connection`, `Host`, `Sec-WebSocket-Key`, `Sec-WebSocket-Version`.
    /// - The `Upgrade` header is not `websocket`.
    /// - The `Connection` header does not list `upgrade`.
    /// - The `Sec-WebSocket-Version` is not a valid integer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();

        // Request line: "GET /path HTTP/1.1"
        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty request".into()))?;

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let [method, path, version] = parts.as_slice() else {
            return Err(Error::InvalidHandshake("Invalid request line".into()));
        };

        if *method != "GET" {
            return Err(Error::InvalidHandshake(format!(
                "Expected GET method, got {method}"
            )));
        }
        require_http_11(version)?;

        let headers = parse_headers(lines, &SECURITY_HEADERS)?;
        check_upgrade_headers(&headers)?;

        let host = required(&headers, "host", "Host")?.to_string();
        let key = required(&headers, "sec-websocket-key", "Sec-WebSocket-Key")?.to_string();
        let version_str = required(&headers, "sec-websocket-version", "Sec-WebSocket-Version")?;
        let version: u8 = version_str
            .parse()
            .map_err(|_| Error::InvalidHandshake(format!("Invalid version: {version_str}")))?;

        let origin = headers.get("origin").cloned();
        let protocols = headers
            .get("sec-websocket-protocol")
            .map(|p| split_list(p))
            .unwrap_or_default();
        let extensions = headers
            .get("sec-websocket-extensions")
            .map(|e| split_list(e))
            .unwrap_or_default();

        Ok(Self {
            path: (*path).to_string(),
            host,
            key,
            version,
            origin,
            protocols,
            extensions,
        })
    }

    /// Parse a handshake request with size limit.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` if data exceeds max_size
    /// - Other handshake errors as per `parse()`
    pub fn parse_with_limit(data: &[u8], max_size: usize) -> Result<Self> {
        if data.len() > max_size {
            return Err(Error::HandshakeTooLarge {
                size: data.len(),
                max: max_size,
            });
        }
        Self::parse(data)
    }

    /// Validate the handshake request according to RFC 6455.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The WebSocket version is not 13.
    /// - The `Sec-WebSocket-Key` is not valid Base64.
    /// - The decoded `Sec-WebSocket-Key` is not exactly 16 bytes.
    /// - The `Host` header is empty.
    pub fn validate(&self) -> Result<()> {
        if self.version != WS_VERSION {
            return Err(Error::InvalidHandshake(format!(
                "Unsupported WebSocket version: {} (expected 13)",
                self.version
            )));
        }

        let decoded = BASE64.decode(&self.key).map_err(|_| {
            Error::InvalidHandshake("Invalid Sec-WebSocket-Key: not valid Base64".into())
        })?;
        if decoded.len() != 16 {
            return Err(Error::InvalidHandshake(format!(
                "Sec-WebSocket-Key must be 16 bytes, got {}",
                decoded.len()
            )));
        }

        if self.host.is_empty() {
            return Err(Error::InvalidHandshake(
                "Host header cannot be empty".into(),
            ));
        }

        Ok(())
    }
}

/// WebSocket handshake response from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// The selected Sec-WebSocket-Protocol (optional).
    pub protocol: Option<String>,
    /// The Sec-WebSocket-Extensions values (optional, never negotiated).
    pub extensions: Vec<String>,
}

impl HandshakeResponse {
    /// Create a handshake response for a validated request.
    ///
    /// Selects the first protocol requested by the client that appears in
    /// `supported`.
    pub fn from_request(req: &HandshakeRequest, supported: &[String]) -> Self {
        Self {
            accept: compute_accept_key(&req.key),
            protocol: req
                .protocols
                .iter()
                .find(|requested| supported.contains(*requested))
                .cloned(),
            extensions: Vec::new(),
        }
    }

    /// Write the HTTP response to a buffer.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderValue` if protocol or extensions contain CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        push_header(buf, "Upgrade", "websocket")?;
        push_header(buf, "Connection", "Upgrade")?;
        push_header(buf, "Sec-WebSocket-Accept", &self.accept)?;

        if let Some(proto) = &self.protocol {
            push_header(buf, "Sec-WebSocket-Protocol", proto)?;
        }
        for ext in &self.extensions {
            push_header(buf, "Sec-WebSocket-Extensions", ext)?;
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }

    /// Parse a WebSocket handshake response from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The response is empty or the status line is malformed.
    /// - The HTTP version is older than `HTTP/1.1`.
    /// - The status code is not `101`.
    /// - Any required headers are missing: `Upgrade`, `Connection`, `Sec-WebSocket-Accept`.
    /// - The `Upgrade` header is not `websocket`.
    /// - The `Connection` header does not list `upgrade`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();

        // Status line: "HTTP/1.1 101 Switching Protocols"
        let status_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty response".into()))?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        let status = parts.next().unwrap_or_default();
        require_http_11(version)?;
        if status != "101" {
            return Err(Error::InvalidHandshake(format!(
                "Expected 101 status, got: {status_line}"
            )));
        }

        let headers = parse_headers(lines, &[])?;
        check_upgrade_headers(&headers)?;

        let accept =
            required(&headers, "sec-websocket-accept", "Sec-WebSocket-Accept")?.to_string();
        let protocol = headers.get("sec-websocket-protocol").cloned();
        let extensions = headers
            .get("sec-websocket-extensions")
            .map(|e| split_list(e))
            .unwrap_or_default();

        Ok(Self {
            accept,
            protocol,
            extensions,
        })
    }
}
