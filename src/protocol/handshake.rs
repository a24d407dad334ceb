//! WebSocket opening handshake, server side (RFC 6455 Section 4.2).
//!
//! [`validate_request`] applies the upgrade checks in a fixed order and
//! returns the negotiated parameters; [`HandshakeResponse`] renders the
//! `101 Switching Protocols` reply.

use crate::error::{Error, Result};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version this server speaks.
pub const WS_VERSION: &str = "13";

/// HTTP protocol version of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

impl HttpVersion {
    pub const HTTP_10: Self = Self::new(1, 0);
    pub const HTTP_11: Self = Self::new(1, 1);

    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse an `HTTP/x.y` token.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let (major, minor) = token.strip_prefix("HTTP/")?.split_once('.')?;
        Some(Self::new(major.parse().ok()?, minor.parse().ok()?))
    }

    /// Equivalent of "protocol at least major.minor".
    #[must_use]
    pub fn at_least(&self, major: u8, minor: u8) -> bool {
        *self >= Self::new(major, minor)
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

/// Read-only view of an inbound HTTP request head.
pub trait RequestHead {
    /// Request method, e.g. `GET`.
    fn method(&self) -> &str;

    /// Protocol version of the request line.
    fn version(&self) -> HttpVersion;

    /// Case-insensitive single-value header lookup.
    fn header(&self, name: &str) -> Option<&str>;
}

/// Parameters agreed during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    /// The client's Sec-WebSocket-Key.
    pub key: String,
    /// Selected subprotocol; always empty, subprotocols are not supported.
    pub protocol: String,
    /// Selected extensions; always empty, offers are accepted and ignored.
    pub extensions: String,
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsgate::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

fn expect_header<R: RequestHead + ?Sized>(req: &R, name: &str, expected: &str) -> Result<()> {
    let value = req.header(name).unwrap_or("");
    if value != expected {
        return Err(Error::InvalidHandshake(format!(
            "Invalid {} header: {}",
            name, value
        )));
    }
    Ok(())
}

fn negotiate_protocol(value: Option<&str>) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Err(Error::InvalidHandshake(format!(
            "Unsupported WebSocket protocol: {}",
            v
        ))),
        _ => Ok(String::new()),
    }
}

fn negotiate_extensions(_value: Option<&str>) -> String {
    String::new()
}

/// Validate an upgrade request. The first failing check wins.
///
/// # Errors
///
/// Returns [`Error::InvalidHandshake`] if:
/// - the method is not `GET` or the version is below HTTP/1.1,
/// - `Upgrade` is not `websocket`, `Connection` is not `Upgrade`, or
///   `Sec-Fetch-Mode` is not `websocket`,
/// - `Sec-WebSocket-Version` does not contain `13`,
/// - a non-empty `Sec-WebSocket-Protocol` is requested,
/// - `Origin` is missing or empty,
/// - `Sec-WebSocket-Key` is missing or empty.
pub fn validate_request<R: RequestHead + ?Sized>(req: &R) -> Result<Negotiated> {
    if req.method() != "GET" {
        return Err(Error::InvalidHandshake(format!(
            "Invalid HTTP method: {}",
            req.method()
        )));
    }
    if !req.version().at_least(1, 1) {
        return Err(Error::InvalidHandshake(format!(
            "HTTP version must be at least 1.1, got {}",
            req.version()
        )));
    }

    expect_header(req, "Upgrade", "websocket")?;
    expect_header(req, "Connection", "Upgrade")?;
    expect_header(req, "Sec-Fetch-Mode", "websocket")?;

    let version = req.header("Sec-WebSocket-Version").unwrap_or("");
    if !version.contains(WS_VERSION) {
        return Err(Error::InvalidHandshake(format!(
            "Unsupported WebSocket version: {}",
            version
        )));
    }

    let protocol = negotiate_protocol(req.header("Sec-WebSocket-Protocol"))?;
    let extensions = negotiate_extensions(req.header("Sec-WebSocket-Extensions"));

    if req.header("Origin").is_none_or(str::is_empty) {
        return Err(Error::InvalidHandshake("Missing Origin header".into()));
    }

    let key = match req.header("Sec-WebSocket-Key") {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            return Err(Error::InvalidHandshake(
                "Missing Sec-WebSocket-Key header".into(),
            ));
        }
    };

    Ok(Negotiated {
        key,
        protocol,
        extensions,
    })
}

/// Validate that a header value does not contain CR or LF characters.
fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::InvalidHeaderValue {
            header: header_name.to_string(),
            reason: "contains CR or LF characters".to_string(),
        });
    }
    Ok(())
}

/// WebSocket handshake response from server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
    /// Sec-WebSocket-Protocol, written only if non-empty.
    pub protocol: String,
    /// Sec-WebSocket-Extensions, written only if non-empty.
    pub extensions: String,
}

impl HandshakeResponse {
    /// Build the response for negotiated parameters.
    pub fn from_negotiated(negotiated: &Negotiated) -> Self {
        Self {
            accept: compute_accept_key(&negotiated.key),
            protocol: negotiated.protocol.clone(),
            extensions: negotiated.extensions.clone(),
        }
    }

    /// Write the HTTP response to a buffer.
    ///
    /// # Errors
    /// Returns `Error::InvalidHeaderValue` if protocol or extensions contain CR/LF.
    pub fn write(&self, buf: &mut Vec<u8>) -> Result<()> {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());

        if !self.protocol.is_empty() {
            validate_header_value("Sec-WebSocket-Protocol", &self.protocol)?;
            buf.extend_from_slice(
                format!("Sec-WebSocket-Protocol: {}\r\n", self.protocol).as_bytes(),
            );
        }

        if !self.extensions.is_empty() {
            validate_header_value("Sec-WebSocket-Extensions", &self.extensions)?;
            buf.extend_from_slice(
                format!("Sec-WebSocket-Extensions: {}\r\n", self.extensions).as_bytes(),
            );
        }

        buf.extend_from_slice(b"\r\n");
        Ok(())
    }
}
