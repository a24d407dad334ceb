//! Minimal HTTP/1.x request reader for plain socket servers.
//!
//! [`HttpRequest`] reads one request head off a raw stream and implements
//! [`UpgradeRequest`], so a bare `TcpListener` can hand connections straight
//! to an [`Upgrader`](crate::Upgrader) without an HTTP framework.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{HttpVersion, RequestHead};
use crate::upgrade::{Hijacked, UpgradeRequest};

/// Headers that must not appear more than once in an upgrade request.
const SINGLETON_HEADERS: [&str; 5] = [
    "host",
    "upgrade",
    "connection",
    "sec-websocket-key",
    "sec-websocket-version",
];

const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Parse header lines into a map keyed by lowercase name.
///
/// Parsing stops at the first empty line. Lines without a colon are skipped.
///
/// # Errors
/// Returns `Error::InvalidHandshake` if a singleton header is duplicated.
fn parse_headers<'a, I>(lines: I) -> Result<HashMap<String, String>>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers: HashMap<String, String> = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name_lower = name.trim().to_ascii_lowercase();
            if SINGLETON_HEADERS.contains(&name_lower.as_str()) && headers.contains_key(&name_lower)
            {
                return Err(Error::InvalidHandshake(format!(
                    "Duplicate header: {}",
                    name.trim()
                )));
            }
            headers.insert(name_lower, value.trim().to_string());
        }
    }

    Ok(headers)
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|window| window == HEAD_TERMINATOR)
        .map(|pos| pos + HEAD_TERMINATOR.len())
}

/// An HTTP request head read directly from a stream.
#[derive(Debug)]
pub struct HttpRequest<S> {
    method: String,
    target: String,
    version: HttpVersion,
    headers: HashMap<String, String>,
    stream: Option<S>,
    buffered: Bytes,
}

impl<S> HttpRequest<S> {
    /// Request target, e.g. `/chat`.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.target
    }

    /// Returns `true` once the stream has been taken by [`hijack`](UpgradeRequest::hijack).
    #[must_use]
    pub fn is_hijacked(&self) -> bool {
        self.stream.is_none()
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> HttpRequest<S> {
    /// Read a request head from `stream`.
    ///
    /// Bytes received after the blank line are kept and handed over with the
    /// stream on hijack.
    ///
    /// ## Errors
    ///
    /// - `Error::HandshakeTooLarge` if no complete head fits in
    ///   `limits.max_handshake_size`
    /// - `Error::InvalidHandshake` if the request line or headers are malformed
    /// - `Error::ConnectionClosed` if the peer disconnects first
    pub async fn read(mut stream: S, limits: &Limits) -> Result<Self> {
        let mut buf = BytesMut::with_capacity(1024);
        let head_end = loop {
            if let Some(end) = find_head_end(&buf) {
                break end;
            }
            limits.check_handshake_size(buf.len())?;
            if stream.read_buf(&mut buf).await? == 0 {
                return Err(Error::ConnectionClosed);
            }
        };
        limits.check_handshake_size(head_end)?;

        let head = buf.split_to(head_end);
        let text = std::str::from_utf8(&head)
            .map_err(|_| Error::InvalidHandshake("Request head is not valid UTF-8".into()))?;
        let mut lines = text.split("\r\n");

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty request".into()))?;
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let [method, target, version] = parts[..] else {
            return Err(Error::InvalidHandshake("Invalid request line".into()));
        };
        let version = HttpVersion::parse(version).ok_or_else(|| {
            Error::InvalidHandshake(format!("Invalid HTTP version: {}", version))
        })?;

        Ok(Self {
            method: method.to_string(),
            target: target.to_string(),
            version,
            headers: parse_headers(lines)?,
            stream: Some(stream),
            buffered: buf.freeze(),
        })
    }

    /// Answer with a plain-text error response and close the stream.
    ///
    /// Used after a failed upgrade; does nothing if the stream has already
    /// been hijacked.
    pub async fn reject(mut self, status: u16, reason: &str) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let response = format!(
            "HTTP/1.1 {status} {reason}\r\n\
             Content-Type: text/plain; charset=utf-8\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n\
             {reason}",
            reason.len()
        );
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

impl<S> RequestHead for HttpRequest<S> {
    fn method(&self) -> &str {
        &self.method
    }

    fn version(&self) -> HttpVersion {
        self.version
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

impl<S> UpgradeRequest for HttpRequest<S>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Stream = S;

    fn hijack(&mut self) -> std::io::Result<Hijacked<S>> {
        let stream = self
            .stream
            .take()
            .ok_or_else(|| std::io::Error::other("stream already hijacked"))?;
        Ok(Hijacked {
            stream,
            buffered: std::mem::take(&mut self.buffered),
        })
    }
}

/// Map a failed upgrade to the HTTP status it should be answered with.
#[must_use]
pub fn status_for(error: &Error) -> (u16, &'static str) {
    match error {
        Error::AdmissionRejected { .. } => (503, "Service Unavailable"),
        Error::HandshakeTooLarge { .. } => (431, "Request Header Fields Too Large"),
        Error::Io(_) | Error::ConnectionClosed => (500, "Internal Server Error"),
        _ => (400, "Bad Request"),
    }
}
