//! Turning an HTTP request into a live [`Connection`].

use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::codec::{FrameReader, FrameWriter};
use crate::config::Config;
use crate::connection::{BoxedWriter, Connection, Handlers, read_loop};
use crate::error::{Error, Result};
use crate::protocol::{HandshakeResponse, RequestHead, validate_request};
use crate::registry::Registry;

/// The raw stream taken over from an HTTP server.
#[derive(Debug)]
pub struct Hijacked<S> {
    pub stream: S,
    /// Bytes the HTTP layer had already read past the request head. They are
    /// consumed before anything else from `stream`.
    pub buffered: Bytes,
}

impl<S> Hijacked<S> {
    #[must_use]
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffered: Bytes::new(),
        }
    }
}

/// An inbound HTTP request that can surrender its underlying stream.
pub trait UpgradeRequest: RequestHead {
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Take ownership of the connection's byte stream. After this the HTTP
    /// layer must not touch the stream again.
    fn hijack(&mut self) -> std::io::Result<Hijacked<Self::Stream>>;
}

/// Performs upgrades against a shared [`Registry`].
///
/// ## Example
///
/// ```rust,ignore
/// let upgrader = Upgrader::new(Config::default());
/// let request = HttpRequest::read(stream, &upgrader.config().limits).await?;
/// let conn = upgrader.upgrade(&mut request, Handlers::new()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct Upgrader {
    config: Arc<Config>,
    registry: Arc<Registry>,
}

impl Upgrader {
    /// Upgrader with a fresh registry sized by `config.limits.max_connections`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(Registry::new(config.limits.max_connections));
        Self::with_registry(config, registry)
    }

    /// Upgrader sharing an existing registry.
    #[must_use]
    pub fn with_registry(config: Config, registry: Arc<Registry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Validate the request, take over its stream, answer `101 Switching
    /// Protocols`, register the connection and start its read and write
    /// tasks.
    ///
    /// Nothing is written to the stream unless the upgrade succeeds; the
    /// caller owns the error response. On any failure the admission slot
    /// is released and no id is consumed.
    ///
    /// ## Errors
    ///
    /// - `Error::InvalidHandshake` / `Error::InvalidHeaderValue` if the
    ///   request is not an acceptable upgrade
    /// - `Error::AdmissionRejected` at the connection limit
    /// - `Error::Io` if hijacking or writing the response fails
    pub async fn upgrade<R: UpgradeRequest>(
        &self,
        req: &mut R,
        handlers: Handlers,
    ) -> Result<Arc<Connection>> {
        let negotiated = validate_request(&*req)?;
        let mut response = Vec::with_capacity(160);
        HandshakeResponse::from_negotiated(&negotiated).write(&mut response)?;

        let permit = self.registry.try_admit().inspect_err(|_| {
            tracing::warn!(
                max = self.registry.max_connections(),
                "connection limit reached"
            );
        })?;

        let hijacked = req.hijack().map_err(|error| {
            tracing::warn!(%error, "hijack failed");
            Error::from(error)
        })?;

        let (read_half, write_half) = tokio::io::split(hijacked.stream);
        let reader = FrameReader::new(Cursor::new(hijacked.buffered).chain(read_half), &self.config);
        let mut writer = FrameWriter::new(Box::new(write_half) as BoxedWriter, &self.config);
        writer.write_raw(&response).await?;

        let conn = Connection::spawn(
            self.registry.next_id(),
            negotiated,
            writer,
            handlers,
            &self.registry,
            permit,
            &self.config,
        );
        self.registry.insert(Arc::clone(&conn));
        tracing::debug!(conn_id = conn.id(), "connection upgraded");

        tokio::spawn(read_loop::run(
            Arc::clone(&conn),
            reader,
            Arc::clone(&self.config),
        ));
        Ok(conn)
    }
}
