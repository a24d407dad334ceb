//! Application callbacks for connection events.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use super::Connection;

/// Future returned by a handler. The read loop awaits it before reading the
/// next frame.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

type TextFn = Arc<dyn Fn(Arc<Connection>, String) -> HandlerFuture + Send + Sync>;
type BinaryFn = Arc<dyn Fn(Arc<Connection>, Bytes) -> HandlerFuture + Send + Sync>;
type ClosedFn = Arc<dyn Fn(Arc<Connection>) -> HandlerFuture + Send + Sync>;

/// Events delivered to the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A complete text message.
    Text(String),
    /// A complete binary message.
    Binary(Bytes),
    /// The connection has been torn down. Delivered exactly once.
    Closed,
}

/// Optional per-event handlers for a connection.
///
/// ```rust,ignore
/// let handlers = Handlers::new()
///     .on_text(|conn, text| async move {
///         let _ = conn.send_text(&text).await;
///     })
///     .on_closed(|conn| async move {
///         tracing::info!(conn_id = conn.id(), "gone");
///     });
/// ```
#[derive(Clone, Default)]
pub struct Handlers {
    text: Option<TextFn>,
    binary: Option<BinaryFn>,
    closed: Option<ClosedFn>,
}

impl Handlers {
    /// No handlers; every event is dropped.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_text<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Connection>, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.text = Some(Arc::new(move |conn, text| Box::pin(f(conn, text))));
        self
    }

    #[must_use]
    pub fn on_binary<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Connection>, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.binary = Some(Arc::new(move |conn, data| Box::pin(f(conn, data))));
        self
    }

    /// Runs once, on the connection's read task, after the teardown has
    /// finished, whichever side started it.
    #[must_use]
    pub fn on_closed<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Arc<Connection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.closed = Some(Arc::new(move |conn| Box::pin(f(conn))));
        self
    }

    /// Build the future for an event, or `None` if no handler is registered.
    pub(crate) fn dispatch(&self, conn: Arc<Connection>, event: Event) -> Option<HandlerFuture> {
        match event {
            Event::Text(text) => self.text.as_ref().map(|f| f(conn, text)),
            Event::Binary(data) => self.binary.as_ref().map(|f| f(conn, data)),
            Event::Closed => self.closed.as_ref().map(|f| f(conn)),
        }
    }
}

impl std::fmt::Debug for Handlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handlers")
            .field("text", &self.text.is_some())
            .field("binary", &self.binary.is_some())
            .field("closed", &self.closed.is_some())
            .finish()
    }
}
