use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::io::AsyncWrite;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::FrameWriter;
use crate::config::Config;
use crate::connection::handler::{Event, HandlerFuture, Handlers};
use crate::connection::state::{AtomicState, ConnectionState};
use crate::connection::write_loop::WriteLoop;
use crate::error::{Error, Result};
use crate::protocol::{Frame, NORMAL_CLOSURE, Negotiated};
use crate::registry::{AdmissionPermit, Registry};

pub(crate) type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A live server-side WebSocket connection.
///
/// Connections are created by [`Upgrader::upgrade`](crate::Upgrader::upgrade)
/// and shared as `Arc<Connection>`. Incoming frames are read on a dedicated
/// task and delivered through the connection's [`Handlers`]. Outgoing frames
/// go through a bounded queue drained by a second task that owns the write
/// half, so frames from concurrent senders never interleave on the wire and
/// a peer that stops reading cannot block anyone but its own senders.
///
/// ## Example
///
/// ```rust,ignore
/// let conn = upgrader.upgrade(&mut request, handlers).await?;
/// conn.send_text("welcome").await?;
/// conn.close().await;
/// ```
pub struct Connection {
    id: u64,
    protocol: String,
    extensions: String,
    state: AtomicState,
    outbound: mpsc::Sender<Frame>,
    close_tx: Mutex<Option<oneshot::Sender<Frame>>>,
    writer_task: Mutex<Option<JoinHandle<()>>>,
    dropped_messages: AtomicU64,
    handlers: RwLock<Handlers>,
    registry: Weak<Registry>,
    permit: Mutex<Option<AdmissionPermit>>,
    shutdown: Arc<Notify>,
}

impl Connection {
    /// Build the connection and start its writer task.
    pub(crate) fn spawn(
        id: u64,
        negotiated: Negotiated,
        writer: FrameWriter<BoxedWriter>,
        handlers: Handlers,
        registry: &Arc<Registry>,
        permit: AdmissionPermit,
        config: &Config,
    ) -> Arc<Self> {
        let (outbound, outbound_rx) = mpsc::channel(config.send_queue_capacity.max(1));
        let (close_tx, close_rx) = oneshot::channel();
        let shutdown = Arc::new(Notify::new());

        let writer_task = tokio::spawn(
            WriteLoop {
                conn_id: id,
                writer,
                outbound: outbound_rx,
                close: close_rx,
                failed: Arc::clone(&shutdown),
                close_timeout: config.close_timeout,
            }
            .run(),
        );

        Arc::new(Self {
            id,
            protocol: negotiated.protocol,
            extensions: negotiated.extensions,
            state: AtomicState::default(),
            outbound,
            close_tx: Mutex::new(Some(close_tx)),
            writer_task: Mutex::new(Some(writer_task)),
            dropped_messages: AtomicU64::new(0),
            handlers: RwLock::new(handlers),
            registry: Arc::downgrade(registry),
            permit: Mutex::new(Some(permit)),
            shutdown,
        })
    }

    /// Registry-unique id, assigned after a successful handshake.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Negotiated subprotocol. Always empty: subprotocol requests are refused.
    #[must_use]
    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Negotiated extensions. Always empty: requested extensions are ignored.
    #[must_use]
    pub fn extensions(&self) -> &str {
        &self.extensions
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state.load()
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state().can_send()
    }

    /// Messages dropped because the outbound queue was full.
    #[must_use]
    pub fn dropped_messages(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Replace the event handlers. Takes effect from the next event.
    pub fn set_handlers(&self, handlers: Handlers) {
        *self.handlers.write() = handlers;
    }

    /// Queue a single unfragmented text frame, waiting for room in the
    /// outbound queue.
    ///
    /// `Ok` means the frame was queued. A later write failure tears the
    /// connection down instead of being reported here.
    ///
    /// ## Errors
    ///
    /// - `Error::ConnectionClosed` once teardown has started
    pub async fn send_text(&self, text: &str) -> Result<()> {
        self.send_frame(Frame::text(Bytes::copy_from_slice(text.as_bytes())))
            .await
    }

    /// Queue a single unfragmented binary frame.
    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.send_frame(Frame::binary(data)).await
    }

    /// Send a Ping. The payload must fit in a control frame (125 bytes).
    pub async fn send_ping(&self, data: impl Into<Bytes>) -> Result<()> {
        let frame = Frame::ping(data);
        frame.validate()?;
        self.send_frame(frame).await
    }

    /// Send an unsolicited Pong.
    pub async fn send_pong(&self, data: impl Into<Bytes>) -> Result<()> {
        let frame = Frame::pong(data);
        frame.validate()?;
        self.send_frame(frame).await
    }

    /// Queue a text frame without waiting.
    ///
    /// ## Errors
    ///
    /// - `Error::SendQueueFull` if the queue has no room; the message is
    ///   dropped and counted in [`dropped_messages`](Self::dropped_messages)
    /// - `Error::ConnectionClosed` once teardown has started
    pub fn try_send_text(&self, text: &str) -> Result<()> {
        self.try_send_frame(Frame::text(Bytes::copy_from_slice(text.as_bytes())))
    }

    /// Queue a binary frame without waiting. See
    /// [`try_send_text`](Self::try_send_text).
    pub fn try_send_binary(&self, data: impl Into<Bytes>) -> Result<()> {
        self.try_send_frame(Frame::binary(data))
    }

    /// Close the connection with status 1000.
    ///
    /// Idempotent: only the first call (or the first peer Close, read or
    /// write error, or keepalive timeout) performs the teardown. Later calls
    /// return immediately. Returns once the Close frame has been written or
    /// `Config::close_timeout` has passed; the `Closed` handler then runs on
    /// the connection's read task.
    pub async fn close(&self) {
        self.teardown(Frame::close(NORMAL_CLOSURE, "")).await;
    }

    async fn send_frame(&self, frame: Frame) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        self.outbound
            .send(frame)
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    pub(crate) fn try_send_frame(&self, frame: Frame) -> Result<()> {
        if !self.is_open() {
            return Err(Error::ConnectionClosed);
        }
        match self.outbound.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                Err(Error::SendQueueFull)
            }
            Err(TrySendError::Closed(_)) => Err(Error::ConnectionClosed),
        }
    }

    /// Run the teardown sequence if no one else has. Returns `true` for the
    /// caller that performed it.
    ///
    /// Order: leave `Open`, leave the registry, hand `close_frame` to the
    /// writer task and wait for it to finish, release the admission slot,
    /// reach `Closed`, then wake the read loop, which delivers
    /// `Event::Closed`.
    pub(crate) async fn teardown(&self, close_frame: Frame) -> bool {
        if !self.state.begin_close() {
            return false;
        }

        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }

        let close_tx = self.close_tx.lock().take();
        if let Some(close_tx) = close_tx {
            // Err means the writer already stopped after a failed write.
            let _ = close_tx.send(close_frame);
        }
        let writer_task = self.writer_task.lock().take();
        if let Some(writer_task) = writer_task {
            if let Err(error) = writer_task.await {
                tracing::debug!(conn_id = self.id, %error, "writer task failed");
            }
        }

        let permit = self.permit.lock().take();
        drop(permit);
        self.state.finish_close();
        tracing::debug!(conn_id = self.id, "connection closed");

        self.shutdown.notify_one();
        true
    }

    /// Future for `event` from the current handlers. The handler lock is
    /// released before the future is returned.
    pub(crate) fn emit(self: &Arc<Self>, event: Event) -> Option<HandlerFuture> {
        self.handlers.read().dispatch(Arc::clone(self), event)
    }

    /// Woken at the end of a teardown, or when the writer task fails.
    pub(crate) fn shutdown_signal(&self) -> &Notify {
        &self.shutdown
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("protocol", &self.protocol)
            .field("extensions", &self.extensions)
            .field("dropped_messages", &self.dropped_messages())
            .finish_non_exhaustive()
    }
}
