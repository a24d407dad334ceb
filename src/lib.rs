//! # wsgate - Server-side WebSocket connections over hijacked HTTP streams
//!
//! `wsgate` upgrades HTTP/1.1 requests to RFC 6455 WebSocket connections,
//! tracks them in a shared registry with a hard admission limit, and
//! delivers inbound messages to async handlers.
//!
//! ## Features
//!
//! - **Strict upgrade validation** with deterministic, ordered checks
//! - **Admission control** that never exceeds the configured limit
//! - **One read task per connection** with in-order handler delivery
//! - **Queued sends** from any task through a per-connection writer task,
//!   so one slow peer never stalls the others
//! - **Opt-in** fragment reassembly and ping keepalive
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wsgate::{Config, Handlers, HttpRequest, Upgrader};
//!
//! let upgrader = Upgrader::new(Config::default());
//! let (stream, _) = listener.accept().await?;
//! let mut request = HttpRequest::read(stream, &upgrader.config().limits).await?;
//! let handlers = Handlers::new().on_text(|conn, text| async move {
//!     let _ = conn.send_text(&text).await;
//! });
//! match upgrader.upgrade(&mut request, handlers).await {
//!     Ok(conn) => tracing::info!(conn_id = conn.id(), "connected"),
//!     Err(e) => {
//!         let (status, reason) = wsgate::http::status_for(&e);
//!         request.reject(status, reason).await?;
//!     }
//! }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod protocol;
pub mod registry;
pub mod upgrade;

pub use codec::{FrameReader, FrameWriter};
pub use config::{Config, Keepalive, Limits};
pub use connection::{Connection, ConnectionState, Event, Handlers};
pub use error::{Error, ErrorKind, Result};
pub use http::HttpRequest;
pub use protocol::{
    Frame, HandshakeResponse, HttpVersion, OpCode, RequestHead, WS_GUID, compute_accept_key,
    validate_request,
};
pub use registry::{AdmissionPermit, Registry};
pub use upgrade::{Hijacked, UpgradeRequest, Upgrader};
