//! Live connections: state, handlers, sending and the read task.
//!
//! ## Connection Lifecycle
//!
//! 1. **Open** - after the 101 response has been written
//! 2. **Closing** - teardown has started; sends fail
//! 3. **Closed** - admission slot released, `Closed` event delivered
//!
//! Teardown is triggered by whichever comes first: a local
//! [`Connection::close`], a peer Close frame, a read, write or protocol
//! error, or a keepalive timeout. It runs exactly once.
//!
//! Each connection runs two tasks. The read task decodes frames and runs
//! every handler, `Closed` included. The write task owns the write half and
//! drains the connection's bounded outbound queue.

#[allow(clippy::module_inception)]
mod connection;
mod handler;
pub(crate) mod read_loop;
mod state;
mod write_loop;

pub use connection::Connection;
pub(crate) use connection::BoxedWriter;
pub use handler::{Event, HandlerFuture, Handlers};
pub use state::ConnectionState;
