//! Connection lifecycle state.

use std::sync::atomic::{AtomicU8, Ordering};

/// WebSocket connection state.
///
/// Connections start `Open` once the handshake response has been written
/// and only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[repr(u8)]
pub enum ConnectionState {
    /// Accepting reads and writes.
    #[default]
    Open = 0,
    /// Teardown in progress.
    Closing = 1,
    /// Terminal.
    Closed = 2,
}

impl ConnectionState {
    /// Returns `true` only for `Open`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Open)
    }

    const fn from_u8(value: u8) -> Self {
        match value {
            0 => ConnectionState::Open,
            1 => ConnectionState::Closing,
            _ => ConnectionState::Closed,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Open => write!(f, "Open"),
            ConnectionState::Closing => write!(f, "Closing"),
            ConnectionState::Closed => write!(f, "Closed"),
        }
    }
}

/// Lock-free cell holding a [`ConnectionState`] that only moves forward.
#[derive(Debug, Default)]
pub(crate) struct AtomicState(AtomicU8);

impl AtomicState {
    pub(crate) fn load(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `Open` to `Closing`. Exactly one caller ever gets `true`.
    pub(crate) fn begin_close(&self) -> bool {
        self.0
            .compare_exchange(
                ConnectionState::Open as u8,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn finish_close(&self) {
        self.0
            .fetch_max(ConnectionState::Closed as u8, Ordering::AcqRel);
    }
}
