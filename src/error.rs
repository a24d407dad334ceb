//! Error types for the WebSocket server engine.
//!
//! A single error enum covers the whole lifecycle. [`Error::kind`] groups the
//! variants into the four classes callers actually act on: handshake and
//! admission failures are returned from the upgrade, protocol and transport
//! failures only ever terminate a connection.

use thiserror::Error;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed or unsupported upgrade request. No resources were consumed.
    Handshake,
    /// The open-connection limit was reached.
    Admission,
    /// Malformed frame or RFC 6455 violation by the peer.
    Protocol,
    /// Failure of the underlying stream, or use of a closed connection.
    Transport,
}

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid WebSocket handshake.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake request head exceeds the configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Header value would inject CR/LF into the response.
    #[error("Invalid value for header {header}: {reason}")]
    InvalidHeaderValue {
        /// Header name.
        header: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// Maximum number of open connections reached.
    #[error("Maximum number of WebSocket connections reached ({max})")]
    AdmissionRejected {
        /// Configured connection limit.
        max: usize,
    },

    /// FIN bit clear while fragmented messages are not enabled.
    #[error("Fragmented frames are not supported")]
    FragmentedFrame,

    /// Continuation frame with no message in progress.
    #[error("Unexpected continuation frame")]
    UnexpectedContinuation,

    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload length.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reassembled message exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Actual message size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Too many fragments in a single message.
    #[error("Too many fragments: {count} (max: {max})")]
    TooManyFragments {
        /// Actual fragment count.
        count: usize,
        /// Maximum allowed fragments.
        max: usize,
    },

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Unmasked client frame while masking is required.
    #[error("Client frame must be masked")]
    UnmaskedClientFrame,

    /// Invalid UTF-8 in text frame.
    #[error("Invalid UTF-8 in text frame")]
    InvalidUtf8,

    /// Connection has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Outbound queue is full; the message was dropped.
    #[error("Send queue full")]
    SendQueueFull,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidHandshake(_)
            | Error::HandshakeTooLarge { .. }
            | Error::InvalidHeaderValue { .. } => ErrorKind::Handshake,
            Error::AdmissionRejected { .. } => ErrorKind::Admission,
            Error::ConnectionClosed | Error::SendQueueFull | Error::Io(_) => ErrorKind::Transport,
            _ => ErrorKind::Protocol,
        }
    }

    /// Returns `true` if the peer violated the framing protocol.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self.kind(), ErrorKind::Protocol)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof => Error::ConnectionClosed,
            _ => Error::Io(err.to_string()),
        }
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}
