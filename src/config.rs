//! Configuration and limits for the WebSocket server.

use std::time::Duration;

/// Resource limits for WebSocket connections.
///
/// These limits prevent resource exhaustion and bound memory usage per
/// connection and per server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum payload size of a single frame in bytes.
    ///
    /// Default: 1 MiB (1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum number of concurrently open connections.
    ///
    /// Default: 1000
    pub max_connections: usize,

    /// Maximum size of a reassembled message in bytes.
    ///
    /// Only used when fragmented messages are enabled.
    ///
    /// Default: 4 MiB (4 * 1024 * 1024)
    pub max_message_size: usize,

    /// Maximum number of fragments in a single message.
    ///
    /// Default: 128
    pub max_fragment_count: usize,

    /// Maximum size of the HTTP request head in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 1024 * 1024,
            max_connections: 1000,
            max_message_size: 4 * 1024 * 1024,
            max_fragment_count: 128,
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Validate that a declared frame payload length is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FrameTooLarge`](crate::Error::FrameTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_frame_size(&self, size: u64) -> Result<(), crate::Error> {
        if size > self.max_frame_size as u64 {
            Err(crate::Error::FrameTooLarge {
                size,
                max: self.max_frame_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that message size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MessageTooLarge`](crate::Error::MessageTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_message_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_message_size {
            Err(crate::Error::MessageTooLarge {
                size,
                max: self.max_message_size,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that fragment count is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFragments`](crate::Error::TooManyFragments) if `count` exceeds the configured maximum.
    pub const fn check_fragment_count(&self, count: usize) -> Result<(), crate::Error> {
        if count > self.max_fragment_count {
            Err(crate::Error::TooManyFragments {
                count,
                max: self.max_fragment_count,
            })
        } else {
            Ok(())
        }
    }

    /// Validate that handshake size is within limits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HandshakeTooLarge`](crate::Error::HandshakeTooLarge) if `size` exceeds the configured maximum.
    pub const fn check_handshake_size(&self, size: usize) -> Result<(), crate::Error> {
        if size > self.max_handshake_size {
            Err(crate::Error::HandshakeTooLarge {
                size,
                max: self.max_handshake_size,
            })
        } else {
            Ok(())
        }
    }
}

/// Ping-driven liveness settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Keepalive {
    /// Interval between pings sent by the server.
    pub interval: Duration,
    /// Extra time a peer gets to show any activity after a ping.
    pub timeout: Duration,
}

impl Default for Keepalive {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(10),
        }
    }
}

impl Keepalive {
    /// Create keepalive settings.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    /// Longest silence tolerated before the peer is considered dead.
    #[must_use]
    pub fn idle_limit(&self) -> Duration {
        self.interval + self.timeout
    }
}

/// WebSocket server configuration, fixed at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Resource limits.
    pub limits: Limits,

    /// Accept unmasked frames from clients.
    ///
    /// RFC 6455 requires clients to mask; the base server contract does not
    /// enforce it.
    ///
    /// Default: true
    pub accept_unmasked_frames: bool,

    /// Reassemble fragmented messages instead of rejecting FIN=0 frames.
    ///
    /// Default: false
    pub fragmented_messages: bool,

    /// Ping-driven liveness. `None` disables it.
    ///
    /// Default: None
    pub keepalive: Option<Keepalive>,

    /// Read buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Write buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub write_buffer_size: usize,

    /// Frames that may wait in a connection's outbound queue.
    ///
    /// Direct sends wait for room; broadcasts drop the message instead.
    ///
    /// Default: 64
    pub send_queue_capacity: usize,

    /// How long teardown waits for queued frames and the Close frame to be
    /// written before the stream is shut down regardless.
    ///
    /// Default: 1 second
    pub close_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            accept_unmasked_frames: true,
            fragmented_messages: false,
            keepalive: None,
            read_buffer_size: 8192,
            write_buffer_size: 8192,
            send_queue_capacity: 64,
            close_timeout: Duration::from_secs(1),
        }
    }
}

impl Config {
    /// Create a new configuration with default limits.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the maximum frame payload size.
    #[must_use]
    pub const fn with_max_frame_size(mut self, size: usize) -> Self {
        self.limits.max_frame_size = size;
        self
    }

    /// Set the maximum number of open connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: usize) -> Self {
        self.limits.max_connections = max;
        self
    }

    /// Require clients to mask every frame.
    #[must_use]
    pub const fn require_masked_frames(mut self) -> Self {
        self.accept_unmasked_frames = false;
        self
    }

    /// Enable or disable fragmented message reassembly.
    #[must_use]
    pub const fn with_fragmented_messages(mut self, enabled: bool) -> Self {
        self.fragmented_messages = enabled;
        self
    }

    /// Enable ping-driven liveness.
    #[must_use]
    pub const fn with_keepalive(mut self, keepalive: Keepalive) -> Self {
        self.keepalive = Some(keepalive);
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set write buffer size.
    #[must_use]
    pub const fn with_write_buffer_size(mut self, size: usize) -> Self {
        self.write_buffer_size = size;
        self
    }

    /// Set the outbound queue capacity. Clamped to at least 1.
    #[must_use]
    pub const fn with_send_queue_capacity(mut self, capacity: usize) -> Self {
        self.send_queue_capacity = if capacity == 0 { 1 } else { capacity };
        self
    }

    /// Set the teardown write deadline.
    #[must_use]
    pub const fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }
}
