//! Header validation for incoming frames.
//!
//! Checks run in wire order so the first violation is reported before any
//! further bytes are read: FIN, RSV bits, opcode, masking, then length.

use crate::config::{Config, Limits};
use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::frame::{BaseHeader, MAX_CONTROL_FRAME_PAYLOAD};

/// Frame validator for incoming WebSocket frames.
#[derive(Debug, Clone)]
pub struct FrameValidator {
    limits: Limits,
    accept_unmasked_frames: bool,
    fragmented_messages: bool,
}

impl FrameValidator {
    /// Create a validator from connection configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            limits: config.limits.clone(),
            accept_unmasked_frames: config.accept_unmasked_frames,
            fragmented_messages: config.fragmented_messages,
        }
    }

    /// Validate the two fixed header bytes and resolve the opcode.
    ///
    /// # Errors
    ///
    /// - `Error::FragmentedFrame` - FIN=0 without reassembly, or on a control frame
    /// - `Error::ReservedBitsSet` - any RSV bit set
    /// - `Error::ReservedOpcode` - opcode outside the six defined values
    /// - `Error::UnexpectedContinuation` - continuation frame without reassembly
    /// - `Error::UnmaskedClientFrame` - unmasked frame while masking is required
    pub fn validate_base(&self, header: &BaseHeader) -> Result<OpCode> {
        if !header.fin && !self.fragmented_messages {
            return Err(Error::FragmentedFrame);
        }
        if header.has_rsv() {
            return Err(Error::ReservedBitsSet);
        }

        let opcode = OpCode::from_u8(header.opcode)?;
        if opcode.is_control() && !header.fin {
            return Err(Error::FragmentedFrame);
        }
        if opcode == OpCode::Continuation && !self.fragmented_messages {
            return Err(Error::UnexpectedContinuation);
        }

        if !header.masked && !self.accept_unmasked_frames {
            return Err(Error::UnmaskedClientFrame);
        }

        Ok(opcode)
    }

    /// Validate the final payload length before the payload is read.
    ///
    /// # Errors
    ///
    /// - `Error::ControlFrameTooLarge` - control payload above 125 bytes
    /// - `Error::FrameTooLarge` - payload above the configured maximum
    pub fn validate_length(&self, opcode: OpCode, payload_len: u64) -> Result<()> {
        if opcode.is_control() && payload_len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
            return Err(Error::ControlFrameTooLarge(
                usize::try_from(payload_len).unwrap_or(usize::MAX),
            ));
        }
        self.limits.check_frame_size(payload_len)
    }
}
