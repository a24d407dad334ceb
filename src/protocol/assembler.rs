//! Reassembly of fragmented messages.
//!
//! Only active when [`Config::fragmented_messages`](crate::Config) is set;
//! otherwise the validator rejects FIN=0 and continuation frames before they
//! reach this point.

use bytes::{Bytes, BytesMut};

use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Reassembles fragmented WebSocket messages, keyed by the opcode of the
/// first fragment.
pub struct MessageAssembler {
    buffer: BytesMut,
    fragment_count: usize,
    opcode: Option<OpCode>,
    limits: Limits,
}

impl MessageAssembler {
    pub fn new(limits: Limits) -> Self {
        Self {
            buffer: BytesMut::new(),
            fragment_count: 0,
            opcode: None,
            limits,
        }
    }

    /// Add a data frame to the message being assembled.
    ///
    /// Returns `Some` when the frame completes a message. Control frames are
    /// never passed here; they are handled as they arrive.
    pub fn push(&mut self, frame: Frame) -> Result<Option<AssembledMessage>> {
        if frame.opcode == OpCode::Continuation {
            if self.opcode.is_none() {
                return Err(Error::UnexpectedContinuation);
            }
        } else {
            if self.opcode.is_some() {
                return Err(Error::ProtocolViolation(
                    "Expected continuation frame".into(),
                ));
            }
            if frame.fin {
                // Unfragmented message, nothing to buffer.
                return Ok(Some(AssembledMessage {
                    opcode: frame.opcode,
                    payload: frame.into_payload(),
                }));
            }
            self.opcode = Some(frame.opcode);
        }

        self.limits
            .check_fragment_count(self.fragment_count + 1)?;
        self.limits
            .check_message_size(self.buffer.len() + frame.payload().len())?;

        self.buffer.extend_from_slice(frame.payload());
        self.fragment_count += 1;

        if !frame.fin {
            return Ok(None);
        }

        let opcode = self.opcode.take().ok_or(Error::UnexpectedContinuation)?;
        self.fragment_count = 0;
        Ok(Some(AssembledMessage {
            opcode,
            payload: self.buffer.split().freeze(),
        }))
    }

    #[cfg(test)]
    fn is_assembling(&self) -> bool {
        self.opcode.is_some()
    }
}

/// A complete message, either a single frame or joined fragments.
#[derive(Debug)]
pub struct AssembledMessage {
    pub opcode: OpCode,
    pub payload: Bytes,
}
