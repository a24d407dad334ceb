//! WebSocket frame model and serialization (RFC 6455 Section 5.2).

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask_fast;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Largest payload that fits the 7-bit length field.
pub const MAX_INLINE_LEN: usize = 125;

/// Largest payload that fits the 16-bit extended length field.
pub const MAX_EXTENDED_16_LEN: usize = 0xFFFF;

/// Status code sent in every server-initiated Close frame.
pub const NORMAL_CLOSURE: u16 = 1000;

/// The length encoding a payload of a given size uses on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthTier {
    /// Length stored in the 7-bit field (0..=125).
    Inline,
    /// Marker 126, then a big-endian `u16`.
    Extended16,
    /// Marker 127, then a big-endian `u64`.
    Extended64,
}

impl LengthTier {
    /// Pick the tier for a payload length.
    #[must_use]
    pub const fn for_len(len: usize) -> Self {
        if len <= MAX_INLINE_LEN {
            LengthTier::Inline
        } else if len <= MAX_EXTENDED_16_LEN {
            LengthTier::Extended16
        } else {
            LengthTier::Extended64
        }
    }

    /// Bytes following the two fixed header bytes.
    #[must_use]
    pub const fn extra_bytes(self) -> usize {
        match self {
            LengthTier::Inline => 0,
            LengthTier::Extended16 => 2,
            LengthTier::Extended64 => 8,
        }
    }
}

/// Fields carried by the first two header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseHeader {
    pub fin: bool,
    pub rsv1: bool,
    pub rsv2: bool,
    pub rsv3: bool,
    /// Raw opcode nibble, not yet validated.
    pub opcode: u8,
    pub masked: bool,
    /// 7-bit length; 126 and 127 announce an extended length.
    pub base_len: u8,
}

impl BaseHeader {
    /// Split the two fixed header bytes into their fields.
    #[inline]
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        let [byte0, byte1] = bytes;
        Self {
            fin: byte0 & 0x80 != 0,
            rsv1: byte0 & 0x40 != 0,
            rsv2: byte0 & 0x20 != 0,
            rsv3: byte0 & 0x10 != 0,
            opcode: byte0 & 0x0F,
            masked: byte1 & 0x80 != 0,
            base_len: byte1 & 0x7F,
        }
    }

    /// Whether any reserved bit is set.
    #[inline]
    #[must_use]
    pub const fn has_rsv(&self) -> bool {
        self.rsv1 || self.rsv2 || self.rsv3
    }
}

/// A WebSocket frame.
///
/// Frames are transient: built, written or dispatched, then dropped. The
/// payload is always stored unmasked.
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                 Masking key (if MASK is set)                  |
/// +---------------------------------------------------------------+
/// |                          Payload data                         |
/// +---------------------------------------------------------------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    payload: Bytes,
}

impl Frame {
    /// Create a frame with the given FIN flag, opcode and payload.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            payload: payload.into(),
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Create a close frame carrying a status code and reason.
    #[must_use]
    pub fn close(code: u16, reason: &str) -> Self {
        let mut data = BytesMut::with_capacity(2 + reason.len());
        data.put_u16(code);
        data.put_slice(reason.as_bytes());
        Self::new(true, OpCode::Close, data.freeze())
    }

    /// Create a close frame with a raw body, e.g. an echoed peer close.
    #[must_use]
    pub fn close_raw(body: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Close, body)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Status code of a close frame, if its body carries one.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match (self.opcode, self.payload.as_ref()) {
            (OpCode::Close, [hi, lo, ..]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Check control-frame constraints.
    ///
    /// # Errors
    ///
    /// - `Error::FragmentedFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_control() {
            if !self.fin {
                return Err(Error::FragmentedFrame);
            }
            if self.payload.len() > MAX_CONTROL_FRAME_PAYLOAD {
                return Err(Error::ControlFrameTooLarge(self.payload.len()));
            }
        }
        Ok(())
    }

    /// Bytes this frame occupies on the wire.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let mask_size = if masked { 4 } else { 0 };
        2 + LengthTier::for_len(self.payload.len()).extra_bytes() + mask_size + self.payload.len()
    }

    /// Append the encoded frame (header, optional mask key, payload) to `buf`.
    ///
    /// RSV bits are always written as zero. When `mask` is given the payload
    /// is XORed with it as it is copied; the frame itself is left untouched.
    pub fn write(&self, buf: &mut BytesMut, mask: Option<[u8; 4]>) {
        let payload_len = self.payload.len();
        buf.reserve(self.wire_size(mask.is_some()));

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        buf.put_u8(byte0);

        let mask_bit = if mask.is_some() { 0x80 } else { 0x00 };
        match LengthTier::for_len(payload_len) {
            LengthTier::Inline => buf.put_u8(mask_bit | payload_len as u8),
            LengthTier::Extended16 => {
                buf.put_u8(mask_bit | 126);
                buf.put_u16(payload_len as u16);
            }
            LengthTier::Extended64 => {
                buf.put_u8(mask_bit | 127);
                buf.put_u64(payload_len as u64);
            }
        }

        match mask {
            Some(key) => {
                buf.put_slice(&key);
                let start = buf.len();
                buf.put_slice(&self.payload);
                apply_mask_fast(&mut buf[start..], key);
            }
            None => buf.put_slice(&self.payload),
        }
    }

    /// Encode into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self, mask: Option<[u8; 4]>) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size(mask.is_some()));
        self.write(&mut buf, mask);
        buf.freeze()
    }
}
