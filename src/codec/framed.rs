use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::config::Config;
use crate::error::Result;
use crate::protocol::Frame;
use crate::protocol::frame::BaseHeader;
use crate::protocol::mask::apply_mask_fast;
use crate::protocol::validation::FrameValidator;

/// Decodes frames from the read half of a connection.
///
/// Every header field is validated as soon as it is read, so an oversized
/// or malformed frame is rejected before its payload is pulled off the
/// stream.
pub struct FrameReader<R> {
    io: BufReader<R>,
    validator: FrameValidator,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    #[must_use]
    pub fn new(io: R, config: &Config) -> Self {
        Self {
            io: BufReader::with_capacity(config.read_buffer_size, io),
            validator: FrameValidator::new(config),
        }
    }

    /// Read and unmask exactly one frame.
    ///
    /// A clean EOF or a short read anywhere inside the frame yields
    /// `Error::ConnectionClosed`; other stream failures yield `Error::Io`.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut head = [0u8; 2];
        self.io.read_exact(&mut head).await?;

        let base = BaseHeader::from_bytes(head);
        let opcode = self.validator.validate_base(&base)?;

        let payload_len = match base.base_len {
            126 => u64::from(self.io.read_u16().await?),
            127 => self.io.read_u64().await?,
            len => u64::from(len),
        };
        self.validator.validate_length(opcode, payload_len)?;

        let mask = if base.masked {
            let mut key = [0u8; 4];
            self.io.read_exact(&mut key).await?;
            Some(key)
        } else {
            None
        };

        // Bounded by max_frame_size, which is a usize.
        let mut payload = BytesMut::zeroed(payload_len as usize);
        self.io.read_exact(&mut payload).await?;
        if let Some(key) = mask {
            apply_mask_fast(&mut payload, key);
        }

        Ok(Frame::new(base.fin, opcode, payload.freeze()))
    }
}

/// Encodes frames onto the write half of a connection.
///
/// Header and payload are assembled in one buffer and written with a single
/// `write_all` followed by a flush. A connection's writer is owned by its
/// write task, which is the only caller.
pub struct FrameWriter<W> {
    io: W,
    write_buf: BytesMut,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    #[must_use]
    pub fn new(io: W, config: &Config) -> Self {
        Self {
            io,
            write_buf: BytesMut::with_capacity(config.write_buffer_size),
        }
    }

    /// Write one frame and flush it.
    ///
    /// Servers send unmasked frames; `mask` exists for clients and tests.
    pub async fn write_frame(&mut self, frame: &Frame, mask: Option<[u8; 4]>) -> Result<()> {
        self.write_buf.clear();
        frame.write(&mut self.write_buf, mask);
        self.io.write_all(&self.write_buf).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Write raw bytes, used for the handshake response.
    pub async fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.io.write_all(data).await?;
        self.io.flush().await?;
        Ok(())
    }

    /// Shut down the write side of the stream.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.io.shutdown().await?;
        Ok(())
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.io
    }
}
