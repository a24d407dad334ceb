use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use wsgate::{Config, Frame, FrameReader, FrameWriter, OpCode, Result};

pub const KEY: &str = "dGhlIHNhbXBsZSBub25jZQ==";
const MASK: [u8; 4] = [0x37, 0xfa, 0x21, 0x3d];

pub fn upgrade_request(extra_headers: &str) -> String {
    format!(
        "GET /ws HTTP/1.1\r\n\
         Host: localhost\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-Fetch-Mode: websocket\r\n\
         Sec-WebSocket-Key: {KEY}\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Origin: http://localhost\r\n\
         {extra_headers}\
         \r\n"
    )
}

/// Read an HTTP response head one byte at a time so nothing past it is
/// consumed.
pub async fn read_response_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if stream.read(&mut byte).await.unwrap() == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

/// Send raw bytes and return the full HTTP response up to EOF.
pub async fn raw_exchange(addr: SocketAddr, request: &[u8]) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(request).await.unwrap();
    let mut response = String::new();
    let _ = stream.read_to_string(&mut response).await;
    response
}

/// Minimal WebSocket client. Frames it sends are always masked.
pub struct TestClient {
    reader: FrameReader<OwnedReadHalf>,
    writer: FrameWriter<OwnedWriteHalf>,
    pub response: String,
}

impl TestClient {
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        Self::connect_with(addr, upgrade_request(""), &[]).await
    }

    /// Connect with a custom request and bytes sent in the same write,
    /// directly after the request head.
    pub async fn connect_with(addr: SocketAddr, request: String, trailing: &[u8]) -> Result<Self> {
        let mut stream = TcpStream::connect(addr).await?;
        let mut first = request.into_bytes();
        first.extend_from_slice(trailing);
        stream.write_all(&first).await?;

        let response = read_response_head(&mut stream).await;
        if !response.starts_with("HTTP/1.1 101") {
            return Err(wsgate::Error::InvalidHandshake(response));
        }

        let config = Config::default();
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            reader: FrameReader::new(read_half, &config),
            writer: FrameWriter::new(write_half, &config),
            response,
        })
    }

    pub async fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_frame(frame, Some(MASK)).await
    }

    pub async fn send_raw(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_raw(data).await
    }

    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.send_frame(&Frame::text(text.to_string())).await
    }

    pub async fn send_binary(&mut self, data: &[u8]) -> Result<()> {
        self.send_frame(&Frame::binary(Bytes::copy_from_slice(data)))
            .await
    }

    pub async fn recv_frame(&mut self) -> Result<Frame> {
        self.reader.read_frame().await
    }

    /// Next text message, or `None` if the server closed.
    pub async fn recv_text(&mut self) -> Result<Option<String>> {
        loop {
            let frame = self.recv_frame().await?;
            match frame.opcode {
                OpCode::Text => {
                    return Ok(Some(String::from_utf8(frame.payload().to_vec()).unwrap()));
                }
                OpCode::Close => return Ok(None),
                _ => {}
            }
        }
    }

    /// Send Close and wait for the server's Close.
    pub async fn close(mut self) -> Result<Frame> {
        self.send_frame(&Frame::close(1000, "")).await?;
        loop {
            let frame = self.recv_frame().await?;
            if frame.opcode == OpCode::Close {
                return Ok(frame);
            }
        }
    }
}
