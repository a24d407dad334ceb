//! The per-connection writer task.
//!
//! Every outbound frame goes through a bounded queue drained by this task,
//! so a peer that stops reading only ever blocks its own writer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, mpsc, oneshot};

use crate::codec::FrameWriter;
use crate::connection::BoxedWriter;
use crate::error::Result;
use crate::protocol::Frame;

pub(crate) struct WriteLoop {
    pub(crate) conn_id: u64,
    pub(crate) writer: FrameWriter<BoxedWriter>,
    pub(crate) outbound: mpsc::Receiver<Frame>,
    pub(crate) close: oneshot::Receiver<Frame>,
    /// Woken when a write fails so the read loop starts the teardown.
    pub(crate) failed: Arc<Notify>,
    pub(crate) close_timeout: Duration,
}

impl WriteLoop {
    pub(crate) async fn run(mut self) {
        loop {
            let frame = tokio::select! {
                biased;
                close_frame = &mut self.close => {
                    if let Ok(close_frame) = close_frame {
                        self.finish(close_frame).await;
                    }
                    return;
                }
                frame = self.outbound.recv() => match frame {
                    Some(frame) => frame,
                    None => return,
                },
            };

            // A stalled write is abandoned as soon as teardown asks for the
            // stream. The frame is cut short, so no Close frame follows it.
            let written = tokio::select! {
                biased;
                _ = &mut self.close => {
                    tracing::debug!(conn_id = self.conn_id, "write abandoned by close");
                    self.shutdown().await;
                    return;
                }
                written = self.writer.write_frame(&frame, None) => written,
            };
            if let Err(error) = written {
                tracing::debug!(conn_id = self.conn_id, %error, "write failed");
                self.failed.notify_one();
                return;
            }
        }
    }

    /// Flush what is already queued, send the Close frame and shut the
    /// stream down, all within `close_timeout`.
    async fn finish(&mut self, close_frame: Frame) {
        self.outbound.close();
        let deadline = self.close_timeout;
        match tokio::time::timeout(deadline, self.drain(&close_frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::debug!(conn_id = self.conn_id, %error, "close frame not delivered");
            }
            Err(_) => tracing::debug!(conn_id = self.conn_id, "close frame timed out"),
        }
        self.shutdown().await;
    }

    async fn drain(&mut self, close_frame: &Frame) -> Result<()> {
        while let Ok(frame) = self.outbound.try_recv() {
            self.writer.write_frame(&frame, None).await?;
        }
        self.writer.write_frame(close_frame, None).await
    }

    async fn shutdown(&mut self) {
        match tokio::time::timeout(self.close_timeout, self.writer.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(error)) => tracing::trace!(conn_id = self.conn_id, %error, "shutdown failed"),
            Err(_) => tracing::trace!(conn_id = self.conn_id, "shutdown timed out"),
        }
    }
}
