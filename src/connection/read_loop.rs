//! The per-connection read task.

use std::sync::Arc;

use bytes::Bytes;
use tokio::io::AsyncRead;
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::codec::FrameReader;
use crate::config::{Config, Keepalive};
use crate::connection::Connection;
use crate::connection::handler::Event;
use crate::error::{Error, Result};
use crate::protocol::{AssembledMessage, Frame, MessageAssembler, NORMAL_CLOSURE, OpCode};

/// What the loop does after handling a frame.
enum Flow {
    Continue,
    /// Peer sent Close; echo its body.
    Close(Bytes),
}

enum Wake<R> {
    Frame(FrameReader<R>, Result<Frame>),
    Tick,
    Shutdown,
}

async fn next_frame<R: AsyncRead + Unpin>(
    mut reader: FrameReader<R>,
) -> (FrameReader<R>, Result<Frame>) {
    let result = reader.read_frame().await;
    (reader, result)
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}

fn keepalive_ticker(keepalive: Option<Keepalive>) -> Option<Interval> {
    keepalive.map(|keepalive| {
        let mut ticker =
            tokio::time::interval_at(Instant::now() + keepalive.interval, keepalive.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    })
}

/// Read frames until the peer closes, the stream fails, a protocol error is
/// seen, the keepalive deadline passes, or the connection is torn down from
/// elsewhere. Then make sure the teardown has run and deliver
/// `Event::Closed`, so every handler runs on this task.
///
/// Each data message's handler is awaited before the next frame is read.
/// The pending read is kept alive across keepalive ticks so a partially
/// received frame is never dropped.
pub(crate) async fn run<R>(conn: Arc<Connection>, reader: FrameReader<R>, config: Arc<Config>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut assembler = config
        .fragmented_messages
        .then(|| MessageAssembler::new(config.limits.clone()));
    let mut ticker = keepalive_ticker(config.keepalive);
    let idle_limit = config.keepalive.map(|keepalive| keepalive.idle_limit());
    let mut last_activity = Instant::now();

    let mut pending = Box::pin(next_frame(reader));

    let close_frame = loop {
        let wake = tokio::select! {
            biased;
            () = conn.shutdown_signal().notified() => Wake::Shutdown,
            (reader, result) = &mut pending => Wake::Frame(reader, result),
            () = tick(&mut ticker) => Wake::Tick,
        };

        match wake {
            // Teardown finished elsewhere, or the writer failed.
            Wake::Shutdown => break Frame::close(NORMAL_CLOSURE, ""),
            Wake::Tick => {
                if idle_limit.is_some_and(|limit| last_activity.elapsed() > limit) {
                    tracing::debug!(conn_id = conn.id(), "keepalive timeout");
                    break Frame::close(NORMAL_CLOSURE, "");
                }
                if let Err(error) = conn.try_send_frame(Frame::ping(Bytes::new())) {
                    tracing::trace!(conn_id = conn.id(), %error, "keepalive ping not queued");
                }
            }
            Wake::Frame(reader, Ok(frame)) => {
                tracing::trace!(
                    conn_id = conn.id(),
                    opcode = %frame.opcode,
                    len = frame.payload().len(),
                    "frame received"
                );
                last_activity = Instant::now();
                pending.set(next_frame(reader));
                match dispatch(&conn, frame, assembler.as_mut()).await {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Close(body)) => {
                        tracing::debug!(conn_id = conn.id(), "peer sent close");
                        break Frame::close_raw(body);
                    }
                    Err(error) => {
                        tracing::debug!(conn_id = conn.id(), %error, "protocol error");
                        break Frame::close(NORMAL_CLOSURE, "");
                    }
                }
            }
            Wake::Frame(_, Err(error)) => {
                match error {
                    Error::ConnectionClosed => {
                        tracing::debug!(conn_id = conn.id(), "peer disconnected");
                    }
                    error => tracing::debug!(conn_id = conn.id(), %error, "read failed"),
                }
                break Frame::close(NORMAL_CLOSURE, "");
            }
        }
    };

    drop(pending);
    conn.teardown(close_frame).await;
    if let Some(closed) = conn.emit(Event::Closed) {
        closed.await;
    }
}

async fn dispatch(
    conn: &Arc<Connection>,
    frame: Frame,
    assembler: Option<&mut MessageAssembler>,
) -> Result<Flow> {
    match frame.opcode {
        OpCode::Close => return Ok(Flow::Close(frame.into_payload())),
        OpCode::Ping => {
            if let Err(error) = conn.try_send_frame(Frame::pong(frame.into_payload())) {
                tracing::trace!(conn_id = conn.id(), %error, "pong not queued");
            }
        }
        OpCode::Pong => {}
        OpCode::Text | OpCode::Binary | OpCode::Continuation => {
            let message = match assembler {
                Some(assembler) => match assembler.push(frame)? {
                    Some(message) => message,
                    None => return Ok(Flow::Continue),
                },
                None => AssembledMessage {
                    opcode: frame.opcode,
                    payload: frame.into_payload(),
                },
            };
            let event = match message.opcode {
                OpCode::Text => Event::Text(std::str::from_utf8(&message.payload)?.to_owned()),
                OpCode::Binary => Event::Binary(message.payload),
                _ => return Err(Error::UnexpectedContinuation),
            };
            if let Some(handler) = conn.emit(event) {
                handler.await;
            }
        }
    }
    Ok(Flow::Continue)
}
