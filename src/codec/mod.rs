//! Frame-level encoding/decoding over async streams.
//!
//! Reading and writing are split so the read half can live in the
//! connection's read loop while the write half sits behind the connection's
//! send lock.

mod framed;

pub use framed::{FrameReader, FrameWriter};
