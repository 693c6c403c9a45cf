//! Bridge from the blocking JSONP writer to an async response body.
//!
//! Serialization runs on a blocking thread and hands each drained chunk to
//! a bounded channel; the response body polls the other end. A full channel
//! blocks the writer, so a slow client slows serialization down instead of
//! growing memory. Once the body is dropped, further sends fail and the
//! write ends with a transport error.

use std::io::{self, Write};

use axum::body::Body;
use bytes::Bytes;
use tokio::sync::mpsc;

pub(crate) type Chunk = Result<Bytes, io::Error>;

/// `io::Write` sink that forwards every write as one body chunk.
pub(crate) struct ChannelWriter {
    tx: mpsc::Sender<Chunk>,
}

impl ChannelWriter {
    pub(crate) fn new(tx: mpsc::Sender<Chunk>) -> Self {
        Self { tx }
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        self.tx
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body was dropped"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Turn the receiving end into a streaming response body.
pub(crate) fn body_from_channel(rx: mpsc::Receiver<Chunk>) -> Body {
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    });
    Body::from_stream(stream)
}
