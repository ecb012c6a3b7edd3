//! Output sink that forwards PDF bytes to an async consumer.
//!
//! The renderer is synchronous and runs on a blocking worker; the HTTP body is
//! a stream.  [`ChannelSink`] bridges the two with a bounded channel: writes
//! are buffered into chunks and each full chunk is handed over with
//! `blocking_send`.  Once the receiving side is dropped (client went away)
//! every write fails with [`io::ErrorKind::BrokenPipe`].

use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use log::debug;
use tokio::sync::mpsc;

/// Default size of the chunks handed to the consumer.
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;

/// Items carried by the channel; an `Err` aborts the consumer's stream.
pub type Chunk = io::Result<Bytes>;

/// Blocking [`Write`] implementation feeding a tokio channel.
///
/// Must not be used from within an async task; run it on a blocking thread.
pub struct ChannelSink {
    tx: mpsc::Sender<Chunk>,
    buffer: BytesMut,
    chunk_size: usize,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Chunk>) -> Self {
        Self::with_chunk_size(tx, DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(tx: mpsc::Sender<Chunk>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            tx,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
        }
    }

    /// Creates a sink together with the receiving half of its channel.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Chunk>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Ends the consumer's stream with an error instead of a clean end.
    pub fn abort(self, message: impl Into<String>) {
        let message = message.into();
        debug!("aborting output stream: {}", message);
        let _ = self.tx.blocking_send(Err(io::Error::new(io::ErrorKind::Other, message)));
    }

    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = self.buffer.split().freeze();
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "output receiver closed"))
    }
}

impl Write for ChannelSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.tx.is_closed() {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "output receiver closed",
            ));
        }
        let room = self.chunk_size - self.buffer.len();
        let take = room.min(buf.len());
        self.buffer.extend_from_slice(&buf[..take]);
        if self.buffer.len() >= self.chunk_size {
            self.send_buffer()?;
        }
        Ok(take)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_arrive_in_chunks_after_flush() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut sink = ChannelSink::with_chunk_size(tx, 4);

        sink.write_all(b"%PDF-1.3").expect("write");
        sink.write_all(b"!").expect("write");
        sink.flush().expect("flush");
        drop(sink);

        let mut chunks = Vec::new();
        while let Some(chunk) = rx.blocking_recv() {
            chunks.push(chunk.expect("chunk"));
        }
        assert_eq!(chunks, vec![Bytes::from("%PDF"), Bytes::from("-1.3"), Bytes::from("!")]);
    }

    #[test]
    fn closed_receiver_is_a_broken_pipe() {
        let (mut sink, rx) = ChannelSink::channel(1);
        drop(rx);

        let err = sink.write_all(b"data").expect_err("receiver gone");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn abort_delivers_an_error_item() {
        let (mut sink, mut rx) = ChannelSink::channel(4);
        sink.write_all(b"partial").expect("write");
        sink.flush().expect("flush");
        sink.abort("layout failed");

        assert_eq!(
            rx.blocking_recv().map(|c| c.ok()),
            Some(Some(Bytes::from("partial")))
        );
        let err = rx.blocking_recv().expect("error item").expect_err("abort item");
        assert!(err.to_string().contains("layout failed"));
        assert!(rx.blocking_recv().is_none());
    }
}
