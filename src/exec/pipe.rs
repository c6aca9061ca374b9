// src/exec/pipe.rs

//! In-process byte pipes used to connect the coordinator with a backend.
//!
//! A pipe is one direction of a `tokio::io::duplex` pair: the writer end only
//! writes, the reader end only reads. The duplex buffer is kept small so a
//! writer is back-pressured by a slow reader instead of accumulating output.
//!
//! - Closing (or dropping) the [`PipeWriter`] makes the reader see EOF once
//!   buffered bytes are drained.
//! - Writing after the [`PipeReader`] is gone fails with `BrokenPipe`.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};

/// Bytes a pipe may hold before the writer has to wait for the reader.
pub const PIPE_CAPACITY: usize = 8 * 1024;

/// Create a fresh unidirectional pipe.
pub fn pipe() -> (PipeReader, PipeWriter) {
    let (read_side, write_side) = tokio::io::duplex(PIPE_CAPACITY);
    (
        PipeReader { inner: read_side },
        PipeWriter { inner: write_side },
    )
}

/// Read end of a [`pipe`].
#[derive(Debug)]
pub struct PipeReader {
    inner: DuplexStream,
}

/// Write end of a [`pipe`].
#[derive(Debug)]
pub struct PipeWriter {
    inner: DuplexStream,
}

impl PipeWriter {
    /// Flush and signal end-of-stream to the reader.
    ///
    /// Consumes the writer, so end-of-stream can be signalled only once.
    pub async fn close(mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

impl AsyncRead for PipeReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for PipeWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}
