//! In-memory byte pipe between the lyrics producer and the pager.

use crate::error::{CoreError, Result};
use std::io::ErrorKind;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWriteExt, DuplexStream, ReadBuf};

/// Default pipe buffer size in bytes
pub const DEFAULT_SINK_CAPACITY: usize = 8 * 1024;

/// Create a connected writer/reader pair.
///
/// Writes wait once `capacity` bytes are buffered and the reader has not
/// caught up yet.
#[must_use]
pub fn stream_sink(capacity: usize) -> (SinkWriter, SinkReader) {
    let (writer, reader) = tokio::io::duplex(capacity.max(1));
    (
        SinkWriter {
            inner: Some(writer),
        },
        SinkReader { inner: reader },
    )
}

/// Producer end of a stream sink.
#[derive(Debug)]
pub struct SinkWriter {
    inner: Option<DuplexStream>,
}

impl SinkWriter {
    /// Write all bytes to the pipe.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SinkClosed`] if the writer was closed or the reader
    /// has gone away.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let inner = self.inner.as_mut().ok_or(CoreError::SinkClosed)?;
        inner.write_all(bytes).await.map_err(|e| match e.kind() {
            ErrorKind::BrokenPipe => CoreError::SinkClosed,
            _ => CoreError::Io(e),
        })?;
        inner.flush().await?;
        Ok(())
    }

    /// Signal end-of-stream to the reader. Closing twice is a no-op.
    pub async fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            // The reader may already be gone; it saw EOF either way
            let _ = inner.shutdown().await;
        }
    }

    /// Whether [`close`](Self::close) has been called
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

/// Consumer end of a stream sink. EOF shows up as a zero-length read.
#[derive(Debug)]
pub struct SinkReader {
    inner: DuplexStream,
}

impl AsyncRead for SinkReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
