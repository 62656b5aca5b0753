//! [`FragmentSink`] implementations for HTTP responses and plain writers.

use async_trait::async_trait;
use axum::body::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use super::FragmentSink;
use crate::error::SinkError;

/// Bytes buffered before a write is forced through to the client.
pub const DEFAULT_BUFFER: usize = 256 * 1024;

/// Buffers markup and hands it to a streaming response body as [`Bytes`].
///
/// The receiving half is typically wrapped in a `ReceiverStream` and passed
/// to `Body::from_stream`; when the client disconnects the body is dropped
/// and every further write or flush fails with [`SinkError::Closed`].
pub struct ChannelSink {
    tx: mpsc::Sender<Bytes>,
    pending: String,
    capacity: usize,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Bytes>) -> Self {
        Self::with_capacity(tx, DEFAULT_BUFFER)
    }

    pub fn with_capacity(tx: mpsc::Sender<Bytes>, capacity: usize) -> Self {
        Self {
            tx,
            pending: String::new(),
            capacity,
        }
    }

    async fn send_pending(&mut self) -> Result<(), SinkError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.pending));
        self.tx.send(chunk).await.map_err(|_| SinkError::Closed)
    }
}

#[async_trait]
impl FragmentSink for ChannelSink {
    async fn write(&mut self, markup: &str) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Closed);
        }
        self.pending.push_str(markup);
        if self.pending.len() >= self.capacity {
            self.send_pending().await?;
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        if self.tx.is_closed() {
            return Err(SinkError::Closed);
        }
        self.send_pending().await
    }

    async fn closed(&mut self) {
        self.tx.closed().await
    }
}

/// Writes markup to any async writer, e.g. stdout for the CLI.
pub struct WriterSink<W> {
    inner: W,
}

impl<W> WriterSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> FragmentSink for WriterSink<W> {
    async fn write(&mut self, markup: &str) -> Result<(), SinkError> {
        self.inner.write_all(markup.as_bytes()).await?;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), SinkError> {
        self.inner.flush().await?;
        Ok(())
    }
}
