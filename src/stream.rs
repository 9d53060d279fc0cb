//! Byte stream adapters bound to the currently installed transport.
//!
//! `WriteStream` pushes whole buffers into a [`ByteSink`] and `ReadStream`
//! pulls exact-length buffers out of a [`ByteSource`]. Deadlines are only
//! armed on transports that report the capability.
//!
//! 绑定到当前已安装传输的字节流适配器。

use crate::error::{Direction, Error, Result};
use bytes::{Bytes, BytesMut};
use std::{
    io,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf, ReadHalf, WriteHalf},
    net::tcp::{OwnedReadHalf, OwnedWriteHalf},
    time::Instant,
};
use tracing::trace;

/// The read side of a transport.
///
/// 传输的读取端。
pub trait ByteSource: AsyncRead + Send + Unpin {
    /// Whether a pending read can be bounded by a deadline.
    /// 挂起的读取是否可以由截止时间限定。
    fn supports_deadline(&self) -> bool {
        false
    }
}

/// The write side of a transport.
///
/// 传输的写入端。
pub trait ByteSink: AsyncWrite + Send + Unpin {
    /// Whether a pending write can be bounded by a deadline.
    /// 挂起的写入是否可以由截止时间限定。
    fn supports_deadline(&self) -> bool {
        false
    }
}

impl ByteSource for OwnedReadHalf {
    fn supports_deadline(&self) -> bool {
        true
    }
}

impl ByteSink for OwnedWriteHalf {
    fn supports_deadline(&self) -> bool {
        true
    }
}

impl ByteSource for DuplexStream {}
impl ByteSink for DuplexStream {}
impl<T: AsyncRead + Send> ByteSource for ReadHalf<T> {}
impl<T: AsyncWrite + Send> ByteSink for WriteHalf<T> {}

/// Opts an arbitrary transport into deadline support.
///
/// 使任意传输支持截止时间。
#[derive(Debug)]
pub struct WithDeadline<T>(pub T);

impl<T: AsyncRead + Unpin> AsyncRead for WithDeadline<T> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_read(cx, buf)
    }
}

impl<T: AsyncWrite + Unpin> AsyncWrite for WithDeadline<T> {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.0).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.0).poll_shutdown(cx)
    }
}

impl<T: AsyncRead + Send + Unpin> ByteSource for WithDeadline<T> {
    fn supports_deadline(&self) -> bool {
        true
    }
}

impl<T: AsyncWrite + Send + Unpin> ByteSink for WithDeadline<T> {
    fn supports_deadline(&self) -> bool {
        true
    }
}

/// An absolute point in time after which a pending read or write fails.
///
/// 一个绝对时间点，超过之后挂起的读或写将失败。
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Instant,
    timeout: Duration,
}

impl Deadline {
    /// Arms a deadline `timeout` from now.
    /// 从现在起设置一个 `timeout` 之后的截止时间。
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now() + timeout,
            timeout,
        }
    }

    fn exceeded(&self, direction: Direction) -> Error {
        Error::DeadlineExceeded {
            direction,
            timeout: self.timeout,
        }
    }
}

/// Pulls exact-length buffers from a [`ByteSource`].
///
/// 从 [`ByteSource`] 拉取精确长度的缓冲区。
pub struct ReadStream {
    source: Box<dyn ByteSource>,
}

impl std::fmt::Debug for ReadStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadStream")
            .field("supports_deadline", &self.source.supports_deadline())
            .finish()
    }
}

impl ReadStream {
    pub fn new(source: Box<dyn ByteSource>) -> Self {
        Self { source }
    }

    /// Returns exactly `n` bytes.
    ///
    /// Blocks until `n` bytes have arrived, the deadline trips (if the
    /// source supports deadlines), or the source fails or reaches EOF.
    /// Bytes consumed before a failure are lost.
    ///
    /// 返回恰好 `n` 个字节。
    pub async fn next(&mut self, n: usize, deadline: Deadline) -> Result<Bytes> {
        if n == 0 {
            return Ok(Bytes::new());
        }

        let armed = self.source.supports_deadline();
        let mut buf = BytesMut::zeroed(n);
        let read = self.source.read_exact(&mut buf);
        if armed {
            tokio::time::timeout_at(deadline.at, read)
                .await
                .map_err(|_| deadline.exceeded(Direction::Read))??;
        } else {
            read.await?;
        }

        trace!(bytes = n, "Read from transport");
        Ok(buf.freeze())
    }
}

/// Pushes whole buffers into a [`ByteSink`].
///
/// 将完整的缓冲区推入 [`ByteSink`]。
pub struct WriteStream {
    sink: Box<dyn ByteSink>,
}

impl std::fmt::Debug for WriteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteStream")
            .field("supports_deadline", &self.sink.supports_deadline())
            .finish()
    }
}

impl WriteStream {
    pub fn new(sink: Box<dyn ByteSink>) -> Self {
        Self { sink }
    }

    /// Writes and flushes the entire buffer, or fails. There is no partial
    /// success.
    ///
    /// 写入并刷新整个缓冲区，否则失败。
    pub async fn write(&mut self, buf: &[u8], deadline: Deadline) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let armed = self.sink.supports_deadline();
        let sink = &mut self.sink;
        let write = async move {
            sink.write_all(buf).await?;
            sink.flush().await
        };
        if armed {
            tokio::time::timeout_at(deadline.at, write)
                .await
                .map_err(|_| deadline.exceeded(Direction::Write))??;
        } else {
            write.await?;
        }

        trace!(bytes = buf.len(), "Wrote to transport");
        Ok(())
    }

    /// Shuts down the write side of the transport.
    /// 关闭传输的写入端。
    pub async fn shutdown(&mut self) -> Result<()> {
        self.sink.shutdown().await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_round_trip_over_duplex() {
        let (client, server) = duplex(64);
        let mut writer = WriteStream::new(Box::new(client));
        let mut reader = ReadStream::new(Box::new(server));

        let deadline = Deadline::after(Duration::from_secs(1));
        writer.write(b"hello pegasus", deadline).await.unwrap();
        let bytes = reader.next(13, deadline).await.unwrap();
        assert_eq!(&bytes[..], b"hello pegasus");
    }

    #[tokio::test]
    async fn test_next_zero_bytes_returns_immediately() {
        let (_client, server) = duplex(64);
        let mut reader = ReadStream::new(Box::new(server));

        let bytes = reader
            .next(0, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn test_next_reports_eof() {
        let (client, server) = duplex(64);
        let mut reader = ReadStream::new(Box::new(server));
        drop(client);

        let err = reader
            .next(4, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(
            matches!(&err, Error::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof),
            "unexpected error: {err:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_deadline_only_when_supported() {
        let (_client, server) = duplex(64);
        let mut reader = ReadStream::new(Box::new(WithDeadline(server)));

        let err = reader
            .next(4, Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DeadlineExceeded {
                direction: Direction::Read,
                ..
            }
        ));

        // Without the capability the read would wait forever.
        let (_client, server) = duplex(64);
        let mut reader = ReadStream::new(Box::new(server));
        let pending = tokio::time::timeout(
            Duration::from_secs(10),
            reader.next(4, Deadline::after(Duration::from_secs(1))),
        )
        .await;
        assert!(pending.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_deadline_on_full_sink() {
        let (client, _server) = duplex(8);
        let mut writer = WriteStream::new(Box::new(WithDeadline(client)));

        let err = writer
            .write(&[7u8; 64], Deadline::after(Duration::from_secs(1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::DeadlineExceeded {
                direction: Direction::Write,
                ..
            }
        ));
    }
}
