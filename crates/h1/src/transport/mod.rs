//! Buffered byte-stream transport the connection engine reads from and writes to.
//!
//! [`Transport`] wraps any tokio `AsyncRead + AsyncWrite` IO with a read buffer and a
//! write buffer. Reads are delimiter or length based and never lose bytes: whatever was
//! read past the current frame stays in the read buffer for the next call. Writes are
//! buffered until [`Transport::drain`] is called.
//!
//! Once a connection is upgraded the transport is detached and handed over as a raw
//! bidirectional stream. It still implements [`AsyncRead`] and [`AsyncWrite`] and
//! replays the bytes it had already buffered before reading from the IO again.

use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::TransportError;

const INIT_READ_BUF_SIZE: usize = 8 * 1024;
const INIT_WRITE_BUF_SIZE: usize = 8 * 1024;

/// Extra information about the underlying channel, supplied by whoever accepted or
/// initiated the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportInfo {
    secure: bool,
    peer_addr: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
}

impl TransportInfo {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_peer_addr(mut self, addr: SocketAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    #[must_use]
    pub fn with_local_addr(mut self, addr: SocketAddr) -> Self {
        self.local_addr = Some(addr);
        self
    }

    /// Whether the channel is encrypted (e.g. TLS terminated below this transport).
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }
}

/// A buffered transport over an async IO.
#[derive(Debug)]
pub struct Transport<IO> {
    io: IO,
    read_buf: BytesMut,
    write_buf: BytesMut,
    info: TransportInfo,
    eof: bool,
    closed: bool,
}

impl<IO> Transport<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: IO, info: TransportInfo) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(INIT_READ_BUF_SIZE),
            write_buf: BytesMut::with_capacity(INIT_WRITE_BUF_SIZE),
            info,
            eof: false,
            closed: false,
        }
    }

    pub fn info(&self) -> &TransportInfo {
        &self.info
    }

    /// Returns true once [`Transport::close`] was called or the io failed while writing.
    pub fn closed(&self) -> bool {
        self.closed
    }

    /// Reads more bytes from the io into the read buffer, returns how many were read.
    async fn fill_buf(&mut self) -> Result<usize, TransportError> {
        ensure!(!self.closed, TransportError::Closed);
        if self.eof {
            return Ok(0);
        }

        self.read_buf.reserve(INIT_READ_BUF_SIZE);
        let n = self.io.read_buf(&mut self.read_buf).await?;
        if n == 0 {
            trace!("transport reached eof");
            self.eof = true;
        }
        Ok(n)
    }

    /// Reads until `delimiter` is found.
    ///
    /// The returned bytes contain the delimiter when `keep_separator` is true. When
    /// `limit` is given and no delimiter shows up within `limit` bytes, fails with
    /// [`TransportError::LimitOverrun`] and leaves the buffered bytes untouched.
    pub async fn read_until(
        &mut self,
        delimiter: &[u8],
        keep_separator: bool,
        limit: Option<usize>,
    ) -> Result<Bytes, TransportError> {
        debug_assert!(!delimiter.is_empty());
        let mut searched = 0;

        loop {
            if let Some(pos) = find(&self.read_buf[searched..], delimiter).map(|pos| pos + searched) {
                let end = pos + delimiter.len();
                if let Some(limit) = limit {
                    ensure!(end <= limit, TransportError::LimitOverrun { limit, received: end });
                }

                let mut line = self.read_buf.split_to(end);
                if !keep_separator {
                    line.truncate(pos);
                }
                return Ok(line.freeze());
            }

            if let Some(limit) = limit {
                ensure!(
                    self.read_buf.len() < limit,
                    TransportError::LimitOverrun { limit, received: self.read_buf.len() }
                );
            }

            // the tail may hold the first bytes of a delimiter split across two reads
            searched = self.read_buf.len().saturating_sub(delimiter.len() - 1);

            if self.fill_buf().await? == 0 {
                return Err(self.eof_error());
            }
        }
    }

    /// Reads exactly `n` bytes.
    pub async fn read_exact(&mut self, n: usize) -> Result<Bytes, TransportError> {
        while self.read_buf.len() < n {
            if self.fill_buf().await? == 0 {
                trace!(expected = n, received = self.read_buf.len(), "transport eof before read_exact completed");
                return Err(self.eof_error());
            }
        }

        Ok(self.read_buf.split_to(n).freeze())
    }

    /// Reads at most `max` bytes, waiting only if nothing is buffered.
    pub async fn read(&mut self, max: usize) -> Result<Bytes, TransportError> {
        if self.read_buf.is_empty() && self.fill_buf().await? == 0 {
            return Err(TransportError::Eof);
        }

        let len = self.read_buf.len().min(max);
        Ok(self.read_buf.split_to(len).freeze())
    }

    /// Drives `decoder` over the read buffer until it yields an item.
    ///
    /// When the io reaches eof, [`Decoder::decode_eof`] decides whether the frame is
    /// complete, and a decoder that still yields nothing gets [`TransportError::Eof`].
    pub async fn decode<D>(&mut self, decoder: &mut D) -> Result<D::Item, D::Error>
    where
        D: Decoder,
        D::Error: From<TransportError>,
    {
        loop {
            if let Some(item) = decoder.decode(&mut self.read_buf)? {
                return Ok(item);
            }

            if self.fill_buf().await? == 0 {
                return match decoder.decode_eof(&mut self.read_buf)? {
                    Some(item) => Ok(item),
                    None => Err(TransportError::Eof.into()),
                };
            }
        }
    }

    /// Appends `data` to the write buffer.
    pub fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        ensure!(!self.closed, TransportError::Closed);
        self.write_buf.extend_from_slice(data);
        Ok(())
    }

    /// Gives encoders direct access to the write buffer.
    pub fn write_buf_mut(&mut self) -> &mut BytesMut {
        &mut self.write_buf
    }

    pub fn buffered_write_len(&self) -> usize {
        self.write_buf.len()
    }

    /// Writes every buffered byte to the io and flushes it.
    pub async fn drain(&mut self) -> Result<(), TransportError> {
        ensure!(!self.closed, TransportError::Closed);

        if let Err(e) = self.flush_write_buf().await {
            self.closed = true;
            return Err(e.into());
        }
        Ok(())
    }

    async fn flush_write_buf(&mut self) -> io::Result<()> {
        self.io.write_all_buf(&mut self.write_buf).await?;
        self.io.flush().await
    }

    /// Flushes what is left and shuts the io down. Calling it again is a no-op.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.flush_write_buf().await {
            trace!(cause = %e, "failed to flush before closing transport");
        }
        if let Err(e) = self.io.shutdown().await {
            trace!(cause = %e, "failed to shutdown transport");
        }
    }

    /// Drops everything buffered in both directions and shuts the io down.
    pub async fn abort(&mut self) {
        self.read_buf.clear();
        self.write_buf.clear();
        if self.closed {
            return;
        }
        self.closed = true;

        if let Err(e) = self.io.shutdown().await {
            trace!(cause = %e, "failed to shutdown aborted transport");
        }
    }

    /// Gives back the io together with the bytes already read but not yet consumed.
    pub fn into_parts(self) -> (IO, BytesMut) {
        (self.io, self.read_buf)
    }

    fn eof_error(&self) -> TransportError {
        if self.read_buf.is_empty() {
            TransportError::Eof
        } else {
            TransportError::IncompleteRead { received: self.read_buf.len() }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() == 1 {
        return haystack.iter().position(|b| *b == needle[0]);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

impl<IO> AsyncRead for Transport<IO>
where
    IO: AsyncRead + Unpin,
{
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if !this.read_buf.is_empty() {
            let len = this.read_buf.len().min(buf.remaining());
            buf.put_slice(&this.read_buf[..len]);
            this.read_buf.advance(len);
            return Poll::Ready(Ok(()));
        }

        Pin::new(&mut this.io).poll_read(cx, buf)
    }
}

impl<IO> AsyncWrite for Transport<IO>
where
    IO: AsyncWrite + Unpin,
{
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        // bytes buffered by the engine go out before anything written through the raw stream
        while this.write_buf.has_remaining() {
            let n = std::task::ready!(Pin::new(&mut this.io).poll_write(cx, &this.write_buf))?;
            if n == 0 {
                return Poll::Ready(Err(io::ErrorKind::WriteZero.into()));
            }
            this.write_buf.advance(n);
        }

        Pin::new(&mut this.io).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockIo;

    #[tokio::test]
    async fn read_until_across_partial_reads() {
        let io = MockIo::new(b"GET / HTTP/1.1\r\nHost: a\r\n".to_vec()).with_read_step(3);
        let mut transport = Transport::new(io, TransportInfo::new());

        let line = transport.read_until(b"\r\n", true, None).await.unwrap();
        assert_eq!(&line[..], b"GET / HTTP/1.1\r\n");

        let line = transport.read_until(b"\r\n", false, None).await.unwrap();
        assert_eq!(&line[..], b"Host: a");

        assert!(matches!(transport.read_until(b"\r\n", true, None).await, Err(TransportError::Eof)));
    }

    #[tokio::test]
    async fn read_until_respects_limit() {
        let io = MockIo::new(b"0123456789\n".to_vec());
        let mut transport = Transport::new(io, TransportInfo::new());

        let result = transport.read_until(b"\n", true, Some(5)).await;
        assert!(matches!(result, Err(TransportError::LimitOverrun { limit: 5, .. })));

        // nothing was consumed by the failed read
        let line = transport.read_until(b"\n", true, None).await.unwrap();
        assert_eq!(&line[..], b"0123456789\n");
    }

    #[tokio::test]
    async fn read_exact_reports_incomplete_read() {
        let io = MockIo::new(b"abc".to_vec());
        let mut transport = Transport::new(io, TransportInfo::new());

        let result = transport.read_exact(5).await;
        assert!(matches!(result, Err(TransportError::IncompleteRead { received: 3 })));
    }

    #[tokio::test]
    async fn read_returns_buffered_bytes_first() {
        let io = MockIo::new(b"hello world".to_vec()).with_read_step(5);
        let mut transport = Transport::new(io, TransportInfo::new());

        assert_eq!(&transport.read(3).await.unwrap()[..], b"hel");
        // served from the buffer, the io is not touched
        assert_eq!(&transport.read(10).await.unwrap()[..], b"lo");
        assert_eq!(&transport.read(10).await.unwrap()[..], b" worl");
        assert_eq!(&transport.read(10).await.unwrap()[..], b"d");

        assert!(matches!(transport.read(10).await, Err(TransportError::Eof)));
    }

    #[tokio::test]
    async fn write_is_buffered_until_drain() {
        let io = MockIo::new(Vec::new());
        let written = io.written();
        let mut transport = Transport::new(io, TransportInfo::new());

        transport.write(b"hello").unwrap();
        assert!(written.lock().unwrap().is_empty());

        transport.drain().await.unwrap();
        assert_eq!(&written.lock().unwrap()[..], b"hello");

        transport.close().await;
        transport.close().await;
        assert!(transport.closed());
        assert!(matches!(transport.write(b"x"), Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn abort_discards_buffers() {
        let io = MockIo::new(b"line\r\nrest".to_vec());
        let written = io.written();
        let mut transport = Transport::new(io, TransportInfo::new());
        transport.read_until(b"\r\n", true, None).await.unwrap();
        transport.write(b"never sent").unwrap();

        transport.abort().await;

        assert!(transport.closed());
        assert!(written.lock().unwrap().is_empty());
        assert!(matches!(transport.read(10).await, Err(TransportError::Closed)));
    }

    #[tokio::test]
    async fn detached_transport_replays_buffered_bytes() {
        let io = MockIo::new(b"line\r\nrest".to_vec());
        let mut transport = Transport::new(io, TransportInfo::new());
        transport.read_until(b"\r\n", true, None).await.unwrap();

        let mut raw = Vec::new();
        transport.read_to_end(&mut raw).await.unwrap();
        assert_eq!(&raw[..], b"rest");
    }
}
