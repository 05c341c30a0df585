//! In-memory IO for tests: scripted reads, captured writes.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::connection::{ConnectionVariables, H1Context};
use crate::transport::{Transport, TransportInfo};

#[derive(Debug, Default)]
struct ReadState {
    data: Vec<u8>,
    pos: usize,
}

/// Clones share the read position and the captured writes.
#[derive(Debug, Clone)]
pub(crate) struct MockIo {
    read: Arc<Mutex<ReadState>>,
    written: Arc<Mutex<Vec<u8>>>,
    read_step: usize,
    pending_eof: bool,
    write_error: Option<io::ErrorKind>,
}

impl MockIo {
    pub(crate) fn new(data: Vec<u8>) -> Self {
        Self {
            read: Arc::new(Mutex::new(ReadState { data, pos: 0 })),
            written: Arc::new(Mutex::new(Vec::new())),
            read_step: usize::MAX,
            pending_eof: false,
            write_error: None,
        }
    }

    /// Caps every read at `step` bytes.
    pub(crate) fn with_read_step(mut self, step: usize) -> Self {
        self.read_step = step.max(1);
        self
    }

    /// Once the data is exhausted, reads never complete instead of reporting eof.
    pub(crate) fn with_pending_eof(mut self) -> Self {
        self.pending_eof = true;
        self
    }

    pub(crate) fn with_write_error(mut self, kind: io::ErrorKind) -> Self {
        self.write_error = Some(kind);
        self
    }

    pub(crate) fn written(&self) -> Arc<Mutex<Vec<u8>>> {
        Arc::clone(&self.written)
    }

    pub(crate) fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned()
    }
}

impl AsyncRead for MockIo {
    fn poll_read(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let mut read = self.read.lock().unwrap();
        let remaining = read.data.len() - read.pos;
        if remaining == 0 {
            return if self.pending_eof { Poll::Pending } else { Poll::Ready(Ok(())) };
        }

        let len = remaining.min(self.read_step).min(buf.remaining());
        let start = read.pos;
        buf.put_slice(&read.data[start..start + len]);
        read.pos += len;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockIo {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        if let Some(kind) = self.write_error {
            return Poll::Ready(Err(kind.into()));
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

pub(crate) fn variables(context: H1Context, io: MockIo) -> ConnectionVariables<MockIo> {
    ConnectionVariables::new(Arc::new(context), Transport::new(io, TransportInfo::new()))
}
