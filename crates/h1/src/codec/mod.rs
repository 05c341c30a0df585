//! Wire codecs for HTTP/1.x messages.
//!
//! An HTTP/1.x message is an initial (start-line plus headers) followed by a body
//! whose framing is decided by the initial. The two halves live in two modules:
//!
//! - [`header`]: [`InitialParser`] and [`InitialBuilder`], one-shot readers and
//!   writers of initials working directly on the connection's transport
//! - [`body`]: framing selection plus `tokio_util` decoders and encoders for
//!   content-length, chunked, close-delimited and empty bodies
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use micro_h1::codec::PayloadDecoder;
//! use micro_h1::protocol::PayloadSize;
//! use tokio_util::codec::Decoder;
//!
//! let mut buffer = BytesMut::from(&b"5\r\nhello\r\n0\r\n\r\n"[..]);
//! let mut decoder = PayloadDecoder::from(PayloadSize::Chunked);
//!
//! let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
//! assert_eq!(&chunk.into_bytes().unwrap()[..], b"hello");
//! assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
//! ```

pub mod body;
pub mod header;

use std::io;

use bytes::{BufMut, BytesMut};

pub use body::{Framing, PayloadDecoder, PayloadEncoder, select_incoming, select_outgoing};
pub use header::{InitialBuilder, InitialParser, capitalize};

/// `io::Write` straight into a `BytesMut`, for `write!` formatting.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut BytesMut);

impl io::Write for FastWrite<'_> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.put_slice(buf);
        Ok(buf.len())
    }

    #[inline]
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
