//! Decoder implementation for HTTP chunked transfer encoding.
//!
//! This module decodes HTTP message bodies that use chunked transfer encoding
//! as specified in [RFC 7230 Section 4.1](https://tools.ietf.org/html/rfc7230#section-4.1).
//!
//! Size lines are parsed with [`httparse::parse_chunk_size`], which also discards
//! chunk extensions. Trailer fields after the last chunk are read and dropped.

use bytes::{Buf, BytesMut};
use httparse::Status;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::ensure;
use crate::protocol::{ParseError, PayloadItem};

/// Upper bound for a size line or a trailer line we are willing to buffer.
const MAX_LINE_SIZE: usize = 4 * 1024;

/// A decoder for handling HTTP chunked transfer encoding.
///
/// The decoder processes incoming bytes according to the chunked format:
/// - Each chunk starts with its size in hexadecimal, optional extensions and CRLF
/// - Then the chunk data and CRLF
/// - A zero-sized chunk, optional trailers and an empty line end the message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedDecoder {
    state: ChunkedState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkedState {
    /// Read the size line of the next chunk
    Size,
    /// Read chunk data, with the bytes left in the current chunk
    Data(u64),
    /// Read the CRLF closing a chunk
    DataCrlf,
    /// Read trailer lines until the empty line
    Trailer,
    /// The last chunk has been read
    End,
}

impl ChunkedDecoder {
    pub fn new() -> Self {
        Self { state: ChunkedState::Size }
    }
}

impl Default for ChunkedDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ChunkedDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.state {
                ChunkedState::Size => match httparse::parse_chunk_size(src) {
                    Ok(Status::Complete((consumed, size))) => {
                        src.advance(consumed);
                        trace!(size, "read chunk size");
                        self.state = if size == 0 { ChunkedState::Trailer } else { ChunkedState::Data(size) };
                    }
                    Ok(Status::Partial) => {
                        ensure!(src.len() <= MAX_LINE_SIZE, ParseError::invalid_chunk_size("chunk size line too long"));
                        return Ok(None);
                    }
                    Err(_) => {
                        let line = src[..].split(|b| *b == b'\n').next().unwrap_or_default();
                        return Err(ParseError::invalid_chunk_size(format!(
                            "invalid chunk size line: {:?}",
                            String::from_utf8_lossy(line)
                        )));
                    }
                },

                ChunkedState::Data(remaining) => {
                    if src.is_empty() {
                        return Ok(None);
                    }

                    let len = remaining.min(src.len() as u64);
                    let bytes = src.split_to(len as usize).freeze();
                    let remaining = remaining - len;
                    self.state = if remaining == 0 { ChunkedState::DataCrlf } else { ChunkedState::Data(remaining) };
                    return Ok(Some(PayloadItem::Chunk(bytes)));
                }

                ChunkedState::DataCrlf => {
                    if src.len() < 2 {
                        return Ok(None);
                    }
                    ensure!(&src[..2] == b"\r\n", ParseError::invalid_chunk_size("chunk data is not followed by CRLF"));
                    src.advance(2);
                    self.state = ChunkedState::Size;
                }

                ChunkedState::Trailer => {
                    let Some(pos) = src.windows(2).position(|window| window == b"\r\n") else {
                        ensure!(src.len() <= MAX_LINE_SIZE, ParseError::invalid_chunk_size("trailer line too long"));
                        return Ok(None);
                    };

                    src.advance(pos + 2);
                    if pos == 0 {
                        trace!("finished reading chunked data");
                        self.state = ChunkedState::End;
                        return Ok(Some(PayloadItem::Eof));
                    }
                }

                ChunkedState::End => return Ok(Some(PayloadItem::Eof)),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => Err(ParseError::premature_eof("transport ended before the last chunk")),
        }
    }
}
