use crate::codec::body::chunked_encoder::ChunkedEncoder;
use crate::codec::body::length_encoder::LengthEncoder;
use crate::ensure;
use crate::protocol::{PayloadItem, PayloadSize, SendError};
use bytes::{Buf, BytesMut};

use tokio_util::codec::Encoder;

/// encode payload for an outgoing body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadEncoder {
    kind: Kind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Kind {
    /// held to the declared `content-length`
    Length(LengthEncoder),

    /// size-prefixed chunks
    Chunked(ChunkedEncoder),

    /// payload ends when the connection closes
    UntilClose { eof: bool },

    /// the message can't carry a body
    NoBody { eof: bool },
}

impl PayloadEncoder {
    /// A message without body: any non-empty chunk is refused.
    pub fn empty() -> Self {
        Self { kind: Kind::NoBody { eof: false } }
    }

    /// `transfer-encoding: chunked`, terminated by the zero-size chunk.
    pub fn chunked() -> Self {
        Self { kind: Kind::Chunked(ChunkedEncoder::new()) }
    }

    /// Exactly `size` bytes, no more and no fewer.
    pub fn fix_length(size: u64) -> Self {
        Self { kind: Kind::Length(LengthEncoder::new(size)) }
    }

    /// create a `PayloadEncoder` whose body is delimited by closing the connection
    pub fn until_close() -> Self {
        Self { kind: Kind::UntilClose { eof: false } }
    }

    pub fn is_chunked(&self) -> bool {
        matches!(self.kind, Kind::Chunked(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.kind, Kind::NoBody { .. })
    }

    pub fn is_until_close(&self) -> bool {
        matches!(self.kind, Kind::UntilClose { .. })
    }

    pub fn is_finish(&self) -> bool {
        match &self.kind {
            Kind::Length(encoder) => encoder.is_finish(),
            Kind::Chunked(encoder) => encoder.is_finish(),
            Kind::UntilClose { eof } | Kind::NoBody { eof } => *eof,
        }
    }
}

impl From<PayloadSize> for PayloadEncoder {
    fn from(size: PayloadSize) -> Self {
        match size {
            PayloadSize::Length(n) => Self::fix_length(n),
            PayloadSize::Chunked => Self::chunked(),
            PayloadSize::UntilEof => Self::until_close(),
            PayloadSize::Empty => Self::empty(),
        }
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for PayloadEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &mut self.kind {
            Kind::Length(encoder) => encoder.encode(item, dst),
            Kind::Chunked(encoder) => encoder.encode(item, dst),
            Kind::UntilClose { eof } => match item {
                PayloadItem::Chunk(mut bytes) => {
                    while bytes.has_remaining() {
                        let chunk = bytes.chunk();
                        let n = chunk.len();
                        dst.extend_from_slice(chunk);
                        bytes.advance(n);
                    }
                    Ok(())
                }
                PayloadItem::Eof => {
                    *eof = true;
                    Ok(())
                }
            },
            Kind::NoBody { eof } => match item {
                PayloadItem::Chunk(bytes) => {
                    ensure!(!bytes.has_remaining(), SendError::invalid_body("this message can't carry a body"));
                    Ok(())
                }
                PayloadItem::Eof => {
                    *eof = true;
                    Ok(())
                }
            },
        }
    }
}
