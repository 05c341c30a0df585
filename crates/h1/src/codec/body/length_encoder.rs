use bytes::{Buf, BytesMut};
use tokio_util::codec::Encoder;

use crate::ensure;
use crate::protocol::{PayloadItem, SendError};

/// Passes body bytes through unchanged, holding them to the declared content-length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthEncoder {
    declared: u64,
    length: u64,
    eof: bool,
}

impl LengthEncoder {
    pub fn new(length: u64) -> Self {
        Self { declared: length, length, eof: false }
    }

    pub fn is_finish(&self) -> bool {
        self.eof
    }
}

impl<D: Buf> Encoder<PayloadItem<D>> for LengthEncoder {
    type Error = SendError;

    fn encode(&mut self, item: PayloadItem<D>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match item {
            PayloadItem::Chunk(mut bytes) => {
                let len = bytes.remaining() as u64;
                ensure!(
                    len <= self.length,
                    SendError::BodyOverflow { declared: self.declared, written: self.declared - self.length + len }
                );

                while bytes.has_remaining() {
                    let chunk = bytes.chunk();
                    let n = chunk.len();
                    dst.extend_from_slice(chunk);
                    bytes.advance(n);
                }
                self.length -= len;
                Ok(())
            }
            PayloadItem::Eof => {
                ensure!(self.length == 0, SendError::BodyIncomplete { remaining: self.length });
                self.eof = true;
                Ok(())
            }
        }
    }
}
