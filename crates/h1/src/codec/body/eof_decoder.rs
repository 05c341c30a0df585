//! Decoder for bodies delimited by the end of the transport.
//!
//! Used for responses that declare neither `content-length` nor `transfer-encoding`:
//! everything the server sends until it closes the connection is body.

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EofDecoder {
    finished: bool,
}

impl EofDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for EofDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.finished {
            return Ok(Some(PayloadItem::Eof));
        }

        if src.is_empty() {
            return Ok(None);
        }

        Ok(Some(PayloadItem::Chunk(src.split().freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(item) => Ok(Some(item)),
            None => {
                self.finished = true;
                Ok(Some(PayloadItem::Eof))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_eof_is_body_eof() {
        let mut buffer = BytesMut::from(&b"partial body"[..]);
        let mut decoder = EofDecoder::new();

        let chunk = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&chunk.as_bytes().unwrap()[..], b"partial body");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        assert!(decoder.decode_eof(&mut buffer).unwrap().unwrap().is_eof());
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }
}
