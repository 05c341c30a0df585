//! Decoder for bodies framed by `content-length`.
//!
//! Exactly the declared number of bytes belong to the body, anything after them is
//! the next message and stays in the buffer. See
//! [RFC 7230 Section 3.3.2](https://tools.ietf.org/html/rfc7230#section-3.3.2).

use bytes::BytesMut;
use tokio_util::codec::Decoder;

use crate::protocol::{ParseError, PayloadItem};

/// Yields the declared bytes as they arrive, then `Eof`.
///
/// The transport ending before `remaining` reaches zero is a premature eof, never a
/// short body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthDecoder {
    declared: u64,
    remaining: u64,
}

impl LengthDecoder {
    pub fn new(length: u64) -> Self {
        Self { declared: length, remaining: length }
    }

    /// Body bytes still expected.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Decoder for LengthDecoder {
    type Item = PayloadItem;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if self.remaining == 0 {
            return Ok(Some(PayloadItem::Eof));
        }
        if src.is_empty() {
            return Ok(None);
        }

        // bounded by `remaining`, so the cast back to usize can't truncate
        let take = self.remaining.min(src.len() as u64) as usize;
        self.remaining -= take as u64;
        Ok(Some(PayloadItem::Chunk(src.split_to(take).freeze())))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(item) = self.decode(src)? {
            return Ok(Some(item));
        }
        Err(ParseError::premature_eof(format!(
            "received {} of {} declared body bytes",
            self.declared - self.remaining,
            self.declared
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_declared_length() {
        let mut buffer = BytesMut::from(&b"hello worldGET / HTTP/1.1\r\n"[..]);
        let mut decoder = LengthDecoder::new(11);

        let item = decoder.decode(&mut buffer).unwrap().unwrap();
        assert_eq!(&item.into_bytes().unwrap()[..], b"hello world");
        assert_eq!(decoder.remaining(), 0);

        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
        assert_eq!(&buffer[..], b"GET / HTTP/1.1\r\n");
    }

    #[test]
    fn body_split_across_reads() {
        let mut decoder = LengthDecoder::new(6);

        let mut buffer = BytesMut::from(&b"abcd"[..]);
        assert_eq!(&decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap()[..], b"abcd");
        assert!(decoder.decode(&mut buffer).unwrap().is_none());

        buffer.extend_from_slice(b"ef");
        assert_eq!(&decoder.decode(&mut buffer).unwrap().unwrap().into_bytes().unwrap()[..], b"ef");
        assert!(decoder.decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn zero_length_is_eof_right_away() {
        let mut buffer = BytesMut::new();
        assert!(LengthDecoder::new(0).decode(&mut buffer).unwrap().unwrap().is_eof());
    }

    #[test]
    fn transport_ending_early_is_premature_eof() {
        let mut buffer = BytesMut::from(&b"abc"[..]);
        let mut decoder = LengthDecoder::new(5);

        let chunk = decoder.decode_eof(&mut buffer).unwrap().unwrap();
        assert_eq!(chunk.as_bytes().unwrap().len(), 3);

        let result = decoder.decode_eof(&mut buffer);
        assert!(
            matches!(result, Err(ParseError::PrematureEof { ref reason }) if reason == "received 3 of 5 declared body bytes")
        );
    }
}
