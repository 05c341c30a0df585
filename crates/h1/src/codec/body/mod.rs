//! Body framing for HTTP/1.x messages.
//!
//! # Components
//!
//! ## Framing
//! - [`select_incoming`]: decides how an incoming body is delimited
//! - [`select_outgoing`]: decides how an outgoing body is written
//!
//! ## Decoders
//! - [`ChunkedDecoder`]: chunked transfer encoded payloads
//! - [`LengthDecoder`]: fixed-length payloads
//! - [`EofDecoder`]: payloads delimited by the end of the transport
//! - [`PayloadDecoder`]: picks one of the above, or no body at all
//!
//! ## Encoders
//! - [`ChunkedEncoder`]: chunked transfer encoding
//! - [`LengthEncoder`]: fixed-length payloads, held to the declared length
//! - [`PayloadEncoder`]: picks one of the above, a close-delimited body, or no body

mod chunked_decoder;
mod chunked_encoder;
mod eof_decoder;
mod framing;
mod length_decoder;
mod length_encoder;
mod payload_decoder;
mod payload_encoder;

pub use chunked_decoder::ChunkedDecoder;
pub use chunked_encoder::ChunkedEncoder;
pub use eof_decoder::EofDecoder;
pub use framing::{Framing, select_incoming, select_outgoing};
pub use length_decoder::LengthDecoder;
pub use length_encoder::LengthEncoder;
pub use payload_decoder::PayloadDecoder;
pub use payload_encoder::PayloadEncoder;
