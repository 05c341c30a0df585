//! Reading and writing HTTP/1.x initials (start-line + headers).
//!
//! - [`InitialParser`]: reads one incoming initial, line by line, from the transport
//! - [`InitialBuilder`]: justifies and writes one outgoing initial to the transport
//! - [`capitalize`]: the canonical wire form of a header name

mod header_case;
mod initial_builder;
mod initial_parser;

pub use header_case::capitalize;
pub use initial_builder::InitialBuilder;
pub use initial_parser::InitialParser;
pub(crate) use initial_parser::{connection_has, has_token};
