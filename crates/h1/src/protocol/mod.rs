//! Core HTTP/1.x protocol types.
//!
//! # Architecture
//!
//! - **Initials** ([`initial`], [`request`], [`response`]): start-line + headers
//!   - [`RequestHeader`]: wraps `http::Request<()>` with the addressed authority and scheme
//!   - [`ResponseHeader`]: wraps `http::Response<()>`
//!   - [`Initial`]: either of them
//!
//! - **Payload** ([`message`]): body items and framing
//!   - [`PayloadItem`]: a body chunk or EOF
//!   - [`PayloadSize`]: how a body is delimited on the wire
//!
//! - **Events** ([`event`]): what a stream reports to its handler
//!   - [`Event`]: initial received, data received, EOF, upgrade
//!
//! - **Error Handling** ([`error`]):
//!   - [`HttpError`]: Top-level error type
//!   - [`ParseError`]: Initial and body parsing errors
//!   - [`SendError`]: Initial and body sending errors
//!   - [`TransportError`]: Failures of the underlying transport
//!   - [`InvalidOperation`]: Misuse of a one-shot or finished component

mod message;
pub use message::PayloadItem;
pub use message::PayloadSize;

mod request;
pub use request::RequestHeader;

mod response;
pub use response::ResponseHeader;

mod initial;
pub use initial::Initial;

mod event;
pub use event::Event;
pub use event::Upgrade;

mod error;
pub use error::BoxError;
pub use error::HttpError;
pub use error::InvalidOperation;
pub use error::ParseError;
pub use error::SendError;
pub use error::TransportError;
