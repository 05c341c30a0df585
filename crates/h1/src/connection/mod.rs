//! Connection handling: the serve loop, streams and their shared state.
//!
//! # Components
//!
//! - [`H1Connection`]: owns the transport and serves one [`H1Stream`] after another,
//!   on either the server or the client side
//! - [`ServingConnection`]: a handle to a connection being served, used to submit
//!   client requests, close the connection and inspect its outcome
//! - [`H1Stream`] / [`StreamWriter`]: one request/response exchange, read as
//!   [`Event`](crate::protocol::Event)s and written through the writer
//! - [`ConnectionVariables`] / [`ConnectionState`]: what the streams of one connection
//!   share, the negotiated version and keep-alive eligibility among others
//! - [`H1Context`]: configuration
//!
//! # Features
//!
//! - Keep-alive with HTTP/1.0 downgrade
//! - Expect-continue mechanism
//! - Protocol upgrades handing the transport over
//! - Best-effort error responses on the server side

mod context;
mod http_connection;
mod stream;
mod variables;

pub use context::{DEFAULT_CHUNK_SIZE, DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_INITIAL_LENGTH, H1Context};
pub use http_connection::{H1Connection, ServingConnection};
pub use stream::{H1Stream, StreamWriter};
pub use variables::{ConnectionState, ConnectionVariables};
