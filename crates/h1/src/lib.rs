//! An asynchronous, streaming HTTP/1.x connection engine
//!
//! This crate implements the protocol layer underneath an HTTP server or client: it
//! parses and writes initials (start-line plus headers), selects body framing, and
//! runs one request/response exchange after another over a single transport,
//! handling keep-alive and protocol upgrades along the way. Routing, request
//! extraction and the like belong to the layer above.
//!
//! # Features
//!
//! - HTTP/1.1 and HTTP/1.0, on the server and the client side
//! - Asynchronous I/O using tokio, over any `AsyncRead + AsyncWrite`
//! - Streaming bodies: content-length, chunked, close-delimited
//! - Keep-alive connections
//! - Expect-continue mechanism
//! - Protocol upgrades, handing the raw transport to the application
//! - Latin-1 safe header handling
//!
//! # Example
//!
//! ```no_run
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use http::{HeaderMap, StatusCode};
//! use micro_h1::connection::{H1Connection, H1Context, StreamWriter};
//! use micro_h1::handler::StreamHandler;
//! use micro_h1::protocol::{BoxError, Event};
//! use micro_h1::transport::{Transport, TransportInfo};
//! use tokio::net::{TcpListener, TcpStream};
//! use tracing::{info, warn};
//!
//! struct HelloWorld;
//!
//! #[async_trait]
//! impl StreamHandler<TcpStream> for HelloWorld {
//!     async fn event_received(&self, event: Event, writer: &mut StreamWriter<'_, TcpStream>) -> Result<(), BoxError> {
//!         if let Event::EofReceived = event {
//!             writer.send_response(StatusCode::OK, HeaderMap::new()).await?;
//!             writer.write(Bytes::from_static(b"Hello World!\r\n")).await?;
//!             writer.write_eof().await?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     info!(port = 8080, "start listening");
//!
//!     loop {
//!         let (tcp_stream, peer_addr) = match listener.accept().await {
//!             Ok(stream_and_addr) => stream_and_addr,
//!             Err(e) => {
//!                 warn!(cause = %e, "failed to accept");
//!                 continue;
//!             }
//!         };
//!
//!         let transport = Transport::new(tcp_stream, TransportInfo::new().with_peer_addr(peer_addr));
//!         H1Connection::new(H1Context::server(), transport, || HelloWorld).start_serving();
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! The crate is organized into several key modules:
//!
//! - [`transport`]: buffered reads and writes over the underlying IO
//! - [`codec`]: initial parser and builder, body framing, decoders and encoders
//! - [`connection`]: streams, the serve loop and per-connection state
//! - [`handler`]: the trait the application implements to take part in a stream
//! - [`protocol`]: initials, events, payload items and errors
//!
//! # Core Components
//!
//! ## Connection Handling
//!
//! [`connection::H1Connection`] owns the transport and serves one stream at a time. A
//! stream reads its incoming message as a sequence of [`protocol::Event`]s that are
//! fed to a [`handler::StreamHandler`], which answers through a
//! [`connection::StreamWriter`]. Once a stream is done, the connection moves on to the
//! next one if keep-alive still holds, and closes the transport otherwise.
//!
//! ## Error Handling
//!
//! - [`protocol::HttpError`]: Top-level error type
//! - [`protocol::ParseError`]: Incoming initial and body errors
//! - [`protocol::SendError`]: Outgoing initial and body errors
//! - [`protocol::TransportError`]: The transport failed or ended
//! - [`protocol::InvalidOperation`]: A component was used out of order
//!
//! Transport failures end a connection quietly; anything else is reported to the
//! handler and recorded on the connection state.
//!
//! # Limitations
//!
//! - HTTP/1.x only, one exchange at a time (no pipelining)
//! - No TLS support, the transport is expected to be decrypted already
//! - Maximum initial size: 8KB by default

pub mod codec;
pub mod connection;
pub mod handler;
pub mod protocol;
pub mod transport;

mod utils;
pub(crate) use utils::ensure;

#[cfg(test)]
mod test_util;

/// Sent as the default `server` and `user-agent` header.
pub const IDENTIFIER: &str = concat!("micro-h1/", env!("CARGO_PKG_VERSION"));
