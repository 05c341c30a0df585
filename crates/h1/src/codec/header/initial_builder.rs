//! Builder writing the start-line and headers of one outgoing HTTP/1.x message.
//!
//! Before anything is written the initial is justified: headers the peer expects are
//! filled in where the caller left them out. The justified initial is what actually
//! went over the wire, so the builder hands it back as the record of what was sent.
//!
//! # Default headers
//!
//! Requests:
//! - `accept: */*` and `user-agent: micro-h1/<version>`
//! - `connection`, from whether the connection may still be kept alive
//! - `host`, from the authority the request is addressed to
//!
//! Responses:
//! - `connection: Close` for every status >= 400, otherwise from keep-alive eligibility
//! - `server: micro-h1/<version>`
//! - `transfer-encoding: Chunked` on HTTP/1.1 when no `content-length` is given and
//!   the status allows a body

use std::io::Write;

use bytes::{BufMut, BytesMut};
use http::header::{ACCEPT, CONNECTION, CONTENT_LENGTH, HOST, SERVER, TRANSFER_ENCODING, USER_AGENT};
use http::{HeaderValue, Method, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Encoder;
use tracing::trace;

use crate::codec::FastWrite;
use crate::codec::header::header_case::put_capitalized;
use crate::connection::ConnectionVariables;
use crate::protocol::{HttpError, Initial, InvalidOperation, RequestHeader, SendError, TransportError};
use crate::{IDENTIFIER, ensure};

/// Initial buffer size reserved for one initial
const INIT_HEADER_SIZE: usize = 4 * 1024;

#[derive(Debug)]
enum State {
    Ready,
    Built,
    Failed(SendError),
}

/// One-shot writer of an outgoing initial.
#[derive(Debug)]
pub struct InitialBuilder {
    state: State,
}

impl InitialBuilder {
    pub fn new() -> Self {
        Self { state: State::Ready }
    }

    /// Justifies `initial`, writes it to the transport, drains the transport and
    /// returns the justified initial.
    ///
    /// If the final `connection` header is not `keep-alive`, keep-alive is disabled
    /// for the connection.
    pub async fn build<IO>(
        &mut self,
        vars: &mut ConnectionVariables<IO>,
        initial: impl Into<Initial>,
    ) -> Result<Initial, HttpError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        match std::mem::replace(&mut self.state, State::Built) {
            State::Ready => {}
            State::Built => return Err(InvalidOperation::BuilderExhausted.into()),
            State::Failed(e) => {
                self.state = State::Failed(e.clone());
                return Err(e.into());
            }
        }

        let initial = justify(vars, initial.into());
        if let Err(e) = write_initial(vars, &initial).await {
            self.state = State::Failed(e.clone());
            return Err(e.into());
        }

        if !initial.connection_is("keep-alive") {
            vars.disable_keep_alive();
        }
        Ok(initial)
    }
}

impl Default for InitialBuilder {
    fn default() -> Self {
        Self::new()
    }
}

async fn write_initial<IO>(vars: &mut ConnectionVariables<IO>, initial: &Initial) -> Result<(), SendError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let transport = vars.transport_mut()?;
    ensure!(!transport.closed(), TransportError::Closed.into());

    InitialEncoder.encode(initial, transport.write_buf_mut())?;
    trace!(buffered = transport.buffered_write_len(), "encoded initial");
    transport.drain().await?;
    Ok(())
}

fn justify<IO>(vars: &ConnectionVariables<IO>, mut initial: Initial) -> Initial
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let version = vars.http_version();
    let default_connection = HeaderValue::from_static(if vars.can_keep_alive() { "Keep-Alive" } else { "Close" });
    initial.set_version(version);

    match &mut initial {
        Initial::Request(request) => {
            let host = request.authority().and_then(|authority| HeaderValue::from_str(authority.as_str()).ok());
            let headers = request.headers_mut();

            headers.entry(ACCEPT).or_insert_with(|| HeaderValue::from_static("*/*"));
            headers.entry(USER_AGENT).or_insert_with(|| HeaderValue::from_static(IDENTIFIER));
            headers.entry(CONNECTION).or_insert(default_connection);
            if let Some(host) = host {
                headers.insert(HOST, host);
            }
        }

        Initial::Response(response) => {
            let status = response.status();
            let bodiless = response.is_bodiless();
            let headers = response.headers_mut();

            if status.as_u16() >= 400 {
                headers.insert(CONNECTION, HeaderValue::from_static("Close"));
            }
            headers.entry(CONNECTION).or_insert(default_connection);
            headers.entry(SERVER).or_insert_with(|| HeaderValue::from_static(IDENTIFIER));

            if version == Version::HTTP_11 && !bodiless && !headers.contains_key(CONTENT_LENGTH) {
                headers.entry(TRANSFER_ENCODING).or_insert_with(|| HeaderValue::from_static("Chunked"));
            }
        }
    }

    initial
}

/// Serializes an initial: start-line, capitalized headers, blank line.
struct InitialEncoder;

impl Encoder<&Initial> for InitialEncoder {
    type Error = SendError;

    fn encode(&mut self, item: &Initial, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.reserve(INIT_HEADER_SIZE);
        let version = version_str(item.version());

        match item {
            Initial::Request(request) => {
                write!(FastWrite(dst), "{} ", request.method())?;
                write_request_target(request, dst)?;
                write!(FastWrite(dst), " {version}\r\n")?;
            }
            Initial::Response(response) => {
                let status = response.status();
                write!(
                    FastWrite(dst),
                    "{version} {} {}\r\n",
                    status.as_str(),
                    status.canonical_reason().unwrap_or("Unknown")
                )?;
            }
        }

        for (name, value) in item.headers() {
            put_capitalized(name, dst);
            dst.put_slice(b": ");
            // values go out byte for byte, latin-1 included
            dst.put_slice(value.as_bytes());
            dst.put_slice(b"\r\n");
        }
        dst.put_slice(b"\r\n");
        Ok(())
    }
}

/// Origin-form for absolute targets (the authority travels in `host`), authority-form
/// for CONNECT, the target as given otherwise.
fn write_request_target(request: &RequestHeader, dst: &mut BytesMut) -> Result<(), SendError> {
    let uri = request.uri();

    if request.method() == Method::CONNECT
        && let Some(authority) = uri.authority()
    {
        dst.put_slice(authority.as_str().as_bytes());
        return Ok(());
    }

    if uri.scheme().is_some() || uri.authority().is_some() {
        let target = uri.path_and_query().map_or("/", |path_and_query| path_and_query.as_str());
        dst.put_slice(target.as_bytes());
    } else {
        write!(FastWrite(dst), "{uri}")?;
    }
    Ok(())
}

fn version_str(version: Version) -> &'static str {
    if version == Version::HTTP_10 { "HTTP/1.0" } else { "HTTP/1.1" }
}
