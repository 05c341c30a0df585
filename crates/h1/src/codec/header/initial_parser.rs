//! Parser for the start-line and header lines of one incoming HTTP/1.x message.
//!
//! The parser reads line by line from the transport instead of waiting for the whole
//! header block, so it can:
//!
//! - enforce the size limit on every line rather than after the fact
//! - detect whether the peer ends lines with CRLF or a bare LF and stick to it
//! - keep header bytes as Latin-1, never assuming they are UTF-8
//!
//! A parser produces exactly one [`Initial`]. Any later call fails: with
//! [`InvalidOperation::ParserExhausted`] after a success, or with the original
//! error after a failure.

use std::str::FromStr;

use bytes::Bytes;
use http::header::{CONNECTION, HOST};
use http::uri::{Authority, Scheme};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode, Uri, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::timeout;
use tracing::trace;

use crate::connection::ConnectionVariables;
use crate::ensure;
use crate::protocol::{HttpError, Initial, InvalidOperation, ParseError, RequestHeader, ResponseHeader, TransportError};
use crate::transport::Transport;

#[derive(Debug)]
enum State {
    Ready,
    Parsed,
    Failed(ParseError),
}

/// One-shot reader of an incoming initial.
#[derive(Debug)]
pub struct InitialParser {
    state: State,
}

impl InitialParser {
    pub fn new() -> Self {
        Self { state: State::Ready }
    }

    /// Reads one initial from the connection's transport.
    ///
    /// A request is produced on the server side, a response on the client side. An
    /// HTTP/1.0 peer downgrades the connection, and any `connection` value other than
    /// `keep-alive` disables keep-alive.
    pub async fn parse<IO>(&mut self, vars: &mut ConnectionVariables<IO>) -> Result<Initial, HttpError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        match std::mem::replace(&mut self.state, State::Parsed) {
            State::Ready => {}
            State::Parsed => return Err(InvalidOperation::ParserExhausted.into()),
            State::Failed(e) => {
                self.state = State::Failed(e.clone());
                return Err(e.into());
            }
        }

        let result = match timeout(vars.context().idle_timeout(), read_initial(vars)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(ParseError::Timeout),
        };

        result.map_err(|e| {
            self.state = State::Failed(e.clone());
            e.into()
        })
    }
}

impl Default for InitialParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts the bytes of the initial read so far against the limit.
struct LineReader<'a, IO> {
    transport: &'a mut Transport<IO>,
    size: usize,
    max_size: usize,
}

impl<IO> LineReader<'_, IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads one line, returned without its terminator.
    async fn read_line(&mut self, delimiter: &[u8]) -> Result<Bytes, ParseError> {
        let limit = self.max_size.saturating_sub(self.size);
        let line = match self.transport.read_until(delimiter, true, Some(limit)).await {
            Ok(line) => line,
            Err(TransportError::LimitOverrun { received, .. }) => {
                return Err(ParseError::too_large_initial(self.size + received, self.max_size));
            }
            Err(e) => return Err(e.into()),
        };

        self.size += line.len();
        ensure!(self.size <= self.max_size, ParseError::too_large_initial(self.size, self.max_size));

        Ok(line.slice(..line.len() - delimiter.len()))
    }
}

async fn read_initial<IO>(vars: &mut ConnectionVariables<IO>) -> Result<Initial, ParseError>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    let max_size = vars.context().max_initial_length();
    let is_client = vars.is_client();
    let transport = vars.transport_mut()?;
    let secure = transport.info().is_secure();

    let mut reader = LineReader { transport, size: 0, max_size };

    // empty lines ahead of the start-line are tolerated, see RFC 7230 section 3.5
    let mut first_line = reader.read_line(b"\n").await?;
    while first_line.is_empty() || first_line[..] == b"\r"[..] {
        first_line = reader.read_line(b"\n").await?;
    }

    let (first_line, delimiter): (Bytes, &[u8]) = if first_line.ends_with(b"\r") {
        (first_line.slice(..first_line.len() - 1), b"\r\n")
    } else {
        (first_line, b"\n")
    };

    let mut headers = HeaderMap::new();
    loop {
        let line = reader.read_line(delimiter).await?;
        if line.is_empty() {
            break;
        }
        let (name, value) = parse_header_line(&line)?;
        headers.append(name, value);
    }
    trace!(size = reader.size, headers = headers.len(), "read initial");

    let basic_info = latin1(&first_line);
    let initial = if is_client {
        Initial::Response(parse_response(&basic_info, headers)?)
    } else {
        Initial::Request(parse_request(&basic_info, headers, secure)?)
    };

    if initial.version() == Version::HTTP_10 {
        vars.downgrade_http_version();
        vars.disable_keep_alive();
    }

    if !initial.connection_is("keep-alive") {
        vars.disable_keep_alive();
    }

    Ok(initial)
}

fn parse_header_line(line: &[u8]) -> Result<(HeaderName, HeaderValue), ParseError> {
    let colon = line
        .iter()
        .position(|b| *b == b':')
        .ok_or_else(|| ParseError::invalid_initial(format!("malformed header line: {:?}", latin1(line))))?;

    let name = HeaderName::from_bytes(line[..colon].trim_ascii())
        .map_err(|e| ParseError::invalid_header(format!("{e}: {:?}", latin1(&line[..colon]))))?;
    let value = HeaderValue::from_bytes(line[colon + 1..].trim_ascii())
        .map_err(|e| ParseError::invalid_header(format!("{e} in header {name}")))?;

    Ok((name, value))
}

fn parse_request(basic_info: &str, headers: HeaderMap, secure: bool) -> Result<RequestHeader, ParseError> {
    let mut parts = basic_info.splitn(3, ' ');
    let (Some(method), Some(target), Some(version)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(ParseError::invalid_initial(format!("malformed request line: {basic_info:?}")));
    };

    let method = Method::from_str(method).map_err(|e| ParseError::invalid_initial(format!("{e}: {method:?}")))?;
    let uri = Uri::from_str(target).map_err(|e| ParseError::invalid_initial(format!("{e}: {target:?}")))?;
    let version = parse_version(version)?;

    let authority = headers.get(HOST).and_then(|host| Authority::try_from(host.as_bytes()).ok());

    let mut request = Request::new(());
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.version_mut() = version;
    *request.headers_mut() = headers;

    let scheme = if secure { Scheme::HTTPS } else { Scheme::HTTP };
    Ok(RequestHeader::from(request).with_authority(authority).with_scheme(Some(scheme)))
}

fn parse_response(basic_info: &str, headers: HeaderMap) -> Result<ResponseHeader, ParseError> {
    // the reason phrase is informative only, it may be missing
    let mut parts = basic_info.splitn(3, ' ');
    let (Some(version), Some(status)) = (parts.next(), parts.next()) else {
        return Err(ParseError::invalid_initial(format!("malformed status line: {basic_info:?}")));
    };

    let version = parse_version(version)?;
    let status = StatusCode::from_str(status.trim())
        .map_err(|e| ParseError::invalid_initial(format!("{e}: {status:?}")))?;

    let mut response = http::Response::new(());
    *response.status_mut() = status;
    *response.version_mut() = version;
    *response.headers_mut() = headers;

    Ok(ResponseHeader::from(response))
}

fn parse_version(version: &str) -> Result<Version, ParseError> {
    let trimmed = version.trim();
    if trimmed.eq_ignore_ascii_case("HTTP/1.1") {
        Ok(Version::HTTP_11)
    } else if trimmed.eq_ignore_ascii_case("HTTP/1.0") {
        Ok(Version::HTTP_10)
    } else {
        Err(ParseError::InvalidVersion(trimmed.to_string()))
    }
}

/// Every byte is one character, as HTTP/1.x initials are Latin-1.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|b| char::from(*b)).collect()
}

/// Returns true if `value` is a comma separated list holding `token`, ignoring case.
pub(crate) fn has_token(value: &HeaderValue, token: &str) -> bool {
    value
        .as_bytes()
        .split(|b| *b == b',')
        .any(|item| item.trim_ascii().eq_ignore_ascii_case(token.as_bytes()))
}

/// Returns true if any `connection` header lists `token`.
pub(crate) fn connection_has(headers: &HeaderMap, token: &str) -> bool {
    headers.get_all(CONNECTION).iter().any(|value| has_token(value, token))
}
