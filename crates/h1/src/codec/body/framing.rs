//! Decides how the body of a message is delimited, from its initial.
//!
//! Incoming messages follow RFC 7230 section 3.3.3, with a few rules of our own:
//! an upgrade offer has no body, and a request without framing headers is either
//! empty or rejected depending on [`H1Context::require_request_framing`].
//!
//! [`H1Context::require_request_framing`]: crate::connection::H1Context::require_request_framing

use http::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderMap, Method, StatusCode};

use crate::codec::header::connection_has;
use crate::ensure;
use crate::protocol::{Initial, ParseError, PayloadSize, SendError};

/// What follows an incoming initial on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    /// The peer offers to switch protocols, nothing follows in HTTP.
    Upgrade,
    Body(PayloadSize),
}

/// Selects the framing of an incoming message.
///
/// `request_method` is the method of the request a response answers, it only matters
/// on the client side.
pub fn select_incoming(
    initial: &Initial,
    request_method: Option<&Method>,
    require_request_framing: bool,
) -> Result<Framing, ParseError> {
    let headers = initial.headers();

    if connection_has(headers, "upgrade") {
        match initial {
            Initial::Request(_) => return Ok(Framing::Upgrade),
            Initial::Response(response) if response.status() == StatusCode::SWITCHING_PROTOCOLS => {
                return Ok(Framing::Upgrade);
            }
            Initial::Response(_) => {}
        }
    }

    if let Initial::Response(response) = initial
        && (request_method == Some(&Method::HEAD) || response.is_bodiless())
    {
        return Ok(Framing::Body(PayloadSize::Empty));
    }

    if let Some(size) = transfer_coding(headers)? {
        return Ok(Framing::Body(size));
    }

    if let Some(length) = content_length(headers)? {
        return Ok(Framing::Body(PayloadSize::Length(length)));
    }

    match initial {
        Initial::Response(_) => Ok(Framing::Body(PayloadSize::UntilEof)),
        Initial::Request(_) => {
            ensure!(
                !require_request_framing,
                ParseError::invalid_framing("a request body must declare its length or encoding")
            );
            Ok(Framing::Body(PayloadSize::Empty))
        }
    }
}

/// Selects how an outgoing message body is written, from the headers the builder
/// actually sent.
///
/// A response without framing headers is delimited by closing the connection, a
/// request without them has no body.
pub fn select_outgoing(initial: &Initial, request_method: Option<&Method>) -> Result<PayloadSize, SendError> {
    if let Initial::Response(response) = initial
        && (request_method == Some(&Method::HEAD) || response.is_bodiless())
    {
        return Ok(PayloadSize::Empty);
    }

    let headers = initial.headers();
    if let Some(size) = transfer_coding(headers).map_err(|e| SendError::invalid_body(e.to_string()))? {
        return Ok(size);
    }
    if let Some(length) = content_length(headers).map_err(|e| SendError::invalid_body(e.to_string()))? {
        return Ok(PayloadSize::Length(length));
    }

    Ok(match initial {
        Initial::Response(_) => PayloadSize::UntilEof,
        Initial::Request(_) => PayloadSize::Empty,
    })
}

/// Every transfer coding listed, in order, across all `transfer-encoding` headers.
fn codings(headers: &HeaderMap) -> Vec<&[u8]> {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .flat_map(|value| value.as_bytes().split(|b| *b == b','))
        // parameters don't matter for framing
        .map(|item| item.split(|b| *b == b';').next().unwrap_or_default().trim_ascii())
        .filter(|coding| !coding.is_empty())
        .collect()
}

fn transfer_coding(headers: &HeaderMap) -> Result<Option<PayloadSize>, ParseError> {
    let codings = codings(headers);
    let Some(last) = codings.last() else {
        return Ok(None);
    };

    if last.eq_ignore_ascii_case(b"chunked") {
        return Ok(Some(PayloadSize::Chunked));
    }

    ensure!(
        !codings.iter().any(|coding| coding.eq_ignore_ascii_case(b"chunked")),
        ParseError::invalid_framing("chunked found but not last")
    );
    ensure!(
        !last.eq_ignore_ascii_case(b"identity") || codings.len() == 1,
        ParseError::invalid_framing("identity must be the only transfer coding")
    );

    Ok(None)
}

fn content_length(headers: &HeaderMap) -> Result<Option<u64>, ParseError> {
    let mut length = None;

    for item in headers.get_all(CONTENT_LENGTH).iter().flat_map(|value| value.as_bytes().split(|b| *b == b',')) {
        let item = item.trim_ascii();
        ensure!(
            !item.is_empty() && item.iter().all(u8::is_ascii_digit),
            ParseError::invalid_framing(format!("invalid content-length {:?}", String::from_utf8_lossy(item)))
        );

        let value = std::str::from_utf8(item)
            .ok()
            .and_then(|item| item.parse::<u64>().ok())
            .ok_or_else(|| ParseError::invalid_framing("content-length out of range"))?;

        match length {
            Some(previous) if previous != value => {
                return Err(ParseError::invalid_framing(format!("conflicting content-length {previous} and {value}")));
            }
            _ => length = Some(value),
        }
    }

    Ok(length)
}
