use std::error::Error;
use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Boxed error returned by stream handlers.
pub type BoxError = Box<dyn Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("parse error: {source}")]
    ParseError {
        #[from]
        source: ParseError,
    },

    #[error("send error: {source}")]
    SendError {
        #[from]
        source: SendError,
    },

    #[error("transport error: {source}")]
    TransportError {
        #[from]
        source: TransportError,
    },

    #[error("invalid operation: {source}")]
    InvalidOperation {
        #[from]
        source: InvalidOperation,
    },

    #[error("handler error: {source}")]
    HandlerError { source: BoxError },
}

impl HttpError {
    pub fn handler<E: Into<BoxError>>(e: E) -> Self {
        Self::HandlerError { source: e.into() }
    }

    /// Returns true if the error comes from the transport itself (eof, reset,
    /// incomplete read, idle timeout) rather than from the exchanged messages.
    pub fn is_transport(&self) -> bool {
        match self {
            HttpError::ParseError { source } => source.is_transport(),
            HttpError::SendError { source } => matches!(source, SendError::Transport { .. }),
            HttpError::TransportError { .. } => true,
            HttpError::InvalidOperation { .. } | HttpError::HandlerError { .. } => false,
        }
    }
}

#[derive(Error, Debug, Clone)]
pub enum TransportError {
    #[error("transport reached eof")]
    Eof,

    #[error("transport reached eof after {received} bytes of an incomplete read")]
    IncompleteRead { received: usize },

    #[error("delimiter not found within {limit} bytes, {received} bytes buffered")]
    LimitOverrun { limit: usize, received: usize },

    #[error("transport has been closed")]
    Closed,

    #[error("io error: {source}")]
    Io { source: Arc<io::Error> },
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        Self::Io { source: Arc::new(e) }
    }
}

#[derive(Error, Debug, Clone)]
pub enum ParseError {
    #[error("initial size too large, current: {current_size} exceed the limit {max_size}")]
    TooLargeInitial { current_size: usize, max_size: usize },

    #[error("invalid initial: {reason}")]
    InvalidInitial { reason: String },

    #[error("invalid header: {reason}")]
    InvalidHeader { reason: String },

    #[error("invalid http version: {0:?}")]
    InvalidVersion(String),

    #[error("invalid body framing: {reason}")]
    InvalidFraming { reason: String },

    #[error("invalid chunk size: {reason}")]
    InvalidChunkSize { reason: String },

    #[error("body ended prematurely: {reason}")]
    PrematureEof { reason: String },

    #[error("idle timeout while waiting for the initial")]
    Timeout,

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },
}

impl ParseError {
    pub fn too_large_initial(current_size: usize, max_size: usize) -> Self {
        Self::TooLargeInitial { current_size, max_size }
    }

    pub fn invalid_initial<S: ToString>(str: S) -> Self {
        Self::InvalidInitial { reason: str.to_string() }
    }

    pub fn invalid_header<S: ToString>(str: S) -> Self {
        Self::InvalidHeader { reason: str.to_string() }
    }

    pub fn invalid_framing<S: ToString>(str: S) -> Self {
        Self::InvalidFraming { reason: str.to_string() }
    }

    pub fn invalid_chunk_size<S: ToString>(str: S) -> Self {
        Self::InvalidChunkSize { reason: str.to_string() }
    }

    pub fn premature_eof<S: ToString>(str: S) -> Self {
        Self::PrematureEof { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Transport { source: TransportError::from(e.into()) }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ParseError::Transport { .. } | ParseError::Timeout)
    }
}

impl From<io::Error> for ParseError {
    fn from(e: io::Error) -> Self {
        Self::io(e)
    }
}

#[derive(Error, Debug, Clone)]
pub enum SendError {
    #[error("body overflow, {written} bytes written but only {declared} declared")]
    BodyOverflow { declared: u64, written: u64 },

    #[error("body incomplete, {remaining} declared bytes were never written")]
    BodyIncomplete { remaining: u64 },

    #[error("invalid body: {reason}")]
    InvalidBody { reason: String },

    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: TransportError,
    },
}

impl SendError {
    pub fn invalid_body<S: ToString>(str: S) -> Self {
        Self::InvalidBody { reason: str.to_string() }
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Transport { source: TransportError::from(e.into()) }
    }
}

impl From<io::Error> for SendError {
    fn from(e: io::Error) -> Self {
        Self::io(e)
    }
}

/// Operations that are not allowed in the current state of a parser, builder,
/// stream or connection.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidOperation {
    #[error("initial parser has already been used")]
    ParserExhausted,

    #[error("initial builder has already been used")]
    BuilderExhausted,

    #[error("read already finished")]
    ReadFinished,

    #[error("http/1.x can only have one stream per connection at the same time")]
    StreamInFlight,

    #[error("there is no pending upgrade on this stream")]
    NoPendingUpgrade,

    #[error("transport has been detached from the connection")]
    Detached,

    #[error("connection has been closed")]
    Closed,

    #[error("operation is only available on the {0} side")]
    WrongRole(&'static str),

    #[error("outgoing initial has already been written")]
    InitialWritten,

    #[error("outgoing initial has not been written yet")]
    InitialNotWritten,

    #[error("body has already been finished")]
    WriteFinished,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_classified() {
        let eof: HttpError = ParseError::from(TransportError::Eof).into();
        assert!(eof.is_transport());

        let timeout: HttpError = ParseError::Timeout.into();
        assert!(timeout.is_transport());

        let reset: HttpError = SendError::io(io::Error::from(io::ErrorKind::ConnectionReset)).into();
        assert!(reset.is_transport());

        let framing: HttpError = ParseError::invalid_framing("chunked not last").into();
        assert!(!framing.is_transport());

        let premature: HttpError = ParseError::premature_eof("3 bytes missing").into();
        assert!(!premature.is_transport());

        assert!(!HttpError::handler("boom").is_transport());
    }

    #[test]
    fn stream_in_flight_message() {
        assert_eq!(
            InvalidOperation::StreamInFlight.to_string(),
            "http/1.x can only have one stream per connection at the same time"
        );
    }
}
