//! One request/response exchange on a connection.
//!
//! An [`H1Stream`] reads the incoming side as a sequence of [`Event`]s and writes the
//! outgoing side through a [`StreamWriter`]. The incoming sequence is always:
//!
//! 1. `RequestReceived` (server) or `ResponseReceived` (client)
//! 2. zero or more `DataReceived`
//! 3. one terminal event: `EofReceived`, or `UpgradeRequested` / `UpgradeResponded`
//!    when the initial offered an upgrade
//!
//! Body framing is selected once, right after the initial is parsed, and never changes.

use std::sync::Arc;

use bytes::Buf;
use http::header::{CONNECTION, CONTENT_LENGTH, EXPECT, UPGRADE};
use http::uri::Scheme;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Encoder;
use tracing::{debug, trace, warn};

use crate::codec::{Framing, InitialBuilder, InitialParser, PayloadDecoder, PayloadEncoder};
use crate::codec::{select_incoming, select_outgoing};
use crate::connection::{ConnectionState, ConnectionVariables};
use crate::ensure;
use crate::protocol::{
    Event, HttpError, Initial, InvalidOperation, PayloadItem, RequestHeader, ResponseHeader, TransportError, Upgrade,
};
use crate::transport::{Transport, TransportInfo};

const CONTINUE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

#[derive(Debug)]
enum ReadState {
    Initial,
    Body(PayloadDecoder),
    Upgrade(Upgrade),
    Finished,
}

/// State of one request/response cycle.
#[derive(Debug)]
pub struct H1Stream {
    stream_id: u64,
    parser: InitialParser,
    builder: InitialBuilder,
    read: ReadState,
    incoming: Option<Initial>,
    outgoing: Option<Initial>,
    /// method of the request this stream carries, known once either side has it
    request_method: Option<Method>,
    encoder: Option<PayloadEncoder>,
    pending_upgrade: Option<Upgrade>,
    expect_continue: bool,
}

impl H1Stream {
    pub fn new(stream_id: u64) -> Self {
        Self {
            stream_id,
            parser: InitialParser::new(),
            builder: InitialBuilder::new(),
            read: ReadState::Initial,
            incoming: None,
            outgoing: None,
            request_method: None,
            encoder: None,
            pending_upgrade: None,
            expect_continue: false,
        }
    }

    pub fn stream_id(&self) -> u64 {
        self.stream_id
    }

    pub(crate) fn set_stream_id(&mut self, stream_id: u64) {
        self.stream_id = stream_id;
    }

    /// The parsed incoming initial, once the first event was read.
    pub fn incoming(&self) -> Option<&Initial> {
        self.incoming.as_ref()
    }

    /// The justified outgoing initial, once it was written.
    pub fn outgoing(&self) -> Option<&Initial> {
        self.outgoing.as_ref()
    }

    pub fn read_finished(&self) -> bool {
        matches!(self.read, ReadState::Finished)
    }

    pub fn writer<'a, IO>(&'a mut self, vars: &'a mut ConnectionVariables<IO>) -> StreamWriter<'a, IO>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        StreamWriter { stream: self, vars }
    }

    /// Reads the next incoming event.
    ///
    /// Any error is terminal for the incoming side, later calls fail with
    /// [`InvalidOperation::ReadFinished`].
    pub async fn next_event<IO>(&mut self, vars: &mut ConnectionVariables<IO>) -> Result<Event, HttpError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        match std::mem::replace(&mut self.read, ReadState::Finished) {
            ReadState::Initial => self.read_initial(vars).await,
            ReadState::Body(decoder) => self.read_body(vars, decoder).await,
            ReadState::Upgrade(upgrade) => {
                if vars.is_client() {
                    Ok(Event::UpgradeResponded(upgrade))
                } else {
                    Ok(Event::UpgradeRequested(upgrade))
                }
            }
            ReadState::Finished => Err(InvalidOperation::ReadFinished.into()),
        }
    }

    async fn read_initial<IO>(&mut self, vars: &mut ConnectionVariables<IO>) -> Result<Event, HttpError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let initial = self.parser.parse(vars).await?;
        let framing =
            select_incoming(&initial, self.request_method.as_ref(), vars.context().require_request_framing())?;
        trace!(stream_id = self.stream_id, ?framing, "selected incoming framing");

        match framing {
            Framing::Upgrade => {
                let upgrade = Upgrade::new(initial.headers().get(UPGRADE).cloned());
                debug!(stream_id = self.stream_id, protocol = ?upgrade.proposed_protocol(), "upgrade offered");
                self.pending_upgrade = Some(upgrade.clone());
                self.read = ReadState::Upgrade(upgrade);
            }
            Framing::Body(size) => {
                if size.is_until_eof() {
                    vars.disable_keep_alive();
                }
                let decoder = PayloadDecoder::from(size);
                self.expect_continue = !vars.is_client()
                    && !decoder.is_empty()
                    && initial.version() == Version::HTTP_11
                    && initial.header_str(EXPECT).is_some_and(|expect| expect.trim().eq_ignore_ascii_case("100-continue"));
                self.read = ReadState::Body(decoder);
            }
        }

        let event = match &initial {
            Initial::Request(request) => {
                self.request_method = Some(request.method().clone());
                Event::RequestReceived(request.clone())
            }
            Initial::Response(response) => Event::ResponseReceived(response.clone()),
        };
        self.incoming = Some(initial);
        Ok(event)
    }

    async fn read_body<IO>(
        &mut self,
        vars: &mut ConnectionVariables<IO>,
        mut decoder: PayloadDecoder,
    ) -> Result<Event, HttpError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        let transport = vars.transport_mut()?;

        // a peer waiting for 100 continue sends nothing until told to, unless a final
        // response already went out
        if std::mem::take(&mut self.expect_continue) && self.outgoing.is_none() {
            transport.write(CONTINUE)?;
            transport.drain().await?;
            debug!(stream_id = self.stream_id, "receive expect request header, sent continue response");
        }

        loop {
            match transport.decode(&mut decoder).await? {
                PayloadItem::Chunk(bytes) if bytes.is_empty() => {}
                PayloadItem::Chunk(bytes) => {
                    trace!(stream_id = self.stream_id, size = bytes.len(), "received body chunk");
                    self.read = ReadState::Body(decoder);
                    return Ok(Event::DataReceived(bytes));
                }
                PayloadItem::Eof => return Ok(Event::EofReceived),
            }
        }
    }

    async fn write_initial<IO>(&mut self, vars: &mut ConnectionVariables<IO>, initial: Initial) -> Result<(), HttpError>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
    {
        ensure!(self.outgoing.is_none(), InvalidOperation::InitialWritten.into());

        let initial = self.builder.build(vars, initial).await?;
        let size = select_outgoing(&initial, self.request_method.as_ref())?;
        if size.is_until_eof() {
            vars.disable_keep_alive();
        }
        trace!(stream_id = self.stream_id, ?size, "selected outgoing framing");

        self.encoder = Some(PayloadEncoder::from(size));
        self.outgoing = Some(initial);
        Ok(())
    }
}

/// The outgoing half of a stream, handed to the stream's handler.
///
/// Body bytes are buffered and drained once `chunk_size` of them are waiting, or on
/// [`StreamWriter::drain`] and [`StreamWriter::write_eof`].
#[derive(Debug)]
pub struct StreamWriter<'a, IO> {
    stream: &'a mut H1Stream,
    vars: &'a mut ConnectionVariables<IO>,
}

impl<IO> StreamWriter<'_, IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    pub fn stream_id(&self) -> u64 {
        self.stream.stream_id
    }

    pub fn http_version(&self) -> Version {
        self.vars.http_version()
    }

    pub fn is_client(&self) -> bool {
        self.vars.is_client()
    }

    pub fn incoming(&self) -> Option<&Initial> {
        self.stream.incoming()
    }

    pub fn outgoing(&self) -> Option<&Initial> {
        self.stream.outgoing()
    }

    pub fn initial_written(&self) -> bool {
        self.stream.outgoing.is_some()
    }

    /// Returns true once the outgoing body is complete.
    pub fn eof_written(&self) -> bool {
        self.stream.encoder.as_ref().is_some_and(PayloadEncoder::is_finish)
    }

    /// `None` once the transport was handed over by an upgrade.
    pub fn transport_info(&self) -> Option<&TransportInfo> {
        self.vars.transport().map(Transport::info)
    }

    pub fn connection_state(&self) -> &Arc<ConnectionState> {
        self.vars.state()
    }

    /// Writes the response initial. Server side only, once per stream.
    pub async fn send_response(&mut self, status: StatusCode, headers: HeaderMap) -> Result<(), HttpError> {
        ensure!(!self.vars.is_client(), InvalidOperation::WrongRole("server").into());
        self.stream.write_initial(self.vars, ResponseHeader::new(status, headers).into()).await
    }

    /// Writes the request initial. The scheme defaults to the transport's.
    pub async fn send_request(&mut self, mut request: RequestHeader) -> Result<(), HttpError> {
        ensure!(self.vars.is_client(), InvalidOperation::WrongRole("client").into());

        if request.uri().scheme().is_none() {
            let secure = self.vars.transport().is_some_and(|transport| transport.info().is_secure());
            request = request.with_scheme(Some(if secure { Scheme::HTTPS } else { Scheme::HTTP }));
        }
        self.stream.request_method = Some(request.method().clone());
        self.stream.write_initial(self.vars, request.into()).await
    }

    /// Appends body bytes, draining once `chunk_size` bytes are buffered.
    pub async fn write(&mut self, data: impl Buf + Send) -> Result<(), HttpError> {
        let encoder = self.stream.encoder.as_mut().ok_or(InvalidOperation::InitialNotWritten)?;
        ensure!(!encoder.is_finish(), InvalidOperation::WriteFinished.into());

        let chunk_size = self.vars.context().chunk_size();
        let transport = self.vars.transport_mut()?;
        encoder.encode(PayloadItem::Chunk(data), transport.write_buf_mut())?;

        if transport.buffered_write_len() >= chunk_size {
            transport.drain().await?;
        }
        Ok(())
    }

    pub async fn drain(&mut self) -> Result<(), HttpError> {
        self.vars.transport_mut()?.drain().await?;
        Ok(())
    }

    /// Finishes the outgoing body and drains. Calling it again is a no-op.
    pub async fn write_eof(&mut self) -> Result<(), HttpError> {
        let encoder = self.stream.encoder.as_mut().ok_or(InvalidOperation::InitialNotWritten)?;
        if encoder.is_finish() {
            return Ok(());
        }

        let transport = self.vars.transport_mut()?;
        encoder.encode(PayloadItem::<bytes::Bytes>::Eof, transport.write_buf_mut())?;
        transport.drain().await?;
        trace!(stream_id = self.stream.stream_id, "outgoing body finished");
        Ok(())
    }

    /// Accepts the upgrade the incoming initial offered and takes the transport.
    ///
    /// On the server side a `101 Switching Protocols` carrying `headers` goes out
    /// first, with `connection: Upgrade` and the offered `upgrade` protocol filled in
    /// unless given. The connection never uses the transport again.
    pub async fn accept_upgrade(&mut self, mut headers: HeaderMap) -> Result<Transport<IO>, HttpError> {
        let upgrade = self.stream.pending_upgrade.take().ok_or(InvalidOperation::NoPendingUpgrade)?;

        if !self.vars.is_client() {
            headers.entry(CONNECTION).or_insert_with(|| HeaderValue::from_static("Upgrade"));
            if let Some(protocol) = upgrade.proposed_protocol() {
                headers.entry(UPGRADE).or_insert_with(|| protocol.clone());
            }
            self.send_response(StatusCode::SWITCHING_PROTOCOLS, headers).await?;
            self.write_eof().await?;
        }

        let transport = self.vars.detach_transport().ok_or(InvalidOperation::Detached)?;
        debug!(stream_id = self.stream.stream_id, protocol = ?upgrade.proposed_protocol(), "upgrade accepted");
        Ok(transport)
    }

    /// Closes the transport right away, dropping whatever is still buffered.
    ///
    /// The stream ends as if the peer had gone away and the connection is not reused.
    pub async fn abort(&mut self) {
        self.vars.disable_keep_alive();
        if let Ok(transport) = self.vars.transport_mut() {
            transport.abort().await;
            debug!(stream_id = self.stream.stream_id, "stream aborted");
        }
    }

    pub(crate) async fn next_event(&mut self) -> Result<Event, HttpError> {
        self.stream.next_event(self.vars).await
    }

    /// Ends the outgoing side once the handler is done with the stream.
    ///
    /// A response whose body was left open is finished here; a server stream that
    /// never got a response is an error.
    pub(crate) async fn finish(&mut self) -> Result<(), HttpError> {
        if self.vars.is_detached() {
            return Ok(());
        }
        ensure!(!self.vars.transport().is_some_and(Transport::closed), TransportError::Closed.into());

        ensure!(self.initial_written(), InvalidOperation::InitialNotWritten.into());
        if !self.eof_written() {
            warn!(stream_id = self.stream.stream_id, "outgoing body was not finished, writing eof");
            self.write_eof().await?;
        }
        Ok(())
    }

    /// Answers with an empty error response unless a response already went out.
    /// Failures are only logged, the connection is closing anyway.
    pub(crate) async fn send_error_response(&mut self, status: StatusCode) {
        if self.vars.is_client() || self.initial_written() || self.vars.is_detached() {
            return;
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, HeaderValue::from_static("Close"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));

        let result = match self.send_response(status, headers).await {
            Ok(()) => self.write_eof().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            debug!(cause = %e, %status, "failed to send error response");
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http::Request;
    use indoc::indoc;

    use super::*;
    use crate::connection::H1Context;
    use crate::protocol::ParseError;
    use crate::test_util::{MockIo, variables};

    async fn collect_body(stream: &mut H1Stream, vars: &mut ConnectionVariables<MockIo>) -> Vec<u8> {
        let mut body = Vec::new();
        loop {
            match stream.next_event(vars).await.unwrap() {
                Event::DataReceived(bytes) => body.extend_from_slice(&bytes),
                Event::EofReceived => return body,
                other => panic!("unexpected event {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn content_length_body_events() {
        let io = MockIo::new(
            indoc! {"
                POST /upload HTTP/1.1\r
                Content-Length: 11\r
                \r
                hello world"}
            .as_bytes()
            .to_vec(),
        )
        .with_read_step(4);
        let mut vars = variables(H1Context::server(), io);
        let mut stream = H1Stream::new(1);

        let Event::RequestReceived(request) = stream.next_event(&mut vars).await.unwrap() else {
            panic!("expected a request");
        };
        assert_eq!(request.method(), Method::POST);
        assert_eq!(collect_body(&mut stream, &mut vars).await, b"hello world");

        let result = stream.next_event(&mut vars).await;
        assert!(matches!(result, Err(HttpError::InvalidOperation { source: InvalidOperation::ReadFinished })));
        assert!(stream.read_finished());
    }

    #[tokio::test]
    async fn chunked_body_events() {
        let io = MockIo::new(
            indoc! {"
                POST / HTTP/1.1\r
                Transfer-Encoding: chunked\r
                \r
                5\r
                hello\r
                7;ext=1\r
                , world\r
                0\r
                \r
                "}
            .as_bytes()
            .to_vec(),
        );
        let mut vars = variables(H1Context::server(), io);
        let mut stream = H1Stream::new(1);

        stream.next_event(&mut vars).await.unwrap();
        assert_eq!(collect_body(&mut stream, &mut vars).await, b"hello, world");
    }

    #[tokio::test]
    async fn short_body_is_premature_eof() {
        let io = MockIo::new(b"POST / HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc".to_vec());
        let mut vars = variables(H1Context::server(), io);
        let mut stream = H1Stream::new(1);

        stream.next_event(&mut vars).await.unwrap();
        let Event::DataReceived(bytes) = stream.next_event(&mut vars).await.unwrap() else {
            panic!("expected data");
        };
        assert_eq!(&bytes[..], b"abc");

        let error = stream.next_event(&mut vars).await.unwrap_err();
        assert!(matches!(error, HttpError::ParseError { source: ParseError::PrematureEof { .. } }));
        assert!(!error.is_transport());
    }

    #[tokio::test]
    async fn expect_continue_is_answered_before_body() {
        let io = MockIo::new(b"PUT / HTTP/1.1\r\nExpect: 100-continue\r\nContent-Length: 2\r\n\r\nok".to_vec());
        let mut vars = variables(H1Context::server(), io.clone());
        let mut stream = H1Stream::new(1);

        stream.next_event(&mut vars).await.unwrap();
        assert!(io.written_str().is_empty());

        stream.next_event(&mut vars).await.unwrap();
        assert_eq!(io.written_str(), "HTTP/1.1 100 Continue\r\n\r\n");
    }

    #[tokio::test]
    async fn response_with_chunked_body() {
        let io = MockIo::new(b"GET / HTTP/1.1\r\nConnection: keep-alive\r\n\r\n".to_vec());
        let mut vars = variables(H1Context::server(), io.clone());
        let mut stream = H1Stream::new(1);
        stream.next_event(&mut vars).await.unwrap();
        stream.next_event(&mut vars).await.unwrap();

        let mut writer = stream.writer(&mut vars);
        writer.send_response(StatusCode::OK, HeaderMap::new()).await.unwrap();
        writer.write(Bytes::from_static(b"hello")).await.unwrap();
        writer.write_eof().await.unwrap();
        writer.write_eof().await.unwrap();
        assert!(writer.eof_written());

        let result = writer.write(Bytes::from_static(b"late")).await;
        assert!(matches!(result, Err(HttpError::InvalidOperation { source: InvalidOperation::WriteFinished })));

        let written = io.written_str();
        assert!(written.contains("Transfer-Encoding: Chunked\r\n"));
        assert!(written.ends_with("\r\n\r\n5\r\nhello\r\n0\r\n\r\n"));
        assert!(vars.can_keep_alive());
    }

    #[tokio::test]
    async fn chunk_size_drives_draining() {
        let io = MockIo::new(b"GET / HTTP/1.1\r\n\r\n".to_vec());
        let mut vars = variables(H1Context::server().with_chunk_size(8), io.clone());
        let mut stream = H1Stream::new(1);
        stream.next_event(&mut vars).await.unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        let mut writer = stream.writer(&mut vars);
        writer.send_response(StatusCode::OK, headers).await.unwrap();
        let after_initial = io.written_str().len();

        writer.write(Bytes::from_static(b"abc")).await.unwrap();
        assert_eq!(io.written_str().len(), after_initial);

        writer.write(Bytes::from_static(b"defghijkl")).await.unwrap();
        assert!(io.written_str().ends_with("abcdefghijkl"));
        writer.finish().await.unwrap();
    }

    #[tokio::test]
    async fn response_to_head_has_no_body() {
        let io = MockIo::new(b"HEAD / HTTP/1.1\r\n\r\n".to_vec());
        let mut vars = variables(H1Context::server(), io);
        let mut stream = H1Stream::new(1);
        stream.next_event(&mut vars).await.unwrap();

        let mut writer = stream.writer(&mut vars);
        writer.send_response(StatusCode::OK, HeaderMap::new()).await.unwrap();
        let result = writer.write(Bytes::from_static(b"body")).await;
        assert!(matches!(result, Err(HttpError::SendError { .. })));
    }

    #[tokio::test]
    async fn missing_response_is_an_error() {
        let io = MockIo::new(b"GET / HTTP/1.1\r\n\r\n".to_vec());
        let mut vars = variables(H1Context::server(), io);
        let mut stream = H1Stream::new(1);
        stream.next_event(&mut vars).await.unwrap();

        let result = stream.writer(&mut vars).finish().await;
        assert!(matches!(result, Err(HttpError::InvalidOperation { source: InvalidOperation::InitialNotWritten })));
    }

    #[tokio::test]
    async fn server_accepts_upgrade() {
        let io = MockIo::new(
            b"GET /chat HTTP/1.1\r\nConnection: Upgrade\r\nUpgrade: websocket\r\n\r\nraw frames".to_vec(),
        );
        let mut vars = variables(H1Context::server(), io.clone());
        let mut stream = H1Stream::new(1);

        stream.next_event(&mut vars).await.unwrap();
        let Event::UpgradeRequested(upgrade) = stream.next_event(&mut vars).await.unwrap() else {
            panic!("expected an upgrade offer");
        };
        assert_eq!(upgrade.proposed_protocol().unwrap(), "websocket");

        let mut writer = stream.writer(&mut vars);
        let transport = writer.accept_upgrade(HeaderMap::new()).await.unwrap();
        let result = writer.accept_upgrade(HeaderMap::new()).await;
        assert!(matches!(result, Err(HttpError::InvalidOperation { source: InvalidOperation::NoPendingUpgrade })));

        let written = io.written_str();
        assert!(written.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(written.contains("Connection: Upgrade\r\n"));
        assert!(written.contains("Upgrade: websocket\r\n"));
        assert!(!written.contains("Transfer-Encoding"));

        assert!(vars.is_detached());
        assert!(!vars.can_keep_alive());

        let (_io, buffered) = transport.into_parts();
        assert_eq!(&buffered[..], b"raw frames");
    }

    #[tokio::test]
    async fn client_exchange() {
        let io = MockIo::new(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi".to_vec());
        let mut vars = variables(H1Context::client(), io.clone());
        let mut stream = H1Stream::new(1);

        let request = Request::post("http://example.com/submit").header(CONTENT_LENGTH, "4").body(()).unwrap();
        let mut writer = stream.writer(&mut vars);
        writer.send_request(RequestHeader::from(request)).await.unwrap();
        writer.write(Bytes::from_static(b"data")).await.unwrap();
        writer.write_eof().await.unwrap();

        let result = writer.send_response(StatusCode::OK, HeaderMap::new()).await;
        assert!(matches!(result, Err(HttpError::InvalidOperation { source: InvalidOperation::WrongRole("server") })));

        let Event::ResponseReceived(response) = stream.next_event(&mut vars).await.unwrap() else {
            panic!("expected a response");
        };
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(collect_body(&mut stream, &mut vars).await, b"hi");

        let written = io.written_str();
        assert!(written.starts_with("POST /submit HTTP/1.1\r\n"));
        assert!(written.ends_with("\r\n\r\ndata"));
    }

    #[tokio::test]
    async fn client_reads_unframed_response_until_eof() {
        let io = MockIo::new(b"HTTP/1.1 200 OK\r\nConnection: keep-alive\r\n\r\nuntil the end".to_vec());
        let mut vars = variables(H1Context::client(), io);
        let mut stream = H1Stream::new(1);

        stream.writer(&mut vars).send_request(Request::get("/").body(()).unwrap().into()).await.unwrap();
        stream.next_event(&mut vars).await.unwrap();
        assert!(!vars.can_keep_alive());
        assert_eq!(collect_body(&mut stream, &mut vars).await, b"until the end");
    }

    #[tokio::test]
    async fn client_head_response_is_empty() {
        let io = MockIo::new(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\n".to_vec());
        let mut vars = variables(H1Context::client(), io);
        let mut stream = H1Stream::new(1);

        let request = Request::head("/").body(()).unwrap();
        stream.writer(&mut vars).send_request(request.into()).await.unwrap();
        stream.next_event(&mut vars).await.unwrap();
        assert!(matches!(stream.next_event(&mut vars).await.unwrap(), Event::EofReceived));
    }
}
