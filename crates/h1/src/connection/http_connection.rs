use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::channel::oneshot;
use http::{StatusCode, Version};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::select;
use tokio_util::sync::DropGuard;
use tracing::{debug, error, info};

use crate::connection::stream::{H1Stream, StreamWriter};
use crate::connection::{ConnectionState, ConnectionVariables, H1Context};
use crate::handler::StreamHandler;
use crate::protocol::{Event, HttpError, InvalidOperation, ParseError, RequestHeader};
use crate::transport::Transport;

/// An HTTP/1.x connection serving successive streams over one transport.
///
/// The server side waits for requests, the client side waits for
/// [`ServingConnection::send_request`]. Either way exactly one stream is active at a
/// time, and the next one is only created while keep-alive still holds.
///
/// Every stream gets a fresh handler from `factory`.
pub struct H1Connection<IO, F, H> {
    vars: ConnectionVariables<IO>,
    factory: F,
    slot: Arc<SubmissionSlot<H>>,
    pending: Option<oneshot::Receiver<Submission<H>>>,
    // fires `closed` even if the serve task panics or the connection is never served
    _closed: DropGuard,
}

impl<IO, F, H> H1Connection<IO, F, H>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: Fn() -> H + Send + 'static,
    H: StreamHandler<IO> + 'static,
{
    pub fn new(context: H1Context, transport: Transport<IO>, factory: F) -> Self {
        let slot = Arc::new(SubmissionSlot::new());
        // armed up front, so a request submitted before the loop runs is not refused
        let pending = context.is_client().then(|| slot.arm());
        let vars = ConnectionVariables::new(Arc::new(context), transport);
        let closed = vars.state().closed_guard();
        Self { vars, factory, slot, pending, _closed: closed }
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        self.vars.state()
    }

    /// A handle to the connection, usable while it is being served.
    pub fn handle(&self) -> ServingConnection<H> {
        ServingConnection {
            is_client: self.vars.is_client(),
            state: Arc::clone(self.vars.state()),
            slot: Arc::clone(&self.slot),
        }
    }

    /// Spawns the serve loop onto the tokio runtime.
    pub fn start_serving(self) -> ServingConnection<H> {
        let handle = self.handle();
        tokio::spawn(self.serve_until_close());
        handle
    }

    /// Serves streams until the connection can't be kept alive any more, then closes
    /// the transport. The outcome is recorded in [`ConnectionState`].
    pub async fn serve_until_close(mut self) {
        let state = Arc::clone(self.vars.state());
        info!(role = self.vars.context().role(), "start serving connection");

        if self.vars.is_client() {
            self.serve_client(&state).await;
        } else {
            self.serve_server(&state).await;
        }

        self.slot.disarm();
        self.pending = None;
        if let Ok(transport) = self.vars.transport_mut() {
            transport.close().await;
        }
        state.mark_closed();
        info!(streams = state.handled_streams(), "connection closed");
    }

    fn can_continue(&self) -> bool {
        self.vars.can_keep_alive()
            && !self.vars.state().closing()
            && self.vars.transport().is_some_and(|transport| !transport.closed())
    }

    async fn serve_server(&mut self, state: &ConnectionState) {
        while self.can_continue() {
            let mut stream = H1Stream::new(0);

            let first = select! {
                () = state.closing_token().cancelled() => break,
                event = stream.next_event(&mut self.vars) => event,
            };

            let event = match first {
                Ok(event) => event,
                Err(e) if e.is_transport() => {
                    debug!(cause = %e, "no more request, connection shutdown");
                    break;
                }
                Err(e) => {
                    error!(cause = %e, "can't receive next request");
                    stream.writer(&mut self.vars).send_error_response(error_status(&e)).await;
                    state.set_error(e);
                    break;
                }
            };

            stream.set_stream_id(state.next_stream_id());
            let handler = (self.factory)();
            let mut writer = stream.writer(&mut self.vars);
            debug!(stream_id = writer.stream_id(), "stream created");

            handler.stream_created(&mut writer).await;
            let result = dispatch(&handler, &mut writer, event).await;
            if !close_stream(&handler, &mut writer, result).await {
                break;
            }
        }
    }

    async fn serve_client(&mut self, state: &ConnectionState) {
        while self.can_continue() {
            let receiver = self.pending.take().unwrap_or_else(|| self.slot.arm());
            let submission = select! {
                () = state.closing_token().cancelled() => break,
                submission = self.slot.next(receiver) => submission,
            };
            let Submission { request, reply } = submission;

            let mut stream = H1Stream::new(state.next_stream_id());
            let mut writer = stream.writer(&mut self.vars);
            debug!(stream_id = writer.stream_id(), method = %request.method(), uri = %request.uri(), "stream created");

            if let Err(e) = writer.send_request(request).await {
                error!(cause = %e, "can't send request");
                // the submitter owns the error, unless it stopped waiting
                if let Err(Err(e)) = reply.send(Err(e)) {
                    state.set_error(e);
                }
                break;
            }

            let handler = Arc::new((self.factory)());
            handler.stream_created(&mut writer).await;
            if reply.send(Ok(Arc::clone(&handler))).is_err() {
                debug!("request submitter stopped waiting, serving the response anyway");
            }

            let result: Result<(), HttpError> = async {
                writer.write_eof().await?;
                let event = writer.next_event().await?;
                dispatch(&*handler, &mut writer, event).await
            }
            .await;

            // the next submission is accepted as soon as this one is done, even before
            // its handler hears about it
            if result.is_ok() && state.can_keep_alive() && !state.closing() {
                self.pending = Some(self.slot.arm());
            }

            if !close_stream(&*handler, &mut writer, result).await {
                break;
            }
        }
    }
}

impl<IO, F, H> fmt::Debug for H1Connection<IO, F, H>
where
    IO: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("H1Connection").field("vars", &self.vars).finish_non_exhaustive()
    }
}

/// Feeds `event` and everything after it to the handler, then ends the outgoing side.
async fn dispatch<IO, H>(handler: &H, writer: &mut StreamWriter<'_, IO>, event: Event) -> Result<(), HttpError>
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
    H: StreamHandler<IO> + ?Sized,
{
    let mut event = event;
    loop {
        let terminal = event.is_terminal();
        handler.event_received(event, writer).await.map_err(HttpError::handler)?;
        if terminal {
            break;
        }
        event = writer.next_event().await?;
    }

    writer.finish().await
}

/// Reports the end of a stream to its handler, returns whether the connection may
/// move on to the next stream.
async fn close_stream<IO, H>(handler: &H, writer: &mut StreamWriter<'_, IO>, result: Result<(), HttpError>) -> bool
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
    H: StreamHandler<IO> + ?Sized,
{
    let stream_id = writer.stream_id();
    match result {
        Ok(()) => {
            debug!(stream_id, "stream finished");
            handler.stream_closed(None).await;
            true
        }
        Err(e) if e.is_transport() => {
            debug!(stream_id, cause = %e, "transport ended during stream");
            writer.connection_state().disable_keep_alive();
            handler.stream_closed(None).await;
            false
        }
        Err(e) => {
            error!(stream_id, cause = %e, "stream failed");
            writer.send_error_response(StatusCode::INTERNAL_SERVER_ERROR).await;
            writer.connection_state().disable_keep_alive();
            handler.stream_closed(Some(&e)).await;
            writer.connection_state().set_error(e);
            false
        }
    }
}

fn error_status(e: &HttpError) -> StatusCode {
    match e {
        HttpError::ParseError { source: ParseError::TooLargeInitial { .. } } => {
            StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE
        }
        HttpError::ParseError { source: ParseError::InvalidVersion(_) } => StatusCode::HTTP_VERSION_NOT_SUPPORTED,
        _ => StatusCode::BAD_REQUEST,
    }
}

struct Submission<H> {
    request: RequestHeader,
    reply: oneshot::Sender<Result<Arc<H>, HttpError>>,
}

/// Single-slot handoff of client requests to the serve loop.
///
/// The slot holds a sender only while the serve loop waits for the next request.
struct SubmissionSlot<H> {
    sender: Mutex<Option<oneshot::Sender<Submission<H>>>>,
}

impl<H> SubmissionSlot<H> {
    fn new() -> Self {
        Self { sender: Mutex::new(None) }
    }

    fn lock(&self) -> MutexGuard<'_, Option<oneshot::Sender<Submission<H>>>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn take(&self) -> Option<oneshot::Sender<Submission<H>>> {
        self.lock().take()
    }

    fn disarm(&self) {
        drop(self.take());
    }

    /// Opens the slot for one submission.
    fn arm(&self) -> oneshot::Receiver<Submission<H>> {
        let (sender, receiver) = oneshot::channel();
        *self.lock() = Some(sender);
        receiver
    }

    /// Waits for the next submission, re-arming the slot if a pending one is dropped.
    async fn next(&self, mut receiver: oneshot::Receiver<Submission<H>>) -> Submission<H> {
        loop {
            match receiver.await {
                Ok(submission) => return submission,
                Err(oneshot::Canceled) => {
                    debug!("request submission canceled, waiting for the next one");
                    receiver = self.arm();
                }
            }
        }
    }
}

/// A handle to a connection being served.
pub struct ServingConnection<H> {
    is_client: bool,
    state: Arc<ConnectionState>,
    slot: Arc<SubmissionSlot<H>>,
}

impl<H> ServingConnection<H> {
    /// Submits a request on a client connection and resolves to the stream's handler
    /// once the request initial went out.
    ///
    /// Only one request may be in flight: a submission made while a stream is active
    /// fails with [`InvalidOperation::StreamInFlight`].
    pub async fn send_request(&self, request: impl Into<RequestHeader>) -> Result<Arc<H>, HttpError> {
        if !self.is_client {
            return Err(InvalidOperation::WrongRole("client").into());
        }
        if self.state.closing() || self.state.closed() {
            return Err(InvalidOperation::Closed.into());
        }

        let Some(sender) = self.slot.take() else {
            return if self.state.can_keep_alive() {
                Err(InvalidOperation::StreamInFlight.into())
            } else {
                Err(InvalidOperation::Closed.into())
            };
        };

        let (reply, response) = oneshot::channel();
        if sender.send(Submission { request: request.into(), reply }).is_err() {
            return Err(InvalidOperation::Closed.into());
        }

        response.await.unwrap_or(Err(InvalidOperation::Closed.into()))
    }

    /// Asks the connection to stop after the current stream. Keep-alive is disabled
    /// right away; calling it again has no effect.
    pub fn close(&self) {
        if self.state.closing() {
            return;
        }
        debug!("connection close requested");
        self.state.request_close();
    }

    /// Waits for the serve loop to finish. Its outcome is available through
    /// [`ServingConnection::error`].
    pub async fn wait_closed(&self) {
        self.state.wait_closed().await;
    }

    pub fn closed(&self) -> bool {
        self.state.closed()
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    pub fn can_keep_alive(&self) -> bool {
        self.state.can_keep_alive()
    }

    pub fn http_version(&self) -> Version {
        self.state.http_version()
    }

    pub fn handled_streams(&self) -> u64 {
        self.state.handled_streams()
    }

    pub fn error(&self) -> Option<Arc<HttpError>> {
        self.state.error()
    }
}

impl<H> Clone for ServingConnection<H> {
    fn clone(&self) -> Self {
        Self { is_client: self.is_client, state: Arc::clone(&self.state), slot: Arc::clone(&self.slot) }
    }
}

impl<H> fmt::Debug for ServingConnection<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServingConnection")
            .field("is_client", &self.is_client)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
