use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::Version;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use crate::connection::H1Context;
use crate::protocol::{HttpError, TransportError};
use crate::transport::Transport;

/// Per-connection state shared between the serving task and its handles.
///
/// Every flag here only moves one way: the version only gets downgraded, keep-alive
/// only gets disabled, the stream counter only grows.
#[derive(Debug)]
pub struct ConnectionState {
    http10: AtomicBool,
    keep_alive: AtomicBool,
    handled_streams: AtomicU64,
    detached: AtomicBool,
    closed: CancellationToken,
    closing: CancellationToken,
    error: Mutex<Option<Arc<HttpError>>>,
}

impl ConnectionState {
    pub(crate) fn new(allow_keep_alive: bool) -> Self {
        Self {
            http10: AtomicBool::new(false),
            keep_alive: AtomicBool::new(allow_keep_alive),
            handled_streams: AtomicU64::new(0),
            detached: AtomicBool::new(false),
            closed: CancellationToken::new(),
            closing: CancellationToken::new(),
            error: Mutex::new(None),
        }
    }

    pub fn http_version(&self) -> Version {
        if self.http10.load(Ordering::Acquire) { Version::HTTP_10 } else { Version::HTTP_11 }
    }

    pub fn can_keep_alive(&self) -> bool {
        self.keep_alive.load(Ordering::Acquire)
    }

    pub fn handled_streams(&self) -> u64 {
        self.handled_streams.load(Ordering::Acquire)
    }

    /// Returns true once the transport was handed over by an accepted upgrade.
    pub fn detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Returns true once a close was requested.
    pub fn closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Returns true once the serve loop has finished.
    pub fn closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Waits until the serve loop has finished.
    pub async fn wait_closed(&self) {
        self.closed.cancelled().await;
    }

    /// The error that ended the serve loop, if any.
    pub fn error(&self) -> Option<Arc<HttpError>> {
        self.lock_error().clone()
    }

    pub(crate) fn downgrade_http_version(&self) {
        self.http10.store(true, Ordering::Release);
    }

    pub(crate) fn disable_keep_alive(&self) {
        if self.keep_alive.swap(false, Ordering::AcqRel) {
            debug!("keep-alive disabled");
        }
    }

    /// Counts a new stream and returns its id, starting from 1.
    pub(crate) fn next_stream_id(&self) -> u64 {
        self.handled_streams.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn mark_detached(&self) {
        self.detached.store(true, Ordering::Release);
    }

    pub(crate) fn mark_closed(&self) {
        self.closed.cancel();
    }

    /// Marks the connection closed when dropped, however its owner goes away.
    pub(crate) fn closed_guard(&self) -> DropGuard {
        self.closed.clone().drop_guard()
    }

    pub(crate) fn request_close(&self) {
        self.disable_keep_alive();
        self.closing.cancel();
    }

    pub(crate) fn closing_token(&self) -> &CancellationToken {
        &self.closing
    }

    pub(crate) fn set_error(&self, error: HttpError) {
        *self.lock_error() = Some(Arc::new(error));
    }

    fn lock_error(&self) -> MutexGuard<'_, Option<Arc<HttpError>>> {
        self.error.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What the parser, builder and stream need from their connection: the context, the
/// transport while it is attached, and the shared state.
#[derive(Debug)]
pub struct ConnectionVariables<IO> {
    context: Arc<H1Context>,
    transport: Option<Transport<IO>>,
    state: Arc<ConnectionState>,
}

impl<IO> ConnectionVariables<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(context: Arc<H1Context>, transport: Transport<IO>) -> Self {
        let state = Arc::new(ConnectionState::new(context.allow_keep_alive()));
        Self { context, transport: Some(transport), state }
    }

    pub fn context(&self) -> &H1Context {
        &self.context
    }

    pub fn state(&self) -> &Arc<ConnectionState> {
        &self.state
    }

    pub fn is_client(&self) -> bool {
        self.context.is_client()
    }

    pub fn http_version(&self) -> Version {
        self.state.http_version()
    }

    pub fn can_keep_alive(&self) -> bool {
        self.state.can_keep_alive()
    }

    pub fn disable_keep_alive(&self) {
        self.state.disable_keep_alive();
    }

    pub fn downgrade_http_version(&self) {
        self.state.downgrade_http_version();
    }

    pub fn transport(&self) -> Option<&Transport<IO>> {
        self.transport.as_ref()
    }

    /// The attached transport, or [`TransportError::Closed`] after it was detached.
    pub fn transport_mut(&mut self) -> Result<&mut Transport<IO>, TransportError> {
        self.transport.as_mut().ok_or(TransportError::Closed)
    }

    /// Hands the transport over for good; keep-alive is disabled from now on.
    pub fn detach_transport(&mut self) -> Option<Transport<IO>> {
        let transport = self.transport.take()?;
        self.state.disable_keep_alive();
        self.state.mark_detached();
        debug!("transport detached from connection");
        Some(transport)
    }

    pub fn is_detached(&self) -> bool {
        self.transport.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::MockIo;
    use crate::transport::TransportInfo;

    #[test]
    fn state_only_moves_one_way() {
        let state = ConnectionState::new(true);
        assert_eq!(state.http_version(), Version::HTTP_11);
        assert!(state.can_keep_alive());

        state.downgrade_http_version();
        state.disable_keep_alive();
        state.disable_keep_alive();
        assert_eq!(state.http_version(), Version::HTTP_10);
        assert!(!state.can_keep_alive());

        assert_eq!(state.next_stream_id(), 1);
        assert_eq!(state.next_stream_id(), 2);
        assert_eq!(state.handled_streams(), 2);
    }

    #[test]
    fn dropped_guard_marks_closed() {
        let state = ConnectionState::new(true);
        let guard = state.closed_guard();
        assert!(!state.closed());

        drop(guard);
        assert!(state.closed());
    }

    #[test]
    fn keep_alive_starts_from_context() {
        let context = Arc::new(H1Context::server().with_allow_keep_alive(false));
        let vars = ConnectionVariables::new(context, Transport::new(MockIo::new(Vec::new()), TransportInfo::new()));
        assert!(!vars.can_keep_alive());
    }

    #[test]
    fn detach_disables_keep_alive() {
        let context = Arc::new(H1Context::server());
        let mut vars = ConnectionVariables::new(context, Transport::new(MockIo::new(Vec::new()), TransportInfo::new()));

        assert!(vars.detach_transport().is_some());
        assert!(vars.detach_transport().is_none());
        assert!(vars.is_detached());
        assert!(vars.state().detached());
        assert!(!vars.can_keep_alive());
        assert!(matches!(vars.transport_mut(), Err(TransportError::Closed)));
    }
}
