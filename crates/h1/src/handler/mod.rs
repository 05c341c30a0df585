//! The application side of a stream.
//!
//! A connection asks its handler factory for one [`StreamHandler`] per stream, then
//! reports the stream's lifecycle to it:
//!
//! 1. [`stream_created`](StreamHandler::stream_created), once the stream exists; the
//!    server side has parsed the request initial, the client side has sent its request
//! 2. [`event_received`](StreamHandler::event_received) for every incoming event
//! 3. [`stream_closed`](StreamHandler::stream_closed), with the error that ended the
//!    stream, if any; transport failures are reported as `None`

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::StreamWriter;
use crate::protocol::{BoxError, Event, HttpError};

#[async_trait]
pub trait StreamHandler<IO>: Send + Sync
where
    IO: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Client handlers write their request body here.
    async fn stream_created(&self, _writer: &mut StreamWriter<'_, IO>) {}

    async fn event_received(&self, event: Event, writer: &mut StreamWriter<'_, IO>) -> Result<(), BoxError>;

    async fn stream_closed(&self, _error: Option<&HttpError>) {}
}
