//! Sends two requests over one keep-alive connection and prints the responses.
//!
//! Start the `server` example first, or pass another `host:port` as the first argument.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Request, header};
use micro_h1::connection::{H1Connection, H1Context, StreamWriter};
use micro_h1::handler::StreamHandler;
use micro_h1::protocol::{BoxError, Event, HttpError};
use micro_h1::transport::{Transport, TransportInfo};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let addr = std::env::args().nth(1).unwrap_or_else(|| "127.0.0.1:8080".to_string());
    let tcp_stream = TcpStream::connect(&addr).await?;
    let info = TransportInfo::new().with_peer_addr(tcp_stream.peer_addr()?);

    let connection = H1Connection::new(H1Context::client(), Transport::new(tcp_stream, info), PrintHandler::new)
        .start_serving();

    for body in ["hello", "world"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri(format!("http://{addr}/echo/{body}"))
            .header(header::CONTENT_LENGTH, body.len())
            .header(header::CONNECTION, "keep-alive")
            .body(())?;

        let handler = connection.send_request(request).await?;
        let response = handler.finished().await?;
        info!(%response, "stream finished");
    }

    connection.close();
    connection.wait_closed().await;
    Ok(())
}

/// Sends the last path segment as the request body and collects the response body.
struct PrintHandler {
    body: Mutex<Vec<u8>>,
    done: Mutex<Option<oneshot::Sender<Result<String, String>>>>,
    finished: Mutex<Option<oneshot::Receiver<Result<String, String>>>>,
}

impl PrintHandler {
    fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self { body: Mutex::default(), done: Mutex::new(Some(tx)), finished: Mutex::new(Some(rx)) }
    }

    async fn finished(&self) -> Result<String, BoxError> {
        let rx = self.finished.lock().unwrap_or_else(PoisonError::into_inner).take().ok_or("already awaited")?;
        Ok(rx.await??)
    }

    fn complete(&self, result: Result<String, String>) {
        if let Some(tx) = self.done.lock().unwrap_or_else(PoisonError::into_inner).take() {
            let _ = tx.send(result);
        }
    }
}

#[async_trait]
impl StreamHandler<TcpStream> for PrintHandler {
    async fn stream_created(&self, writer: &mut StreamWriter<'_, TcpStream>) {
        let body = writer
            .outgoing()
            .and_then(|initial| initial.as_request())
            .and_then(|request| request.uri().path().rsplit('/').next())
            .map(|segment| Bytes::copy_from_slice(segment.as_bytes()))
            .unwrap_or_default();

        if let Err(e) = writer.write(body).await {
            warn!(cause = %e, "failed to write request body");
        }
    }

    async fn event_received(&self, event: Event, _writer: &mut StreamWriter<'_, TcpStream>) -> Result<(), BoxError> {
        match event {
            Event::ResponseReceived(response) => info!(status = %response.status(), "receiving response"),
            Event::DataReceived(bytes) => {
                self.body.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(&bytes);
            }
            Event::EofReceived => {
                let body = std::mem::take(&mut *self.body.lock().unwrap_or_else(PoisonError::into_inner));
                self.complete(Ok(String::from_utf8_lossy(&body).into_owned()));
            }
            other => return Err(format!("unexpected event {other:?}").into()),
        }
        Ok(())
    }

    async fn stream_closed(&self, error: Option<&HttpError>) {
        let reason = error.map_or_else(|| "stream closed early".to_string(), ToString::to_string);
        self.complete(Err(reason));
    }
}
