//! An echo server: every request body is sent back as the response body, and an
//! upgrade to the `echo` protocol turns the connection into a raw byte echo.
//!
//! ```sh
//! curl -v --data 'hello' http://127.0.0.1:8080/
//! ```

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};
use micro_h1::connection::{H1Connection, H1Context, StreamWriter};
use micro_h1::handler::StreamHandler;
use micro_h1::protocol::{BoxError, Event, HttpError};
use micro_h1::transport::{Transport, TransportInfo};
use tokio::net::{TcpListener, TcpStream};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!(port = 8080, "start listening");
    let tcp_listener = match TcpListener::bind("127.0.0.1:8080").await {
        Ok(tcp_listener) => tcp_listener,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    loop {
        let (tcp_stream, peer_addr) = match tcp_listener.accept().await {
            Ok(stream_and_addr) => stream_and_addr,
            Err(e) => {
                warn!(cause = %e, "failed to accept");
                continue;
            }
        };

        let mut info = TransportInfo::new().with_peer_addr(peer_addr);
        if let Ok(local_addr) = tcp_stream.local_addr() {
            info = info.with_local_addr(local_addr);
        }

        let transport = Transport::new(tcp_stream, info);
        H1Connection::new(H1Context::server(), transport, EchoHandler::default).start_serving();
    }
}

#[derive(Default)]
struct EchoHandler {
    body: Mutex<Vec<u8>>,
}

#[async_trait]
impl StreamHandler<TcpStream> for EchoHandler {
    async fn event_received(&self, event: Event, writer: &mut StreamWriter<'_, TcpStream>) -> Result<(), BoxError> {
        match event {
            Event::RequestReceived(request) => {
                info!(method = %request.method(), uri = %request.uri(), "receiving request");
            }
            Event::DataReceived(bytes) => {
                self.body.lock().unwrap_or_else(PoisonError::into_inner).extend_from_slice(&bytes);
            }
            Event::EofReceived => {
                let body = std::mem::take(&mut *self.body.lock().unwrap_or_else(PoisonError::into_inner));

                let mut headers = HeaderMap::new();
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
                writer.send_response(StatusCode::OK, headers).await?;
                writer.write(Bytes::from(body)).await?;
                writer.write_eof().await?;
            }
            Event::UpgradeRequested(upgrade) => {
                if upgrade.proposed_protocol().is_some_and(|protocol| protocol == "echo") {
                    let transport = writer.accept_upgrade(HeaderMap::new()).await?;
                    tokio::spawn(async move {
                        let (mut reader, mut writer) = tokio::io::split(transport);
                        match tokio::io::copy(&mut reader, &mut writer).await {
                            Ok(size) => debug!(size, "echo upgrade finished"),
                            Err(e) => warn!(cause = %e, "echo upgrade failed"),
                        }
                    });
                } else {
                    let mut headers = HeaderMap::new();
                    headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("0"));
                    writer.send_response(StatusCode::BAD_REQUEST, headers).await?;
                    writer.write_eof().await?;
                }
            }
            Event::ResponseReceived(_) | Event::UpgradeResponded(_) => {
                return Err("server streams never receive responses".into());
            }
        }
        Ok(())
    }

    async fn stream_closed(&self, error: Option<&HttpError>) {
        if let Some(e) = error {
            warn!(cause = %e, "stream failed");
        }
    }
}
