use async_trait::async_trait;
use bytes::Bytes;
use criterion::{Criterion, criterion_group, criterion_main};
use http::{HeaderMap, HeaderValue, StatusCode, header};
use micro_h1::{
    codec::{InitialBuilder, InitialParser},
    connection::{ConnectionVariables, H1Connection, H1Context, StreamWriter},
    handler::StreamHandler,
    protocol::{BoxError, Event, ResponseHeader},
    transport::{Transport, TransportInfo},
};
use std::{
    hint::black_box,
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::runtime::Runtime;

// Mock IO for testing
struct MockIO {
    read_data: Vec<u8>,
    write_data: Vec<u8>,
    read_pos: usize,
}

impl MockIO {
    fn new(read_data: Vec<u8>) -> Self {
        Self { read_data, write_data: Vec::new(), read_pos: 0 }
    }
}

impl AsyncRead for MockIO {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        let remaining = &self.read_data[self.read_pos..];
        let amt = std::cmp::min(remaining.len(), buf.remaining());
        buf.put_slice(&remaining[..amt]);
        self.read_pos += amt;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockIO {
    fn poll_write(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<Result<usize, io::Error>> {
        self.write_data.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), io::Error>> {
        Poll::Ready(Ok(()))
    }
}

// Test handler
struct HelloWorld;

#[async_trait]
impl StreamHandler<MockIO> for HelloWorld {
    async fn event_received(&self, event: Event, writer: &mut StreamWriter<'_, MockIO>) -> Result<(), BoxError> {
        if let Event::EofReceived = event {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
            writer.send_response(StatusCode::OK, headers).await?;
            writer.write(Bytes::from_static(b"Hello World!")).await?;
            writer.write_eof().await?;
        }
        Ok(())
    }
}

fn variables(context: &Arc<H1Context>, read_data: &[u8]) -> ConnectionVariables<MockIO> {
    let transport = Transport::new(MockIO::new(read_data.to_vec()), TransportInfo::new());
    ConnectionVariables::new(Arc::clone(context), transport)
}

fn bench_initial_parser(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
    let context = Arc::new(H1Context::server());
    let runtime = Runtime::new().unwrap();

    c.bench_function("parse_simple_request", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut vars = variables(&context, request);
            black_box(InitialParser::new().parse(&mut vars).await.unwrap());
        });
    });
}

fn bench_initial_builder(c: &mut Criterion) {
    let context = Arc::new(H1Context::server());
    let runtime = Runtime::new().unwrap();

    c.bench_function("build_simple_response", |b| {
        b.to_async(&runtime).iter(|| async {
            let mut vars = variables(&context, b"");
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("12"));
            let response = ResponseHeader::new(StatusCode::OK, headers);
            black_box(InitialBuilder::new().build(&mut vars, response).await.unwrap());
        });
    });
}

fn bench_http_connection(c: &mut Criterion) {
    let request = b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n";
    let runtime = Runtime::new().unwrap();

    c.bench_function("serve_simple_request", |b| {
        b.to_async(&runtime).iter(|| async {
            let transport = Transport::new(MockIO::new(request.to_vec()), TransportInfo::new());
            let connection = H1Connection::new(H1Context::server(), transport, || HelloWorld);
            let state = Arc::clone(connection.state());
            connection.serve_until_close().await;
            black_box(state.handled_streams());
        });
    });
}

criterion_group!(benches, bench_initial_parser, bench_initial_builder, bench_http_connection);
criterion_main!(benches);
