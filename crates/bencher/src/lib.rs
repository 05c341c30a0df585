use std::io::Cursor;
use std::sync::Arc;

use micro_h1::connection::{ConnectionVariables, H1Context};
use micro_h1::transport::{Transport, TransportInfo};

/// A recorded message replayed by the benchmarks.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    side: Side,
    file: TestFile,
}

impl TestCase {
    pub fn new(name: &'static str, side: Side, file: TestFile) -> Self {
        Self { name, side, file }
    }

    /// A request, read by a server side connection.
    pub fn request(name: &'static str, file: TestFile) -> Self {
        Self::new(name, Side::Server, file)
    }

    /// A response, read by a client side connection.
    pub fn response(name: &'static str, file: TestFile) -> Self {
        Self::new(name, Side::Client, file)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }

    pub fn context(&self) -> Arc<H1Context> {
        Arc::new(H1Context::new(self.side == Side::Client))
    }

    /// Connection variables whose transport replays the file content, then reports EOF.
    pub fn variables(&self, context: &Arc<H1Context>) -> ConnectionVariables<Cursor<Vec<u8>>> {
        let io = Cursor::new(self.file.content().as_bytes().to_vec());
        ConnectionVariables::new(Arc::clone(context), Transport::new(io, TransportInfo::new()))
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static str,
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static str) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static str {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Server,
    Client,
}
