//! HTTP response initial, the standard `http::Response` with an empty body.

use http::response::Parts;
use http::{HeaderMap, Response, StatusCode, Version};

/// Represents an HTTP response initial (status line + headers).
#[derive(Debug, Clone)]
pub struct ResponseHeader {
    inner: Response<()>,
}

impl AsRef<Response<()>> for ResponseHeader {
    fn as_ref(&self) -> &Response<()> {
        &self.inner
    }
}

impl ResponseHeader {
    /// Creates a response initial from a status code and its headers.
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        let mut inner = Response::new(());
        *inner.status_mut() = status;
        *inner.headers_mut() = headers;
        Self { inner }
    }

    pub fn into_inner(self) -> Response<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Response<T>`.
    pub fn body<T>(self, body: T) -> Response<T> {
        self.inner.map(|_| body)
    }

    pub fn status(&self) -> StatusCode {
        self.inner.status()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        *self.inner.version_mut() = version;
    }

    /// Responses with these status codes never carry a body, whatever their headers say.
    pub fn is_bodiless(&self) -> bool {
        let status = self.status();
        status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
    }
}

impl From<Parts> for ResponseHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Response::from_parts(parts, ()).into()
    }
}

impl From<Response<()>> for ResponseHeader {
    #[inline]
    fn from(inner: Response<()>) -> Self {
        Self { inner }
    }
}
