//! HTTP request initial.
//!
//! It wraps the standard `http::Request` type with an empty body, plus the authority
//! and scheme the request was addressed to, which on the wire travel apart from the
//! request target.

use http::request::Parts;
use http::uri::{Authority, Scheme};
use http::{HeaderMap, Method, Request, Uri, Version};

/// Represents an HTTP request initial (request line + headers).
#[derive(Debug, Clone)]
pub struct RequestHeader {
    inner: Request<()>,
    authority: Option<Authority>,
    scheme: Option<Scheme>,
}

impl AsRef<Request<()>> for RequestHeader {
    fn as_ref(&self) -> &Request<()> {
        &self.inner
    }
}

impl RequestHeader {
    /// Consumes the header and returns the inner `Request<()>`.
    pub fn into_inner(self) -> Request<()> {
        self.inner
    }

    /// Attaches a body to this header, converting it into a full `Request<T>`.
    pub fn body<T>(self, body: T) -> Request<T> {
        self.inner.map(|_| body)
    }

    #[must_use]
    pub fn with_authority(mut self, authority: Option<Authority>) -> Self {
        self.authority = authority;
        self
    }

    #[must_use]
    pub fn with_scheme(mut self, scheme: Option<Scheme>) -> Self {
        self.scheme = scheme;
        self
    }

    /// Returns a reference to the request's HTTP method.
    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    /// Returns a reference to the request target.
    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    /// Returns the request's HTTP version.
    pub fn version(&self) -> Version {
        self.inner.version()
    }

    /// Returns a reference to the request's headers.
    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        *self.inner.version_mut() = version;
    }

    /// The authority the request is addressed to: the explicit one, else the one
    /// carried by an absolute-form target.
    pub fn authority(&self) -> Option<&Authority> {
        self.authority.as_ref().or_else(|| self.uri().authority())
    }

    /// The scheme the request is addressed with: the explicit one, else the one
    /// carried by an absolute-form target.
    pub fn scheme(&self) -> Option<&Scheme> {
        self.scheme.as_ref().or_else(|| self.uri().scheme())
    }
}

/// Converts request parts into a RequestHeader.
impl From<Parts> for RequestHeader {
    #[inline]
    fn from(parts: Parts) -> Self {
        Request::from_parts(parts, ()).into()
    }
}

/// Converts a bodyless request into a RequestHeader.
impl From<Request<()>> for RequestHeader {
    #[inline]
    fn from(inner: Request<()>) -> Self {
        Self { inner, authority: None, scheme: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authority_falls_back_to_absolute_target() {
        let request = Request::get("http://example.com:8080/index.html?a=1").body(()).unwrap();
        let header = RequestHeader::from(request);

        assert_eq!(header.authority().map(Authority::as_str), Some("example.com:8080"));
        assert_eq!(header.scheme(), Some(&Scheme::HTTP));
        assert_eq!(header.uri().path(), "/index.html");
    }

    #[test]
    fn explicit_authority_wins() {
        let request = Request::get("/index.html").body(()).unwrap();
        let header = RequestHeader::from(request)
            .with_authority(Some(Authority::from_static("localhost")))
            .with_scheme(Some(Scheme::HTTPS));

        assert_eq!(header.authority().map(Authority::as_str), Some("localhost"));
        assert_eq!(header.scheme(), Some(&Scheme::HTTPS));
        assert_eq!(header.method(), &Method::GET);
    }
}
