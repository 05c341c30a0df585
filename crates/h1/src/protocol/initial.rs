use http::{HeaderMap, Version};

use crate::protocol::{RequestHeader, ResponseHeader};

/// The start-line and headers of one HTTP message, in either direction.
#[derive(Debug, Clone)]
pub enum Initial {
    Request(RequestHeader),
    Response(ResponseHeader),
}

impl Initial {
    pub fn headers(&self) -> &HeaderMap {
        match self {
            Initial::Request(request) => request.headers(),
            Initial::Response(response) => response.headers(),
        }
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        match self {
            Initial::Request(request) => request.headers_mut(),
            Initial::Response(response) => response.headers_mut(),
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Initial::Request(request) => request.version(),
            Initial::Response(response) => response.version(),
        }
    }

    pub(crate) fn set_version(&mut self, version: Version) {
        match self {
            Initial::Request(request) => request.set_version(version),
            Initial::Response(response) => response.set_version(version),
        }
    }

    pub fn as_request(&self) -> Option<&RequestHeader> {
        match self {
            Initial::Request(request) => Some(request),
            Initial::Response(_) => None,
        }
    }

    pub fn as_response(&self) -> Option<&ResponseHeader> {
        match self {
            Initial::Request(_) => None,
            Initial::Response(response) => Some(response),
        }
    }

    /// Returns the first value of `name`, if it is visible text.
    pub fn header_str(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers().get(name).and_then(|value| value.to_str().ok())
    }

    /// Returns true if the first `connection` value equals `token`, ignoring case.
    pub fn connection_is(&self, token: &str) -> bool {
        self.header_str(http::header::CONNECTION)
            .is_some_and(|value| value.trim().eq_ignore_ascii_case(token))
    }
}

impl From<RequestHeader> for Initial {
    fn from(request: RequestHeader) -> Self {
        Initial::Request(request)
    }
}

impl From<ResponseHeader> for Initial {
    fn from(response: ResponseHeader) -> Self {
        Initial::Response(response)
    }
}
