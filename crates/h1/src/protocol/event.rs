use bytes::Bytes;
use http::HeaderValue;

use crate::protocol::{RequestHeader, ResponseHeader};

/// Everything a stream reports to its handler, in order: one initial, zero or more
/// data chunks, then exactly one terminal event.
#[derive(Debug, Clone)]
pub enum Event {
    /// Server side: the request initial has been parsed.
    RequestReceived(RequestHeader),
    /// Client side: the response initial has been parsed.
    ResponseReceived(ResponseHeader),
    /// A non-empty piece of the incoming body.
    DataReceived(Bytes),
    /// The incoming body is complete.
    EofReceived,
    /// Server side: the client offered to switch protocols.
    UpgradeRequested(Upgrade),
    /// Client side: the server answered an upgrade offer.
    UpgradeResponded(Upgrade),
}

impl Event {
    /// Returns true for the events after which the stream yields nothing more.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::EofReceived | Event::UpgradeRequested(_) | Event::UpgradeResponded(_))
    }
}

/// An upgrade offer, with the protocol named in the `upgrade` header if there was one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgrade {
    proposed_protocol: Option<HeaderValue>,
}

impl Upgrade {
    pub fn new(proposed_protocol: Option<HeaderValue>) -> Self {
        Self { proposed_protocol }
    }

    pub fn proposed_protocol(&self) -> Option<&HeaderValue> {
        self.proposed_protocol.as_ref()
    }
}
