//! Canonical capitalization of outgoing header names.
//!
//! `http::HeaderName` stores names lowercased. On the wire we write the conventional
//! form (`Content-Length`, `ETag`, `WWW-Authenticate`): well known names come from a
//! fixed table, any other name is title-cased once and cached into the same table.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use bytes::{BufMut, BytesMut};
use http::HeaderName;
use once_cell::sync::Lazy;

/// Stop caching new names past this size, so peers choosing names can't grow it forever.
const MAX_CACHED_NAMES: usize = 1024;

const WELL_KNOWN: &[(&str, &str)] = &[
    ("te", "TE"),
    ("age", "Age"),
    ("date", "Date"),
    ("etag", "ETag"),
    ("from", "From"),
    ("host", "Host"),
    ("vary", "Vary"),
    ("allow", "Allow"),
    ("range", "Range"),
    ("accept", "Accept"),
    ("cookie", "Cookie"),
    ("expect", "Expect"),
    ("server", "Server"),
    ("upgrade", "Upgrade"),
    ("referer", "Referer"),
    ("if-match", "If-Match"),
    ("if-range", "If-Range"),
    ("location", "Location"),
    ("connection", "Connection"),
    ("keep-alive", "Keep-Alive"),
    ("set-cookie", "Set-Cookie"),
    ("user-agent", "User-Agent"),
    ("content-md5", "Content-MD5"),
    ("retry-after", "Retry-After"),
    ("content-type", "Content-Type"),
    ("max-forwards", "Max-Forwards"),
    ("accept-ranges", "Accept-Ranges"),
    ("authorization", "Authorization"),
    ("content-range", "Content-Range"),
    ("if-none-match", "If-None-Match"),
    ("last-modified", "Last-Modified"),
    ("accept-charset", "Accept-Charset"),
    ("content-length", "Content-Length"),
    ("accept-encoding", "Accept-Encoding"),
    ("accept-language", "Accept-Language"),
    ("content-encoding", "Content-Encoding"),
    ("www-authenticate", "WWW-Authenticate"),
    ("transfer-encoding", "Transfer-Encoding"),
    ("if-modified-since", "If-Modified-Since"),
    ("proxy-authenticate", "Proxy-Authenticate"),
    ("content-disposition", "Content-Disposition"),
    ("if-unmodified-since", "If-Unmodified-Since"),
    ("proxy-authorization", "Proxy-Authorization"),
];

static CAPITALIZED: Lazy<ArcSwap<HashMap<String, String>>> = Lazy::new(|| {
    let table = WELL_KNOWN.iter().map(|(lower, canonical)| ((*lower).to_string(), (*canonical).to_string())).collect();
    ArcSwap::from_pointee(table)
});

/// Writes the canonical form of `name` into `dst`.
pub(crate) fn put_capitalized(name: &HeaderName, dst: &mut BytesMut) {
    if let Some(canonical) = CAPITALIZED.load().get(name.as_str()) {
        dst.put_slice(canonical.as_bytes());
        return;
    }

    let canonical = title_case(name.as_str());
    dst.put_slice(canonical.as_bytes());

    if CAPITALIZED.load().len() < MAX_CACHED_NAMES {
        CAPITALIZED.rcu(|table| {
            let mut table = HashMap::clone(table);
            table.insert(name.as_str().to_string(), canonical.clone());
            Arc::new(table)
        });
    }
}

/// Returns the canonical form of `name`.
pub fn capitalize(name: &HeaderName) -> String {
    let mut dst = BytesMut::with_capacity(name.as_str().len());
    put_capitalized(name, &mut dst);
    // header names are ascii, so is anything derived from them
    String::from_utf8_lossy(&dst).into_owned()
}

/// Uppercases every letter that follows a non-letter, lowercases the rest.
fn title_case(name: &str) -> String {
    let mut after_letter = false;
    name.chars()
        .map(|c| {
            let mapped = if after_letter { c.to_ascii_lowercase() } else { c.to_ascii_uppercase() };
            after_letter = c.is_ascii_alphabetic();
            mapped
        })
        .collect()
}
