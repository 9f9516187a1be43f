//! Header handling for relayed traffic.
//!
//! `HeaderBag` is the case-insensitive header collection used at the relay
//! boundary. It keeps the casing each header arrived with. The filters strip
//! hop-by-hop and relay-internal headers in each direction.

use axum::http::{HeaderMap, HeaderName, HeaderValue};

/// Hop-by-hop headers, never forwarded in either direction.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Client -> upstream. The body is re-sent, so its length is recomputed.
const INBOUND_BLOCKED: &[&str] = &["host", "content-length"];
const INBOUND_BLOCKED_PREFIXES: &[&str] = &["x-forwarded-"];

/// Upstream -> client. Session cookies are never relayed and CORS headers are
/// recomputed by the relay.
const OUTBOUND_BLOCKED: &[&str] = &["set-cookie", "content-length"];
const OUTBOUND_BLOCKED_PREFIXES: &[&str] = &["access-control-"];

// == Header Bag ==
/// Ordered, case-insensitive multimap of header names to values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBag {
    entries: Vec<(String, String)>,
}

impl HeaderBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replaces every value of `name` with a single value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, value.into()));
    }

    /// Removes every value of `name`; returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.entries.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Converts from an `http` header map. Values that are not visible ASCII
    /// are decoded lossily.
    pub fn from_header_map(map: &HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }

    /// Converts into an `http` header map, skipping names or values `http` rejects.
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::with_capacity(self.entries.len());
        for (name, value) in &self.entries {
            let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) else {
                continue;
            };
            map.append(name, value);
        }
        map
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for HeaderBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// == Filtering ==
/// Headers safe to send to the upstream.
pub fn filter_inbound(headers: &HeaderBag) -> HeaderBag {
    filter(headers, INBOUND_BLOCKED, INBOUND_BLOCKED_PREFIXES)
}

/// Headers safe to return to the client.
pub fn filter_outbound(headers: &HeaderBag) -> HeaderBag {
    filter(headers, OUTBOUND_BLOCKED, OUTBOUND_BLOCKED_PREFIXES)
}

fn filter(headers: &HeaderBag, blocked: &[&str], prefixes: &[&str]) -> HeaderBag {
    // names listed in Connection are hop-by-hop for this message too
    let connection_tokens: Vec<String> = headers
        .entries
        .iter()
        .filter(|(n, _)| n.eq_ignore_ascii_case("connection"))
        .flat_map(|(_, v)| v.split(','))
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect();

    headers
        .iter()
        .filter(|(name, _)| {
            let lower = name.to_ascii_lowercase();
            !(HOP_BY_HOP.contains(&lower.as_str())
                || blocked.contains(&lower.as_str())
                || prefixes.iter().any(|p| lower.starts_with(p))
                || connection_tokens.contains(&lower))
        })
        .collect()
}
