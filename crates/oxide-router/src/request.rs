//! Inbound requests, methods and bound path parameters.

use std::collections::HashMap;
use std::fmt;

/// Request method. Routes are kept in one tree per method.
///
/// Anything outside the common verbs is kept verbatim in `Other`, so a
/// request with an unusual method can still be answered with a 405.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    /// Any other method, upper-cased.
    Other(String),
}

impl Method {
    /// The verbs `Router::any` registers a handler for.
    pub const ALL: [Self; 7] = [
        Self::Get,
        Self::Post,
        Self::Put,
        Self::Patch,
        Self::Delete,
        Self::Head,
        Self::Options,
    ];

    /// Reads a method name, ignoring case.
    pub fn parse(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|known| known.as_str().eq_ignore_ascii_case(name))
            .unwrap_or_else(|| Self::Other(name.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Other(name) => name,
        }
    }

    /// Status code used when redirecting a request with this method.
    ///
    /// GET gets a permanent redirect; every other method gets a 307 so the
    /// client repeats the request with the same method and body.
    pub fn redirect_status(&self) -> u16 {
        if *self == Self::Get {
            301
        } else {
            307
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Values the route tree bound to `{name}` and `*name` segments.
///
/// Keys are unique and kept in the order the tree bound them, which is the
/// left-to-right order of the segments in the pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    bound: Vec<(String, String)>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key`, overwriting an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let (key, value) = (key.into(), value.into());
        if let Some(slot) = self.bound.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.bound.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.bound
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    /// Reads `key` as `T`; `None` when missing or unparsable.
    pub fn parse<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key)?.parse().ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bound.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    /// Drops parameters bound after `len`, used when the tree backtracks.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.bound.truncate(len);
    }

    pub(crate) fn push(&mut self, key: &str, value: &str) {
        self.bound.push((key.to_string(), value.to_string()));
    }
}

/// A request as the transport hands it to the dispatcher.
///
/// The path is matched exactly as given: the transport strips the query
/// string, and nothing is percent-decoded.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// Query string as received, without the `?`. Redirects carry it over.
    pub raw_query: Option<String>,
    /// Decoded query string pairs.
    pub query: HashMap<String, String>,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            raw_query: None,
            query: HashMap::new(),
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Adds one query pair, appending it to the raw query as written.
    #[must_use]
    pub fn query_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let (key, value) = (key.into(), value.into());
        let pair = format!("{key}={value}");
        self.raw_query = Some(match self.raw_query.take() {
            Some(raw) if !raw.is_empty() => format!("{raw}&{pair}"),
            _ => pair,
        });
        self.query.insert(key, value);
        self
    }

    /// Sets the raw query string and decodes it into [`query`](Self::query).
    #[must_use]
    pub fn with_query(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.query = Self::parse_query_string(&raw);
        self.raw_query = Some(raw);
        self
    }

    /// Header value by case-insensitive name.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(key).then_some(v.as_str()))
    }

    pub fn get_query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Splits `a=1&b=two+words` into decoded pairs. A key without `=` maps
    /// to an empty value; later duplicates win.
    pub fn parse_query_string(query: &str) -> HashMap<String, String> {
        query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (decode_component(key), decode_component(value)),
                None => (decode_component(pair), String::new()),
            })
            .collect()
    }
}

/// `application/x-www-form-urlencoded` decoding. Malformed escapes are kept
/// as written.
fn decode_component(raw: &str) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        rest = tail;
        match byte {
            b'+' => out.push(b' '),
            b'%' => match tail.get(..2).and_then(hex_pair) {
                Some(decoded) => {
                    out.push(decoded);
                    rest = &tail[2..];
                }
                None => out.push(b'%'),
            },
            other => out.push(other),
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    if !pair.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok()
}
