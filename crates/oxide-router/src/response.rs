//! Outbound responses and the write-once state a request carries.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::{Result, RouterError};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const APPLICATION_JSON: &str = "application/json";

/// Reason phrase for `status`, or `"Unknown"`.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        100 => "Continue",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        409 => "Conflict",
        413 => "Payload Too Large",
        415 => "Unsupported Media Type",
        422 => "Unprocessable Entity",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

/// What a dispatcher hands back to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    /// Empty response with `status` and no headers.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn ok() -> Self {
        Self::new(200)
    }

    /// A `status` response whose plain-text body is its reason phrase,
    /// e.g. `404 Not Found`. Used for every default error answer.
    pub fn plain(status: u16) -> Self {
        Self::new(status).typed(TEXT_PLAIN, reason_phrase(status))
    }

    pub fn text(body: impl Into<String>) -> Self {
        Self::ok().typed(TEXT_PLAIN, body.into())
    }

    pub fn html(body: impl Into<String>) -> Self {
        Self::ok().typed(TEXT_HTML, body.into())
    }

    /// Serializes `data`; a value serde rejects becomes a plain 500.
    pub fn json<T: serde::Serialize>(data: &T) -> Self {
        serde_json::to_vec(data).map_or_else(
            |_| Self::internal_server_error(),
            |body| Self::ok().typed(APPLICATION_JSON, body),
        )
    }

    /// Redirect with an explicit status and an empty body.
    pub fn redirect_with(status: u16, location: impl Into<String>) -> Self {
        Self::new(status).header("Location", location)
    }

    /// `302 Found` to `location`.
    pub fn redirect(location: impl Into<String>) -> Self {
        Self::redirect_with(302, location)
    }

    pub fn unauthorized() -> Self {
        Self::plain(401)
    }

    pub fn not_found() -> Self {
        Self::plain(404)
    }

    pub fn method_not_allowed() -> Self {
        Self::plain(405)
    }

    pub fn internal_server_error() -> Self {
        Self::plain(500)
    }

    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    fn typed(self, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        self.header("Content-Type", content_type).body(body)
    }

    /// Header value by case-insensitive name.
    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find_map(|(k, v)| k.eq_ignore_ascii_case(key).then_some(v.as_str()))
    }

    /// The body, if it is valid UTF-8.
    pub fn body_string(&self) -> Option<String> {
        std::str::from_utf8(&self.body).ok().map(str::to_string)
    }

    pub fn status_text(&self) -> &'static str {
        reason_phrase(self.status)
    }

    /// 3xx with a `Location` header.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.get_header("Location").is_some()
    }
}

/// The outbound side of one request.
///
/// The first [`commit`](Self::commit) wins. Once committed the state never
/// goes back, and later writes are dropped instead of reaching the transport.
#[derive(Debug)]
pub struct ResponseState {
    response: Option<Response>,
    dropped_writes: usize,
    started: Instant,
}

impl ResponseState {
    /// Creates an uncommitted state; the request clock starts now.
    pub fn new() -> Self {
        Self {
            response: None,
            dropped_writes: 0,
            started: Instant::now(),
        }
    }

    /// Returns true once a response has been sent.
    pub fn is_committed(&self) -> bool {
        self.response.is_some()
    }

    /// Commits `response`, or drops it if something was already sent.
    pub fn commit(&mut self, response: Response) -> Result<()> {
        if let Some(sent) = &self.response {
            self.dropped_writes += 1;
            warn!(
                sent = sent.status,
                dropped = response.status,
                "response already committed, dropping write"
            );
            return Err(RouterError::ResponseAlreadyCommitted);
        }
        self.response = Some(response);
        Ok(())
    }

    /// Status of the committed response.
    pub fn status(&self) -> Option<u16> {
        self.response.as_ref().map(|r| r.status)
    }

    /// The committed response, if any.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Number of writes dropped because the response was already sent.
    pub fn dropped_writes(&self) -> usize {
        self.dropped_writes
    }

    /// Time since the state was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub(crate) fn into_response(self) -> Option<Response> {
        self.response
    }
}

impl Default for ResponseState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_error_bodies() {
        let res = Response::not_found();
        assert_eq!(res.status, 404);
        assert_eq!(res.body_string().unwrap(), "Not Found");
        assert_eq!(res.get_header("content-type"), Some(TEXT_PLAIN));

        assert_eq!(
            Response::method_not_allowed().body_string().unwrap(),
            "Method Not Allowed"
        );
        assert_eq!(
            Response::internal_server_error().body_string().unwrap(),
            "Internal Server Error"
        );
        assert_eq!(Response::plain(599).body_string().unwrap(), "Unknown");
    }

    #[test]
    fn test_redirects_have_no_body() {
        let res = Response::redirect_with(307, "/login");
        assert!(res.is_redirect());
        assert_eq!(res.get_header("LOCATION"), Some("/login"));
        assert!(res.body.is_empty());

        assert!(!Response::new(304).is_redirect());
        assert_eq!(Response::redirect("/").status_text(), "Found");
    }

    #[test]
    fn test_json_body() {
        let res = Response::json(&serde_json::json!({ "name": "test" }));
        assert_eq!(res.get_header("Content-Type"), Some(APPLICATION_JSON));
        assert_eq!(res.body_string().unwrap(), r#"{"name":"test"}"#);
    }

    #[test]
    fn test_body_string_rejects_invalid_utf8() {
        let res = Response::ok().body(vec![0xff, 0xfe]);
        assert_eq!(res.body_string(), None);
    }

    #[test]
    fn test_state_commits_once() {
        let mut state = ResponseState::new();
        assert!(!state.is_committed());

        state.commit(Response::text("first")).unwrap();
        assert!(state.is_committed());

        let second = state.commit(Response::text("second").status(500));
        assert!(matches!(second, Err(RouterError::ResponseAlreadyCommitted)));
        assert!(state.is_committed());
        assert_eq!(state.status(), Some(200));
        assert_eq!(state.dropped_writes(), 1);

        let res = state.into_response().unwrap();
        assert_eq!(res.body_string(), Some("first".to_string()));
    }
}
