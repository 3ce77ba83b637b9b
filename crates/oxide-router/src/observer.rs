//! Access records and the observer that receives them.

use std::fmt;
use std::time::Duration;

use tracing::info;

use crate::request::Method;

/// How the dispatcher answered a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A route matched and its chain ran.
    Matched,
    /// The client was redirected to a corrected path.
    Redirected,
    /// Nothing matched.
    NotFound,
    /// The path exists under other methods only.
    MethodNotAllowed,
}

impl Outcome {
    /// Short lowercase label, used in log lines.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Matched => "matched",
            Self::Redirected => "redirected",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the access log.
#[derive(Debug, Clone)]
pub struct AccessRecord {
    /// Request method.
    pub method: Method,
    /// Request path as sent.
    pub path: String,
    /// Pattern of the matched route.
    pub route: Option<String>,
    /// How the request was answered.
    pub outcome: Outcome,
    /// Response status.
    pub status: u16,
    /// Response body size.
    pub bytes: usize,
    /// Time spent in the dispatcher.
    pub elapsed: Duration,
    /// Writes dropped because a response was already sent.
    pub dropped_writes: usize,
    /// Set when a handler panicked or returned an error.
    pub failure: Option<String>,
}

/// Receives one [`AccessRecord`] per request.
pub trait Observer: Send + Sync + 'static {
    /// Called after the response is final.
    fn record(&self, record: &AccessRecord);
}

impl<F> Observer for F
where
    F: Fn(&AccessRecord) + Send + Sync + 'static,
{
    fn record(&self, record: &AccessRecord) {
        self(record);
    }
}

/// Default observer: one `info!` event per request.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl Observer for TracingObserver {
    fn record(&self, record: &AccessRecord) {
        info!(
            method = %record.method,
            path = %record.path,
            route = record.route.as_deref().unwrap_or("-"),
            outcome = %record.outcome,
            status = record.status,
            bytes = record.bytes,
            elapsed_us = u64::try_from(record.elapsed.as_micros()).unwrap_or(u64::MAX),
            dropped = record.dropped_writes,
            failure = record.failure.as_deref(),
            "request"
        );
    }
}
