//! The per-request context handed to every handler.

use std::sync::Arc;

use crate::chain::{ChainState, HandlerChain};
use crate::error::HandlerFailure;
use crate::handler::{BoxFuture, HandlerResult};
use crate::request::{PathParams, Request};
use crate::response::{Response, ResponseState};

/// Everything a handler can see and do for one request.
///
/// A context is created by the dispatcher for each request and never shared
/// between requests.
#[derive(Debug)]
pub struct Context {
    request: Request,
    params: PathParams,
    response: ResponseState,
    chain: HandlerChain,
    route: Option<Arc<str>>,
    route_name: Option<Arc<str>>,
    failure: Option<HandlerFailure>,
    pending_headers: Vec<(String, String)>,
}

impl Context {
    /// Creates a context for `request` that will run `chain`.
    pub fn new(request: Request, chain: HandlerChain) -> Self {
        Self {
            request,
            params: PathParams::new(),
            response: ResponseState::new(),
            chain,
            route: None,
            route_name: None,
            failure: None,
            pending_headers: Vec::new(),
        }
    }

    /// Sets the path parameters.
    #[must_use]
    pub fn with_params(mut self, params: PathParams) -> Self {
        self.params = params;
        self
    }

    pub(crate) fn with_route(mut self, pattern: Arc<str>, name: Option<Arc<str>>) -> Self {
        self.route = Some(pattern);
        self.route_name = name;
        self
    }

    /// The request being handled.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Mutable access to the request, for filters that rewrite it.
    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    /// Path parameters bound by the route.
    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Gets one path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Pattern of the matched route, if a route matched.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Name of the matched route, if it has one.
    pub fn route_name(&self) -> Option<&str> {
        self.route_name.as_deref()
    }

    /// The response state.
    pub fn response(&self) -> &ResponseState {
        &self.response
    }

    /// Returns true once a response has been sent.
    pub fn is_committed(&self) -> bool {
        self.response.is_committed()
    }

    /// The failure being recovered from; only set while the panic handler runs.
    pub fn failure(&self) -> Option<&HandlerFailure> {
        self.failure.as_ref()
    }

    /// Adds a header to whatever response is sent later.
    ///
    /// Headers set by the response itself take precedence.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pending_headers.push((key.into(), value.into()));
    }

    /// Sends `response`. Returns false if a response was already sent, in
    /// which case this one is dropped.
    pub fn send(&mut self, response: Response) -> bool {
        let response = self.merge_pending(response);
        self.response.commit(response).is_ok()
    }

    /// Runs the rest of the chain.
    ///
    /// Does nothing once a response was sent or when no unit is left.
    pub fn proceed(&mut self) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move {
            if self.response.is_committed() {
                return Ok(());
            }
            let Some(unit) = self.chain.advance() else {
                return Ok(());
            };
            self.chain.enter();
            let result = unit.invoke(self).await;
            self.chain.leave();
            result
        })
    }

    /// Where the chain currently is.
    pub fn chain_state(&self) -> ChainState {
        self.chain.state(self.response.is_committed())
    }

    /// The chain bound to this request.
    pub fn chain(&self) -> &HandlerChain {
        &self.chain
    }

    /// Runs the chain from its first unit.
    pub(crate) fn start(&mut self) -> BoxFuture<'_, HandlerResult> {
        self.chain.reset();
        self.proceed()
    }

    pub(crate) fn replace_chain(&mut self, chain: HandlerChain) {
        self.chain = chain;
    }

    pub(crate) fn set_failure(&mut self, failure: HandlerFailure) {
        self.failure = Some(failure);
    }

    pub(crate) fn take_failure(&mut self) -> Option<HandlerFailure> {
        self.failure.take()
    }

    /// Consumes the context, returning the sent response and the number of
    /// dropped writes. A request nobody answered gets an empty `200 OK`.
    pub(crate) fn finish(mut self) -> (Response, usize) {
        let dropped = self.response.dropped_writes();
        let response = match self.response.into_response() {
            Some(response) => response,
            None => {
                let pending = std::mem::take(&mut self.pending_headers);
                pending
                    .into_iter()
                    .fold(Response::ok(), |res, (k, v)| res.header(k, v))
            }
        };
        (response, dropped)
    }

    fn merge_pending(&mut self, mut response: Response) -> Response {
        for (key, value) in std::mem::take(&mut self.pending_headers) {
            if response.get_header(&key).is_none() {
                response = response.header(key, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerUnit;

    #[test]
    fn test_send_is_write_once() {
        let mut ctx = Context::new(Request::get("/"), HandlerChain::empty());
        assert!(ctx.send(Response::text("one")));
        assert!(!ctx.send(Response::text("two")));

        let (res, dropped) = ctx.finish();
        assert_eq!(res.body_string(), Some("one".to_string()));
        assert_eq!(dropped, 1);
    }

    #[test]
    fn test_pending_headers_are_merged() {
        let mut ctx = Context::new(Request::get("/"), HandlerChain::empty());
        ctx.set_header("X-Trace", "abc");
        ctx.set_header("Content-Type", "text/html");
        assert!(ctx.send(Response::text("hi")));

        let (res, _) = ctx.finish();
        assert_eq!(res.get_header("x-trace"), Some("abc"));
        assert_eq!(res.get_header("content-type"), Some("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_unanswered_request_is_empty_ok() {
        let ctx = Context::new(Request::get("/"), HandlerChain::empty());
        let (res, dropped) = ctx.finish();
        assert_eq!(res.status, 200);
        assert!(res.body.is_empty());
        assert_eq!(dropped, 0);
    }

    #[tokio::test]
    async fn test_params_are_visible_to_handlers() {
        let mut params = PathParams::new();
        params.insert("id", "42");
        let unit = HandlerUnit::plain(|ctx| {
            Box::pin(async move {
                let id = ctx.param("id").unwrap_or_default().to_string();
                ctx.send(Response::text(id));
                Ok(())
            })
        });
        let mut ctx = Context::new(Request::get("/users/42"), HandlerChain::single(unit))
            .with_params(params);

        ctx.start().await.unwrap();

        let (res, _) = ctx.finish();
        assert_eq!(res.body_string(), Some("42".to_string()));
    }
}
