//! Serving one request end to end.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tracing::{debug, error, warn};

use crate::chain::HandlerChain;
use crate::context::Context;
use crate::error::{HandlerFailure, RouterError};
use crate::handler::HandlerUnit;
use crate::observer::{AccessRecord, Observer, Outcome};
use crate::path::{clean, toggle_trailing_slash, PathPattern, ROOT};
use crate::registry::MethodRegistry;
use crate::request::{Method, PathParams, Request};
use crate::response::Response;
use crate::router::RouterConfig;

/// The immutable, shareable result of [`Router::build`](crate::Router::build).
///
/// Cheap to share behind an `Arc`; every request gets its own [`Context`].
pub struct Dispatcher {
    pub(crate) registry: MethodRegistry,
    pub(crate) named: HashMap<String, PathPattern>,
    pub(crate) not_found: Option<HandlerUnit>,
    pub(crate) method_not_allowed: Option<HandlerUnit>,
    pub(crate) on_panic: Option<HandlerUnit>,
    pub(crate) config: RouterConfig,
    pub(crate) observer: Arc<dyn Observer>,
}

/// What the routing step decided, before the response is final.
struct Routed {
    ctx: Context,
    outcome: Outcome,
}

impl Dispatcher {
    /// Serves `request` and returns the response to write.
    ///
    /// Never fails: misses, method mismatches and handler failures all turn
    /// into responses. Exactly one [`AccessRecord`] is reported per call.
    pub async fn serve(&self, mut request: Request) -> Response {
        let started = Instant::now();
        if request.path.is_empty() {
            request.path = ROOT.to_string();
        }
        let method = request.method.clone();
        let path = request.path.clone();

        let Routed { mut ctx, outcome } = self.route(request).await;
        let route = ctx.route().map(str::to_string);
        let failure = ctx.take_failure().map(|f| f.to_string());
        let (response, dropped_writes) = ctx.finish();

        self.observer.record(&AccessRecord {
            method,
            path,
            route,
            outcome,
            status: response.status,
            bytes: response.body.len(),
            elapsed: started.elapsed(),
            dropped_writes,
            failure,
        });
        response
    }

    async fn route(&self, request: Request) -> Routed {
        let lookup = self.registry.lookup(&request.method, &request.path);

        let mut trailing_slash_redirect = false;
        if let Some(found) = lookup {
            if let Some(endpoint) = found.value {
                let endpoint = Arc::clone(endpoint);
                let chain = HandlerChain::new(Arc::clone(&endpoint.units));
                let ctx = Context::new(request, chain)
                    .with_params(found.params)
                    .with_route(Arc::clone(&endpoint.pattern), endpoint.name.clone());
                return Routed {
                    ctx: self.run(ctx).await,
                    outcome: Outcome::Matched,
                };
            }
            trailing_slash_redirect = found.trailing_slash_redirect;

            if let Some(location) = self.corrected_path(&request, trailing_slash_redirect) {
                return self.redirect(request, &location);
            }
        }

        if self.config.handle_method_not_allowed {
            let (allowed, params) = self.registry.allowed_methods(&request.path, &request.method);
            if !allowed.is_empty() {
                let ctx = self
                    .method_not_allowed(request, &allowed, params.unwrap_or_default())
                    .await;
                return Routed {
                    ctx,
                    outcome: Outcome::MethodNotAllowed,
                };
            }
        }

        debug!(
            error = %RouterError::NotFound {
                method: request.method.to_string(),
                path: request.path.clone(),
            },
            trailing_slash_redirect,
            "no route"
        );
        let ctx = match &self.not_found {
            Some(unit) => self.run(Context::new(request, HandlerChain::single(unit.clone()))).await,
            None => Self::answer(request, Response::not_found()),
        };
        Routed {
            ctx,
            outcome: Outcome::NotFound,
        }
    }

    /// Where a missed request should be sent instead, if anywhere.
    fn corrected_path(&self, request: &Request, trailing_slash_redirect: bool) -> Option<String> {
        if trailing_slash_redirect && self.config.redirect_trailing_slash {
            return Some(toggle_trailing_slash(&request.path));
        }
        if !self.config.redirect_fixed_path {
            return None;
        }
        let cleaned = clean(&request.path);
        self.registry
            .find_case_insensitive(
                &request.method,
                &cleaned,
                self.config.redirect_trailing_slash,
            )
            .filter(|fixed| *fixed != request.path)
    }

    fn redirect(&self, request: Request, path: &str) -> Routed {
        let status = request.method.redirect_status();
        let location = match request.raw_query.as_deref() {
            Some(query) if !query.is_empty() => format!("{path}?{query}"),
            _ => path.to_string(),
        };
        debug!(from = %request.path, to = %location, status, "redirecting");
        Routed {
            ctx: Self::answer(request, Response::redirect_with(status, location)),
            outcome: Outcome::Redirected,
        }
    }

    async fn method_not_allowed(
        &self,
        request: Request,
        allowed: &[Method],
        params: PathParams,
    ) -> Context {
        let allow = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        debug!(
            error = %RouterError::MethodNotAllowed {
                method: request.method.to_string(),
                path: request.path.clone(),
            },
            allow = %allow,
            "method mismatch"
        );

        match &self.method_not_allowed {
            Some(unit) => {
                let mut ctx =
                    Context::new(request, HandlerChain::single(unit.clone())).with_params(params);
                ctx.set_header("Allow", allow);
                self.run(ctx).await
            }
            None => Self::answer(request, Response::method_not_allowed().header("Allow", allow)),
        }
    }

    fn answer(request: Request, response: Response) -> Context {
        let mut ctx = Context::new(request, HandlerChain::empty());
        ctx.send(response);
        ctx
    }

    /// Runs the context's chain, recovering once from a panic or error.
    async fn run(&self, mut ctx: Context) -> Context {
        let Err(failure) = Self::guarded(&mut ctx).await else {
            return ctx;
        };

        if ctx.is_committed() {
            warn!(
                path = %ctx.request().path,
                failure = %failure,
                "handler failed after the response was sent"
            );
            ctx.set_failure(failure);
            return ctx;
        }

        error!(path = %ctx.request().path, failure = %failure, "handler failed");
        ctx.set_failure(failure);
        if let Some(unit) = &self.on_panic {
            ctx.replace_chain(HandlerChain::single(unit.clone()));
            if let Err(second) = Self::guarded(&mut ctx).await {
                error!(failure = %second, "panic handler failed");
            }
        }
        if !ctx.is_committed() {
            ctx.send(Response::internal_server_error());
        }
        ctx
    }

    async fn guarded(ctx: &mut Context) -> Result<(), HandlerFailure> {
        match AssertUnwindSafe(ctx.start()).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(HandlerFailure::Error(err)),
            Err(payload) => Err(HandlerFailure::from_panic(payload)),
        }
    }

    /// Builds the path of a named route.
    pub fn url_for(&self, name: &str, params: &HashMap<String, String>) -> Option<String> {
        self.named.get(name).and_then(|p| p.reverse(params))
    }

    /// The active configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// All `(method, pattern)` pairs, sorted.
    pub fn routes(&self) -> Vec<(&Method, &str)> {
        self.registry.routes()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.registry.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
