//! Ready-made filters.
//!
//! Both are [`Handler`]s meant to be registered as filter units, globally or
//! for selected routes:
//!
//! ```
//! use oxide_router::{AuthGuard, CorsFilter, HandlerUnit, Router};
//!
//! let router = Router::new()
//!     .before_unit(HandlerUnit::filter_handler(CorsFilter::permissive()))
//!     .filter_unit(
//!         "admin",
//!         HandlerUnit::filter_handler(AuthGuard::new("/login").exclude(&["/public"])),
//!     );
//! ```

use tracing::debug;

use crate::context::Context;
use crate::handler::{BoxFuture, Handler, HandlerResult};
use crate::request::Method;
use crate::response::Response;

/// Filter that lets a request through only when it carries credentials.
///
/// Anything else is redirected to the login URL.
#[derive(Debug, Clone)]
pub struct AuthGuard {
    /// Path prefixes to exclude from authentication.
    pub exclude: Vec<String>,
    /// The login redirect URL.
    pub login_url: String,
}

impl AuthGuard {
    /// Creates a guard redirecting to `login_url`.
    pub fn new(login_url: impl Into<String>) -> Self {
        Self {
            exclude: Vec::new(),
            login_url: login_url.into(),
        }
    }

    /// Adds paths to exclude from authentication.
    #[must_use]
    pub fn exclude(mut self, paths: &[&str]) -> Self {
        self.exclude
            .extend(paths.iter().map(|s| (*s).to_string()));
        self
    }

    fn is_excluded(&self, path: &str) -> bool {
        path == self.login_url || self.exclude.iter().any(|p| path.starts_with(p.as_str()))
    }

    fn has_credentials(ctx: &Context) -> bool {
        let request = ctx.request();
        request.get_header("Authorization").is_some()
            || request
                .get_header("Cookie")
                .is_some_and(|c| c.contains("session="))
    }
}

impl Handler for AuthGuard {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if self.is_excluded(&ctx.request().path) || Self::has_credentials(ctx) {
                return ctx.proceed().await;
            }
            debug!(path = %ctx.request().path, "unauthenticated, redirecting to login");
            ctx.send(Response::redirect(self.login_url.as_str()));
            Ok(())
        })
    }
}

/// Filter answering CORS preflight requests and tagging every response.
#[derive(Debug, Clone)]
pub struct CorsFilter {
    /// Allowed origins.
    pub allowed_origins: Vec<String>,
    /// Allowed methods.
    pub allowed_methods: Vec<String>,
    /// Allowed headers.
    pub allowed_headers: Vec<String>,
}

impl CorsFilter {
    /// Allows all origins.
    pub fn permissive() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: ["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
            allowed_headers: vec!["*".to_string()],
        }
    }

    /// Allows the given origins only.
    pub fn new(origins: &[&str]) -> Self {
        Self {
            allowed_origins: origins.iter().map(|s| (*s).to_string()).collect(),
            allowed_methods: ["GET", "POST", "PUT", "DELETE"]
                .iter()
                .map(|m| (*m).to_string())
                .collect(),
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
        }
    }

    /// Value for `Access-Control-Allow-Origin`: `*` when any origin is
    /// allowed, otherwise the request's `Origin` if it is listed.
    fn allow_origin(&self, origin: Option<&str>) -> Option<String> {
        if self.allowed_origins.iter().any(|o| o == "*") {
            return Some("*".to_string());
        }
        let origin = origin?;
        self.allowed_origins
            .iter()
            .any(|o| o == origin)
            .then(|| origin.to_string())
    }

    fn preflight(&self) -> Response {
        Response::new(204)
            .header("Access-Control-Allow-Methods", self.allowed_methods.join(", "))
            .header("Access-Control-Allow-Headers", self.allowed_headers.join(", "))
            .header("Access-Control-Max-Age", "86400")
    }
}

impl Handler for CorsFilter {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            if let Some(origin) = self.allow_origin(ctx.request().get_header("Origin")) {
                if origin != "*" {
                    ctx.set_header("Vary", "Origin");
                }
                ctx.set_header("Access-Control-Allow-Origin", origin);
            } else {
                debug!(path = %ctx.request().path, "origin not allowed");
            }
            if ctx.request().method == Method::Options {
                ctx.send(self.preflight());
                return Ok(());
            }
            ctx.proceed().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::HandlerChain;
    use crate::handler::HandlerUnit;
    use crate::request::Request;

    fn run_behind(filter: HandlerUnit, request: Request) -> (Context, bool) {
        let reached = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&reached);
        let handler = HandlerUnit::plain(move |ctx| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Box::pin(async move {
                ctx.send(Response::text("ok"));
                Ok(())
            })
        });
        let mut ctx = Context::new(request, HandlerChain::new(vec![filter, handler].into()));
        futures::executor::block_on(ctx.start()).unwrap();
        let hit = reached.load(std::sync::atomic::Ordering::SeqCst);
        (ctx, hit)
    }

    #[test]
    fn test_auth_guard_exclude() {
        let guard = AuthGuard::new("/login").exclude(&["/public", "/api/health"]);
        assert!(guard.is_excluded("/public/file.txt"));
        assert!(guard.is_excluded("/api/health"));
        assert!(guard.is_excluded("/login"));
        assert!(!guard.is_excluded("/admin"));
    }

    #[test]
    fn test_auth_guard_redirects_anonymous() {
        let guard = HandlerUnit::filter_handler(AuthGuard::new("/login"));
        let (ctx, reached) = run_behind(guard, Request::get("/admin"));
        assert!(!reached);
        let (res, _) = ctx.finish();
        assert_eq!(res.status, 302);
        assert_eq!(res.get_header("location"), Some("/login"));
    }

    #[test]
    fn test_auth_guard_passes_session() {
        let guard = HandlerUnit::filter_handler(AuthGuard::new("/login"));
        let request = Request::get("/admin").header("Cookie", "theme=dark; session=abc");
        let (_, reached) = run_behind(guard, request);
        assert!(reached);
    }

    #[test]
    fn test_cors_preflight_short_circuits() {
        let cors = HandlerUnit::filter_handler(CorsFilter::new(&[
            "https://example.com",
            "https://admin.example.com",
        ]));
        let request =
            Request::new(Method::Options, "/api").header("Origin", "https://example.com");
        let (ctx, reached) = run_behind(cors, request);
        assert!(!reached);
        let (res, _) = ctx.finish();
        assert_eq!(res.status, 204);
        assert_eq!(
            res.get_header("access-control-allow-origin"),
            Some("https://example.com")
        );
        assert_eq!(res.get_header("vary"), Some("Origin"));
        assert_eq!(
            res.get_header("access-control-allow-methods"),
            Some("GET, POST, PUT, DELETE")
        );
    }

    #[test]
    fn test_cors_ignores_unlisted_origins() {
        let cors = HandlerUnit::filter_handler(CorsFilter::new(&["https://example.com"]));
        let request = Request::get("/api").header("Origin", "https://evil.test");
        let (ctx, reached) = run_behind(cors, request);
        assert!(reached);
        let (res, _) = ctx.finish();
        assert_eq!(res.get_header("access-control-allow-origin"), None);

        let filter = CorsFilter::new(&["https://a.test", "https://b.test"]);
        assert_eq!(
            filter.allow_origin(Some("https://b.test")).as_deref(),
            Some("https://b.test")
        );
        assert_eq!(filter.allow_origin(None), None);
    }

    #[test]
    fn test_cors_tags_normal_responses() {
        let cors = HandlerUnit::filter_handler(CorsFilter::permissive());
        let (ctx, reached) = run_behind(cors, Request::get("/api"));
        assert!(reached);
        let (res, _) = ctx.finish();
        assert_eq!(res.get_header("access-control-allow-origin"), Some("*"));
        assert_eq!(res.body_string(), Some("ok".to_string()));
    }
}
