//! Route registration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::Context;
use crate::dispatcher::Dispatcher;
use crate::error::Result;
use crate::files::{StaticFiles, FILEPATH_PARAM};
use crate::handler::{BoxFuture, HandlerResult, HandlerUnit};
use crate::observer::{Observer, TracingObserver};
use crate::path::PathPattern;
use crate::registry::{Endpoint, MethodRegistry};
use crate::request::Method;

/// Recovery switches of the dispatcher.
///
/// Every switch defaults to on; a config file only has to list the ones it
/// turns off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Redirect `/a/` to `/a` (and back) when only the other spelling exists.
    pub redirect_trailing_slash: bool,
    /// Redirect to a cleaned, case-corrected path when one exists.
    pub redirect_fixed_path: bool,
    /// Answer 405 instead of 404 when the path exists under other methods.
    pub handle_method_not_allowed: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            redirect_trailing_slash: true,
            redirect_fixed_path: true,
            handle_method_not_allowed: true,
        }
    }
}

/// A single route definition.
#[derive(Debug, Clone)]
pub struct Route {
    method: Method,
    pattern: String,
    name: Option<String>,
    filters: Vec<String>,
    units: Vec<HandlerUnit>,
}

impl Route {
    /// Creates a route running `units` in order.
    pub fn new(method: Method, pattern: impl Into<String>, units: Vec<HandlerUnit>) -> Self {
        Self {
            method,
            pattern: pattern.into(),
            name: None,
            filters: Vec::new(),
            units,
        }
    }

    /// Sets the route name, used for reverse lookup and filter selection.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Opts the route into the filter registered under `filter`.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filters.push(filter.into());
        self
    }

    /// The HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The path pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    fn wants(&self, filter: &str) -> bool {
        self.name.as_deref() == Some(filter)
            || self.pattern == filter
            || self.filters.iter().any(|f| f == filter)
    }
}

fn join(prefix: &str, pattern: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if pattern == "/" && !prefix.is_empty() {
        return prefix.to_string();
    }
    format!("{prefix}{pattern}")
}

/// A group of routes with a common prefix and shared units.
#[derive(Debug, Clone)]
pub struct RouteGroup {
    prefix: String,
    units: Vec<HandlerUnit>,
    routes: Vec<Route>,
}

impl RouteGroup {
    /// Creates a new route group with the given prefix.
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            units: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Runs `handler` ahead of every route in the group.
    #[must_use]
    pub fn before<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.unit(HandlerUnit::plain(handler))
    }

    /// Adds a group-level unit.
    #[must_use]
    pub fn unit(mut self, unit: HandlerUnit) -> Self {
        self.units.push(unit);
        self
    }

    /// Adds a GET route.
    #[must_use]
    pub fn get<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Route::new(Method::Get, path, vec![HandlerUnit::plain(handler)]))
    }

    /// Adds a POST route.
    #[must_use]
    pub fn post<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Route::new(Method::Post, path, vec![HandlerUnit::plain(handler)]))
    }

    /// Adds a PUT route.
    #[must_use]
    pub fn put<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Route::new(Method::Put, path, vec![HandlerUnit::plain(handler)]))
    }

    /// Adds a DELETE route.
    #[must_use]
    pub fn delete<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Route::new(Method::Delete, path, vec![HandlerUnit::plain(handler)]))
    }

    /// Adds a route; its pattern is relative to the group prefix.
    #[must_use]
    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Returns the routes with the prefix and group units applied.
    pub fn into_routes(self) -> Vec<Route> {
        let Self {
            prefix,
            units,
            routes,
        } = self;
        routes
            .into_iter()
            .map(|mut route| {
                route.pattern = join(&prefix, &route.pattern);
                let own = std::mem::take(&mut route.units);
                route.units = units.iter().cloned().chain(own).collect();
                route
            })
            .collect()
    }
}

/// Collects routes, middleware and fallbacks, then builds a [`Dispatcher`].
pub struct Router {
    routes: Vec<Route>,
    before: Vec<HandlerUnit>,
    after: Vec<HandlerUnit>,
    filters: Vec<(String, HandlerUnit)>,
    not_found: Option<HandlerUnit>,
    method_not_allowed: Option<HandlerUnit>,
    on_panic: Option<HandlerUnit>,
    config: RouterConfig,
    observer: Arc<dyn Observer>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Creates a new empty router.
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
            filters: Vec::new(),
            not_found: None,
            method_not_allowed: None,
            on_panic: None,
            config: RouterConfig::default(),
            observer: Arc::new(TracingObserver),
        }
    }

    /// Adds a GET route.
    #[must_use]
    pub fn get<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::Get, path, vec![HandlerUnit::plain(handler)])
    }

    /// Adds a POST route.
    #[must_use]
    pub fn post<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::Post, path, vec![HandlerUnit::plain(handler)])
    }

    /// Adds a PUT route.
    #[must_use]
    pub fn put<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::Put, path, vec![HandlerUnit::plain(handler)])
    }

    /// Adds a PATCH route.
    #[must_use]
    pub fn patch<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::Patch, path, vec![HandlerUnit::plain(handler)])
    }

    /// Adds a DELETE route.
    #[must_use]
    pub fn delete<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::Delete, path, vec![HandlerUnit::plain(handler)])
    }

    /// Adds a HEAD route.
    #[must_use]
    pub fn head<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::Head, path, vec![HandlerUnit::plain(handler)])
    }

    /// Adds an OPTIONS route.
    #[must_use]
    pub fn options<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::Options, path, vec![HandlerUnit::plain(handler)])
    }

    /// Adds a route running `units` in order.
    #[must_use]
    pub fn route(self, method: Method, path: &str, units: Vec<HandlerUnit>) -> Self {
        self.add(Route::new(method, path, units))
    }

    /// Adds a prepared [`Route`].
    #[must_use]
    pub fn add(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    /// Registers the same handler under each of `methods`.
    #[must_use]
    pub fn matches<F>(mut self, methods: &[Method], path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        let unit = HandlerUnit::plain(handler);
        for method in methods {
            self.routes
                .push(Route::new(method.clone(), path, vec![unit.clone()]));
        }
        self
    }

    /// Registers the handler under every method in [`Method::ALL`].
    #[must_use]
    pub fn any<F>(self, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.matches(&Method::ALL, path, handler)
    }

    /// Adds a named route.
    #[must_use]
    pub fn named<F>(self, name: &str, method: Method, path: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add(Route::new(method, path, vec![HandlerUnit::plain(handler)]).name(name))
    }

    /// Runs `handler` before every route.
    #[must_use]
    pub fn before<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.before_unit(HandlerUnit::plain(handler))
    }

    /// Adds a global unit that runs before every route.
    #[must_use]
    pub fn before_unit(mut self, unit: HandlerUnit) -> Self {
        self.before.push(unit);
        self
    }

    /// Runs `handler` after every route that did not send a response.
    #[must_use]
    pub fn after<F>(self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.after_unit(HandlerUnit::plain(handler))
    }

    /// Adds a global unit that runs after every route.
    #[must_use]
    pub fn after_unit(mut self, unit: HandlerUnit) -> Self {
        self.after.push(unit);
        self
    }

    /// Registers a filter for routes whose name or pattern is `target`, or
    /// that opted in with [`Route::with_filter`]. The filter must call
    /// [`Context::proceed`] to let the route run.
    #[must_use]
    pub fn filter<F>(self, target: &str, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.filter_unit(target, HandlerUnit::filter(handler))
    }

    /// Registers any unit as a filter for `target`.
    #[must_use]
    pub fn filter_unit(mut self, target: &str, unit: HandlerUnit) -> Self {
        self.filters.push((target.to_string(), unit));
        self
    }

    /// Adds a route group.
    #[must_use]
    pub fn group(mut self, group: RouteGroup) -> Self {
        self.routes.extend(group.into_routes());
        self
    }

    /// Serves files below `dir` under `GET {prefix}/*filepath`.
    #[must_use]
    pub fn serve_files(self, prefix: &str, dir: impl Into<PathBuf>) -> Self {
        let pattern = format!("{}/*{FILEPATH_PARAM}", prefix.trim_end_matches('/'));
        let files = HandlerUnit::handler(StaticFiles::new(dir));
        self.route(Method::Get, &pattern, vec![files])
    }

    /// Answers requests no route matched.
    #[must_use]
    pub fn not_found<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.not_found = Some(HandlerUnit::plain(handler));
        self
    }

    /// Answers requests whose path exists under other methods only.
    ///
    /// The `Allow` header is set before the handler runs.
    #[must_use]
    pub fn method_not_allowed<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.method_not_allowed = Some(HandlerUnit::plain(handler));
        self
    }

    /// Answers requests whose handler panicked or returned an error.
    ///
    /// The failure is available through [`Context::failure`].
    #[must_use]
    pub fn on_panic<F>(mut self, handler: F) -> Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.on_panic = Some(HandlerUnit::plain(handler));
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the observer receiving access records.
    #[must_use]
    pub fn observer(mut self, observer: impl Observer) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    /// Validates every route and assembles the chains.
    ///
    /// Each chain is: global before units, matching filters in registration
    /// order, the route's own units (group units first), global after units.
    pub fn build(self) -> Result<Dispatcher> {
        let Self {
            routes,
            before,
            after,
            filters,
            not_found,
            method_not_allowed,
            on_panic,
            config,
            observer,
        } = self;

        let mut registry = MethodRegistry::new();
        let mut named: HashMap<String, PathPattern> = HashMap::new();

        for route in routes {
            let parsed = PathPattern::parse(&route.pattern)?;

            let mut units = before.clone();
            units.extend(
                filters
                    .iter()
                    .filter(|(target, _)| route.wants(target))
                    .map(|(_, unit)| unit.clone()),
            );
            units.extend(route.units);
            units.extend(after.iter().cloned());

            if let Some(name) = &route.name {
                if named.insert(name.clone(), parsed).is_some() {
                    warn!(name = %name, "route name reused, the later route wins");
                }
            }

            registry.insert(Endpoint {
                method: route.method,
                pattern: Arc::from(route.pattern),
                name: route.name.map(Arc::from),
                units: units.into(),
            })?;
        }

        debug!(routes = registry.len(), ?config, "router built");
        Ok(Dispatcher {
            registry,
            named,
            not_found,
            method_not_allowed,
            on_panic,
            config,
            observer,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Request;
    use crate::response::Response;

    fn hello_handler(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move {
            ctx.send(Response::text("hello"));
            Ok(())
        })
    }

    fn slug_handler(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
        Box::pin(async move {
            let slug = ctx.param("slug").unwrap_or("-").to_string();
            ctx.send(Response::text(slug));
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_shortcuts_register_under_their_method() {
        let router = Router::new()
            .get("/a", hello_handler)
            .post("/a", hello_handler)
            .put("/a", hello_handler)
            .patch("/a", hello_handler)
            .delete("/a", hello_handler)
            .head("/a", hello_handler)
            .options("/a", hello_handler)
            .build()
            .unwrap();

        let methods: Vec<&str> = router
            .routes()
            .into_iter()
            .map(|(m, _)| m.as_str())
            .collect();
        assert_eq!(
            methods,
            vec!["DELETE", "GET", "HEAD", "OPTIONS", "PATCH", "POST", "PUT"]
        );

        let res = router.serve(Request::new(Method::Patch, "/a")).await;
        assert_eq!(res.body_string().unwrap(), "hello");
    }

    #[test]
    fn test_url_for_named_routes() {
        let router = Router::new()
            .named("post", Method::Get, "/blog/{year}/{slug}", slug_handler)
            .add(Route::new(Method::Get, "/feed", vec![]).name("feed"))
            .build()
            .unwrap();

        let params: HashMap<String, String> = [("year", "2024"), ("slug", "radix-trees")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(
            router.url_for("post", &params),
            Some("/blog/2024/radix-trees".to_string())
        );
        assert_eq!(router.url_for("feed", &HashMap::new()), Some("/feed".to_string()));
        assert_eq!(router.url_for("post", &HashMap::new()), None);
        assert_eq!(router.url_for("missing", &params), None);
    }

    #[test]
    fn test_reused_name_points_at_the_later_route() {
        let router = Router::new()
            .named("home", Method::Get, "/old", hello_handler)
            .named("home", Method::Get, "/new", hello_handler)
            .build()
            .unwrap();
        assert_eq!(router.url_for("home", &HashMap::new()), Some("/new".to_string()));
    }

    #[tokio::test]
    async fn test_group_prefix_and_units() {
        let group = RouteGroup::new("/blog/")
            .before(|ctx| {
                Box::pin(async move {
                    ctx.set_header("X-Section", "blog");
                    Ok(())
                })
            })
            .get("/", hello_handler)
            .get("/{slug}", slug_handler)
            .delete("/{slug}", hello_handler);

        let router = Router::new().group(group).build().unwrap();

        let res = router.serve(Request::get("/blog/first-post")).await;
        assert_eq!(res.body_string().unwrap(), "first-post");
        assert_eq!(res.get_header("x-section"), Some("blog"));

        let res = router.serve(Request::get("/blog")).await;
        assert_eq!(res.body_string().unwrap(), "hello");

        let res = router.serve(Request::post("/blog/first-post")).await;
        assert_eq!(res.get_header("allow"), Some("DELETE, GET"));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/api/", "/users"), "/api/users");
        assert_eq!(join("/api", "/"), "/api");
        assert_eq!(join("", "/"), "/");
    }

    #[test]
    fn test_build_rejects_bad_routes() {
        let err = Router::new()
            .get("/ping", hello_handler)
            .get("/ping/", hello_handler)
            .build()
            .unwrap_err();
        assert!(err.is_registration());

        let err = Router::new()
            .get("/files/*rest/more", hello_handler)
            .build()
            .unwrap_err();
        assert!(err.is_registration());
    }

    #[test]
    fn test_filters_are_selected_at_build() {
        fn pass(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
            ctx.proceed()
        }

        let router = Router::new()
            .before(|_ctx| Box::pin(async move { Ok(()) }))
            .filter("admin", pass)
            .filter("/public", pass)
            .filter("audited", pass)
            .add(
                Route::new(Method::Get, "/admin", vec![HandlerUnit::plain(hello_handler)])
                    .name("admin"),
            )
            .add(
                Route::new(Method::Get, "/reports", vec![HandlerUnit::plain(hello_handler)])
                    .with_filter("audited"),
            )
            .get("/public", hello_handler)
            .get("/plain", hello_handler)
            .after(|_ctx| Box::pin(async move { Ok(()) }))
            .build()
            .unwrap();

        let chain_len = |path: &str| {
            router
                .registry
                .lookup(&Method::Get, path)
                .and_then(|found| found.value.map(|e| e.chain_len()))
                .unwrap()
        };
        assert_eq!(chain_len("/admin"), 4);
        assert_eq!(chain_len("/reports"), 4);
        assert_eq!(chain_len("/public"), 4);
        assert_eq!(chain_len("/plain"), 3);
    }

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: RouterConfig =
            serde_json::from_str(r#"{"redirect_fixed_path": false}"#).unwrap();
        assert!(config.redirect_trailing_slash);
        assert!(!config.redirect_fixed_path);
        assert!(config.handle_method_not_allowed);
    }
}
