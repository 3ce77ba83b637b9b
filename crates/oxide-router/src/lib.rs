//! # oxide-router
//!
//! Request routing and dispatch for HTTP applications.
//!
//! This crate provides:
//! - A per-method radix tree with static, `{param}` and `*catch_all`
//!   segments, where the most specific route wins
//! - Trailing-slash and case-insensitive redirects, 405 with `Allow`
//! - Handler chains with before/after middleware and route filters
//! - Write-once responses and panic recovery
//! - Route groups sharing a prefix and leading units
//! - Reverse lookup of named routes
//! - Static files and an access-log observer
//!
//! ## Quick Start
//!
//! ```
//! use oxide_router::{BoxFuture, Context, HandlerResult, Request, Response, Router};
//!
//! fn hello(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
//!     Box::pin(async move {
//!         ctx.send(Response::text("Hello, World!"));
//!         Ok(())
//!     })
//! }
//!
//! fn user(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
//!     Box::pin(async move {
//!         let id = ctx.param("id").unwrap_or("unknown").to_string();
//!         ctx.send(Response::json(&serde_json::json!({ "id": id })));
//!         Ok(())
//!     })
//! }
//!
//! # async fn run() -> oxide_router::Result<()> {
//! let dispatcher = Router::new()
//!     .get("/", hello)
//!     .get("/users/{id}", user)
//!     .build()?;
//!
//! let response = dispatcher.serve(Request::get("/users/123")).await;
//! assert_eq!(response.status, 200);
//! # Ok(())
//! # }
//! ```
//!
//! ## Middleware and filters
//!
//! Plain units run and let the chain continue; filters decide by calling
//! [`Context::proceed`]:
//!
//! ```
//! use oxide_router::{Response, Route, Method, HandlerUnit, Router};
//!
//! let router = Router::new()
//!     .before(|ctx| {
//!         Box::pin(async move {
//!             ctx.set_header("X-Powered-By", "oxide");
//!             Ok(())
//!         })
//!     })
//!     .filter("admin", |ctx| {
//!         Box::pin(async move {
//!             if ctx.request().get_header("Authorization").is_some() {
//!                 ctx.proceed().await
//!             } else {
//!                 ctx.send(Response::unauthorized());
//!                 Ok(())
//!             }
//!         })
//!     })
//!     .add(
//!         Route::new(
//!             Method::Get,
//!             "/admin",
//!             vec![HandlerUnit::plain(|ctx| {
//!                 Box::pin(async move {
//!                     ctx.send(Response::text("welcome"));
//!                     Ok(())
//!                 })
//!             })],
//!         )
//!         .name("admin"),
//!     );
//! # let _ = router.build().unwrap();
//! ```
//!
//! ## Groups, redirects and method mismatches
//!
//! ```
//! use oxide_router::{BoxFuture, Context, HandlerResult, Request, Response, RouteGroup, Router};
//!
//! fn list(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
//!     Box::pin(async move {
//!         ctx.send(Response::json(&serde_json::json!([])));
//!         Ok(())
//!     })
//! }
//!
//! # futures::executor::block_on(async {
//! let dispatcher = Router::new()
//!     .group(RouteGroup::new("/api/v1").get("/users", list))
//!     .build()
//!     .unwrap();
//!
//! let res = dispatcher.serve(Request::get("/api/v1/users/")).await;
//! assert_eq!(res.status, 301);
//! assert_eq!(res.get_header("Location"), Some("/api/v1/users"));
//!
//! let res = dispatcher.serve(Request::post("/api/v1/users")).await;
//! assert_eq!(res.status, 405);
//! assert_eq!(res.get_header("Allow"), Some("GET"));
//! # });
//! ```

mod chain;
mod context;
mod dispatcher;
mod error;
mod files;
mod handler;
mod middleware;
mod observer;
pub mod path;
mod registry;
mod request;
mod response;
mod router;
mod tree;

pub use chain::{ChainState, HandlerChain};
pub use context::Context;
pub use dispatcher::Dispatcher;
pub use error::{BoxError, HandlerFailure, Result, RouterError};
pub use files::{content_type, StaticFiles};
pub use handler::{BoxFuture, Handler, HandlerResult, HandlerUnit};
pub use middleware::{AuthGuard, CorsFilter};
pub use observer::{AccessRecord, Observer, Outcome, TracingObserver};
pub use path::PathPattern;
pub use registry::{Endpoint, MethodRegistry};
pub use request::{Method, PathParams, Request};
pub use response::{reason_phrase, Response, ResponseState};
pub use router::{Route, RouteGroup, Router, RouterConfig};
pub use tree::{Lookup, NodeKind, RouteTrie};
