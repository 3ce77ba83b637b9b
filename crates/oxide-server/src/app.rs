//! The routes this server answers.

use std::path::Path;
use std::sync::Arc;

use oxide_router::{
    AuthGuard, BoxFuture, Context, CorsFilter, Dispatcher, HandlerResult, HandlerUnit, Method,
    Response, Route, RouteGroup, Router, RouterConfig,
};
use serde_json::json;

/// Users served by the demo API.
struct UsersController {
    names: Vec<&'static str>,
}

impl UsersController {
    fn list<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            ctx.send(Response::json(&json!({ "users": self.names })));
            Ok(())
        })
    }

    fn show<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let Some(index) = ctx.params().parse::<usize>("id") else {
                ctx.send(Response::plain(400));
                return Ok(());
            };
            let response = match self.names.get(index) {
                Some(name) => Response::json(&json!({ "id": index, "name": name })),
                None => Response::not_found(),
            };
            ctx.send(response);
            Ok(())
        })
    }
}

fn index(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.send(Response::text("oxide-server"));
        Ok(())
    })
}

fn health(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.send(Response::json(&json!({ "status": "ok" })));
        Ok(())
    })
}

fn echo(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let body = ctx.request().body.clone();
        let content_type = ctx
            .request()
            .get_header("Content-Type")
            .unwrap_or("application/octet-stream")
            .to_string();
        ctx.send(Response::ok().header("Content-Type", content_type).body(body));
        Ok(())
    })
}

fn admin(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        ctx.send(Response::html("<h1>Admin</h1>"));
        Ok(())
    })
}

/// Fails on purpose: `?error` returns an error, anything else panics.
fn boom(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        if ctx.request().get_query("error").is_some() {
            return Err("requested failure".into());
        }
        panic!("requested failure")
    })
}

fn not_found(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let path = ctx.request().path.clone();
        ctx.send(Response::json(&json!({ "error": "not found", "path": path })).status(404));
        Ok(())
    })
}

fn recovered(ctx: &mut Context) -> BoxFuture<'_, HandlerResult> {
    Box::pin(async move {
        let detail = ctx.failure().map(ToString::to_string);
        ctx.send(
            Response::json(&json!({ "error": "internal server error", "detail": detail }))
                .status(500),
        );
        Ok(())
    })
}

/// Builds the dispatcher with the demo routes, plus `/assets` when given.
pub fn build(config: RouterConfig, assets: Option<&Path>) -> oxide_router::Result<Dispatcher> {
    let users = Arc::new(UsersController {
        names: vec!["ada", "grace", "linus"],
    });

    let api = RouteGroup::new("/api")
        .route(Route::new(
            Method::Get,
            "/users",
            vec![HandlerUnit::bind(Arc::clone(&users), UsersController::list)],
        ))
        .route(
            Route::new(
                Method::Get,
                "/users/{id}",
                vec![HandlerUnit::bind(users, UsersController::show)],
            )
            .name("user"),
        )
        .post("/echo", echo);

    let mut router = Router::new()
        .config(config)
        .before_unit(HandlerUnit::filter_handler(CorsFilter::permissive()))
        .filter_unit("admin", HandlerUnit::filter_handler(AuthGuard::new("/login")))
        .get("/", index)
        .get("/health", health)
        .get("/boom", boom)
        .add(Route::new(Method::Get, "/admin", vec![HandlerUnit::plain(admin)]).name("admin"))
        .group(api)
        .not_found(not_found)
        .on_panic(recovered);

    if let Some(dir) = assets {
        router = router.serve_files("/assets", dir);
    }

    router.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxide_router::Request;

    fn app() -> Dispatcher {
        build(RouterConfig::default(), None).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let res = app().serve(Request::get("/health")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.get_header("access-control-allow-origin"), Some("*"));
    }

    #[tokio::test]
    async fn test_bound_controller() {
        let res = app().serve(Request::get("/api/users/1")).await;
        assert_eq!(res.status, 200);
        assert!(res.body_string().unwrap().contains("grace"));

        let res = app().serve(Request::get("/api/users/abc")).await;
        assert_eq!(res.status, 400);
    }

    #[tokio::test]
    async fn test_panic_is_recovered_as_json() {
        let res = app().serve(Request::get("/boom")).await;
        assert_eq!(res.status, 500);
        assert!(res.body_string().unwrap().contains("panicked: requested failure"));

        let res = app()
            .serve(Request::get("/boom").query_param("error", "1"))
            .await;
        assert_eq!(res.status, 500);
        assert!(res.body_string().unwrap().contains("\"requested failure\""));
    }

    #[tokio::test]
    async fn test_admin_requires_login() {
        let res = app().serve(Request::get("/admin")).await;
        assert_eq!(res.status, 302);

        let res = app()
            .serve(Request::get("/admin").header("Authorization", "Bearer t"))
            .await;
        assert_eq!(res.status, 200);
    }

    #[tokio::test]
    async fn test_custom_not_found() {
        let res = app().serve(Request::get("/missing")).await;
        assert_eq!(res.status, 404);
        assert!(res.body_string().unwrap().contains("/missing"));
    }

    #[tokio::test]
    async fn test_assets() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.css"), "body{}").unwrap();
        let app = build(RouterConfig::default(), Some(dir.path())).unwrap();

        let res = app.serve(Request::get("/assets/app.css")).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.get_header("content-type"), Some("text/css; charset=utf-8"));
    }

    #[test]
    fn test_url_for_user() {
        let params = [("id".to_string(), "2".to_string())].into_iter().collect();
        assert_eq!(app().url_for("user", &params), Some("/api/users/2".to_string()));
    }
}
