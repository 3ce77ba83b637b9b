//! Conversion between hyper and oxide-router requests and responses.

use std::convert::Infallible;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request as HyperRequest, Response as HyperResponse, StatusCode};
use oxide_router::{Dispatcher, Method, Request, Response};
use tracing::warn;

/// Serves one hyper request through `dispatcher`.
pub async fn handle(
    req: HyperRequest<Incoming>,
    dispatcher: Arc<Dispatcher>,
) -> Result<HyperResponse<Full<Bytes>>, Infallible> {
    let request = into_request(req).await;
    let response = dispatcher.serve(request).await;
    Ok(into_hyper(response))
}

async fn into_request(req: HyperRequest<Incoming>) -> Request {
    let (parts, body) = req.into_parts();
    let mut request = Request::new(Method::parse(parts.method.as_str()), parts.uri.path());

    if let Some(query) = parts.uri.query() {
        request = request.with_query(query);
    }

    for (key, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            request.headers.insert(key.to_string(), v.to_string());
        }
    }

    match body.collect().await {
        Ok(collected) => request.body = collected.to_bytes().to_vec(),
        Err(err) => warn!(error = %err, "failed to read request body"),
    }
    request
}

/// Converts a dispatcher response; unusable headers turn it into a bare 500.
pub fn into_hyper(res: Response) -> HyperResponse<Full<Bytes>> {
    let mut builder = HyperResponse::builder()
        .status(StatusCode::from_u16(res.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));

    for (key, value) in &res.headers {
        builder = builder.header(key.as_str(), value.as_str());
    }

    builder
        .body(Full::new(Bytes::from(res.body)))
        .unwrap_or_else(|err| {
            warn!(error = %err, "invalid response, answering 500");
            let mut fallback = HyperResponse::new(Full::new(Bytes::new()));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_hyper_copies_everything() {
        let res = into_hyper(Response::redirect_with(307, "/next").header("X-Test", "1"));
        assert_eq!(res.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(res.headers()["location"], "/next");
        assert_eq!(res.headers()["x-test"], "1");
    }

    #[test]
    fn test_into_hyper_rejects_bad_headers() {
        let res = into_hyper(Response::text("x").header("bad header", "v"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_into_hyper_bad_status() {
        let res = into_hyper(Response::new(1000));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
