//! HTTP surface: route table, error mapping and the assembled pipeline.
//!
//! | Route                     | Response                                  |
//! |---------------------------|-------------------------------------------|
//! | `GET /gamepasses/:userId` | JSON array of passes, or `{"error": ..}`  |
//! | `GET /health`             | `{"status":"ok"}`                          |

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use crate::context::Context;
use crate::error::ProxyError;
use crate::middleware::{LoggerMiddleware, Pipeline};
use crate::security::{RateLimitMiddleware, RequestGate};
use crate::service::PassService;
use crate::upstream::Upstream;
use crate::{Response, Router, StatusCode};

impl From<ProxyError> for Response {
    fn from(err: ProxyError) -> Self {
        Response::error(err.status(), err.public_message())
    }
}

/// Routes served by the proxy.
pub fn router<U: Upstream>(service: Arc<PassService<U>>) -> Router {
    let mut router = Router::new();

    router.get("/health", |_ctx| async {
        Response::new(StatusCode::Ok).json(&json!({ "status": "ok" }))
    });

    router.get("/gamepasses/:userId", move |ctx: Context| {
        let service = Arc::clone(&service);
        async move {
            let raw = ctx.params().get("userId").unwrap_or_default();
            match service.passes_for(raw).await {
                Ok(items) => Response::new(StatusCode::Ok).json(items.as_slice()),
                Err(err) => {
                    warn!(user_id = raw, error = %err, "gamepass request failed");
                    err.into()
                }
            }
        }
    });

    router
}

/// The full request pipeline: logging, then rate limiting, then routing.
pub fn app<U: Upstream>(service: Arc<PassService<U>>, gate: Arc<RequestGate>) -> Pipeline {
    Pipeline::new(router(service))
        .with(LoggerMiddleware)
        .with(RateLimitMiddleware::new(gate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::Aggregator;
    use crate::aggregate::tests::FakeUpstream;
    use crate::http::Request;
    use crate::upstream::Item;
    use std::time::Duration;

    fn get(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
        let (mut req, _) = Request::parse(raw.as_bytes()).unwrap();
        req.set_peer_addr("192.0.2.1:50000".parse().unwrap());
        req
    }

    fn app_with(fake: FakeUpstream, max: u32) -> (Pipeline, Arc<FakeUpstream>) {
        let fake = Arc::new(fake);
        let service = Arc::new(PassService::new(Aggregator::new(Arc::clone(&fake))));
        let gate = Arc::new(RequestGate::new(max, Duration::from_secs(900)));
        (app(service, gate), fake)
    }

    fn json_body(res: &Response) -> serde_json::Value {
        serde_json::from_slice(res.body_bytes()).unwrap()
    }

    #[tokio::test]
    async fn returns_enriched_list() {
        let mut fake = FakeUpstream::with_universes(&[(1, &[2, 3])]);
        fake.icons.insert(2, "icon-2".into());
        let (app, _) = app_with(fake, 100);

        let res = app.handle(get("/gamepasses/5")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        let items: Vec<Item> = serde_json::from_slice(res.body_bytes()).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].icon_image_url, "icon-2");
        assert_eq!(items[1].icon_image_url, "");
    }

    #[tokio::test]
    async fn invalid_id_is_400() {
        let (app, fake) = app_with(FakeUpstream::default(), 100);
        let res = app.handle(get("/gamepasses/abc")).await;
        assert_eq!(res.status(), StatusCode::BadRequest);
        assert_eq!(json_body(&res), json!({ "error": "Invalid userId: must be numeric" }));
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn forbidden_and_generic_failures_differ() {
        let forbidden = FakeUpstream {
            fail_owner: Some(ProxyError::UpstreamForbidden { endpoint: "games" }),
            ..FakeUpstream::default()
        };
        let (app, _) = app_with(forbidden, 100);
        let res = app.handle(get("/gamepasses/1")).await;
        assert_eq!(res.status(), StatusCode::Forbidden);
        let forbidden_body = json_body(&res);

        let broken = FakeUpstream {
            fail_owner: Some(ProxyError::failure("games", "timed out")),
            ..FakeUpstream::default()
        };
        let (app, _) = app_with(broken, 100);
        let res = app.handle(get("/gamepasses/1")).await;
        assert_eq!(res.status(), StatusCode::BadGateway);
        assert_ne!(json_body(&res), forbidden_body);
    }

    #[tokio::test]
    async fn rate_limited_requests_skip_the_pipeline() {
        let (app, fake) = app_with(FakeUpstream::with_universes(&[(1, &[2])]), 1);

        assert_eq!(app.handle(get("/gamepasses/abc")).await.status(), StatusCode::BadRequest);
        let res = app.handle(get("/gamepasses/5")).await;
        assert_eq!(res.status(), StatusCode::TooManyRequests);
        assert_eq!(fake.total_calls(), 0);
    }

    #[tokio::test]
    async fn health_and_unknown_routes() {
        let (app, _) = app_with(FakeUpstream::default(), 100);
        let res = app.handle(get("/health")).await;
        assert_eq!(json_body(&res), json!({ "status": "ok" }));
        assert_eq!(app.handle(get("/nope")).await.status(), StatusCode::NotFound);
    }
}
