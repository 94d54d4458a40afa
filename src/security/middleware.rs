use std::sync::Arc;

use tracing::warn;

use super::RequestGate;
use crate::{
    Response,
    context::Context,
    error::ProxyError,
    middleware::{BoxResponse, Middleware, Next},
};

/// Rate-limiting middleware backed by a shared [`RequestGate`].
///
/// Keys the gate by the client's IP address. Allowed requests continue down
/// the chain and get `X-RateLimit-Limit` / `X-RateLimit-Remaining` headers on
/// the way back; denied ones are answered here with `429` and never reach the
/// router, the cache or the upstream.
///
/// # Examples
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use pass_proxy::{Router, middleware::Pipeline, security::{RateLimitMiddleware, RequestGate}};
///
/// let gate = Arc::new(RequestGate::default());
/// let pipeline = Pipeline::new(Router::new()).with(RateLimitMiddleware::new(gate));
/// ```
pub struct RateLimitMiddleware {
    gate: Arc<RequestGate>,
}

impl RateLimitMiddleware {
    pub fn new(gate: Arc<RequestGate>) -> Self {
        Self { gate }
    }
}

impl Middleware for RateLimitMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
        let client = ctx.client_key();
        let decision = self.gate.check(&client);

        Box::pin(async move {
            if !decision.allowed {
                warn!(%client, "rate limit exceeded");
                let err = ProxyError::RateLimited;
                return Response::error(err.status(), err.public_message())
                    .header("Retry-After", decision.reset_after.as_secs().to_string())
                    .header("X-RateLimit-Limit", decision.limit.to_string())
                    .header("X-RateLimit-Remaining", "0");
            }

            let mut resp = next.run(ctx).await;
            resp.add_header("X-RateLimit-Limit", decision.limit.to_string());
            resp.add_header("X-RateLimit-Remaining", decision.remaining.to_string());
            resp
        })
    }
}
