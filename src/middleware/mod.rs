//! Middleware pipeline — composable logic that runs before the router.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by all middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to advance.
//! - [`Pipeline`] — an ordered middleware stack terminated by a [`Router`].
//! - [`LoggerMiddleware`] — one `info!` line per request.
//!
//! Middleware can short-circuit (the rate limiter answers 429 without ever
//! reaching the router) or decorate the downstream response.

use std::{future::Future, pin::Pin, sync::Arc};
use tokio::time::Instant;

use crate::{Request, Response, context::Context, router::Router};

/// Boxed future returned by every middleware.
pub type BoxResponse = Pin<Box<dyn Future<Output = Response> + Send>>;

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so a middleware can forward a
/// request at most once. When the stack is exhausted the request goes to the
/// router.
pub struct Next {
    middlewares: Arc<[Arc<dyn Middleware>]>,
    router: Arc<Router>,
    index: usize,
}

impl Next {
    /// Invokes the next middleware, or the router once none remain.
    pub async fn run(mut self, ctx: Context) -> Response {
        match self.middlewares.get(self.index).cloned() {
            Some(middleware) => {
                self.index += 1;
                middleware.handle(ctx, self).await
            }
            None => self.router.route(ctx.into_request()).await,
        }
    }
}

/// The core middleware trait.
///
/// Implementations must be `Send + Sync` because the stack is shared across
/// Tokio tasks, and must not hold locks across an `.await`.
pub trait Middleware: Send + Sync + 'static {
    /// Handle the request and optionally delegate to `next`.
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse;
}

/// An ordered middleware stack in front of a router.
///
/// Cheap to clone; the server handler clones it into every request.
///
/// # Examples
///
/// ```rust,no_run
/// use pass_proxy::{Router, middleware::{LoggerMiddleware, Pipeline}};
///
/// let pipeline = Pipeline::new(Router::new()).with(LoggerMiddleware);
/// ```
#[derive(Clone)]
pub struct Pipeline {
    middlewares: Arc<[Arc<dyn Middleware>]>,
    router: Arc<Router>,
}

impl Pipeline {
    pub fn new(router: Router) -> Self {
        Self {
            middlewares: Arc::from(Vec::new()),
            router: Arc::new(router),
        }
    }

    /// Appends a middleware. Middleware runs in the order it was added.
    #[must_use]
    pub fn with(self, middleware: impl Middleware) -> Self {
        let mut stack: Vec<Arc<dyn Middleware>> = self.middlewares.iter().cloned().collect();
        stack.push(Arc::new(middleware));
        Self {
            middlewares: Arc::from(stack),
            router: self.router,
        }
    }

    /// Runs `request` through the whole stack.
    pub async fn handle(&self, request: Request) -> Response {
        let next = Next {
            middlewares: Arc::clone(&self.middlewares),
            router: Arc::clone(&self.router),
            index: 0,
        };
        next.run(Context::new(request)).await
    }
}

/// Logs method, path, client, status and duration once the response is ready.
pub struct LoggerMiddleware;

impl Middleware for LoggerMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.request().method().clone();
            let path = ctx.request().path().to_string();
            let client = ctx.client_key();

            let response = next.run(ctx).await;

            tracing::info!(
                %method,
                %path,
                %client,
                status = response.status().as_u16(),
                elapsed = ?start.elapsed(),
                "request completed"
            );
            response
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_request(path: &str) -> Request {
        let raw = format!("GET {path} HTTP/1.1\r\n\r\n");
        Request::parse(raw.as_bytes()).unwrap().0
    }

    struct Deny;

    impl Middleware for Deny {
        fn handle(&self, _ctx: Context, _next: Next) -> BoxResponse {
            Box::pin(async { Response::error(StatusCode::Forbidden, "denied") })
        }
    }

    struct Count(Arc<AtomicUsize>);

    impl Middleware for Count {
        fn handle(&self, ctx: Context, next: Next) -> BoxResponse {
            self.0.fetch_add(1, Ordering::SeqCst);
            Box::pin(next.run(ctx))
        }
    }

    fn ok_router(hits: Arc<AtomicUsize>) -> Router {
        let mut router = Router::new();
        router.get("/x", move |_ctx| {
            let hits = Arc::clone(&hits);
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                Response::new(StatusCode::Ok)
            }
        });
        router
    }

    #[tokio::test]
    async fn empty_stack_reaches_router() {
        let hits = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(ok_router(Arc::clone(&hits)));
        let res = pipeline.handle(make_request("/x")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn short_circuit_skips_router() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(ok_router(Arc::clone(&hits)))
            .with(Count(Arc::clone(&seen)))
            .with(Deny);

        let res = pipeline.handle(make_request("/x")).await;
        assert_eq!(res.status(), StatusCode::Forbidden);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn logger_passes_response_through() {
        let hits = Arc::new(AtomicUsize::new(0));
        let pipeline = Pipeline::new(ok_router(hits)).with(LoggerMiddleware);
        let res = pipeline.handle(make_request("/nope")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }
}
