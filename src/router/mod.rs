//! Request routing — map HTTP methods and URL patterns to handlers.
//!
//! Two pattern styles are supported:
//!
//! | Pattern                 | Example match       | Captured params     |
//! |-------------------------|---------------------|---------------------|
//! | `/health`               | `/health`           | *(none)*            |
//! | `/gamepasses/:userId`   | `/gamepasses/42`    | `userId → "42"`     |
//!
//! Trailing slashes are ignored on both sides. Routes are tried in
//! registration order and the first match wins; anything else gets a JSON 404.

use std::pin::Pin;
use std::sync::Arc;

use crate::context::{Context, PathParams};
use crate::{Method, Request, Response, StatusCode};

/// Type-erased async handler stored by the router.
pub type Handler =
    Arc<dyn Fn(Context) -> Pin<Box<dyn Future<Output = Response> + Send>> + Send + Sync + 'static>;

/// Conversion trait for async handler functions.
///
/// Blanket-implemented for every `Fn(Context) -> impl Future<Output = Response>`
/// that is `Send + Sync + 'static`.
pub trait IntoHandler: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>>;
}

impl<T, F> IntoHandler for T
where
    T: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = Response> + Send + 'static,
{
    fn call(&self, ctx: Context) -> Pin<Box<dyn Future<Output = Response> + Send>> {
        Box::pin((self)(ctx))
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Static(String),
    Parameter(String),
}

// Compiled representation of a route pattern string.
#[derive(Debug, Clone)]
enum Pattern {
    Exact(String),
    Parameterized { segments: Vec<Segment> },
}

fn trim_trailing_slash(path: &str) -> &str {
    if path != "/" {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}

impl Pattern {
    /// Compile a pattern. Any `:name` segment makes it parameterized.
    fn parse(pattern: &str) -> Self {
        let pattern = trim_trailing_slash(pattern);

        if !pattern.contains(':') {
            return Pattern::Exact(pattern.to_string());
        }

        let segments = pattern
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) => Segment::Parameter(name.to_string()),
                None => Segment::Static(s.to_string()),
            })
            .collect();
        Pattern::Parameterized { segments }
    }

    fn matches(&self, path: &str) -> Option<PathParams> {
        let path = trim_trailing_slash(path);

        match self {
            Pattern::Exact(p) => (p == path).then(PathParams::new),
            Pattern::Parameterized { segments } => {
                let path_segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
                if segments.len() != path_segments.len() {
                    return None;
                }

                let mut params = PathParams::new();
                for (seg, path_seg) in segments.iter().zip(path_segments) {
                    match seg {
                        Segment::Static(s) if s != path_seg => return None,
                        Segment::Static(_) => {}
                        Segment::Parameter(name) => {
                            params.insert(name.clone(), path_seg.to_string());
                        }
                    }
                }
                Some(params)
            }
        }
    }
}

struct Route {
    method: Method,
    pattern: Pattern,
    handler: Handler,
}

/// HTTP request router.
///
/// # Examples
///
/// ```rust,no_run
/// use pass_proxy::{Router, Response, StatusCode};
/// use pass_proxy::context::Context;
///
/// let mut router = Router::new();
/// router.get("/gamepasses/:userId", |ctx: Context| async move {
///     let id = ctx.params().get("userId").unwrap_or_default().to_owned();
///     Response::new(StatusCode::Ok).body(id)
/// });
/// ```
#[derive(Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `GET` requests matching `path`.
    pub fn get(&mut self, path: &str, handler: impl IntoHandler) {
        self.add_route(Method::Get, path, handler);
    }

    fn add_route(&mut self, method: Method, path: &str, handler: impl IntoHandler) {
        let handler: Handler = Arc::new(move |ctx| handler.call(ctx));
        self.routes.push(Route {
            method,
            pattern: Pattern::parse(path),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatch `request` to the first matching route, or answer 404.
    pub async fn route(&self, request: Request) -> Response {
        let matched = self.routes.iter().find_map(|route| {
            if &route.method != request.method() {
                return None;
            }
            route
                .pattern
                .matches(request.path())
                .map(|params| (route.handler.clone(), params))
        });

        match matched {
            Some((handler, params)) => handler(Context::with_params(request, params)).await,
            None => Response::error(StatusCode::NotFound, "Not found"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_request(method: &str, path: &str) -> Request {
        let raw = format!("{method} {path} HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let (req, _) = Request::parse(raw.as_bytes()).unwrap();
        req
    }

    #[test]
    fn pattern_parse_exact() {
        assert!(matches!(Pattern::parse("/health"), Pattern::Exact(s) if s == "/health"));
        assert!(matches!(Pattern::parse("/health/"), Pattern::Exact(s) if s == "/health"));
        assert!(matches!(Pattern::parse("/"), Pattern::Exact(s) if s == "/"));
    }

    #[test]
    fn pattern_parse_parameterized() {
        match Pattern::parse("/gamepasses/:userId") {
            Pattern::Parameterized { segments } => {
                assert_eq!(segments.len(), 2);
                assert!(matches!(&segments[0], Segment::Static(s) if s == "gamepasses"));
                assert!(matches!(&segments[1], Segment::Parameter(s) if s == "userId"));
            }
            other => panic!("expected Parameterized, got {other:?}"),
        }
    }

    #[test]
    fn param_extracts_raw_segment() {
        let pat = Pattern::parse("/gamepasses/:userId");
        let params = pat.matches("/gamepasses/abc").unwrap();
        assert_eq!(params.get("userId"), Some("abc"));
        assert!(pat.matches("/gamepasses/1/").is_some());
    }

    #[test]
    fn param_rejects_shape_mismatch() {
        let pat = Pattern::parse("/gamepasses/:userId");
        assert!(pat.matches("/gamepasses").is_none());
        assert!(pat.matches("/gamepasses/1/extra").is_none());
        assert!(pat.matches("/badges/1").is_none());
    }

    #[tokio::test]
    async fn empty_router_returns_json_404() {
        let res = Router::new().route(make_request("GET", "/")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
        assert_eq!(res.headers().get("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn method_must_match() {
        let mut router = Router::new();
        router.get("/health", |_ctx| async { Response::new(StatusCode::Ok) });
        assert_eq!(router.len(), 1);

        let res = router.route(make_request("GET", "/health")).await;
        assert_eq!(res.status(), StatusCode::Ok);
        let res = router.route(make_request("POST", "/health")).await;
        assert_eq!(res.status(), StatusCode::NotFound);
    }

    #[tokio::test]
    async fn first_matching_route_wins() {
        let mut router = Router::new();
        router.get("/path", |_ctx| async { Response::new(StatusCode::Ok) });
        router.get("/path", |_ctx| async { Response::new(StatusCode::NoContent) });

        let res = router.route(make_request("GET", "/path")).await;
        assert_eq!(res.status(), StatusCode::Ok);
    }

    #[tokio::test]
    async fn handler_sees_params() {
        let mut router = Router::new();
        router.get("/gamepasses/:userId", |ctx: Context| async move {
            let id = ctx.params().get("userId").unwrap_or("").to_owned();
            Response::new(StatusCode::Ok).body(id)
        });
        let res = router.route(make_request("GET", "/gamepasses/42")).await;
        assert_eq!(res.body_bytes(), b"42");
    }
}
