//! Per-request context handed to middleware and route handlers.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::Request;

/// Path parameters captured by the matched route, e.g. `userId` for
/// `/gamepasses/:userId`.
#[derive(Default, Debug, Clone)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, value: String) {
        self.map.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A request travelling through the middleware pipeline.
///
/// Params are empty until the router matches a route.
pub struct Context {
    request: Request,
    params: PathParams,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self::with_params(request, PathParams::new())
    }

    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// The client identity used for rate limiting: the peer IP, or `"unknown"`
    /// for requests that did not come through a socket.
    pub fn client_key(&self) -> String {
        self.request
            .peer_addr()
            .map(|addr| addr.ip())
            .map_or_else(|| "unknown".to_owned(), |ip: IpAddr| ip.to_string())
    }

    pub fn into_request(self) -> Request {
        self.request
    }
}
