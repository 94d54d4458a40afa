//! # pass-proxy
//!
//! A caching, rate-limited proxy that flattens every game pass a Roblox user
//! owns into one JSON array.
//!
//! For `GET /gamepasses/:userId` the proxy lists the user's public universes,
//! walks each universe's paginated game-pass listing, concatenates the
//! results in order, and fills in icon URLs through batched thumbnail
//! lookups. Results are cached per user for five minutes and each client IP
//! gets 100 requests per 15-minute window.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pass_proxy::{api, aggregate::Aggregator, config::Config, server::Server};
//! use pass_proxy::{security::RequestGate, service::PassService, upstream::RobloxClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env();
//!     let upstream = Arc::new(RobloxClient::new(&config)?);
//!     let service = Arc::new(PassService::new(Aggregator::new(upstream)));
//!     let app = api::app(service, Arc::new(RequestGate::default()));
//!
//!     let server = Server::bind(config.bind_addr()).await?;
//!     server.run(move |req| {
//!         let app = app.clone();
//!         async move { app.handle(req).await }
//!     }).await?;
//!     Ok(())
//! }
//! ```

// ── Front door ────────────────────────────────────────────────────────────────
pub mod context;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Aggregation core ──────────────────────────────────────────────────────────
pub mod aggregate;
pub mod cache;
pub mod paginate;
pub mod security;
pub mod service;
pub mod upstream;

// ── Wiring ────────────────────────────────────────────────────────────────────
pub mod api;
pub mod config;
pub mod error;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use error::{ProxyError, ProxyResult};
pub use http::{Headers, Method, Request, Response, StatusCode};
pub use router::Router;
pub use server::{Server, ServerError};
