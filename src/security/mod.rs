//! Request gating — per-client rate limiting in front of the router.
//!
//! - [`RequestGate`] — fixed-window counter per client identity.
//! - [`RateLimitMiddleware`] — keys the gate by peer IP and answers 429.

mod gate;
mod middleware;

pub use gate::{GateDecision, RATE_LIMIT_MAX, RATE_LIMIT_WINDOW, RequestGate};
pub use middleware::RateLimitMiddleware;
