use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Length of one counting window.
pub const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);

/// Requests a client may make per window.
pub const RATE_LIMIT_MAX: u32 = 100;

const SWEEP_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Default)]
struct Windows {
    by_client: HashMap<String, Window>,
    last_sweep: Option<Instant>,
}

/// Outcome of one [`RequestGate::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    pub limit: u32,
    /// Requests left in the current window after this one.
    pub remaining: u32,
    /// Time until the current window closes.
    pub reset_after: Duration,
}

/// Tumbling-window request counter keyed by client identity.
///
/// A client's window opens on its first request and lasts
/// [`RATE_LIMIT_WINDOW`]; the next request after that opens a fresh one. Every
/// call counts, denied ones included, so a client hammering the gate stays
/// denied until the window rolls over.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use pass_proxy::security::RequestGate;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let gate = RequestGate::new(2, Duration::from_secs(60));
/// assert!(gate.allow("10.0.0.1"));
/// assert!(gate.allow("10.0.0.1"));
/// assert!(!gate.allow("10.0.0.1"));
/// assert!(gate.allow("10.0.0.2"));
/// # });
/// ```
pub struct RequestGate {
    max: u32,
    window: Duration,
    clients: Mutex<Windows>,
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(RATE_LIMIT_MAX, RATE_LIMIT_WINDOW)
    }
}

impl RequestGate {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: Mutex::new(Windows::default()),
        }
    }

    /// Counts one request from `client` and reports whether it may proceed.
    pub fn allow(&self, client: &str) -> bool {
        self.check(client).allowed
    }

    /// Like [`allow`](Self::allow) but with the numbers needed for rate-limit headers.
    pub fn check(&self, client: &str) -> GateDecision {
        let now = Instant::now();
        let mut state = self.clients.lock();

        // Past the threshold, drop closed windows at most once per window length.
        let sweep_due = state
            .last_sweep
            .is_none_or(|at| now.duration_since(at) >= self.window);
        if state.by_client.len() > SWEEP_THRESHOLD && sweep_due {
            let window = self.window;
            state
                .by_client
                .retain(|_, w| now.duration_since(w.started) < window);
            state.last_sweep = Some(now);
        }

        let entry = state.by_client.entry(client.to_owned()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        entry.count = entry.count.saturating_add(1);

        GateDecision {
            allowed: entry.count <= self.max,
            limit: self.max,
            remaining: self.max.saturating_sub(entry.count),
            reset_after: self.window.saturating_sub(now.duration_since(entry.started)),
        }
    }

    /// Number of clients with a tracked window.
    pub fn tracked_clients(&self) -> usize {
        self.clients.lock().by_client.len()
    }
}
