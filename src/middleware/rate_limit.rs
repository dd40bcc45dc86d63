use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::middleware::client_ip::ClientIp;

const WINDOW: Duration = Duration::from_secs(1);
const PRUNE_ABOVE: usize = 4096;

#[derive(Debug)]
struct WindowState {
    start: Instant,
    count: u32,
}

/// Fixed one-second windows. Per-client limiters keep one window per caller
/// address; shared limiters use a single window for everyone.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    rps: u32,
    per_client: bool,
    windows: Arc<Mutex<HashMap<Option<IpAddr>, WindowState>>>,
}

impl RateLimiter {
    fn new(rps: u32, per_client: bool) -> Self {
        Self {
            rps: rps.max(1),
            per_client,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Option<IpAddr>, WindowState>> {
        self.windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn allow_at(&self, client: Option<IpAddr>, now: Instant) -> bool {
        let key = if self.per_client { client } else { None };
        let mut guard = self.lock();
        if guard.len() > PRUNE_ABOVE {
            guard.retain(|_, w| now.duration_since(w.start) < WINDOW);
        }
        let window = guard.entry(key).or_insert(WindowState {
            start: now,
            count: 0,
        });
        if now.duration_since(window.start) >= WINDOW {
            window.start = now;
            window.count = 0;
        }
        if window.count < self.rps {
            window.count += 1;
            true
        } else {
            false
        }
    }

    pub fn allow(&self, client: Option<IpAddr>) -> bool {
        self.allow_at(client, Instant::now())
    }
}

pub async fn rps_middleware(
    State(state): State<RateLimiter>,
    ClientIp(client): ClientIp,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !state.allow(client) {
        tracing::debug!(client = ?client, "rate limit exceeded");
        return (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded").into_response();
    }
    next.run(req).await
}

pub fn new_rps_state(rps: u32) -> RateLimiter {
    RateLimiter::new(rps, false)
}

pub fn new_per_client_rps_state(rps: u32) -> RateLimiter {
    RateLimiter::new(rps, true)
}
