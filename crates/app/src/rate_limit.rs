use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use metrics::counter;
use tracing::warn;

use rentdesk_util::RateLimitConfig;

use crate::envelope::ApiError;
use crate::router::AppState;

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32 },
    Limited { retry_after: Duration },
}

#[derive(Debug)]
struct Window {
    started: Instant,
    hits: u32,
}

/// Fixed-window request counter keyed by client address.
#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, Window>>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests: config.max_requests,
            window: config.window,
        }
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn check(&self, key: &str, now: Instant) -> Decision {
        let mut windows = self
            .windows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if windows.len() >= PRUNE_THRESHOLD {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            hits: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            entry.started = now;
            entry.hits = 0;
        }

        if entry.hits >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            return Decision::Limited {
                retry_after: self.window.saturating_sub(elapsed),
            };
        }
        entry.hits += 1;
        Decision::Allowed {
            remaining: self.max_requests - entry.hits,
        }
    }
}

/// Applies the per-client limit to `/api` routes.
pub async fn limit_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let limiter = state.rate_limiter();
    match limiter.check(&client, Instant::now()) {
        Decision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.max_requests()));
            headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
            response
        }
        Decision::Limited { retry_after } => {
            counter!("rate_limited_total").increment(1);
            warn!(stage = "ratelimit", %client, "request rate limited");
            let mut response = ApiError::new(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests, please try again later.",
            )
            .into_response();
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from(retry_after.as_secs().max(1)),
            );
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> RateLimiter {
        RateLimiter::new(&RateLimitConfig {
            max_requests,
            window: Duration::from_secs(window_secs),
        })
    }

    #[test]
    fn limits_after_max_requests_within_window() {
        let limiter = limiter(2, 60);
        let start = Instant::now();
        assert_eq!(
            limiter.check("1.2.3.4", start),
            Decision::Allowed { remaining: 1 }
        );
        assert_eq!(
            limiter.check("1.2.3.4", start),
            Decision::Allowed { remaining: 0 }
        );
        assert_eq!(
            limiter.check("1.2.3.4", start + Duration::from_secs(10)),
            Decision::Limited {
                retry_after: Duration::from_secs(50)
            }
        );
        assert_eq!(
            limiter.check("5.6.7.8", start),
            Decision::Allowed { remaining: 1 }
        );
    }

    #[test]
    fn window_resets_after_expiry() {
        let limiter = limiter(1, 60);
        let start = Instant::now();
        assert!(matches!(limiter.check("a", start), Decision::Allowed { .. }));
        assert!(matches!(limiter.check("a", start), Decision::Limited { .. }));
        assert!(matches!(
            limiter.check("a", start + Duration::from_secs(60)),
            Decision::Allowed { remaining: 0 }
        ));
    }
}
