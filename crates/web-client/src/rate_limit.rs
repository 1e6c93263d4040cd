//! Sliding-window rate limiter.
//!
//! Keeps a log of request instants per logical endpoint. When the window
//! is full, callers sleep for `window - (now - oldest)` instead of being
//! rejected, so the ceiling is never exceeded and no request is dropped.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

struct WindowState {
    timestamps: VecDeque<Instant>,
    /// Set on a 429 with a server-indicated Retry-After; all callers hold
    /// off until this instant.
    blocked_until: Option<Instant>,
}

/// One endpoint's request window. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SlidingWindow {
    state: Arc<Mutex<WindowState>>,
    max_requests: usize,
    window: Duration,
}

impl SlidingWindow {
    /// Panics if `max_requests` is 0: a zero-slot window can never grant
    /// a request and `acquire` would hang forever.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        assert!(max_requests > 0, "max_requests must be positive");
        Self {
            state: Arc::new(Mutex::new(WindowState {
                timestamps: VecDeque::with_capacity(max_requests),
                blocked_until: None,
            })),
            max_requests,
            window,
        }
    }

    /// Block until a request slot is available, then claim it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();

                match state.blocked_until {
                    Some(until) if now < until => Some(until - now),
                    _ => {
                        state.blocked_until = None;

                        while let Some(front) = state.timestamps.front() {
                            if now.duration_since(*front) >= self.window {
                                state.timestamps.pop_front();
                            } else {
                                break;
                            }
                        }

                        if state.timestamps.len() < self.max_requests {
                            state.timestamps.push_back(now);
                            None
                        } else {
                            let oldest = *state.timestamps.front().expect("window is full");
                            Some(self.window - now.duration_since(oldest))
                        }
                    }
                }
            };

            match wait {
                None => return,
                Some(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "rate window full, waiting");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Reset the window after a 429: drop the request log and hold all
    /// callers for `retry_after`.
    pub async fn reset_for(&self, retry_after: Duration) {
        let mut state = self.state.lock().await;
        state.timestamps.clear();
        state.blocked_until = Some(Instant::now() + retry_after);
    }

    /// Number of requests currently inside the window.
    pub async fn in_flight_window(&self) -> usize {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        while let Some(front) = state.timestamps.front() {
            if now.duration_since(*front) >= self.window {
                state.timestamps.pop_front();
            } else {
                break;
            }
        }
        state.timestamps.len()
    }
}

/// Dual limiter — separate windows for search and fetch endpoints.
#[derive(Clone)]
pub struct RateLimiter {
    search: SlidingWindow,
    fetch: SlidingWindow,
}

impl RateLimiter {
    pub fn new(max_per_window: usize, window: Duration) -> Self {
        Self {
            search: SlidingWindow::new(max_per_window, window),
            fetch: SlidingWindow::new(max_per_window, window),
        }
    }

    pub fn search_window(&self) -> &SlidingWindow {
        &self.search
    }

    pub fn fetch_window(&self) -> &SlidingWindow {
        &self.fetch
    }
}
