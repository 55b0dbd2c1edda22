use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const RATE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct WindowState {
    count: u32,
    resets_at: Instant,
}

/// Fixed-window call budget, tracked independently per key.
///
/// A rejected call is not queued; the caller skips the work for this tick.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_window: u32,
    window: Duration,
    windows: Mutex<HashMap<String, WindowState>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        Self::with_window(requests_per_minute, RATE_WINDOW)
    }

    pub fn with_window(requests_per_window: u32, window: Duration) -> Self {
        Self {
            requests_per_window: requests_per_window.max(1),
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn requests_per_window(&self) -> u32 {
        self.requests_per_window
    }

    pub fn check_and_consume(&self, key: &str) -> bool {
        self.check_and_consume_at(key, Instant::now())
    }

    pub fn check_and_consume_at(&self, key: &str, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let fresh = WindowState {
            count: 0,
            resets_at: now + self.window,
        };
        let state = windows.entry(key.to_string()).or_insert(fresh);
        if now >= state.resets_at {
            *state = fresh;
        }

        if state.count < self.requests_per_window {
            state.count += 1;
            true
        } else {
            false
        }
    }
}
