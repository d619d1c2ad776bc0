//! Sliding-window admission control for provider calls.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tracing::{debug, info};

/// Extra wait added after the oldest request leaves the window.
const SAFETY_BUFFER: Duration = Duration::from_millis(100);

/// Admits at most `max_requests` calls in any trailing `window`.
///
/// The check-and-record step runs under a single [`tokio::sync::Mutex`],
/// which is held while a caller waits. Waiting callers are therefore
/// admitted in FIFO order and two callers can never both observe a free
/// slot. Each instance has its own history; create one per upstream budget.
#[derive(Debug)]
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter admitting `max_requests` per `window`.
    ///
    /// A `max_requests` of zero is treated as one.
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            requests: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Budget for embedding calls: 30 requests per minute.
    pub fn for_embeddings() -> Self {
        Self::new(30, Duration::from_secs(60))
    }

    /// Budget for generation calls: 10 requests per minute.
    pub fn for_generation() -> Self {
        Self::new(10, Duration::from_secs(60))
    }

    /// Maximum admissions per window.
    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    /// Length of the trailing window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Suspend until a request may be issued, then record it.
    pub async fn wait_for_availability(&self) {
        let mut requests = self.requests.lock().await;

        loop {
            let now = Instant::now();
            while requests.front().is_some_and(|oldest| now.duration_since(*oldest) >= self.window)
            {
                requests.pop_front();
            }

            if requests.len() < self.max_requests {
                requests.push_back(now);
                debug!(in_window = requests.len(), max = self.max_requests, "request admitted");
                return;
            }

            // The window is full, so it has a front entry.
            let Some(oldest) = requests.front().copied() else { continue };
            let wait = (oldest + self.window).saturating_duration_since(now) + SAFETY_BUFFER;
            info!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            time::sleep(wait).await;
        }
    }
}
