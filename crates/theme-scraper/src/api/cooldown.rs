//! Cooldown guard for the anime-info service.
//!
//! Calls are spaced so that no call starts before the stored deadline. The
//! deadline only moves forward when a call actually reached the remote
//! service; answers served from the service's own cache leave it untouched.

use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};

/// Minimum spacing between remote calls
#[derive(Debug)]
pub struct Cooldown {
    /// Spacing applied after each remote call
    interval: Duration,
    /// Earliest instant the next call may start
    next_call: Option<Instant>,
}

impl Cooldown {
    /// Create a new cooldown, the first call is never delayed
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_call: None,
        }
    }

    /// Time left before the next call may start
    pub fn remaining(&self) -> Duration {
        self.next_call
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    /// Wait until the deadline has passed
    pub async fn wait(&self) {
        let wait = self.remaining();
        if !wait.is_zero() {
            tracing::debug!(wait_ms = wait.as_millis(), "Cooldown: waiting before lookup");
            sleep(wait).await;
        }
    }

    /// Push the deadline one interval past now
    pub fn advance(&mut self) {
        self.next_call = Some(Instant::now() + self.interval);
    }

    /// Wait for the deadline, run `call`, and advance the deadline when
    /// `reached_remote` says the call hit the remote service
    pub async fn guard<T, Fut, P>(&mut self, call: Fut, reached_remote: P) -> T
    where
        Fut: Future<Output = T>,
        P: FnOnce(&T) -> bool,
    {
        self.wait().await;
        let result = call.await;
        if reached_remote(&result) {
            self.advance();
        }
        result
    }
}
