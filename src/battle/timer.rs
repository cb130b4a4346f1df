//! Command phase countdown
//!
//! Deadline based: an armed timer holds the instant of its next tick and
//! nothing else. There is no background task to leak, and a disarmed timer
//! never fires.

use std::time::Duration;

use tokio::time::Instant;

use crate::battle::constants::COMMAND_TICK_MS;

#[derive(Debug)]
pub struct CommandTimer {
    period: Duration,
    next_tick: Option<Instant>,
}

impl Default for CommandTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandTimer {
    pub fn new() -> Self {
        Self {
            period: Duration::from_millis(COMMAND_TICK_MS),
            next_tick: None,
        }
    }

    /// Start ticking one period from now. Re-arming restarts the period.
    pub fn arm(&mut self) {
        self.next_tick = Some(Instant::now() + self.period);
    }

    pub fn stop(&mut self) {
        self.next_tick = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Wait for the next tick. Pending forever while disarmed.
    ///
    /// Cancel safe: dropping the future before it completes leaves the
    /// deadline untouched.
    pub async fn tick(&mut self) {
        match self.next_tick {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.next_tick = Some(deadline + self.period);
            }
            None => std::future::pending().await,
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
