// src/session/timer.rs

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};

/// Result of a single countdown step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The countdown was not running; nothing changed.
    Idle,
    /// One second elapsed, this many remain.
    Ticked(u32),
    /// The last second elapsed. Reported exactly once per countdown.
    Expired,
}

/// Remaining-time bookkeeping for a test. Purely logical: it only moves when `tick` is called.
#[derive(Debug, Clone)]
pub struct Countdown {
    budget: u32,
    remaining: u32,
    running: bool,
}

impl Countdown {
    pub fn new(budget_secs: u32) -> Self {
        Self {
            budget: budget_secs,
            remaining: budget_secs,
            running: false,
        }
    }

    /// Restores the full budget, stopped.
    pub fn reset(&mut self) {
        self.remaining = self.budget;
        self.running = false;
    }

    /// Resumes ticking. Has no effect once the budget is exhausted.
    pub fn resume(&mut self) {
        self.running = self.remaining > 0;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if !self.running || self.remaining == 0 {
            return TickOutcome::Idle;
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.running = false;
            TickOutcome::Expired
        } else {
            TickOutcome::Ticked(self.remaining)
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

/// Background task calling `on_tick` once per `period` until it breaks or the ticker is dropped.
///
/// Dropping or stopping the ticker aborts the task, so no callback runs after teardown.
#[derive(Debug)]
pub struct Ticker {
    handle: JoinHandle<()>,
    first_tick: Instant,
    period: Duration,
}

impl Ticker {
    /// First call one full period from now.
    pub fn spawn<F, Fut>(period: Duration, on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        Self::resume(period, Duration::ZERO, on_tick)
    }

    /// Like [`Ticker::spawn`], but `elapsed` of the first period has already passed.
    /// Pair with [`Ticker::stop`] to pause without losing the partial period.
    pub fn resume<F, Fut>(period: Duration, elapsed: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let first_tick = Instant::now() + period.saturating_sub(elapsed);
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(first_tick, period);
            loop {
                interval.tick().await;
                if on_tick().await.is_break() {
                    break;
                }
            }
        });

        Self {
            handle,
            first_tick,
            period,
        }
    }

    /// Aborts the task and returns how far into the current period it was.
    pub fn stop(self) -> Duration {
        self.phase()
    }

    fn phase(&self) -> Duration {
        let now = Instant::now();
        if self.period.is_zero() {
            return Duration::ZERO;
        }
        if now < self.first_tick {
            return self.period.saturating_sub(self.first_tick - now);
        }
        let since = (now - self.first_tick).as_nanos() % self.period.as_nanos();
        Duration::from_nanos(since as u64)
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
