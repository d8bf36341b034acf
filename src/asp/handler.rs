#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
//! Cooperative cancellation of a running search.
//!
//! The search polls its [`StopCondition`] before every decision. A stopped search keeps its
//! learned nogoods and a consistent assignment, and can be resumed by stepping it again.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

pub trait StopCondition: Debug {
    /// Called once when a search (or the search for the next answer set) starts.
    fn started(&mut self) {}

    /// Returns `true` if the search should stop before its next decision.
    fn should_stop(&mut self) -> bool;
}

/// Never stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeverStop;

impl StopCondition for NeverStop {
    fn should_stop(&mut self) -> bool {
        false
    }
}

/// A flag another thread can raise, e.g. from a signal handler.
impl StopCondition for Arc<AtomicBool> {
    fn should_stop(&mut self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub enum Timer {
    /// Measured from construction; restarting the search does not reset it.
    SingleTimeout(Duration),
    /// Measured from each call to [`StopCondition::started`].
    RestartingTimeout(Duration),
    FixedEnd(Instant),
}

#[derive(Debug, Clone, Eq, PartialEq, PartialOrd, Ord, Hash)]
pub struct Timeout {
    timer: Timer,
    checkpoint: Instant,
}

impl Timeout {
    #[must_use]
    pub fn new(timer: Timer) -> Self {
        Self {
            timer,
            checkpoint: Instant::now(),
        }
    }

    #[must_use]
    pub fn after(duration: Duration) -> Self {
        Self::new(Timer::SingleTimeout(duration))
    }
}

impl StopCondition for Timeout {
    fn started(&mut self) {
        if matches!(self.timer, Timer::RestartingTimeout(_)) {
            self.checkpoint = Instant::now();
        }
    }

    fn should_stop(&mut self) -> bool {
        match self.timer {
            Timer::SingleTimeout(timeout) | Timer::RestartingTimeout(timeout) => {
                self.checkpoint.elapsed() >= timeout
            }
            Timer::FixedEnd(end) => Instant::now() >= end,
        }
    }
}

/// Stops after a fixed number of polls. Mostly useful in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionLimit(pub usize);

impl StopCondition for DecisionLimit {
    fn should_stop(&mut self) -> bool {
        if self.0 == 0 {
            true
        } else {
            self.0 -= 1;
            false
        }
    }
}

/// `None` never stops.
impl<S: StopCondition> StopCondition for Option<S> {
    fn started(&mut self) {
        if let Some(stop) = self {
            stop.started();
        }
    }

    fn should_stop(&mut self) -> bool {
        self.as_mut().is_some_and(StopCondition::should_stop)
    }
}

impl<S: StopCondition + ?Sized> StopCondition for Box<S> {
    fn started(&mut self) {
        (**self).started();
    }

    fn should_stop(&mut self) -> bool {
        (**self).should_stop()
    }
}
