//! [`TimerHost`] – a single-threaded, cooperative timer scheduler.
//!
//! Callbacks are registered under a string key with a first delay.  Each
//! call returns the delay until its next run, or `None` to unregister
//! itself.  Callbacks run one at a time on the caller's thread and never
//! re-entrantly.
//!
//! # Example
//!
//! ```rust
//! use std::time::{Duration, Instant};
//! use asrs_runtime::scheduler::TimerHost;
//!
//! let mut host = TimerHost::new();
//! host.register("once", Duration::ZERO, || None).unwrap();
//!
//! assert_eq!(host.run_due(Instant::now()), 1);
//! assert!(!host.is_registered("once"));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace};

/// Longest the host sleeps before re-checking the stop flag.
const MAX_IDLE: Duration = Duration::from_millis(50);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("timer '{0}' is not registered")]
    NotRegistered(String),

    #[error("timer '{0}' is already registered")]
    AlreadyRegistered(String),
}

type Callback = Box<dyn FnMut() -> Option<Duration>>;

struct Timer {
    key: String,
    due: Instant,
    callback: Callback,
}

#[derive(Default)]
pub struct TimerHost {
    timers: Vec<Timer>,
}

impl TimerHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` to run `first_interval` from now.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::AlreadyRegistered`] when `key` is taken.
    pub fn register(
        &mut self,
        key: impl Into<String>,
        first_interval: Duration,
        callback: impl FnMut() -> Option<Duration> + 'static,
    ) -> Result<(), SchedulerError> {
        let key = key.into();
        if self.is_registered(&key) {
            return Err(SchedulerError::AlreadyRegistered(key));
        }
        debug!(%key, ?first_interval, "timer registered");
        self.timers.push(Timer {
            key,
            due: Instant::now() + first_interval,
            callback: Box::new(callback),
        });
        Ok(())
    }

    /// # Errors
    ///
    /// [`SchedulerError::NotRegistered`] when nothing runs under `key`.
    pub fn unregister(&mut self, key: &str) -> Result<(), SchedulerError> {
        let idx = self
            .timers
            .iter()
            .position(|t| t.key == key)
            .ok_or_else(|| SchedulerError::NotRegistered(key.to_string()))?;
        self.timers.remove(idx);
        debug!(key, "timer unregistered");
        Ok(())
    }

    pub fn is_registered(&self, key: &str) -> bool {
        self.timers.iter().any(|t| t.key == key)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Earliest due time among registered timers.
    pub fn next_due(&self) -> Option<Instant> {
        self.timers.iter().map(|t| t.due).min()
    }

    /// Run every timer due at `now`, in registration order.  Returns how
    /// many callbacks ran.
    pub fn run_due(&mut self, now: Instant) -> usize {
        let mut ran = 0;
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].due > now {
                i += 1;
                continue;
            }
            ran += 1;
            let timer = &mut self.timers[i];
            trace!(key = %timer.key, "timer fired");
            match (timer.callback)() {
                Some(interval) => {
                    timer.due = now + interval;
                    i += 1;
                }
                None => {
                    let timer = self.timers.remove(i);
                    debug!(key = %timer.key, "timer finished");
                }
            }
        }
        ran
    }

    /// Drive the timers until `stop` is raised or none are left.
    pub fn run_until(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::SeqCst) {
            let Some(next) = self.next_due() else {
                debug!("no timers left");
                return;
            };
            let now = Instant::now();
            if next > now {
                std::thread::sleep((next - now).min(MAX_IDLE));
                continue;
            }
            self.run_due(now);
        }
    }
}
