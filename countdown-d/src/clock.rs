// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Monotonic time, used for every cadence decision of the control loop.

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::SHUTDOWN_REQUESTED;

/// Longest a single sleep slice lasts, bounding how late a shutdown request is noticed.
const SLEEP_SLICE: Duration = Duration::from_secs(1);

#[cfg_attr(any(test, feature = "test"), mockall::automock)]
pub trait MonotonicClock: Send {
    /// Milliseconds elapsed since the device started. Never goes backwards.
    fn uptime_millis(&self) -> u64;

    fn sleep(&mut self, duration: Duration);
}

/// Monotonic clock of the host process.
#[derive(Debug)]
pub struct SystemClock {
    started: Instant,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock {
            started: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        SystemClock::new()
    }
}

impl MonotonicClock for SystemClock {
    fn uptime_millis(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Sleep for `duration`, returning early if a shutdown is requested.
    fn sleep(&mut self, duration: Duration) {
        sleep_unless_shutdown(duration);
    }
}

/// Block the calling thread for `duration`, in slices, until done or a shutdown is requested.
pub(crate) fn sleep_unless_shutdown(duration: Duration) {
    let deadline = Instant::now() + duration;
    loop {
        if SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            return;
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return;
        }
        std::thread::sleep(remaining.min(SLEEP_SLICE));
    }
}
