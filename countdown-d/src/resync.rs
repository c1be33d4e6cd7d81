// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Resync scheduling: joining a network and obtaining a fresh time reading.
//!
//! A resync is triggered either periodically, even while a valid time is held, or on demand when
//! the time source has nothing to offer. Failures are never fatal: the previous time is kept and
//! the next trigger tries again.

use std::time::{Duration, Instant};

use retry::delay::Fixed;
use retry::retry_with_index;
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::display::{DisplayValue, SegmentDisplay};
use crate::network::{LinkStatus, NetworkAdapter, NetworkCandidate};
use crate::time_source::{SyncParams, TimeSource};

/// Whether a valid time has been obtained, and when it was last refreshed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct TimeSyncState {
    /// Set after the first successful resync, and never cleared afterwards.
    pub has_valid_time: bool,
    /// Uptime of the last successful resync, in milliseconds.
    pub last_sync_millis: u64,
}

/// Result of a resync attempt.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResyncOutcome {
    /// A fresh time was read after the sync request.
    Synchronized,
    /// The network is up but the time source did not produce a time in time.
    TimeSyncTimedOut,
    /// None of the candidate networks could be joined.
    NoNetwork,
}

/// A polling wait with a fixed number of attempts and a fixed delay between them.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BoundedWait {
    pub max_attempts: usize,
    pub interval: Duration,
}

impl BoundedWait {
    pub const fn new(max_attempts: usize, interval: Duration) -> BoundedWait {
        BoundedWait {
            max_attempts,
            interval,
        }
    }

    /// Poll `ready` until it returns true or the attempts are exhausted.
    ///
    /// `ready` is always called at least once, and the delay only separates attempts, there is
    /// no wait after the last one. Returns whether `ready` eventually returned true.
    pub fn poll(&self, what: &str, mut ready: impl FnMut() -> bool) -> bool {
        let max_attempts = self.max_attempts.max(1);
        let started = Instant::now();
        retry_with_index(
            Fixed::from(self.interval).take(max_attempts - 1),
            |attempt| {
                if ready() {
                    Ok(attempt)
                } else {
                    debug!(
                        attempt = %attempt,
                        "Waiting for {} (attempt {} of {})", what, attempt, max_attempts
                    );
                    Err(())
                }
            },
        )
        .inspect(|attempt| {
            debug!(
                attempt = %attempt,
                "{} ready after {:?}", what, started.elapsed()
            )
        })
        .is_ok()
    }
}

/// Decides when to resync, and runs the resync itself.
#[derive(Debug)]
pub struct ResyncScheduler {
    /// Config: networks to try, in order.
    candidates: Vec<NetworkCandidate>,
    /// Config: parameters passed along with every sync request.
    sync_params: SyncParams,
    /// Config: period of the proactive resync.
    interval: Duration,
    /// Config: wait for a network association to complete.
    connect_wait: BoundedWait,
    /// Config: wait for the time source to produce a time after a sync request.
    sync_wait: BoundedWait,
    /// State: outcome of successful resyncs.
    state: TimeSyncState,
    /// State: uptime of the last attempt, successful or not.
    last_attempt_millis: Option<u64>,
    /// State: outcome of the last attempt.
    last_outcome: Option<ResyncOutcome>,
}

impl ResyncScheduler {
    pub fn new(config: &DeviceConfig) -> ResyncScheduler {
        ResyncScheduler {
            candidates: config.networks.clone(),
            sync_params: SyncParams {
                gmt_offset_secs: config.gmt_offset_secs,
                dst_offset_secs: config.dst_offset_secs,
                server: config.ntp_server.clone(),
            },
            interval: config.resync_interval,
            connect_wait: config.connect_wait,
            sync_wait: config.sync_wait,
            state: TimeSyncState::default(),
            last_attempt_millis: None,
            last_outcome: None,
        }
    }

    pub fn state(&self) -> TimeSyncState {
        self.state
    }

    pub fn last_outcome(&self) -> Option<ResyncOutcome> {
        self.last_outcome
    }

    /// Whether the periodic trigger fires at `now_millis`.
    ///
    /// The period runs from the last attempt, so an unreachable network is retried once per
    /// period rather than on every tick.
    pub fn is_periodic_due(&self, now_millis: u64) -> bool {
        match self.last_attempt_millis {
            None => true,
            Some(last) => {
                now_millis.saturating_sub(last) >= self.interval.as_millis() as u64
            }
        }
    }

    /// Run a resync now.
    ///
    /// An already established link is reused. Otherwise the candidates are tried in order until
    /// one of them associates, and each one that fails is disconnected before moving on. While a
    /// candidate is associating, every unsuccessful poll steps a digit on `display`.
    pub fn resync(
        &mut self,
        network: &mut impl NetworkAdapter,
        time_source: &mut impl TimeSource,
        display: &mut impl SegmentDisplay,
        now_millis: u64,
    ) -> ResyncOutcome {
        self.last_attempt_millis = Some(now_millis);

        let outcome = if network.current_status().is_connected() || self.connect(network, display) {
            self.synchronize(time_source, now_millis)
        } else {
            warn!("Could not connect to any network");
            ResyncOutcome::NoNetwork
        };

        self.last_outcome = Some(outcome);
        outcome
    }

    /// Join the first candidate that associates. Returns false once all of them failed.
    fn connect(
        &self,
        network: &mut impl NetworkAdapter,
        display: &mut impl SegmentDisplay,
    ) -> bool {
        let total = self.candidates.len();
        for (index, candidate) in self.candidates.iter().enumerate() {
            info!(ssid = %candidate.ssid, "Trying network {} of {}", index + 1, total);
            network.begin(candidate);

            let mut step: u8 = 0;
            let connected = self.connect_wait.poll("network association", || {
                let up = network.current_status().is_connected();
                if !up {
                    display.show(DisplayValue::Progress(step), false);
                    step = (step + 1) % 10;
                }
                up
            });
            if connected {
                if let LinkStatus::Connected { ssid, ip, .. } = network.current_status() {
                    info!(ssid = %ssid, ip = %ip, "Network connected");
                }
                return true;
            }

            warn!(ssid = %candidate.ssid, "Failed to connect");
            network.disconnect();
        }
        false
    }

    fn synchronize(&mut self, time_source: &mut impl TimeSource, now_millis: u64) -> ResyncOutcome {
        time_source.request_sync(&self.sync_params);

        let mut fresh = None;
        self.sync_wait.poll("time synchronization", || {
            fresh = time_source.read_local_time();
            fresh.is_some()
        });

        match fresh {
            Some(moment) => {
                info!("Time synchronized: {}", moment);
                self.state.has_valid_time = true;
                self.state.last_sync_millis = now_millis;
                ResyncOutcome::Synchronized
            }
            None => {
                warn!("Failed to obtain time");
                ResyncOutcome::TimeSyncTimedOut
            }
        }
    }
}
