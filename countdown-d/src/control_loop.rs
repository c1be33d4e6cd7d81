// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! The control loop of the countdown device.

use std::sync::atomic::Ordering;

use anyhow::Context;
use countdown_snapshot::{BatteryFields, CountdownResult, NetworkFields, SnapshotWrite, StatusSnapshot};
use tracing::{debug, info, warn};

use crate::battery_guardian::{self, BatteryGuardian, ResumeDecision};
use crate::clock::MonotonicClock;
use crate::config::DeviceConfig;
use crate::countdown::{countdown, CalendarMoment};
use crate::display::{DisplayValue, SegmentDisplay};
use crate::network::{LinkStatus, NetworkAdapter};
use crate::power::PowerAdapter;
use crate::resync::{ResyncOutcome, ResyncScheduler};
use crate::time_source::TimeSource;
use crate::{FORCE_RESYNC_PENDING, SHUTDOWN_REQUESTED};

/// Outcome of a single tick.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sleep until the next tick.
    Continue,
    /// The battery must be protected now, no further tick may run.
    Protect,
}

/// Where the device is in its power cycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// Powered on or woken up: initialize the display and resync.
    Startup,
    /// Ticking.
    Running,
    /// Woken up from a protective suspend, the battery has to be checked before anything else.
    Suspended,
}

/// The collaborators the control loop drives.
///
/// The power adapter is optional, devices without a fuel gauge run without battery protection.
#[derive(Debug)]
pub struct Collaborators<T, N, P, D, C> {
    pub time_source: T,
    pub network: N,
    pub power: Option<P>,
    pub display: D,
    pub clock: C,
}

/// Central state of the countdown device.
pub struct ControlLoop<T, N, P, D, C, W> {
    time_source: T,
    network: N,
    power: Option<P>,
    display: D,
    clock: C,
    /// Sole writer of the published status.
    writer: W,
    scheduler: ResyncScheduler,
    guardian: BatteryGuardian,
    /// State: uptime of the last diagnostic summary.
    last_diagnostics_millis: u64,
    /// Config: everything else.
    config: DeviceConfig,
}

impl<T, N, P, D, C, W> ControlLoop<T, N, P, D, C, W>
where
    T: TimeSource,
    N: NetworkAdapter,
    P: PowerAdapter,
    D: SegmentDisplay,
    C: MonotonicClock,
    W: SnapshotWrite,
{
    pub fn new(config: DeviceConfig, parts: Collaborators<T, N, P, D, C>, writer: W) -> Self {
        ControlLoop {
            time_source: parts.time_source,
            network: parts.network,
            power: parts.power,
            display: parts.display,
            clock: parts.clock,
            writer,
            scheduler: ResyncScheduler::new(&config),
            guardian: BatteryGuardian::new(config.suspend_duration, config.critical_hold),
            last_diagnostics_millis: 0,
            config,
        }
    }

    pub fn scheduler(&self) -> &ResyncScheduler {
        &self.scheduler
    }

    /// Give the collaborators back, once the loop is done with them.
    pub fn into_parts(self) -> (Collaborators<T, N, P, D, C>, W) {
        let parts = Collaborators {
            time_source: self.time_source,
            network: self.network,
            power: self.power,
            display: self.display,
            clock: self.clock,
        };
        (parts, self.writer)
    }

    /// Startup sequence, run at power on and on every wake up.
    ///
    /// Failing to initialize the display is the only fatal condition of the device. Failing to
    /// join any network is not: the error is shown and the next scheduled resync tries again.
    pub fn startup(&mut self) -> anyhow::Result<()> {
        info!("Christmas Countdown Timer starting");
        self.display
            .begin(self.config.display_address)
            .with_context(|| {
                format!(
                    "initialize display at I2C address {:#04x}",
                    self.config.display_address
                )
            })?;
        info!("Display initialized");

        self.display.set_brightness(self.config.display_brightness);
        self.display.show(DisplayValue::TestPattern, false);
        self.clock.sleep(self.config.test_pattern_hold);

        self.network.set_hostname(&self.config.hostname);
        self.display.show(DisplayValue::Blank, false);

        let now = self.clock.uptime_millis();
        if self.resync(now) == ResyncOutcome::NoNetwork {
            self.display.show(DisplayValue::Error, false);
        }
        Ok(())
    }

    fn resync(&mut self, now_millis: u64) -> ResyncOutcome {
        self.scheduler.resync(
            &mut self.network,
            &mut self.time_source,
            &mut self.display,
            now_millis,
        )
    }

    /// Run one iteration of the control loop, at uptime `now_millis`.
    ///
    /// 1. Resync if the periodic trigger is due, or an operator asked for it.
    /// 2. Read the local time, resyncing on demand if a time was never obtained.
    /// 3. Compute the countdown.
    /// 4. Sample the battery. Stop here if it must be protected.
    /// 5. Publish the status snapshot.
    /// 6. Drive the display.
    /// 7. Log the diagnostic summary when due.
    pub fn tick(&mut self, now_millis: u64) -> TickOutcome {
        let forced = FORCE_RESYNC_PENDING.swap(false, Ordering::SeqCst);
        let mut resynced = false;
        if forced || self.scheduler.is_periodic_due(now_millis) {
            if forced {
                info!("FORCE_RESYNC_PENDING was set, resyncing now");
            }
            self.resync(now_millis);
            resynced = true;
        }

        let mut moment = self.time_source.read_local_time();
        if moment.is_none() && !self.scheduler.state().has_valid_time && !resynced {
            warn!("Failed to obtain time, resyncing now");
            if self.resync(now_millis) == ResyncOutcome::Synchronized {
                moment = self.time_source.read_local_time();
            }
        }

        let result = moment.as_ref().map(countdown);

        let battery = self.sample_battery();
        if battery.is_some_and(|(_, protect)| protect) {
            return TickOutcome::Protect;
        }
        let battery = battery.map(|(fields, _)| fields);

        let network = match self.network.current_status() {
            LinkStatus::Connected { ssid, ip, rssi } => NetworkFields { ssid, ip, rssi },
            LinkStatus::Disconnected => NetworkFields::default(),
        };

        let snapshot = StatusSnapshot {
            countdown: result.unwrap_or_default(),
            clock: moment.map(|m| m.clock_fields()).unwrap_or_default(),
            network,
            battery,
        };
        self.writer.write(&snapshot);

        self.drive_display(moment.as_ref(), result.as_ref(), now_millis);
        self.log_diagnostics(&snapshot, now_millis);
        TickOutcome::Continue
    }

    /// Read and assess the battery. None when there is no fuel gauge or it could not be read.
    fn sample_battery(&mut self) -> Option<(BatteryFields, bool)> {
        let power = self.power.as_mut()?;
        let reading = match power.read_battery() {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = ?e, "Failed to read battery");
                return None;
            }
        };

        let assessment = battery_guardian::assess(&reading);
        debug!(
            voltage = %reading.voltage_volts,
            percent = %reading.percent,
            rate = %reading.charge_rate_per_hour,
            "Battery {}", assessment.classification
        );
        let fields = BatteryFields {
            reading,
            classification: assessment.classification,
        };
        Some((fields, assessment.protect))
    }

    fn drive_display(
        &mut self,
        moment: Option<&CalendarMoment>,
        result: Option<&CountdownResult>,
        now_millis: u64,
    ) {
        match (moment, result) {
            (Some(moment), Some(result)) => {
                debug!(
                    "Today: {} - Days until Christmas {}: {}",
                    moment, result.target_year, result.days_remaining
                );
                if result.is_target_day {
                    // Blink at 1Hz off the monotonic clock, not the wall clock seconds.
                    let colon_on = now_millis % 1000 < 500;
                    self.display.show(DisplayValue::Number(0), colon_on);
                } else {
                    self.display
                        .show(DisplayValue::number(result.days_remaining), false);
                }
            }
            _ => {
                let value = match self.scheduler.last_outcome() {
                    Some(ResyncOutcome::NoNetwork) => DisplayValue::Error,
                    _ => DisplayValue::Placeholder,
                };
                self.display.show(value, false);
            }
        }
    }

    fn log_diagnostics(&mut self, snapshot: &StatusSnapshot, now_millis: u64) {
        let interval = self.config.diagnostics_interval.as_millis() as u64;
        if now_millis.saturating_sub(self.last_diagnostics_millis) < interval {
            return;
        }
        self.last_diagnostics_millis = now_millis;

        let network = &snapshot.network;
        match snapshot.battery {
            Some(battery) => info!(
                ssid = %network.ssid,
                ip = %network.ip,
                rssi = %network.rssi,
                battery_voltage = %battery.reading.voltage_volts,
                battery_percent = %battery.reading.percent,
                charge_rate = %battery.reading.charge_rate_per_hour,
                battery_status = %battery.classification,
                "Status summary"
            ),
            None => info!(
                ssid = %network.ssid,
                ip = %network.ip,
                rssi = %network.rssi,
                "Status summary"
            ),
        }
    }

    /// Take the device down to protect the battery. Returns on wake up.
    fn protect(&mut self) {
        if let Some(power) = self.power.as_mut() {
            self.guardian
                .protect(&mut self.display, power, &mut self.clock);
        }
    }

    /// Advance the lifecycle by one step.
    pub fn step(&mut self, lifecycle: Lifecycle) -> anyhow::Result<Lifecycle> {
        let next = match lifecycle {
            Lifecycle::Startup => {
                self.startup()?;
                Lifecycle::Running
            }
            Lifecycle::Running => {
                let now = self.clock.uptime_millis();
                match self.tick(now) {
                    TickOutcome::Continue => {
                        self.clock.sleep(self.config.tick_interval);
                        Lifecycle::Running
                    }
                    TickOutcome::Protect => {
                        self.protect();
                        Lifecycle::Suspended
                    }
                }
            }
            Lifecycle::Suspended => match self.power.as_mut() {
                Some(power) => match self.guardian.resume_check(power) {
                    ResumeDecision::Proceed => Lifecycle::Startup,
                    ResumeDecision::Resuspend => {
                        self.guardian.resuspend(power);
                        Lifecycle::Suspended
                    }
                },
                None => Lifecycle::Startup,
            },
        };
        Ok(next)
    }

    /// The main loop of the device, until a shutdown is requested or the display fails.
    pub fn run(&mut self) -> anyhow::Result<()> {
        let mut lifecycle = Lifecycle::Startup;
        while !SHUTDOWN_REQUESTED.load(Ordering::SeqCst) {
            lifecycle = self.step(lifecycle)?;
        }
        info!("Shutdown requested, leaving the control loop");
        Ok(())
    }
}
