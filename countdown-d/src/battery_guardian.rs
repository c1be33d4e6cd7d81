// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Battery Guardian.
//!
//! Classifies every battery reading, and takes the device into a protective suspend when the
//! battery is about to be damaged by a deep discharge. The decision logic is made of pure
//! functions over a `BatteryReading`; only `protect` and `resume_check` reach out to the
//! collaborators.

use std::time::Duration;

use countdown_snapshot::{BatteryClassification, BatteryReading};
use tracing::{info, warn};

use crate::clock::MonotonicClock;
use crate::display::{DisplayValue, SegmentDisplay};
use crate::power::PowerAdapter;

/// Charge rates within this band, in percent per hour, count as neither charging nor discharging.
const RATE_DEAD_BAND: f32 = 0.1;

/// Charging at or above this percentage counts as charged.
const CHARGED_WHILE_CHARGING_PERCENT: u8 = 99;

/// With no current flowing, a battery at or above both thresholds counts as charged.
const CHARGED_IDLE_PERCENT: u8 = 95;
const CHARGED_IDLE_VOLTAGE: f32 = 4.1;

/// Protective thresholds: at or below either one, a battery not being charged must be protected.
pub const CRITICAL_VOLTAGE: f32 = 3.0;
pub const CRITICAL_PERCENT: u8 = 5;

/// Classify a reading. Rules are evaluated in order, first match wins.
pub fn classify(reading: &BatteryReading) -> BatteryClassification {
    let rate = reading.charge_rate_per_hour;
    if rate > RATE_DEAD_BAND {
        if reading.percent >= CHARGED_WHILE_CHARGING_PERCENT {
            BatteryClassification::Charged
        } else {
            BatteryClassification::Charging
        }
    } else if rate < -RATE_DEAD_BAND {
        BatteryClassification::Discharging
    } else if rate.is_nan() {
        BatteryClassification::Unknown
    } else if reading.percent >= CHARGED_IDLE_PERCENT
        && reading.voltage_volts >= CHARGED_IDLE_VOLTAGE
    {
        BatteryClassification::Charged
    } else {
        BatteryClassification::OnBattery
    }
}

/// At or below either protective threshold.
pub fn is_critical(reading: &BatteryReading) -> bool {
    reading.voltage_volts <= CRITICAL_VOLTAGE || reading.percent <= CRITICAL_PERCENT
}

/// At or below both protective thresholds.
fn is_still_critical(reading: &BatteryReading) -> bool {
    reading.voltage_volts <= CRITICAL_VOLTAGE && reading.percent <= CRITICAL_PERCENT
}

/// Classification of a reading and whether it calls for a protective suspend.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub classification: BatteryClassification,
    pub protect: bool,
}

/// Assess a reading. Protection is only considered while the battery is not being charged.
pub fn assess(reading: &BatteryReading) -> Assessment {
    let classification = classify(reading);
    let protect = matches!(
        classification,
        BatteryClassification::Discharging | BatteryClassification::OnBattery
    ) && is_critical(reading);
    Assessment {
        classification,
        protect,
    }
}

/// What to do when waking up from a protective suspend.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResumeDecision {
    /// Go through the startup sequence and back to normal operation.
    Proceed,
    /// Suspend again straight away, without running a tick.
    Resuspend,
}

/// Decide whether to carry on after waking up.
///
/// Only a battery still at or below both thresholds keeps the device down. Anything better goes
/// back through startup, where the regular tick checks again.
pub fn resume_decision(reading: &BatteryReading) -> ResumeDecision {
    if is_still_critical(reading) {
        ResumeDecision::Resuspend
    } else {
        ResumeDecision::Proceed
    }
}

/// Carries out the protective transitions.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct BatteryGuardian {
    /// How long a protective suspend lasts.
    suspend_duration: Duration,
    /// How long the critical pattern is shown before suspending.
    critical_hold: Duration,
}

impl BatteryGuardian {
    pub fn new(suspend_duration: Duration, critical_hold: Duration) -> BatteryGuardian {
        BatteryGuardian {
            suspend_duration,
            critical_hold,
        }
    }

    /// Show the critical pattern, leave it up long enough to be seen, then suspend.
    ///
    /// Returns once the device wakes up, at which point the caller owes a `resume_check`.
    pub fn protect(
        &self,
        display: &mut impl SegmentDisplay,
        power: &mut impl PowerAdapter,
        clock: &mut impl MonotonicClock,
    ) {
        warn!(
            "Battery critically low, suspending for {:?}",
            self.suspend_duration
        );
        display.show(DisplayValue::Critical, false);
        clock.sleep(self.critical_hold);
        power.suspend_for(self.suspend_duration);
    }

    /// Guard evaluated on wake up, before anything else runs.
    ///
    /// A battery that cannot be read is given the benefit of the doubt: the next tick either
    /// reads it fine or runs without protection, as it would on a device without a fuel gauge.
    pub fn resume_check(&self, power: &mut impl PowerAdapter) -> ResumeDecision {
        match power.read_battery() {
            Ok(reading) => {
                let decision = resume_decision(&reading);
                info!(
                    voltage = %reading.voltage_volts,
                    percent = %reading.percent,
                    "Woke up from protective suspend: {:?}", decision
                );
                decision
            }
            Err(e) => {
                warn!(error = ?e, "Failed to read battery on wake up");
                ResumeDecision::Proceed
            }
        }
    }

    /// Suspend again, without showing anything new.
    pub fn resuspend(&self, power: &mut impl PowerAdapter) {
        info!("Battery still critical, suspending again");
        power.suspend_for(self.suspend_duration);
    }
}
