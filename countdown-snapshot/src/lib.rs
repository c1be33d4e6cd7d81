// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Countdown Status Snapshot
//!
//! This crate holds the data model published by the countdown control loop, and the cell used to
//! publish it. There is exactly one writer (the control loop) and any number of readers (the HTTP
//! status responder, tests, ...). A reader always observes a complete snapshot: the writer
//! replaces the whole structure at once and never updates individual fields in place.

pub use crate::reader::SnapshotReader;
pub use crate::report::StatusReport;
pub use crate::writer::{SnapshotWrite, SnapshotWriter};

mod reader;
mod report;
mod writer;

use std::fmt;
use std::sync::{Arc, RwLock};

/// Outcome of the countdown calculation for a given calendar moment.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct CountdownResult {
    /// The year of the Christmas being counted down to.
    pub target_year: i32,

    /// Whole days left until the target date. Never negative.
    pub days_remaining: i32,

    /// True on December 25th itself, whatever the time of day.
    pub is_target_day: bool,
}

/// One sample of the fuel gauge.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct BatteryReading {
    /// Cell voltage, in volts.
    pub voltage_volts: f32,

    /// State of charge, 0 to 100.
    pub percent: u8,

    /// Charge rate in percent per hour. Positive while charging, negative while discharging.
    pub charge_rate_per_hour: f32,
}

/// Charge state derived from a single BatteryReading.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum BatteryClassification {
    Charging,
    Charged,
    Discharging,
    OnBattery,
    #[default]
    Unknown,
}

impl fmt::Display for BatteryClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            BatteryClassification::Charging => "Charging",
            BatteryClassification::Charged => "Charged",
            BatteryClassification::Discharging => "Discharging",
            BatteryClassification::OnBattery => "On Battery",
            BatteryClassification::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// Local date and time fields, as displayed on the status page.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct ClockFields {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Network link details at the time the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NetworkFields {
    pub ssid: String,
    pub ip: String,
    /// Signal strength in dBm.
    pub rssi: i32,
}

/// Battery state, only present when a fuel gauge is fitted.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct BatteryFields {
    pub reading: BatteryReading,
    pub classification: BatteryClassification,
}

/// The single consistent view of the device state.
///
/// The default value is the placeholder published at startup, before the first tick completes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusSnapshot {
    pub countdown: CountdownResult,
    pub clock: ClockFields,
    pub network: NetworkFields,
    pub battery: Option<BatteryFields>,
}

impl StatusSnapshot {
    /// Project the snapshot onto the JSON document served at `/api/status`.
    pub fn report(&self) -> StatusReport {
        StatusReport::from(self)
    }
}

/// What the writer publishes: the snapshot and the generation it was published at.
#[derive(Debug)]
struct Published {
    generation: u64,
    snapshot: Arc<StatusSnapshot>,
}

/// Storage shared between the writer and the readers.
#[derive(Debug)]
struct SnapshotCell {
    published: RwLock<Published>,
}

/// Create a new snapshot cell seeded with `initial`, and return its only writer and a reader.
///
/// Readers can be cloned freely. The writer cannot, which guarantees a single writer for the
/// lifetime of the cell.
pub fn channel(initial: StatusSnapshot) -> (SnapshotWriter, SnapshotReader) {
    let cell = Arc::new(SnapshotCell {
        published: RwLock::new(Published {
            // Generation 0 marks the placeholder, no tick has been published yet.
            generation: 0,
            snapshot: Arc::new(initial),
        }),
    });

    (SnapshotWriter::new(cell.clone()), SnapshotReader::new(cell))
}
