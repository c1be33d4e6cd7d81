// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Battery fuel gauge and the suspend primitive.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use countdown_snapshot::BatteryReading;
use tracing::{info, warn};

use crate::clock::sleep_unless_shutdown;

#[cfg_attr(any(test, feature = "test"), mockall::automock)]
pub trait PowerAdapter: Send {
    fn read_battery(&self) -> anyhow::Result<BatteryReading>;

    /// Enter low power for `duration`. Returning from this call is the device waking up.
    fn suspend_for(&mut self, duration: Duration);
}

/// Fuel gauge exposed by the Linux `power_supply` class, e.g. `/sys/class/power_supply/BAT0`.
///
/// The attributes read are:
/// * `voltage_now`, in microvolts.
/// * `capacity`, in percent.
/// * `current_now` in microamps and `charge_full` in microampere hours, which give the charge
///   rate in percent per hour. Both are optional, the rate is 0 when either is missing.
/// * `status`, whose "Discharging" value makes the rate negative.
#[derive(Debug)]
pub struct SysfsFuelGauge {
    dir: PathBuf,
}

impl SysfsFuelGauge {
    /// Open the fuel gauge. Fails when the directory does not describe a battery.
    pub fn open(dir: &Path) -> anyhow::Result<SysfsFuelGauge> {
        let gauge = SysfsFuelGauge {
            dir: dir.to_path_buf(),
        };
        gauge
            .read_attribute::<i64>("voltage_now")
            .with_context(|| format!("no fuel gauge at {}", dir.display()))?;
        Ok(gauge)
    }

    fn read_raw(&self, name: &str) -> anyhow::Result<String> {
        let path = self.dir.join(name);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        Ok(raw.trim().to_string())
    }

    fn read_attribute<T>(&self, name: &str) -> anyhow::Result<T>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        let raw = self.read_raw(name)?;
        raw.parse::<T>()
            .with_context(|| format!("parse {} value {:?}", name, raw))
    }

    fn read_charge_rate(&self) -> f32 {
        let (Ok(current_ua), Ok(charge_full_uah)) = (
            self.read_attribute::<i64>("current_now"),
            self.read_attribute::<i64>("charge_full"),
        ) else {
            return 0.0;
        };
        if charge_full_uah <= 0 {
            return 0.0;
        }

        let rate = (current_ua.unsigned_abs() as f64 / charge_full_uah as f64 * 100.0) as f32;
        match self.read_raw("status").as_deref() {
            Ok("Discharging") => -rate,
            _ => rate,
        }
    }
}

impl PowerAdapter for SysfsFuelGauge {
    fn read_battery(&self) -> anyhow::Result<BatteryReading> {
        let voltage_uv = self.read_attribute::<i64>("voltage_now")?;
        let capacity = self.read_attribute::<i64>("capacity")?;

        Ok(BatteryReading {
            voltage_volts: (voltage_uv as f64 / 1_000_000.0) as f32,
            percent: capacity.clamp(0, 100) as u8,
            charge_rate_per_hour: self.read_charge_rate(),
        })
    }

    /// A host cannot power itself down and come back, block the control loop instead.
    fn suspend_for(&mut self, duration: Duration) {
        info!("Suspending for {:?}", duration);
        sleep_unless_shutdown(duration);
        info!("Resuming from suspend");
    }
}

/// Open the fuel gauge, or carry on without battery monitoring when there is none.
pub fn open_fuel_gauge(dir: Option<&Path>) -> Option<SysfsFuelGauge> {
    let dir = dir?;
    match SysfsFuelGauge::open(dir) {
        Ok(gauge) => {
            info!("Fuel gauge found at {}", dir.display());
            Some(gauge)
        }
        Err(e) => {
            warn!(error = ?e, "Battery monitoring unavailable");
            None
        }
    }
}
