// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Device configuration.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use crate::network::NetworkCandidate;
use crate::resync::BoundedWait;

pub const DEFAULT_HOSTNAME: &str = "christmas-countdown";
pub const DEFAULT_DISPLAY_ADDRESS: u8 = 0x70;
pub const MAX_DISPLAY_BRIGHTNESS: u8 = 15;
pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org";
pub const DEFAULT_HTTP_LISTEN: &str = "0.0.0.0:8080";
pub const DEFAULT_BATTERY_SYSFS: &str = "/sys/class/power_supply/BAT0";

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_DIAGNOSTICS_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Network association and time synchronization are both given 20 polls, 500ms apart.
pub const DEFAULT_CONNECT_WAIT: BoundedWait = BoundedWait::new(20, Duration::from_millis(500));
pub const DEFAULT_SYNC_WAIT: BoundedWait = BoundedWait::new(20, Duration::from_millis(500));

pub const DEFAULT_SUSPEND_DURATION: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_CRITICAL_HOLD: Duration = Duration::from_secs(3);
pub const DEFAULT_TEST_PATTERN_HOLD: Duration = Duration::from_secs(1);

/// Everything the device needs to know to run.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    /// Networks to join, in order of preference.
    pub networks: Vec<NetworkCandidate>,
    pub hostname: String,
    /// I2C address of the display backpack.
    pub display_address: u8,
    /// 0 to 15.
    pub display_brightness: u8,
    pub ntp_server: String,
    pub gmt_offset_secs: i32,
    pub dst_offset_secs: i32,
    pub tick_interval: Duration,
    pub resync_interval: Duration,
    pub diagnostics_interval: Duration,
    pub connect_wait: BoundedWait,
    pub sync_wait: BoundedWait,
    pub suspend_duration: Duration,
    pub critical_hold: Duration,
    pub test_pattern_hold: Duration,
    /// Address the status page is served on. None disables it.
    pub http_listen: Option<String>,
    /// Fuel gauge directory. None runs without battery monitoring.
    pub battery_sysfs: Option<PathBuf>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            networks: Vec::new(),
            hostname: DEFAULT_HOSTNAME.to_string(),
            display_address: DEFAULT_DISPLAY_ADDRESS,
            display_brightness: MAX_DISPLAY_BRIGHTNESS,
            ntp_server: DEFAULT_NTP_SERVER.to_string(),
            gmt_offset_secs: 0,
            dst_offset_secs: 0,
            tick_interval: DEFAULT_TICK_INTERVAL,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            diagnostics_interval: DEFAULT_DIAGNOSTICS_INTERVAL,
            connect_wait: DEFAULT_CONNECT_WAIT,
            sync_wait: DEFAULT_SYNC_WAIT,
            suspend_duration: DEFAULT_SUSPEND_DURATION,
            critical_hold: DEFAULT_CRITICAL_HOLD,
            test_pattern_hold: DEFAULT_TEST_PATTERN_HOLD,
            http_listen: Some(DEFAULT_HTTP_LISTEN.to_string()),
            battery_sysfs: Some(PathBuf::from(DEFAULT_BATTERY_SYSFS)),
        }
    }
}

/// Parse a `SSID:PASSWORD` pair. The split happens on the first colon, so passwords may hold
/// colons but SSIDs may not.
pub fn parse_network_candidate(value: &str) -> anyhow::Result<NetworkCandidate> {
    let (ssid, password) = value
        .split_once(':')
        .context("expected SSID:PASSWORD")?;
    if ssid.is_empty() {
        anyhow::bail!("SSID must not be empty");
    }
    Ok(NetworkCandidate {
        ssid: ssid.to_string(),
        password: password.to_string(),
    })
}

/// Parse an I2C address, in decimal or with a `0x` prefix in hexadecimal.
pub fn parse_display_address(value: &str) -> anyhow::Result<u8> {
    let address = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    }
    .with_context(|| format!("invalid I2C address {:?}", value))?;

    if address > 0x7f {
        anyhow::bail!("I2C address {:#04x} is out of the 7-bit range", address);
    }
    Ok(address)
}

/// Parse a display brightness, 0 to 15.
pub fn parse_brightness(value: &str) -> anyhow::Result<u8> {
    let level = value
        .parse::<u8>()
        .with_context(|| format!("invalid brightness {:?}", value))?;
    if level > MAX_DISPLAY_BRIGHTNESS {
        anyhow::bail!("brightness must be between 0 and {}", MAX_DISPLAY_BRIGHTNESS);
    }
    Ok(level)
}
