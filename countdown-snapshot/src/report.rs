// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use serde::Serialize;

use crate::StatusSnapshot;

/// The JSON document served at `/api/status`.
///
/// Field names are those the status page expects. The battery fields are left out entirely when
/// the device has no fuel gauge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub days: i32,
    pub christmas_year: i32,
    pub year: i32,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub min: u8,
    pub sec: u8,
    pub ssid: String,
    pub ip: String,
    pub rssi: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_voltage: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_percent: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub battery_status: Option<String>,
}

impl StatusReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<&StatusSnapshot> for StatusReport {
    fn from(snapshot: &StatusSnapshot) -> Self {
        let battery = snapshot.battery.as_ref();
        StatusReport {
            days: snapshot.countdown.days_remaining,
            christmas_year: snapshot.countdown.target_year,
            year: snapshot.clock.year,
            month: snapshot.clock.month,
            day: snapshot.clock.day,
            hour: snapshot.clock.hour,
            min: snapshot.clock.minute,
            sec: snapshot.clock.second,
            ssid: snapshot.network.ssid.clone(),
            ip: snapshot.network.ip.clone(),
            rssi: snapshot.network.rssi,
            battery_voltage: battery.map(|b| b.reading.voltage_volts),
            battery_percent: battery.map(|b| b.reading.percent),
            battery_status: battery.map(|b| b.classification.to_string()),
        }
    }
}
