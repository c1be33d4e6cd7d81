//! Simulated collaborators, all driven by the same virtual clock.
//!
//! Nothing here ever blocks: sleeping, suspending and polling the network advance the virtual
//! clock instead. Once the clock reaches the end of the simulation a shutdown is requested, and
//! the control loop leaves at its next step.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use countdown_d::clock::MonotonicClock;
use countdown_d::countdown::CalendarMoment;
use countdown_d::display::{render, DisplayValue, SegmentDisplay};
use countdown_d::network::{LinkStatus, NetworkAdapter, NetworkCandidate};
use countdown_d::power::PowerAdapter;
use countdown_d::time_source::{SyncParams, TimeSource};
use countdown_d::SHUTDOWN_REQUESTED;
use countdown_snapshot::{BatteryReading, SnapshotWrite, SnapshotWriter, StatusSnapshot};
use jiff::civil::DateTime;
use jiff::SignedDuration;
use tracing::{debug, info};

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Time spent on every network status poll.
const LINK_POLL_COST: Duration = Duration::from_millis(500);

/// Counters collected along the simulation.
#[derive(Debug, Default)]
pub struct Stats {
    pub syncs: AtomicU32,
    pub suspends: AtomicU32,
    pub publications: AtomicU32,
    pub frames: AtomicU32,
}

/// Virtual uptime, shared by every simulated collaborator.
#[derive(Debug, Clone)]
pub struct VirtualTime {
    now_millis: Arc<AtomicU64>,
    end_millis: u64,
}

impl VirtualTime {
    pub fn new(length: Duration) -> VirtualTime {
        VirtualTime {
            now_millis: Arc::new(AtomicU64::new(0)),
            end_millis: length.as_millis() as u64,
        }
    }

    pub fn now_millis(&self) -> u64 {
        self.now_millis.load(Ordering::SeqCst)
    }

    pub fn hours(&self) -> f64 {
        self.now_millis() as f64 / MILLIS_PER_HOUR
    }

    /// Move time forward, and request a shutdown once the end of the simulation is reached.
    pub fn advance(&self, duration: Duration) {
        let step = duration.as_millis() as u64;
        let now = self.now_millis.fetch_add(step, Ordering::SeqCst) + step;
        if now >= self.end_millis {
            SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);
        }
    }

    /// Uptime formatted as `+HHH:MM:SS`, for the console.
    pub fn stamp(&self) -> String {
        let secs = self.now_millis() / 1000;
        format!("+{:03}:{:02}:{:02}", secs / 3600, secs / 60 % 60, secs % 60)
    }
}

#[derive(Debug)]
pub struct SimClock {
    pub time: VirtualTime,
}

impl MonotonicClock for SimClock {
    fn uptime_millis(&self) -> u64 {
        self.time.now_millis()
    }

    fn sleep(&mut self, duration: Duration) {
        self.time.advance(duration);
    }
}

/// A time source whose wall clock starts at `epoch` when the uptime is zero.
///
/// No time is known until the first sync request.
#[derive(Debug)]
pub struct SimTimeSource {
    pub time: VirtualTime,
    pub epoch: DateTime,
    pub synced: bool,
    pub stats: Arc<Stats>,
}

impl TimeSource for SimTimeSource {
    fn read_local_time(&self) -> Option<CalendarMoment> {
        if !self.synced {
            return None;
        }
        let elapsed = SignedDuration::from_millis(self.time.now_millis() as i64);
        self.epoch.checked_add(elapsed).ok().map(CalendarMoment::from)
    }

    fn request_sync(&mut self, params: &SyncParams) {
        debug!(server = %params.server, "Simulated sync");
        self.synced = true;
        self.stats.syncs.fetch_add(1, Ordering::SeqCst);
    }
}

/// A radio that can reach some networks, and drops the first few association attempts.
#[derive(Debug)]
pub struct SimNetwork {
    pub time: VirtualTime,
    pub unreachable: Vec<String>,
    pub flaky_attempts: u32,
    pub associated: Option<String>,
}

impl NetworkAdapter for SimNetwork {
    fn set_hostname(&mut self, hostname: &str) {
        debug!("Simulated hostname {}", hostname);
    }

    fn begin(&mut self, candidate: &NetworkCandidate) {
        self.associated = None;
        if self.unreachable.contains(&candidate.ssid) {
            return;
        }
        if self.flaky_attempts > 0 {
            self.flaky_attempts -= 1;
            return;
        }
        self.associated = Some(candidate.ssid.clone());
    }

    fn current_status(&self) -> LinkStatus {
        self.time.advance(LINK_POLL_COST);
        match &self.associated {
            Some(ssid) => LinkStatus::Connected {
                ssid: ssid.clone(),
                ip: String::from("10.0.0.42"),
                rssi: -58,
            },
            None => LinkStatus::Disconnected,
        }
    }

    fn disconnect(&mut self) {
        self.associated = None;
    }
}

/// A fuel gauge draining linearly, until a charger is plugged in.
///
/// The state of charge is a function of the virtual time alone. The cell voltage follows the
/// charge linearly, from 3.0V at 5% to 4.2V when full.
#[derive(Debug)]
pub struct SimBattery {
    pub time: VirtualTime,
    pub initial_percent: f64,
    pub drain_per_hour: f64,
    pub charge_per_hour: f64,
    pub charger_after_hours: Option<f64>,
    pub stats: Arc<Stats>,
}

impl SimBattery {
    /// State of charge and charge rate at `hours` into the simulation.
    fn charge_at(&self, hours: f64) -> (f64, f64) {
        let drained = |hours: f64| (self.initial_percent - self.drain_per_hour * hours).max(0.0);
        match self.charger_after_hours {
            Some(plugged) if hours >= plugged => {
                let percent =
                    (drained(plugged) + self.charge_per_hour * (hours - plugged)).min(100.0);
                let rate = if percent < 100.0 {
                    self.charge_per_hour
                } else {
                    0.0
                };
                (percent, rate)
            }
            _ => {
                let percent = drained(hours);
                let rate = if percent > 0.0 {
                    -self.drain_per_hour
                } else {
                    0.0
                };
                (percent, rate)
            }
        }
    }
}

impl PowerAdapter for SimBattery {
    fn read_battery(&self) -> anyhow::Result<BatteryReading> {
        let (percent, rate) = self.charge_at(self.time.hours());
        Ok(BatteryReading {
            voltage_volts: (3.0 + 1.2 * (percent - 5.0) / 95.0) as f32,
            percent: percent.round() as u8,
            charge_rate_per_hour: rate as f32,
        })
    }

    fn suspend_for(&mut self, duration: Duration) {
        info!("{} suspended for {:?}", self.time.stamp(), duration);
        self.stats.suspends.fetch_add(1, Ordering::SeqCst);
        self.time.advance(duration);
    }
}

/// Prints the panel on the console whenever its content changes.
#[derive(Debug)]
pub struct SimDisplay {
    pub time: VirtualTime,
    pub shown: Option<(DisplayValue, bool)>,
    pub stats: Arc<Stats>,
}

impl SegmentDisplay for SimDisplay {
    fn begin(&mut self, _address: u8) -> anyhow::Result<()> {
        self.shown = None;
        Ok(())
    }

    fn set_brightness(&mut self, _level: u8) {}

    fn show(&mut self, value: DisplayValue, colon_on: bool) {
        if self.shown == Some((value, colon_on)) {
            return;
        }
        self.shown = Some((value, colon_on));
        self.stats.frames.fetch_add(1, Ordering::SeqCst);
        println!("{} {}", self.time.stamp(), render(value, colon_on));
    }
}

/// Publishes to a real snapshot cell, counting publications.
#[derive(Debug)]
pub struct CountingWriter {
    pub inner: SnapshotWriter,
    pub stats: Arc<Stats>,
}

impl SnapshotWrite for CountingWriter {
    fn write(&mut self, snapshot: &StatusSnapshot) {
        self.stats.publications.fetch_add(1, Ordering::SeqCst);
        self.inner.write(snapshot);
    }
}

#[cfg(test)]
mod t_sim {
    use super::*;

    fn battery(charger_after_hours: Option<f64>) -> SimBattery {
        SimBattery {
            time: VirtualTime::new(Duration::from_secs(3600 * 100)),
            initial_percent: 50.0,
            drain_per_hour: 10.0,
            charge_per_hour: 20.0,
            charger_after_hours,
            stats: Arc::default(),
        }
    }

    #[test]
    fn test_battery_drains_to_empty() {
        let battery = battery(None);
        assert_eq!(battery.charge_at(0.0), (50.0, -10.0));
        assert_eq!(battery.charge_at(2.0), (30.0, -10.0));
        assert_eq!(battery.charge_at(8.0), (0.0, 0.0));
    }

    #[test]
    fn test_battery_charges_to_full() {
        let battery = battery(Some(3.0));
        assert_eq!(battery.charge_at(4.0), (40.0, 20.0));
        assert_eq!(battery.charge_at(20.0), (100.0, 0.0));
    }

    #[test]
    fn test_voltage_follows_charge() {
        let battery = battery(None);
        let reading = battery.read_battery().unwrap();
        assert_eq!(reading.percent, 50);
        assert!((reading.voltage_volts - 3.568).abs() < 0.01);
    }

    #[test]
    fn test_flaky_network_drops_first_attempts() {
        let mut network = SimNetwork {
            time: VirtualTime::new(Duration::from_secs(3600)),
            unreachable: vec![String::from("cafe")],
            flaky_attempts: 1,
            associated: None,
        };
        let home = NetworkCandidate {
            ssid: String::from("home"),
            password: String::new(),
        };
        let cafe = NetworkCandidate {
            ssid: String::from("cafe"),
            password: String::new(),
        };

        network.begin(&home);
        assert!(!network.current_status().is_connected());
        network.begin(&cafe);
        assert!(!network.current_status().is_connected());
        network.begin(&home);
        assert!(network.current_status().is_connected());
        assert_eq!(network.time.now_millis(), 1500);
    }

    #[test]
    fn test_time_unknown_until_synced() {
        let time = VirtualTime::new(Duration::from_secs(3600));
        let mut source = SimTimeSource {
            time: time.clone(),
            epoch: DateTime::constant(2025, 12, 24, 23, 59, 0, 0),
            synced: false,
            stats: Arc::default(),
        };
        assert!(source.read_local_time().is_none());

        source.request_sync(&SyncParams {
            gmt_offset_secs: 0,
            dst_offset_secs: 0,
            server: String::from("pool.ntp.org"),
        });
        time.advance(Duration::from_secs(90));
        let now = source.read_local_time().unwrap();
        assert_eq!((now.month(), now.day(), now.hour()), (12, 25, 0));
        assert_eq!(source.stats.syncs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stamp() {
        let time = VirtualTime::new(Duration::from_secs(3600 * 200));
        time.advance(Duration::from_secs(3600 * 101 + 62));
        assert_eq!(time.stamp(), "+101:01:02");
    }
}
