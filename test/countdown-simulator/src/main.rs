use std::process;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use countdown_d::config::DeviceConfig;
use countdown_d::control_loop::{Collaborators, ControlLoop};
use countdown_d::network::NetworkCandidate;
use countdown_d::resync::BoundedWait;
use countdown_d::SHUTDOWN_REQUESTED;
use countdown_snapshot::{SnapshotReader, StatusSnapshot};
use jiff::civil::DateTime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod sim;

use sim::{
    CountingWriter, SimBattery, SimClock, SimDisplay, SimNetwork, SimTimeSource, Stats,
    VirtualTime,
};

/// Runs the countdown control loop against simulated hardware, on a virtual clock.
///
/// Days of device life are simulated in a fraction of a second. The panel content is printed on
/// stdout whenever it changes, and the last published status is printed as JSON at the end.
#[derive(Parser, Debug)]
#[command(author, name = "countdown-simulator", version, about, long_about = None)]
struct Cli {
    /// Local date and time when the device is powered on.
    #[arg(long, default_value = "2025-12-20T08:00:00")]
    start: DateTime,

    /// Length of the simulation, in hours.
    #[arg(long, default_value_t = 48.0)]
    hours: f64,

    /// SSID of a configured network, in order of preference.
    #[arg(long = "network", default_value = "home")]
    networks: Vec<String>,

    /// SSID of a configured network that never associates.
    #[arg(long)]
    unreachable: Vec<String>,

    /// Number of association attempts dropped before the radio behaves.
    #[arg(long, default_value_t = 0)]
    flaky: u32,

    /// Run without a fuel gauge.
    #[arg(long)]
    no_battery: bool,

    /// State of charge at power on.
    #[arg(long, default_value_t = 60.0)]
    battery_percent: f64,

    /// Discharge rate, in percent per hour.
    #[arg(long, default_value_t = 2.0)]
    drain_per_hour: f64,

    /// Hours after power on when a charger is plugged in.
    #[arg(long)]
    charger_after_hours: Option<f64>,

    /// Charge rate once the charger is plugged in, in percent per hour.
    #[arg(long, default_value_t = 25.0)]
    charge_per_hour: f64,
}

/// What came out of a simulation.
#[derive(Debug)]
struct Summary {
    stats: Arc<Stats>,
    status: Arc<StatusSnapshot>,
    generation: u64,
    elapsed_millis: u64,
}

fn device_config(args: &Cli) -> DeviceConfig {
    DeviceConfig {
        networks: args
            .networks
            .iter()
            .map(|ssid| NetworkCandidate {
                ssid: ssid.clone(),
                password: String::from("simulated"),
            })
            .collect(),
        // The simulated radio advances the virtual clock itself on every poll.
        connect_wait: BoundedWait::new(20, Duration::ZERO),
        sync_wait: BoundedWait::new(20, Duration::ZERO),
        http_listen: None,
        battery_sysfs: None,
        ..DeviceConfig::default()
    }
}

fn simulate(args: &Cli) -> anyhow::Result<Summary> {
    if !(args.hours > 0.0) {
        anyhow::bail!("the simulation must last a positive number of hours");
    }
    SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);

    let length = Duration::try_from_secs_f64(args.hours * 3600.0)
        .context("the simulation is too long")?;
    let time = VirtualTime::new(length);
    let stats = Arc::new(Stats::default());

    let power = (!args.no_battery).then(|| SimBattery {
        time: time.clone(),
        initial_percent: args.battery_percent.clamp(0.0, 100.0),
        drain_per_hour: args.drain_per_hour,
        charge_per_hour: args.charge_per_hour,
        charger_after_hours: args.charger_after_hours,
        stats: stats.clone(),
    });
    let parts = Collaborators {
        time_source: SimTimeSource {
            time: time.clone(),
            epoch: args.start,
            synced: false,
            stats: stats.clone(),
        },
        network: SimNetwork {
            time: time.clone(),
            unreachable: args.unreachable.clone(),
            flaky_attempts: args.flaky,
            associated: None,
        },
        power,
        display: SimDisplay {
            time: time.clone(),
            shown: None,
            stats: stats.clone(),
        },
        clock: SimClock { time: time.clone() },
    };

    let (writer, reader) = countdown_snapshot::channel(StatusSnapshot::default());
    let writer = CountingWriter {
        inner: writer,
        stats: stats.clone(),
    };

    info!("Simulating {} hours from {}", args.hours, args.start);
    let mut control_loop = ControlLoop::new(device_config(args), parts, writer);
    let result = control_loop.run();
    SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
    result?;

    Ok(summarize(stats, &reader, &time))
}

fn summarize(stats: Arc<Stats>, reader: &SnapshotReader, time: &VirtualTime) -> Summary {
    let (generation, status) = reader.load();
    Summary {
        stats,
        status,
        generation,
        elapsed_millis: time.now_millis(),
    }
}

fn main() {
    let args = Cli::parse();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let summary = match simulate(&args) {
        Ok(summary) => summary,
        Err(e) => {
            error!("Simulation failed: {:#}", e);
            process::exit(1);
        }
    };

    info!(
        elapsed = ?Duration::from_millis(summary.elapsed_millis),
        syncs = summary.stats.syncs.load(Ordering::SeqCst),
        suspends = summary.stats.suspends.load(Ordering::SeqCst),
        publications = summary.stats.publications.load(Ordering::SeqCst),
        frames = summary.stats.frames.load(Ordering::SeqCst),
        generation = summary.generation,
        "Simulation complete"
    );
    match summary.status.report().to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            error!("Failed to serialize the last status: {}", e);
            process::exit(1);
        }
    }
}

#[cfg(test)]
mod t_main {
    use countdown_snapshot::BatteryClassification;
    use serial_test::serial;

    use super::*;

    fn args(extra: &[&str]) -> Cli {
        let mut argv = vec!["countdown-simulator"];
        argv.extend_from_slice(extra);
        Cli::parse_from(argv)
    }

    #[test]
    #[serial]
    fn test_counts_down_across_christmas() {
        let summary =
            simulate(&args(&["--start", "2025-12-24T08:00:00", "--hours", "48", "--no-battery"]))
                .unwrap();

        let countdown = summary.status.countdown;
        assert_eq!(countdown.target_year, 2026);
        assert_eq!(countdown.days_remaining, 364);
        assert!(!countdown.is_target_day);
        assert_eq!(summary.status.clock.day, 26);
        assert!(summary.status.battery.is_none());
        assert_eq!(summary.status.network.ssid, "home");

        // One sync at power on, then one an hour.
        assert!(summary.stats.syncs.load(Ordering::SeqCst) >= 47);
        assert_eq!(summary.stats.suspends.load(Ordering::SeqCst), 0);
        assert_eq!(
            u64::from(summary.stats.publications.load(Ordering::SeqCst)),
            summary.generation
        );
    }

    #[test]
    #[serial]
    fn test_falls_back_to_reachable_network() {
        let summary = simulate(&args(&[
            "--hours",
            "2",
            "--network",
            "cafe",
            "--network",
            "home",
            "--unreachable",
            "cafe",
            "--flaky",
            "1",
            "--no-battery",
        ]))
        .unwrap();

        assert_eq!(summary.status.network.ssid, "home");
        assert_eq!(summary.status.network.ip, "10.0.0.42");
        assert_eq!(summary.status.countdown.days_remaining, 5);
    }

    #[test]
    #[serial]
    fn test_never_synchronized_without_network() {
        let summary = simulate(&args(&[
            "--hours",
            "3",
            "--unreachable",
            "home",
            "--no-battery",
        ]))
        .unwrap();

        assert_eq!(summary.stats.syncs.load(Ordering::SeqCst), 0);
        assert_eq!(summary.status.countdown.days_remaining, 0);
        assert_eq!(summary.status.clock.year, 0);
    }

    #[test]
    #[serial]
    fn test_deep_discharge_suspends_until_charged() {
        let summary = simulate(&args(&[
            "--start",
            "2025-12-01T08:00:00",
            "--hours",
            "24",
            "--battery-percent",
            "10",
            "--drain-per-hour",
            "1",
            "--charger-after-hours",
            "12",
        ]))
        .unwrap();

        // Protected around 4.5 hours in, then suspended again every hour until charged.
        assert!(summary.stats.suspends.load(Ordering::SeqCst) >= 7);

        let battery = summary.status.battery.unwrap();
        assert_eq!(battery.classification, BatteryClassification::Charged);
        assert_eq!(battery.reading.percent, 100);
        assert_eq!(summary.status.countdown.days_remaining, 23);
    }

    #[test]
    fn test_rejects_empty_simulation() {
        assert!(simulate(&args(&["--hours", "0"])).is_err());
    }
}
