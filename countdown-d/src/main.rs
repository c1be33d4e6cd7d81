// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, Level};
use tracing_subscriber::EnvFilter;

use countdown_d::config::{
    parse_brightness, parse_display_address, parse_network_candidate, DeviceConfig,
    DEFAULT_BATTERY_SYSFS, DEFAULT_DISPLAY_ADDRESS, DEFAULT_HOSTNAME, DEFAULT_HTTP_LISTEN,
    DEFAULT_NTP_SERVER, MAX_DISPLAY_BRIGHTNESS,
};
use countdown_d::network::NetworkCandidate;
use countdown_d::run;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// Count down the days to Christmas on a four digit display.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// A network to join, as SSID:PASSWORD. Repeat to list fallbacks, tried in order.
    #[arg(long = "network", value_name = "SSID:PASSWORD", value_parser = parse_network_candidate)]
    networks: Vec<NetworkCandidate>,

    /// Hostname announced on the network.
    #[arg(long, default_value = DEFAULT_HOSTNAME)]
    hostname: String,

    /// I2C address of the display, decimal or 0x-prefixed hexadecimal.
    #[arg(long, value_parser = parse_display_address, default_value_t = DEFAULT_DISPLAY_ADDRESS)]
    display_address: u8,

    /// Display brightness, 0 to 15.
    #[arg(long, value_parser = parse_brightness, default_value_t = MAX_DISPLAY_BRIGHTNESS)]
    display_brightness: u8,

    /// NTP server to synchronize with.
    #[arg(long, default_value = DEFAULT_NTP_SERVER)]
    ntp_server: String,

    /// Offset of local standard time from UTC, in seconds.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    gmt_offset: i32,

    /// Daylight saving offset, in seconds.
    #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
    dst_offset: i32,

    /// Address to serve the status page on.
    #[arg(long, default_value = DEFAULT_HTTP_LISTEN)]
    http_listen: String,

    /// Do not serve the status page.
    #[arg(long)]
    no_http: bool,

    /// Fuel gauge directory in sysfs. Battery protection is disabled if it does not exist.
    #[arg(long, default_value = DEFAULT_BATTERY_SYSFS)]
    battery_sysfs: PathBuf,

    /// Seconds between two ticks of the control loop.
    #[arg(long, default_value_t = 60)]
    tick_interval: u64,

    /// Seconds between two periodic resyncs.
    #[arg(long, default_value_t = 3600)]
    resync_interval: u64,

    /// Format of the log lines.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Most verbose level logged, unless RUST_LOG is set.
    #[arg(short = 'L', long, value_enum, default_value_t = LogLevel::Info)]
    level: LogLevel,
}

impl Cli {
    fn into_config(self) -> DeviceConfig {
        DeviceConfig {
            networks: self.networks,
            hostname: self.hostname,
            display_address: self.display_address,
            display_brightness: self.display_brightness,
            ntp_server: self.ntp_server,
            gmt_offset_secs: self.gmt_offset,
            dst_offset_secs: self.dst_offset,
            tick_interval: Duration::from_secs(self.tick_interval),
            resync_interval: Duration::from_secs(self.resync_interval),
            http_listen: (!self.no_http).then_some(self.http_listen),
            battery_sysfs: Some(self.battery_sysfs),
            ..Default::default()
        }
    }
}

fn init_tracing(format: LogFormat, level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::from(level).as_str()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

// christmas-countdownd entry point.
fn main() {
    let args = Cli::parse();
    init_tracing(args.log_format, args.level);

    let config = args.into_config();
    if config.networks.is_empty() {
        tracing::warn!("No network configured, the time can never be synchronized");
    }

    if let Err(e) = run(config) {
        error!("{:#}", e);
        process::exit(1);
    }
}
