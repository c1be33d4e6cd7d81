// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! A daemon counting down the days to Christmas on a four digit display.
//!
//! The daemon obtains the local time over the network, shows the number of days left until the
//! next December 25th, and publishes the same information on a small status page. On battery
//! powered devices it watches the fuel gauge and suspends itself before the battery is damaged
//! by a deep discharge.
//!
//! # Operation
//!
//! At startup the display is initialized and shows a test pattern, then the configured networks
//! are tried in order until one associates, and the time is synchronized. The control loop then
//! ticks once a minute:
//!
//! * The time is resynchronized once an hour, or immediately if it was never obtained.
//! * The countdown is computed and shown. On Christmas day, `0` is shown with a blinking colon.
//! * The battery is classified, and a critically low battery not being charged triggers a
//!   protective suspend of one hour.
//! * A complete status snapshot is published for the status page.
//!
//! A display that cannot be initialized is the only fatal error. Networks that cannot be joined
//! show `-1` and are retried at the next scheduled resync. A clock that was never synchronized
//! shows `----`.
//!
//! # Status page
//!
//! * `GET /` serves a page refreshing itself every 5 seconds.
//! * `GET /api/status` serves the status snapshot as JSON.
//!
//! # Signals
//!
//! * `SIGUSR1` forces a resync at the next tick.
//! * `SIGINT` and `SIGTERM` stop the daemon.
//!
//! # Logging
//!
//! Logs are written to stderr through `tracing`, as text or JSON lines, leaving stdout to the
//! console display. The level is set on the command line, and `RUST_LOG` takes precedence when
//! set.
pub mod battery_guardian;
pub mod clock;
pub mod config;
pub mod control_loop;
pub mod countdown;
pub mod display;
pub mod network;
pub mod power;
pub mod resync;
pub mod signal;
pub mod status_server;
pub mod time_source;

use std::sync::atomic::AtomicBool;

use countdown_snapshot::StatusSnapshot;
use tracing::{info, warn};

use crate::clock::SystemClock;
use crate::config::DeviceConfig;
use crate::control_loop::{Collaborators, ControlLoop};
use crate::display::ConsoleDisplay;
use crate::network::HostNetwork;
use crate::power::open_fuel_gauge;
use crate::status_server::StatusServer;
use crate::time_source::SystemTimeSource;

/// Set by SIGUSR1: resync at the next tick, whatever the schedule says.
pub static FORCE_RESYNC_PENDING: AtomicBool = AtomicBool::new(false);

/// Set by SIGINT and SIGTERM: leave the control loop at the next opportunity.
pub static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Run the daemon with the host collaborators, until a shutdown is requested.
///
/// Returns an error if the display cannot be initialized. A status page that cannot be served is
/// logged, and the device runs without it.
pub fn run(config: DeviceConfig) -> anyhow::Result<()> {
    info!("Initialized countdown daemon");

    if let Err(e) = signal::register_operator_signals() {
        warn!(error = ?e, "Running without operator signals");
    }

    let (writer, reader) = countdown_snapshot::channel(StatusSnapshot::default());
    let status_server = match config.http_listen.as_deref() {
        Some(listen) => match StatusServer::start(listen, reader) {
            Ok(server) => Some(server),
            Err(e) => {
                warn!(error = ?e, "Status page unavailable");
                None
            }
        },
        None => None,
    };

    let parts = Collaborators {
        time_source: SystemTimeSource::new(),
        network: HostNetwork::default(),
        power: open_fuel_gauge(config.battery_sysfs.as_deref()),
        display: ConsoleDisplay::stdout(),
        clock: SystemClock::new(),
    };
    let mut control_loop = ControlLoop::new(config, parts, writer);
    let result = control_loop.run();

    if let Some(status_server) = status_server {
        status_server.stop();
    }
    result
}
