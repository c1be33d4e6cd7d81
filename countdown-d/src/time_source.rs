// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Local time source.

use std::net::ToSocketAddrs;

use jiff::tz::{Offset, TimeZone};
use jiff::Timestamp;
use tracing::{info, warn};

use crate::countdown::CalendarMoment;

/// NTP port, used when resolving the configured server.
const NTP_PORT: u16 = 123;

/// Parameters of a time synchronization request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncParams {
    /// Offset of the local standard time from UTC, in seconds.
    pub gmt_offset_secs: i32,
    /// Additional daylight saving offset, in seconds.
    pub dst_offset_secs: i32,
    /// Address of the NTP server.
    pub server: String,
}

/// The source of local calendar time.
///
/// Synchronization is fire and forget: `request_sync` returns straight away, and the caller
/// polls `read_local_time` to find out when a time is available.
#[cfg_attr(any(test, feature = "test"), mockall::automock)]
pub trait TimeSource: Send {
    /// Current local time, or None if the clock has never been set.
    fn read_local_time(&self) -> Option<CalendarMoment>;

    fn request_sync(&mut self, params: &SyncParams);
}

/// Time source backed by the host clock, which is kept in sync by the operating system.
///
/// The host clock is not trusted until a synchronization request succeeded once: the NTP server
/// must resolve and the offsets must form a valid UTC offset. From then on the local time is
/// always available, a later failed request leaves the latched offset in place.
#[derive(Debug, Default)]
pub struct SystemTimeSource {
    offset: Option<Offset>,
}

impl SystemTimeSource {
    pub fn new() -> SystemTimeSource {
        SystemTimeSource::default()
    }
}

impl TimeSource for SystemTimeSource {
    fn read_local_time(&self) -> Option<CalendarMoment> {
        let offset = self.offset?;
        let zoned = Timestamp::now().to_zoned(TimeZone::fixed(offset));
        Some(CalendarMoment::from(zoned.datetime()))
    }

    fn request_sync(&mut self, params: &SyncParams) {
        let resolved = (params.server.as_str(), NTP_PORT)
            .to_socket_addrs()
            .map(|mut addrs| addrs.next());
        match resolved {
            Ok(Some(addr)) => info!("Getting time from NTP server {} ({})", params.server, addr),
            Ok(None) => {
                warn!("NTP server {} has no address", params.server);
                return;
            }
            Err(e) => {
                warn!(error = ?e, "Failed to resolve NTP server {}", params.server);
                return;
            }
        }

        let seconds = params.gmt_offset_secs.saturating_add(params.dst_offset_secs);
        match Offset::from_seconds(seconds) {
            Ok(offset) => self.offset = Some(offset),
            Err(e) => warn!(error = ?e, "Invalid UTC offset of {} seconds", seconds),
        }
    }
}
