// Copyright Christmas Countdown Developers. All Rights Reserved.
// SPDX-License-Identifier: GPL-2.0-only

//! Network link management.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

/// Documentation address (TEST-NET-1) used to look up the default route. Connecting a datagram
/// socket sends nothing on the wire.
pub const DEFAULT_ROUTE_PROBE: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 9);

/// A network the device may join, in order of preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkCandidate {
    pub ssid: String,
    pub password: String,
}

/// State of the network link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    Connected { ssid: String, ip: String, rssi: i32 },
    Disconnected,
}

impl LinkStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkStatus::Connected { .. })
    }
}

/// The network interface of the device.
///
/// Joining a network is asynchronous: `begin` starts the association and the caller polls
/// `current_status` until the link comes up or it gives up.
#[cfg_attr(any(test, feature = "test"), mockall::automock)]
pub trait NetworkAdapter: Send {
    fn set_hostname(&mut self, hostname: &str);

    fn begin(&mut self, candidate: &NetworkCandidate);

    fn current_status(&self) -> LinkStatus;

    fn disconnect(&mut self);
}

/// Network adapter for a host where the operating system already manages the links.
///
/// "Joining" a candidate only records its name. The link is reported up whenever the host has a
/// route to `probe`, along with the local address that route goes through. Hosts do not expose
/// a signal strength, it is always reported as 0 dBm.
#[derive(Debug)]
pub struct HostNetwork {
    probe: SocketAddr,
    hostname: Option<String>,
    joined: Option<String>,
}

impl HostNetwork {
    pub fn new(probe: SocketAddr) -> HostNetwork {
        HostNetwork {
            probe,
            hostname: None,
            joined: None,
        }
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }
}

impl Default for HostNetwork {
    fn default() -> Self {
        HostNetwork::new(DEFAULT_ROUTE_PROBE)
    }
}

/// Return the local address the host would use to reach `probe`.
fn local_address_towards(probe: SocketAddr) -> io::Result<IpAddr> {
    let socket = Socket::new(Domain::for_address(probe), Type::DGRAM, Some(Protocol::UDP))?;
    socket.connect(&probe.into())?;
    socket
        .local_addr()?
        .as_socket()
        .map(|addr| addr.ip())
        .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "not an inet socket address"))
}

impl NetworkAdapter for HostNetwork {
    fn set_hostname(&mut self, hostname: &str) {
        info!("Hostname set to: {}", hostname);
        self.hostname = Some(hostname.to_string());
    }

    fn begin(&mut self, candidate: &NetworkCandidate) {
        self.joined = Some(candidate.ssid.clone());
    }

    fn current_status(&self) -> LinkStatus {
        let Some(ssid) = &self.joined else {
            return LinkStatus::Disconnected;
        };

        match local_address_towards(self.probe) {
            Ok(ip) => LinkStatus::Connected {
                ssid: ssid.clone(),
                ip: ip.to_string(),
                rssi: 0,
            },
            Err(e) => {
                debug!(error = ?e, "No route towards {}", self.probe);
                LinkStatus::Disconnected
            }
        }
    }

    fn disconnect(&mut self) {
        self.joined = None;
    }
}
