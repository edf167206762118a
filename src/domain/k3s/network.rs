// Copyright 2025 Home Team.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Node interface and address selection.

use crate::infrastructure::constants::IGNORED_INTERFACE_PREFIXES;
use crate::shared::error::{HomeError, Result};
use crate::shared::process::Command;
use serde::Deserialize;
use std::net::Ipv4Addr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct IpLink {
    ifname: String,
    #[serde(default)]
    flags: Vec<String>,
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    #[serde(default)]
    family: String,
    #[serde(default)]
    local: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub loopback: bool,
    pub up: bool,
    pub ipv4: Vec<Ipv4Addr>,
}

impl NetworkInterface {
    fn is_internal(&self) -> bool {
        IGNORED_INTERFACE_PREFIXES
            .iter()
            .any(|prefix| self.name.starts_with(prefix))
    }

    /// Usable for the k3s network.
    pub fn is_candidate(&self) -> bool {
        !self.is_internal() && !self.loopback && self.up
    }
}

/// Parse the output of `ip -j -4 addr show`.
pub fn parse_ip_addr_json(json: &str) -> Result<Vec<NetworkInterface>> {
    let links: Vec<IpLink> =
        serde_json::from_str(json).map_err(|e| HomeError::decode(Some("ip -j -4 addr show"), e))?;

    Ok(links
        .into_iter()
        .map(|link| NetworkInterface {
            loopback: link.flags.iter().any(|f| f == "LOOPBACK"),
            up: link.flags.iter().any(|f| f == "UP"),
            ipv4: link
                .addr_info
                .iter()
                .filter(|a| a.family == "inet")
                .filter_map(|a| a.local.as_deref()?.parse().ok())
                .collect(),
            name: link.ifname,
        })
        .collect())
}

pub async fn list_interfaces(cancel: &CancellationToken) -> Result<Vec<NetworkInterface>> {
    let output = Command::new("ip")
        .args(["-j", "-4", "addr", "show"])
        .output(cancel)
        .await?;
    parse_ip_addr_json(&output)
}

/// Interface, node address and host name k3s is installed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeNetwork {
    pub iface: String,
    pub node_ip: Ipv4Addr,
    pub hostname: String,
}

/// Pick the interface and node address.
///
/// `iface` must name a running, non-loopback interface; when unset the first
/// such interface is used. `node_ip` must belong to that interface; when
/// unset its first IPv4 address is used. The host name defaults to the node
/// address.
pub fn select_network(
    interfaces: &[NetworkInterface],
    iface: Option<&str>,
    node_ip: Option<&str>,
    hostname: Option<&str>,
) -> Result<NodeNetwork> {
    let requested_ip = match node_ip.filter(|ip| !ip.is_empty() && *ip != "0.0.0.0") {
        Some(ip) => {
            let addr: Ipv4Addr = ip.parse().map_err(|_| {
                HomeError::validation(format!("IP address {:?} is not valid", ip))
            })?;
            if addr.is_loopback() {
                return Err(HomeError::validation(format!("unable to bind to {}", addr)));
            }
            Some(addr)
        }
        None => None,
    };

    let interface = interfaces
        .iter()
        .filter(|i| {
            if !i.is_candidate() {
                debug!(iface = %i.name, loopback = i.loopback, up = i.up, "Skipping interface");
                return false;
            }
            true
        })
        .find(|i| iface.map_or(true, |name| name.is_empty() || name == i.name))
        .ok_or_else(|| {
            HomeError::validation(format!(
                "network interface {:?} is not running, does not exist or is a loopback interface",
                iface.unwrap_or_default()
            ))
        })?;
    info!(iface = %interface.name, "Found interface for networking");

    let node_ip = match requested_ip {
        Some(addr) if interface.ipv4.contains(&addr) => addr,
        Some(addr) => {
            return Err(HomeError::validation(format!(
                "IP address {:?} is not assigned to {}",
                addr.to_string(),
                interface.name
            )))
        }
        None => *interface.ipv4.first().ok_or_else(|| {
            HomeError::validation(format!("interface {} has no IPv4 address", interface.name))
        })?,
    };

    let hostname = match hostname.filter(|h| !h.is_empty()) {
        Some(host) => host.to_string(),
        None => {
            warn!(hostname = %node_ip, "Hostname is not set, using IP");
            node_ip.to_string()
        }
    };

    Ok(NodeNetwork {
        iface: interface.name.clone(),
        node_ip,
        hostname,
    })
}
