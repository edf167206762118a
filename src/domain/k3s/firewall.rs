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

use crate::infrastructure::constants::{FIREWALL_TCP_PORTS, K3S_POD_CIDR, K3S_SERVICE_CIDR};
use crate::shared::error::Result;
use crate::shared::process::Command;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Firewall {
    Firewalld,
    Ufw,
}

impl fmt::Display for Firewall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.unit())
    }
}

impl Firewall {
    pub const ALL: [Firewall; 2] = [Firewall::Firewalld, Firewall::Ufw];

    pub fn unit(&self) -> &'static str {
        match self {
            Firewall::Firewalld => "firewalld",
            Firewall::Ufw => "ufw",
        }
    }

    pub fn command(&self) -> &'static str {
        match self {
            Firewall::Firewalld => "firewall-cmd",
            Firewall::Ufw => "ufw",
        }
    }

    /// Argument lists, one per rule: the k3s TCP ports, then the pod and
    /// service networks.
    pub fn rules(&self) -> Vec<Vec<String>> {
        let ports = FIREWALL_TCP_PORTS.iter().map(|port| match self {
            Firewall::Firewalld => vec![
                "--add-port".to_string(),
                format!("{}/tcp", port),
                "--permanent".to_string(),
            ],
            Firewall::Ufw => vec!["allow".to_string(), format!("{}/tcp", port)],
        });
        let networks = [K3S_POD_CIDR, K3S_SERVICE_CIDR].into_iter().map(|cidr| match self {
            Firewall::Firewalld => vec![
                "--add-source".to_string(),
                cidr.to_string(),
                "--permanent".to_string(),
                "--zone=trusted".to_string(),
            ],
            Firewall::Ufw => ["allow", "from", cidr, "to", "any"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        });
        ports.chain(networks).collect()
    }

    /// `systemctl is-active` reports the unit as active.
    pub async fn is_active(&self, cancel: &CancellationToken) -> bool {
        info!("Checking if {} is enabled", self);
        match Command::new("systemctl")
            .args(["is-active", self.unit()])
            .output(cancel)
            .await
        {
            Ok(output) => output.lines().any(|l| l.trim() == "active"),
            Err(e) => {
                // exit status 3: inactive or no such unit
                debug!("systemctl is-active {}: {}", self.unit(), e);
                false
            }
        }
    }

    pub async fn add_rules(&self, cancel: &CancellationToken) -> Result<()> {
        info!("Adding firewall rules for {}", self);
        for args in self.rules() {
            Command::new(self.command())
                .args(args.clone())
                .on_stdout(|line| debug!("{}", line))
                .run(cancel)
                .await?;
            info!(args = ?args, "Added {} rule", self.command());
        }
        if *self == Firewall::Firewalld {
            Command::new(self.command())
                .arg("--reload")
                .run(cancel)
                .await?;
        }
        Ok(())
    }
}

/// Open the k3s ports on every active firewall. Failures are logged and do
/// not stop the install.
pub async fn configure_firewall(cancel: &CancellationToken) {
    let mut found = false;
    for firewall in Firewall::ALL {
        if !firewall.is_active(cancel).await {
            continue;
        }
        found = true;
        if let Err(e) = firewall.add_rules(cancel).await {
            warn!("Failed to add {} rules: {}", firewall, e);
        }
    }
    if !found {
        warn!("No active firewall found (firewalld, ufw), skipping firewall rules");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_firewalld_rules() {
        let rules = Firewall::Firewalld.rules();
        assert_eq!(rules.len(), 8);
        assert_eq!(rules[0], vec!["--add-port", "80/tcp", "--permanent"]);
        assert_eq!(
            rules[7],
            vec!["--add-source", "10.43.0.0/16", "--permanent", "--zone=trusted"]
        );
    }

    #[test]
    fn test_ufw_rules() {
        let rules = Firewall::Ufw.rules();
        assert_eq!(rules[2], vec!["allow", "6443/tcp"]);
        assert_eq!(rules[6], vec!["allow", "from", "10.42.0.0/16", "to", "any"]);
    }
}
