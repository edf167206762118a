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

use super::version::{parse_version_output, K3sVersion};
use crate::infrastructure::constants::K3S_SERVICE_NAME;
use crate::shared::error::Result;
use crate::shared::process::Command;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Control over the running k3s server.
#[async_trait::async_trait]
pub trait K3sService: Send + Sync {
    async fn stop(&self, cancel: &CancellationToken) -> Result<()>;

    async fn start(&self, cancel: &CancellationToken) -> Result<()>;

    /// Version reported by the k3s binary at `binary`.
    async fn installed_version(
        &self,
        binary: &Path,
        cancel: &CancellationToken,
    ) -> Result<K3sVersion>;
}

/// The k3s unit managed by systemd, or by the SysV `service` wrapper on
/// hosts without systemd.
#[derive(Debug, Clone)]
pub struct SystemService {
    name: String,
    systemd_marker: PathBuf,
}

impl Default for SystemService {
    fn default() -> Self {
        Self {
            name: K3S_SERVICE_NAME.to_string(),
            systemd_marker: PathBuf::from("/run/systemd/system"),
        }
    }
}

impl SystemService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uses_systemd(&self) -> bool {
        self.systemd_marker.is_dir()
    }

    fn control(&self, action: &str) -> Command {
        if self.uses_systemd() {
            Command::new("systemctl").args([action, self.name.as_str()])
        } else {
            Command::new("service").args([self.name.as_str(), action])
        }
    }
}

#[async_trait::async_trait]
impl K3sService for SystemService {
    async fn stop(&self, cancel: &CancellationToken) -> Result<()> {
        info!("Stopping k3s service");
        self.control("stop")
            .on_stdout(|line| debug!("{}", line))
            .run(cancel)
            .await
    }

    async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        info!("Starting k3s service");
        self.control("start")
            .on_stdout(|line| debug!("{}", line))
            .run(cancel)
            .await
    }

    async fn installed_version(
        &self,
        binary: &Path,
        cancel: &CancellationToken,
    ) -> Result<K3sVersion> {
        let output = Command::new(binary.display().to_string())
            .arg("-v")
            .output(cancel)
            .await?;
        parse_version_output(&output)
    }
}
