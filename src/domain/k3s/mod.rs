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

//! Offline k3s installation and upgrade from a bundle.

pub mod backup;
pub mod dns;
pub mod firewall;
pub mod images;
pub mod install;
pub mod network;
pub mod service;
pub mod tls;
pub mod upgrade;
pub mod version;

pub use backup::{BackedUpFile, BackupSet};
pub use images::ImageImporter;
pub use install::{InstallConfig, K3sInstaller};
pub use network::{NetworkInterface, NodeNetwork};
pub use service::{K3sService, SystemService};
pub use upgrade::{UpgradeOutcome, Upgrader};
pub use version::K3sVersion;

use crate::infrastructure::constants::{
    K3S_BINARY_NAME, K3S_BIN_DIR, K3S_IMAGES_DIR, K3S_RESOLV_CONF, K3S_UNINSTALL_SCRIPT,
    SYSTEM_RESOLV_CONF,
};
use std::path::{Path, PathBuf};

/// Filesystem locations the installer writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct K3sPaths {
    pub bin_dir: PathBuf,
    pub images_dir: PathBuf,
    /// Synthetic resolv file handed to k3s when the system one is unusable.
    pub resolv_conf: PathBuf,
    pub system_resolv_conf: PathBuf,
}

impl Default for K3sPaths {
    fn default() -> Self {
        Self {
            bin_dir: PathBuf::from(K3S_BIN_DIR),
            images_dir: PathBuf::from(K3S_IMAGES_DIR),
            resolv_conf: PathBuf::from(K3S_RESOLV_CONF),
            system_resolv_conf: PathBuf::from(SYSTEM_RESOLV_CONF),
        }
    }
}

impl K3sPaths {
    /// The same layout below `root`, for tests and staging.
    pub fn under(root: &Path) -> Self {
        let rebase = |p: &str| root.join(p.trim_start_matches('/'));
        Self {
            bin_dir: rebase(K3S_BIN_DIR),
            images_dir: rebase(K3S_IMAGES_DIR),
            resolv_conf: rebase(K3S_RESOLV_CONF),
            system_resolv_conf: rebase(SYSTEM_RESOLV_CONF),
        }
    }

    pub fn binary(&self) -> PathBuf {
        self.bin_dir.join(K3S_BINARY_NAME)
    }

    pub fn uninstall_script(&self) -> PathBuf {
        self.bin_dir.join(K3S_UNINSTALL_SCRIPT)
    }

    pub fn is_installed(&self) -> bool {
        self.binary().exists()
    }
}
