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

use super::backup::BackupSet;
use super::install::placement_callbacks;
use super::service::K3sService;
use super::version::K3sVersion;
use super::K3sPaths;
use crate::infrastructure::bundle::glob::Glob;
use crate::infrastructure::bundle::Bundle;
use crate::infrastructure::constants::K3S_AIRGAP_GLOB;
use crate::shared::error::{HomeError, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    Upgraded { from: K3sVersion, to: K3sVersion },
    /// The bundle carries an older k3s than the one running. Nothing was
    /// changed.
    RefusedDowngrade {
        installed: K3sVersion,
        bundled: K3sVersion,
    },
}

impl UpgradeOutcome {
    pub fn is_upgraded(&self) -> bool {
        matches!(self, UpgradeOutcome::Upgraded { .. })
    }
}

pub struct Upgrader {
    paths: K3sPaths,
    service: Arc<dyn K3sService>,
    cancel: CancellationToken,
}

impl Upgrader {
    pub fn new(service: Arc<dyn K3sService>, cancel: CancellationToken) -> Self {
        Self {
            paths: K3sPaths::default(),
            service,
            cancel,
        }
    }

    pub fn with_paths(mut self, paths: K3sPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Files the upgrade overwrites: the binary and the airgap image archives.
    pub fn files_to_back_up(&self) -> Result<Vec<PathBuf>> {
        let mut files = vec![self.paths.binary()];
        if self.paths.images_dir.is_dir() {
            let glob = Glob::new(K3S_AIRGAP_GLOB)?;
            let mut images: Vec<PathBuf> = std::fs::read_dir(&self.paths.images_dir)?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|p| p.is_file())
                .filter(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| glob.matches(n))
                })
                .collect();
            images.sort();
            files.extend(images);
        }
        Ok(files)
    }

    /// Swap in the bundle's k3s binary and airgap images.
    ///
    /// The service is stopped before anything is written and started again
    /// afterwards, also on failure, in which case the previous files are
    /// restored first. A bundle older than the running k3s is refused unless
    /// `debug` is set.
    pub async fn upgrade(&self, bundle: &Bundle, debug: bool) -> Result<UpgradeOutcome> {
        let binary = self.paths.binary();
        if !binary.exists() {
            return Err(HomeError::NotInstalled);
        }

        let bundled: K3sVersion = bundle.manifest()?.k3s.parse()?;
        let installed = self.service.installed_version(&binary, &self.cancel).await?;
        info!(installed = %installed, bundled = %bundled, "Upgrading k3s");

        if bundled < installed {
            if !debug {
                error!(
                    installed = %installed,
                    bundled = %bundled,
                    "Refusing to downgrade k3s"
                );
                return Ok(UpgradeOutcome::RefusedDowngrade { installed, bundled });
            }
            warn!("Downgrading k3s in debug mode");
        }

        self.service.stop(&self.cancel).await?;

        let mut backup = match self.files_to_back_up().and_then(|f| BackupSet::create(&f)) {
            Ok(set) => Some(set),
            Err(e) if debug => {
                warn!("Backup failed, continuing without it: {}", e);
                None
            }
            Err(e) => {
                error!("Backup failed: {}", e);
                self.start_service().await;
                return Err(e);
            }
        };

        let result = self.extract(bundle).await;
        if let Err(e) = &result {
            error!("k3s upgrade failed: {}", e);
            match backup.take() {
                Some(set) => match set.restore() {
                    Ok(()) => info!("Previous k3s restored"),
                    Err(restore) => {
                        error!("Restoring previous k3s failed: {}", restore);
                        let kept = set.keep();
                        error!(
                            dir = %kept.display(),
                            "Previous k3s files were kept, copy them back manually"
                        );
                    }
                },
                None => warn!("No backup to restore"),
            }
        }

        // must run even after cancellation
        let started = self.service.start(&CancellationToken::new()).await;

        match (result, started) {
            (Err(e), Err(start)) => {
                error!("Starting k3s failed: {}", start);
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), Err(e)) => Err(e.context("starting k3s")),
            (Ok(()), Ok(())) => {
                info!(version = %bundled, "k3s upgraded");
                Ok(UpgradeOutcome::Upgraded {
                    from: installed,
                    to: bundled,
                })
            }
        }
    }

    async fn extract(&self, bundle: &Bundle) -> Result<()> {
        let callbacks = placement_callbacks(&self.paths)?;
        bundle.k3s_archive()?.extract(&self.cancel, callbacks).await
    }

    async fn start_service(&self) {
        if let Err(e) = self.service.start(&CancellationToken::new()).await {
            error!("Starting k3s failed: {}", e);
        }
    }
}
