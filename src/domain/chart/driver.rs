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

//! Installs and upgrades the `wekahome` release.

use super::generator::ValuesGenerator;
use super::spec::{ChartLocation, ChartSpec};
use crate::domain::config::Configuration;
use crate::infrastructure::bundle::Bundle;
use crate::infrastructure::constants::{CHART_REPO_NAME, CHART_REPO_URL, K3S_KUBECONFIG};
use crate::infrastructure::helm::HelmBackend;
use crate::infrastructure::kubernetes::events::{
    report_warnings, watch_warning_events, WarningEvent,
};
use crate::shared::error::{HomeError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Operator overrides of where the chart comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationOverride {
    /// Chart archive or directory.
    pub path: Option<PathBuf>,
    /// Fetch from the public chart repository.
    pub remote_download: bool,
    /// Chart version to request from the repository.
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HelmOptions {
    pub location: LocationOverride,
    pub namespace: Option<String>,
    /// Skip the rollback of a failed upgrade.
    pub debug: bool,
}

/// Kubeconfig to use: `explicit`, then the k3s one, then `$KUBECONFIG`,
/// then `~/.kube/config`.
pub fn resolve_kubeconfig(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let k3s = PathBuf::from(K3S_KUBECONFIG);
    if k3s.exists() {
        return Ok(k3s);
    }
    if let Some(path) = std::env::var_os("KUBECONFIG").filter(|p| !p.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let home = dirs::home_dir()
        .ok_or_else(|| HomeError::validation("unable to read kubeconfig: no home directory"))?;
    Ok(home.join(".kube").join("config"))
}

type EventTap = (CancellationToken, JoinHandle<Vec<WarningEvent>>);

pub struct ChartDriver {
    helm: Arc<dyn HelmBackend>,
    generator: ValuesGenerator,
    kube: Option<kube::Client>,
}

impl ChartDriver {
    pub fn new(helm: Arc<dyn HelmBackend>) -> Result<Self> {
        Ok(Self {
            helm,
            generator: ValuesGenerator::standard()?,
            kube: None,
        })
    }

    /// Tap `Warning` events in the release namespace while helm runs.
    pub fn with_event_tap(mut self, client: kube::Client) -> Self {
        self.kube = Some(client);
        self
    }

    /// Pick the chart: explicit path, then the public repository, then the
    /// archive shipped in the bundle.
    pub async fn chart_location(
        &self,
        location: &LocationOverride,
        bundle: Option<&Bundle>,
        cancel: &CancellationToken,
    ) -> Result<ChartLocation> {
        debug!(?location, "Determining chart location");

        if let Some(path) = &location.path {
            return Ok(ChartLocation::Path(path.clone()));
        }

        if location.remote_download {
            self.helm
                .add_repo(CHART_REPO_NAME, CHART_REPO_URL, cancel)
                .await
                .map_err(|e| e.context("failed adding chart repo"))?;
            return Ok(ChartLocation::remote());
        }

        if let Some(bundle) = bundle.filter(|b| b.is_bundled()) {
            return match bundle.chart()? {
                Some(path) => Ok(ChartLocation::Bundle(path)),
                None => Err(HomeError::bundle("unable to find wekahome chart in bundle")),
            };
        }

        Err(HomeError::validation("unable to determine chart location"))
    }

    pub fn values(&self, conf: &Configuration) -> Result<String> {
        let values = self.generator.generate_yaml(conf)?;
        debug!("Generated values:\n{}", values);
        Ok(values)
    }

    pub async fn chart_spec(
        &self,
        conf: &Configuration,
        opts: &HelmOptions,
        bundle: Option<&Bundle>,
        cancel: &CancellationToken,
    ) -> Result<ChartSpec> {
        let chart = self.chart_location(&opts.location, bundle, cancel).await?;
        let values = self.values(conf)?;
        Ok(ChartSpec::new(chart, values, opts.namespace.as_deref())
            .with_version(opts.location.version.clone()))
    }

    fn start_tap(&self, spec: &ChartSpec, cancel: &CancellationToken) -> Option<EventTap> {
        let client = self.kube.clone()?;
        let stop = cancel.child_token();
        let handle = watch_warning_events(client, &spec.namespace, stop.clone());
        Some((stop, handle))
    }

    async fn stop_tap(tap: Option<EventTap>, failed: bool, cancel: &CancellationToken) {
        let Some((stop, handle)) = tap else {
            return;
        };
        stop.cancel();
        match handle.await {
            Ok(warnings) if failed && !cancel.is_cancelled() => report_warnings(&warnings),
            Ok(_) => {}
            Err(e) => debug!("event tap ended abnormally: {}", e),
        }
    }

    pub async fn install(
        &self,
        conf: &Configuration,
        opts: &HelmOptions,
        bundle: Option<&Bundle>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let spec = self
            .chart_spec(conf, opts, bundle, cancel)
            .await
            .map_err(|e| e.context("failed to prepare chart spec"))?;

        info!(
            namespace = %spec.namespace,
            chart = %spec.chart,
            release = %spec.release_name,
            "Installing chart"
        );

        let tap = self.start_tap(&spec, cancel);
        let result = self.helm.install(&spec, cancel).await;
        Self::stop_tap(tap, result.is_err(), cancel).await;

        let notes = result?;
        if !notes.is_empty() {
            debug!("{}", notes);
        }
        info!("Chart installed");
        Ok(())
    }

    pub async fn upgrade(
        &self,
        conf: &Configuration,
        opts: &HelmOptions,
        bundle: Option<&Bundle>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let spec = self
            .chart_spec(conf, opts, bundle, cancel)
            .await
            .map_err(|e| e.context("failed to prepare chart spec"))?;

        info!(
            namespace = %spec.namespace,
            chart = %spec.chart,
            release = %spec.release_name,
            "Upgrading chart"
        );

        let tap = self.start_tap(&spec, cancel);
        let result = self.helm.upgrade(&spec, cancel).await;
        Self::stop_tap(tap, result.is_err(), cancel).await;

        match result {
            Ok(_) => {
                info!("Chart upgraded");
                Ok(())
            }
            Err(err) => {
                if !opts.debug && !err.is_cancelled() {
                    warn!("Rolling back release");
                    if let Err(e) = self.helm.rollback(&spec, cancel).await {
                        error!("Rollback failed: {}", e);
                    }
                }
                error!("Upgrade failed: {}", err);
                Err(err)
            }
        }
    }
}
