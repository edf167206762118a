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

//! Helm release operations, driven through the `helm` binary.

use crate::domain::chart::spec::ChartSpec;
use crate::shared::error::{HomeError, Result};
use crate::shared::process::Command;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// stderr fragments helm prints when an operation runs out of time.
const TIMEOUT_MARKERS: [&str; 3] = [
    "context deadline exceeded",
    "timed out waiting for the condition",
    "would exceed context deadline",
];

#[async_trait::async_trait]
pub trait HelmBackend: Send + Sync {
    async fn add_repo(&self, name: &str, url: &str, cancel: &CancellationToken) -> Result<()>;

    /// Install the release. Returns helm's output, including chart notes.
    async fn install(&self, spec: &ChartSpec, cancel: &CancellationToken) -> Result<String>;

    async fn upgrade(&self, spec: &ChartSpec, cancel: &CancellationToken) -> Result<String>;

    /// Roll the release back to its previous revision.
    async fn rollback(&self, spec: &ChartSpec, cancel: &CancellationToken) -> Result<()>;
}

/// Whether a helm failure is a timeout rather than a plain error.
pub fn classify_error(err: HomeError) -> HomeError {
    match err {
        HomeError::Subprocess {
            ref command,
            ref stderr_tail,
            ..
        } if TIMEOUT_MARKERS.iter().any(|m| stderr_tail.contains(m)) => {
            HomeError::timeout(format!("{}: {}", command, stderr_tail))
        }
        other => other,
    }
}

pub struct HelmCli {
    binary: String,
    kubeconfig: PathBuf,
    kube_context: Option<String>,
}

impl HelmCli {
    pub fn new(kubeconfig: impl Into<PathBuf>, kube_context: Option<String>) -> Self {
        Self {
            binary: "helm".to_string(),
            kubeconfig: kubeconfig.into(),
            kube_context,
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    fn base_args(&self) -> Vec<String> {
        let mut args = vec![
            "--kubeconfig".to_string(),
            self.kubeconfig.display().to_string(),
        ];
        if let Some(context) = &self.kube_context {
            args.push("--kube-context".to_string());
            args.push(context.clone());
        }
        args
    }

    /// Arguments for `helm install` / `helm upgrade`.
    pub fn release_args(&self, action: &str, spec: &ChartSpec) -> Vec<String> {
        let mut args = vec![
            action.to_string(),
            spec.release_name.clone(),
            spec.chart.reference(),
            "--namespace".to_string(),
            spec.namespace.clone(),
            "--values".to_string(),
            "-".to_string(),
            "--timeout".to_string(),
            spec.helm_timeout(),
        ];
        if spec.create_namespace {
            args.push("--create-namespace".to_string());
        }
        if spec.wait {
            args.push("--wait".to_string());
        }
        if spec.wait_for_jobs {
            args.push("--wait-for-jobs".to_string());
        }
        if action == "upgrade" && spec.reset_values {
            args.push("--reset-values".to_string());
        }
        if let Some(version) = &spec.version {
            args.push("--version".to_string());
            args.push(version.clone());
        }
        args.extend(self.base_args());
        args
    }

    async fn run_release(
        &self,
        action: &str,
        spec: &ChartSpec,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let output = Arc::new(Mutex::new(Vec::new()));
        let sink = output.clone();

        Command::new(&self.binary)
            .args(self.release_args(action, spec))
            .stdin_bytes(spec.values.clone())
            .on_stdout(move |line| {
                info!("{}", line);
                if let Ok(mut lines) = sink.lock() {
                    lines.push(line);
                }
            })
            .on_stderr(|line| debug!("helm: {}", line))
            .run(cancel)
            .await
            .map_err(classify_error)?;

        let output = output
            .lock()
            .map(|lines| lines.join("\n"))
            .unwrap_or_default();
        Ok(output)
    }
}

#[async_trait::async_trait]
impl HelmBackend for HelmCli {
    async fn add_repo(&self, name: &str, url: &str, cancel: &CancellationToken) -> Result<()> {
        Command::new(&self.binary)
            .args(["repo", "add", "--force-update", name, url])
            .on_stderr(|line| debug!("helm: {}", line))
            .run(cancel)
            .await?;
        Command::new(&self.binary)
            .args(["repo", "update", name])
            .on_stderr(|line| debug!("helm: {}", line))
            .run(cancel)
            .await
    }

    async fn install(&self, spec: &ChartSpec, cancel: &CancellationToken) -> Result<String> {
        self.run_release("install", spec, cancel).await
    }

    async fn upgrade(&self, spec: &ChartSpec, cancel: &CancellationToken) -> Result<String> {
        self.run_release("upgrade", spec, cancel).await
    }

    async fn rollback(&self, spec: &ChartSpec, cancel: &CancellationToken) -> Result<()> {
        let mut args = vec![
            "rollback".to_string(),
            spec.release_name.clone(),
            "--namespace".to_string(),
            spec.namespace.clone(),
            "--wait".to_string(),
            "--timeout".to_string(),
            spec.helm_timeout(),
        ];
        args.extend(self.base_args());

        Command::new(&self.binary)
            .args(args)
            .on_stderr(|line| debug!("helm: {}", line))
            .run(cancel)
            .await
            .map_err(classify_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chart::spec::ChartLocation;

    #[test]
    fn test_release_args() {
        let helm = HelmCli::new("/etc/rancher/k3s/k3s.yaml", Some("ctx".to_string()));
        let spec = ChartSpec::new(
            ChartLocation::Bundle(PathBuf::from("/b/wekahome-3.0.0.tgz")),
            String::new(),
            None,
        );

        let args = helm.release_args("upgrade", &spec).join(" ");
        assert!(args.starts_with("upgrade wekahome /b/wekahome-3.0.0.tgz --namespace home-weka-io"));
        assert!(args.contains("--values - --timeout 5m0s"));
        assert!(args.contains("--reset-values"));
        assert!(args.ends_with("--kubeconfig /etc/rancher/k3s/k3s.yaml --kube-context ctx"));

        let install = helm.release_args("install", &spec).join(" ");
        assert!(!install.contains("--reset-values"));
        assert!(install.contains("--create-namespace --wait --wait-for-jobs"));
    }

    #[test]
    fn test_timeout_classification() {
        let err = HomeError::subprocess(
            "helm upgrade",
            "exit status: 1",
            "Error: UPGRADE FAILED: context deadline exceeded",
        );
        assert!(classify_error(err).is_timeout());

        let err = HomeError::subprocess("helm upgrade", "exit status: 1", "Error: bad chart");
        assert!(!classify_error(err).is_timeout());
    }
}
