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

use super::dns::ensure_resolv_conf;
use super::firewall::configure_firewall;
use super::network::{list_interfaces, select_network, NodeNetwork};
use super::K3sPaths;
use crate::domain::config::Configuration;
use crate::infrastructure::bundle::{Bundle, TarCallback, TarEntry};
use crate::infrastructure::constants::{
    K3S_AIRGAP_GLOB, K3S_BINARY_MODE, K3S_BINARY_NAME, K3S_IMAGE_MODE, K3S_INSTALL_SCRIPT,
    K3S_LOCAL_STORAGE_PATH,
};
use crate::shared::error::{HomeError, Result};
use crate::shared::fs::{remove_dir_if_exists, remove_file_if_exists, write_from_reader};
use crate::shared::process::Command;
use regex::Regex;
use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Default)]
pub struct InstallConfig {
    pub configuration: Configuration,
    /// Interface for the k3s network; the first usable one when unset.
    pub iface: Option<String>,
    /// Keep going over an existing install and skip cleanup on failure.
    pub debug: bool,
}

/// Re-emit a line of install script output at the level it announces with
/// a `[LEVEL]` prefix.
pub fn log_script_line(line: &str) {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"(\[(.+?)\]\s*)?(.+)").ok());

    let Some(caps) = pattern.as_ref().and_then(|re| re.captures(line)) else {
        if !line.trim().is_empty() {
            info!("{}", line);
        }
        return;
    };
    let message = caps.get(3).map_or(line, |m| m.as_str());
    match caps.get(2).map(|m| m.as_str().to_ascii_uppercase()) {
        None => info!("{}", message),
        Some(level) => match level.as_str() {
            "INFO" => info!("{}", message),
            "WARN" | "WARNING" => warn!("{}", message),
            "ERROR" | "FATAL" => error!("{}", message),
            _ => debug!("{}", message),
        },
    }
}

fn place_file(target: &Path, reader: &mut dyn Read, mode: u32) -> Result<()> {
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir)?;
    }
    if let Err(e) = write_from_reader(target, reader, mode) {
        if let Err(rm) = remove_file_if_exists(target) {
            debug!("removing partial {} failed: {}", target.display(), rm);
        }
        return Err(e.into());
    }
    Ok(())
}

/// Callbacks that put the k3s binary and the airgap images in place, in
/// that order.
pub fn placement_callbacks(paths: &K3sPaths) -> Result<Vec<TarCallback>> {
    let binary = paths.binary();
    let images_dir = paths.images_dir.clone();

    Ok(vec![
        TarCallback::new(K3S_BINARY_NAME, move |_: &TarEntry, reader: &mut dyn Read| {
            info!(path = %binary.display(), "Copying k3s binary");
            place_file(&binary, reader, K3S_BINARY_MODE)
        })?,
        TarCallback::new(K3S_AIRGAP_GLOB, move |entry: &TarEntry, reader: &mut dyn Read| {
            let target = images_dir.join(&entry.name);
            info!(path = %target.display(), "Copying airgap images");
            place_file(&target, reader, K3S_IMAGE_MODE)
        })?,
    ])
}

/// `INSTALL_K3S_EXEC` for the node.
pub fn install_exec(network: &NodeNetwork, conf: &Configuration) -> String {
    let mut args = vec![
        format!("--node-ip={}", network.node_ip),
        format!("--flannel-iface={}", network.iface),
        format!("--default-local-storage-path={}", K3S_LOCAL_STORAGE_PATH),
    ];
    if !conf.external_ips.is_empty() {
        args.push(format!("--node-external-ip={}", conf.external_ips.join(",")));
    }
    args.extend(conf.k3s_args.iter().cloned());
    args.join(" ")
}

pub struct K3sInstaller {
    paths: K3sPaths,
    shell: String,
    cancel: CancellationToken,
}

impl K3sInstaller {
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            paths: K3sPaths::default(),
            shell: "sh".to_string(),
            cancel,
        }
    }

    pub fn with_paths(mut self, paths: K3sPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Shell the install script is piped into.
    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn paths(&self) -> &K3sPaths {
        &self.paths
    }

    pub fn install_env(
        &self,
        network: &NodeNetwork,
        resolv_conf: Option<&Path>,
        conf: &Configuration,
    ) -> Vec<(String, String)> {
        let mut env = vec![
            ("K3S_HOSTNAME".to_string(), network.hostname.clone()),
            ("K3S_NODE_NAME".to_string(), network.hostname.clone()),
        ];
        if let Some(path) = resolv_conf {
            env.push(("K3S_RESOLV_CONF".to_string(), path.display().to_string()));
        }
        env.extend(
            [
                (
                    "INSTALL_K3S_BIN_DIR",
                    self.paths.bin_dir.display().to_string(),
                ),
                ("INSTALL_K3S_SKIP_DOWNLOAD", "true".to_string()),
                ("INSTALL_K3S_SELINUX_WARN", "true".to_string()),
                ("INSTALL_K3S_SKIP_SELINUX_RPM", "true".to_string()),
                ("INSTALL_K3S_EXEC", install_exec(network, conf)),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v)),
        );
        env
    }

    /// Install k3s from the bundle. Returns the network it was set up on.
    pub async fn install(&self, bundle: &Bundle, config: &InstallConfig) -> Result<NodeNetwork> {
        if self.paths.is_installed() && !config.debug {
            return Err(HomeError::AlreadyInstalled);
        }

        let manifest = bundle.manifest()?;
        info!(version = %manifest.k3s, "Installing k3s");

        let conf = &config.configuration;
        let interfaces = list_interfaces(&self.cancel).await?;
        let network = select_network(
            &interfaces,
            config.iface.as_deref(),
            conf.node_ip.as_deref(),
            conf.host.as_deref(),
        )?;

        configure_firewall(&self.cancel).await;

        match self.install_on(bundle, &network, conf).await {
            Ok(()) => {
                info!("Install completed");
                Ok(network)
            }
            Err(err) => {
                if err.is_cancelled() {
                    info!("Setup was cancelled");
                }
                if !config.debug {
                    self.cleanup().await;
                }
                Err(err)
            }
        }
    }

    /// Extraction and install script for an already selected network.
    pub async fn install_on(
        &self,
        bundle: &Bundle,
        network: &NodeNetwork,
        conf: &Configuration,
    ) -> Result<()> {
        let resolv_conf = ensure_resolv_conf(&self.paths)?;

        let script = Arc::new(Mutex::new(Vec::new()));
        let sink = script.clone();
        let mut callbacks = placement_callbacks(&self.paths)?;
        callbacks.push(TarCallback::new(
            K3S_INSTALL_SCRIPT,
            move |_: &TarEntry, reader: &mut dyn Read| {
                let mut buf = sink
                    .lock()
                    .map_err(|_| HomeError::bundle("install script buffer poisoned"))?;
                reader.read_to_end(&mut buf)?;
                Ok(())
            },
        )?);

        bundle.k3s_archive()?.extract(&self.cancel, callbacks).await?;

        let script = script
            .lock()
            .map(|buf| buf.clone())
            .map_err(|_| HomeError::bundle("install script buffer poisoned"))?;

        info!("Starting k3s install");
        let env = self.install_env(network, resolv_conf.as_deref(), conf);
        for (key, value) in &env {
            debug!("{}={}", key, value);
        }
        Command::new(&self.shell)
            .args(["-s", "-", "server"])
            .envs(env)
            .stdin_bytes(script)
            .on_stdout(|line| log_script_line(&line))
            .on_stderr(|line| log_script_line(&line))
            .run(&self.cancel)
            .await
            .map_err(|e| e.context(K3S_INSTALL_SCRIPT))
    }

    /// Undo a partial install: run the uninstall script and remove what was
    /// placed on disk.
    pub async fn cleanup(&self) {
        info!("Cleaning up installation");

        let uninstall = self.paths.uninstall_script();
        if uninstall.exists() {
            // cleanup must run even when the install itself was cancelled
            let token = CancellationToken::new();
            if let Err(e) = Command::new(uninstall.display().to_string())
                .on_stdout(|line| debug!("{}", line))
                .run(&token)
                .await
            {
                warn!("k3s uninstall failed: {}", e);
            }
        }

        if let Err(e) = remove_dir_if_exists(&self.paths.images_dir) {
            warn!("removing {} failed: {}", self.paths.images_dir.display(), e);
        }
        for path in [self.paths.binary(), self.paths.resolv_conf.clone()] {
            if let Err(e) = remove_file_if_exists(&path) {
                warn!("removing {} failed: {}", path.display(), e);
            }
        }
    }
}
