//! `homecli local`: install and upgrade Weka Home on this node.

use super::Context;
use crate::domain::chart::{
    resolve_kubeconfig, ChartDriver, HelmOptions, LocationOverride, ValuesGenerator,
};
use crate::domain::config::Configuration;
use crate::domain::k3s::tls::{setup_tls, EndpointWait};
use crate::domain::k3s::{
    ImageImporter, InstallConfig, K3sInstaller, K3sPaths, SystemService, UpgradeOutcome, Upgrader,
};
use crate::infrastructure::bundle::Bundle;
use crate::infrastructure::constants::TLS_NAMESPACE;
use crate::infrastructure::helm::HelmCli;
use crate::infrastructure::kubernetes::{HomeKubeClient, HomeKubeClientImpl};
use crate::shared::HomeError;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
pub struct LocalCommand {
    #[command(subcommand)]
    pub action: LocalAction,
}

#[derive(Subcommand, Debug)]
pub enum LocalAction {
    /// Install k3s from the bundle and deploy Weka Home on it
    Setup(InstallArgs),
    /// Upgrade k3s from the bundle and the Weka Home release
    Upgrade(InstallArgs),
    /// Print the chart values generated from a configuration
    Values {
        /// Configuration as JSON, or a path to a JSON file
        #[arg(long, value_name = "JSON|PATH")]
        config: Option<String>,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct InstallArgs {
    /// Configuration as JSON, or a path to a JSON file
    #[arg(long, value_name = "JSON|PATH")]
    pub config: Option<String>,

    /// Network interface for k3s; the first running one by default
    #[arg(long)]
    pub iface: Option<String>,

    /// Node IP; overrides "node_ip" from the configuration
    #[arg(long)]
    pub ip: Option<String>,

    /// Bundle directory; by default the release directory of this binary
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Fetch the chart from the public repository instead of the bundle
    #[arg(long, conflicts_with = "chart")]
    pub remote_chart: bool,

    /// Chart archive or directory to install
    #[arg(long)]
    pub chart: Option<PathBuf>,

    /// Chart version to request with --remote-chart
    #[arg(long, requires = "remote_chart")]
    pub chart_version: Option<String>,

    /// Kubeconfig for helm and the TLS step
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,
}

/// Installer configuration from `--config`, with `--ip` applied.
pub fn load_configuration(config: Option<&str>, ip: Option<&str>) -> anyhow::Result<Configuration> {
    let mut conf = match config {
        Some(input) => Configuration::from_json_or_path(input)?,
        None => Configuration::default(),
    };
    if let Some(ip) = ip {
        conf.node_ip = Some(ip.to_string());
        conf.validate()?;
    }
    Ok(conf)
}

impl InstallArgs {
    pub fn helm_options(&self, debug: bool) -> HelmOptions {
        HelmOptions {
            location: LocationOverride {
                path: self.chart.clone(),
                remote_download: self.remote_chart,
                version: self.chart_version.clone(),
            },
            namespace: None,
            debug,
        }
    }
}

impl LocalCommand {
    pub async fn execute(&self, ctx: &Context) -> anyhow::Result<()> {
        match &self.action {
            LocalAction::Setup(args) => setup(ctx, args).await,
            LocalAction::Upgrade(args) => upgrade(ctx, args).await,
            LocalAction::Values { config } => {
                let conf = load_configuration(config.as_deref(), None)?;
                print!("{}", ValuesGenerator::standard()?.generate_yaml(&conf)?);
                Ok(())
            }
        }
    }
}

struct ClusterAccess {
    kubeconfig: PathBuf,
    kube: HomeKubeClientImpl,
}

async fn cluster_access(kubeconfig: Option<&Path>) -> anyhow::Result<ClusterAccess> {
    let kubeconfig = resolve_kubeconfig(kubeconfig)?;
    info!(kubeconfig = %kubeconfig.display(), "Using kubeconfig");
    let kube =
        HomeKubeClientImpl::new_with_config(TLS_NAMESPACE.to_string(), Some(&kubeconfig), None)
            .await?;
    Ok(ClusterAccess { kubeconfig, kube })
}

/// Certificate, bundle images and the release, once k3s is up.
async fn deploy(
    ctx: &Context,
    args: &InstallArgs,
    conf: &Configuration,
    bundle: &Bundle,
    paths: &K3sPaths,
    upgrade: bool,
) -> anyhow::Result<()> {
    let access = cluster_access(args.kubeconfig.as_deref()).await?;

    match setup_tls(&access.kube, &conf.tls, EndpointWait::default(), &ctx.cancel).await {
        Ok(()) | Err(HomeError::NoTls) => {}
        Err(e) => return Err(e.into()),
    }

    ImageImporter::new(paths.binary(), ctx.cancel.clone())
        .import_bundle_images(bundle, false)
        .await?;

    let helm = HelmCli::new(access.kubeconfig.clone(), None);
    let driver = ChartDriver::new(Arc::new(helm))?.with_event_tap(access.kube.get_client());
    let opts = args.helm_options(ctx.debug);
    if upgrade {
        driver.upgrade(conf, &opts, Some(bundle), &ctx.cancel).await?;
    } else {
        driver.install(conf, &opts, Some(bundle), &ctx.cancel).await?;
    }
    Ok(())
}

async fn setup(ctx: &Context, args: &InstallArgs) -> anyhow::Result<()> {
    let conf = load_configuration(args.config.as_deref(), args.ip.as_deref())?;
    let bundle = Bundle::resolve(args.bundle.as_deref())?;
    let paths = K3sPaths::default();

    let installer = K3sInstaller::new(ctx.cancel.clone()).with_paths(paths.clone());
    let install = InstallConfig {
        configuration: conf.clone(),
        iface: args.iface.clone(),
        debug: ctx.debug,
    };
    let network = installer.install(&bundle, &install).await?;
    info!(node_ip = %network.node_ip, iface = %network.iface, "k3s is installed");

    deploy(ctx, args, &conf, &bundle, &paths, false).await?;
    println!("Weka Home is installed on {}", network.hostname);
    Ok(())
}

async fn upgrade(ctx: &Context, args: &InstallArgs) -> anyhow::Result<()> {
    let conf = load_configuration(args.config.as_deref(), args.ip.as_deref())?;
    let bundle = Bundle::resolve(args.bundle.as_deref())?;
    let paths = K3sPaths::default();

    let upgrader = Upgrader::new(Arc::new(SystemService::new()), ctx.cancel.clone())
        .with_paths(paths.clone());
    match upgrader.upgrade(&bundle, ctx.debug).await? {
        UpgradeOutcome::RefusedDowngrade { installed, bundled } => {
            warn!("Bundle k3s {} is older than installed {}, nothing was changed", bundled, installed);
            return Ok(());
        }
        UpgradeOutcome::Upgraded { from, to } => info!(from = %from, to = %to, "k3s upgraded"),
    }

    deploy(ctx, args, &conf, &bundle, &paths, true).await?;
    println!("Weka Home is upgraded");
    Ok(())
}
