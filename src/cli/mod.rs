pub mod api;
pub mod commands;
pub mod config;
pub mod display;
pub mod local;

pub use commands::{CliArgs, Commands};

use crate::domain::config::{Aliases, CliConfig, ConfigPaths, ConfigState};
use crate::infrastructure::api::ApiClient;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Raised when the site config did not exist and a template was written in
/// its place. The binary exits with status 1 on it.
#[derive(Debug, thiserror::Error)]
#[error(
    "A default configuration was written to {}; set \"api_key\" and \"cloud_url\" there and run again",
    .0.display()
)]
pub struct TemplateCreated(pub PathBuf);

/// Global flags and process-wide state handed to every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub site: Option<String>,
    pub debug: bool,
    pub cancel: CancellationToken,
    paths: Option<ConfigPaths>,
}

impl Context {
    pub fn new(site: Option<String>, debug: bool, cancel: CancellationToken) -> Self {
        Self {
            site,
            debug,
            cancel,
            paths: None,
        }
    }

    /// Read config and aliases from `dir` instead of the home directory.
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths = Some(ConfigPaths::in_dir(dir));
        self
    }

    pub fn config_paths(&self) -> anyhow::Result<ConfigPaths> {
        match &self.paths {
            Some(paths) => Ok(paths.clone()),
            None => Ok(ConfigPaths::from_home()?),
        }
    }

    pub fn load_config(&self) -> anyhow::Result<CliConfig> {
        let paths = self.config_paths()?;
        match CliConfig::load_or_init(&paths)? {
            ConfigState::Ready(config) => Ok(config),
            ConfigState::TemplateCreated(path) => Err(TemplateCreated(path).into()),
        }
    }

    pub fn api_client(&self) -> anyhow::Result<ApiClient> {
        let config = self.load_config()?;
        let (name, site) = config.site(self.site.as_deref())?;
        debug!(site = %name, url = %site.cloud_url, "Using site");
        Ok(ApiClient::new(&site.cloud_url, &site.api_key)?.with_cancellation(self.cancel.clone()))
    }

    pub fn aliases(&self) -> anyhow::Result<Aliases> {
        Ok(Aliases::load(self.config_paths()?.aliases_file)?)
    }

    /// Cluster id for a `<cluster>` argument, which may be an alias.
    pub fn cluster_id(&self, input: &str) -> anyhow::Result<String> {
        Ok(self.aliases()?.parse_cluster_identifier(input)?)
    }
}
