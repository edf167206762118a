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

//! `~/.config/home-cli/config.toml`

use crate::infrastructure::constants::{
    ALIASES_FILE, CONFIG_DIR, CONFIG_FILE_MODE, DEFAULT_CLOUD_URL, SITE_CONFIG_FILE,
};
use crate::shared::error::{HomeError, Result};
use crate::shared::fs::write_with_mode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Site name used for the legacy single-site layout and the template.
pub const DEFAULT_SITE_NAME: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    pub dir: PathBuf,
    pub config_file: PathBuf,
    pub aliases_file: PathBuf,
}

impl ConfigPaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            config_file: dir.join(SITE_CONFIG_FILE),
            aliases_file: dir.join(ALIASES_FILE),
            dir,
        }
    }

    pub fn from_home() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| HomeError::validation("cannot determine the home directory"))?;
        Ok(Self::in_dir(home.join(CONFIG_DIR)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub cloud_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cloud_url: String,
    #[serde(default)]
    pub default_site: String,
    #[serde(default)]
    pub sites: BTreeMap<String, SiteConfig>,
}

/// Outcome of [`CliConfig::load_or_init`].
#[derive(Debug)]
pub enum ConfigState {
    Ready(CliConfig),
    /// No config existed; a template was written to this path.
    TemplateCreated(PathBuf),
}

impl CliConfig {
    pub fn template() -> Self {
        let mut sites = BTreeMap::new();
        sites.insert(
            DEFAULT_SITE_NAME.to_string(),
            SiteConfig {
                api_key: String::new(),
                cloud_url: DEFAULT_CLOUD_URL.to_string(),
            },
        );
        Self {
            default_site: DEFAULT_SITE_NAME.to_string(),
            sites,
            ..Default::default()
        }
    }

    pub fn read(path: &Path) -> Result<Self> {
        debug!("Reading configuration from {}", path.display());
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| HomeError::decode(Some(path.display().to_string()), e))
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        debug!("Writing configuration to {}", path.display());
        let data = toml::to_string(self)?;
        write_with_mode(path, data.as_bytes(), CONFIG_FILE_MODE)?;
        Ok(())
    }

    pub fn load_or_init(paths: &ConfigPaths) -> Result<ConfigState> {
        if !paths.config_file.exists() {
            warn!(
                "Config file {} does not exist, creating default config file",
                paths.config_file.display()
            );
            std::fs::create_dir_all(&paths.dir)?;
            Self::template().write(&paths.config_file)?;
            return Ok(ConfigState::TemplateCreated(paths.config_file.clone()));
        }
        Ok(ConfigState::Ready(Self::read(&paths.config_file)?))
    }

    fn is_legacy(&self, requested: Option<&str>) -> bool {
        requested.is_none() && (!self.api_key.is_empty() || !self.cloud_url.is_empty())
    }

    fn site_name<'a>(&'a self, requested: Option<&'a str>) -> Result<&'a str> {
        if self.sites.is_empty() {
            return Err(HomeError::validation("Config error: no sites are configured"));
        }
        let name = match requested {
            Some(name) => name,
            None if self.default_site.is_empty() => {
                return Err(HomeError::validation(
                    "Config error: --site was not specified, and \"default_site\" is not set in the config file",
                ))
            }
            None => self.default_site.as_str(),
        };
        if !self.sites.contains_key(name) {
            return Err(HomeError::validation(format!(
                "Config error: site {} has no corresponding [sites.{}] section in the config file",
                name, name
            )));
        }
        Ok(name)
    }

    /// Resolve the active site: `requested`, then the legacy top-level keys,
    /// then `default_site`.
    pub fn site(&self, requested: Option<&str>) -> Result<(String, SiteConfig)> {
        let (name, site) = if self.is_legacy(requested) {
            if !self.default_site.is_empty() {
                warn!("Config warning: \"default_site\" is set, but so are the global \"api_key\" and \"cloud_url\"");
            }
            (
                DEFAULT_SITE_NAME.to_string(),
                SiteConfig {
                    api_key: self.api_key.clone(),
                    cloud_url: self.cloud_url.clone(),
                },
            )
        } else {
            let name = self.site_name(requested)?;
            (name.to_string(), self.sites[name].clone())
        };

        if site.api_key.is_empty() {
            warn!("config error: \"api_key\" is unset for site {}", name);
        }
        if site.cloud_url.is_empty() {
            warn!("config error: \"cloud_url\" is unset for site {}", name);
        }
        Ok((name, site))
    }

    /// Apply `update` to the active site's settings. Returns the site name.
    pub fn update_site(
        &mut self,
        requested: Option<&str>,
        update: impl FnOnce(&mut SiteConfig),
    ) -> Result<String> {
        if self.is_legacy(requested) {
            let mut site = SiteConfig {
                api_key: std::mem::take(&mut self.api_key),
                cloud_url: std::mem::take(&mut self.cloud_url),
            };
            update(&mut site);
            self.api_key = site.api_key;
            self.cloud_url = site.cloud_url;
            return Ok(DEFAULT_SITE_NAME.to_string());
        }

        let name = self.site_name(requested)?.to_string();
        if let Some(site) = self.sites.get_mut(&name) {
            update(site);
        }
        Ok(name)
    }
}
