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

//! Cluster aliases, `~/.config/home-cli/aliases.toml`.

use crate::infrastructure::constants::CONFIG_FILE_MODE;
use crate::shared::error::{HomeError, Result};
use crate::shared::fs::write_with_mode;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aliases {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl Aliases {
    /// Load from `path`; a missing file is an empty alias set.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut entries = BTreeMap::new();
        if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let table: toml::Table = toml::from_str(&content)
                .map_err(|e| HomeError::decode(Some(path.display().to_string()), e))?;
            for (alias, value) in table {
                match value {
                    toml::Value::String(target) => {
                        entries.insert(alias, target);
                    }
                    other => warn!(
                        "ignoring alias {} in {}: expected a string, got {}",
                        alias,
                        path.display(),
                        other.type_str()
                    ),
                }
            }
        }
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Alias target, or `name` itself when it is not an alias.
    pub fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        self.entries.get(name).map(String::as_str).unwrap_or(name)
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    pub fn set(&mut self, alias: &str, target: &str, force: bool) -> Result<()> {
        if let Some(existing) = self.entries.get(alias) {
            if !force && existing != target {
                return Err(HomeError::validation(format!(
                    "alias {} already points to {}",
                    alias, existing
                )));
            }
        }
        self.entries.insert(alias.to_string(), target.to_string());
        Ok(())
    }

    pub fn remove(&mut self, alias: &str) -> Result<String> {
        self.entries
            .remove(alias)
            .ok_or_else(|| HomeError::validation(format!("alias {} does not exist", alias)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = toml::to_string(&self.entries)?;
        write_with_mode(&self.path, data.as_bytes(), CONFIG_FILE_MODE)?;
        Ok(())
    }

    /// Cluster id for a command-line `<cluster>` argument: an alias or a UUID.
    pub fn parse_cluster_identifier(&self, input: &str) -> Result<String> {
        let resolved = self.resolve(input);
        Uuid::parse_str(resolved)
            .map(|id| id.to_string())
            .map_err(|_| {
                HomeError::validation(format!(
                    "{} is neither a cluster ID nor a known alias",
                    input
                ))
            })
    }
}
