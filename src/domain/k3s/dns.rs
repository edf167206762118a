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

//! CoreDNS in an air-gapped node needs at least one nameserver; when the
//! host has none, k3s gets a resolv file of its own.

use super::K3sPaths;
use crate::infrastructure::constants::{CONFIG_FILE_MODE, K3S_RESOLV_CONF_CONTENT};
use crate::shared::error::Result;
use crate::shared::fs::write_with_mode;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Whether `resolv_conf` has a `nameserver` line. A missing file has none.
pub fn has_nameserver(resolv_conf: &Path) -> Result<bool> {
    match std::fs::read_to_string(resolv_conf) {
        Ok(content) => Ok(content
            .lines()
            .any(|line| line.trim_start().starts_with("nameserver"))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Write the synthetic resolv file if the system one is unusable. Returns
/// its path when k3s should be pointed at it.
pub fn ensure_resolv_conf(paths: &K3sPaths) -> Result<Option<PathBuf>> {
    if has_nameserver(&paths.system_resolv_conf)? {
        debug!("Nameserver found, no fix needed");
        return Ok(None);
    }

    info!(
        path = %paths.resolv_conf.display(),
        "Nameserver is not found, writing resolv file for k3s"
    );
    if let Some(dir) = paths.resolv_conf.parent() {
        std::fs::create_dir_all(dir)?;
    }
    write_with_mode(
        &paths.resolv_conf,
        K3S_RESOLV_CONF_CONTENT.as_bytes(),
        CONFIG_FILE_MODE,
    )?;
    Ok(Some(paths.resolv_conf.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_existing_nameserver_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let paths = K3sPaths::under(dir.path());
        std::fs::create_dir_all(paths.system_resolv_conf.parent().unwrap()).unwrap();
        std::fs::write(&paths.system_resolv_conf, "# local\n  nameserver 10.0.0.2\n").unwrap();

        assert_eq!(ensure_resolv_conf(&paths).unwrap(), None);
        assert!(!paths.resolv_conf.exists());
    }

    #[test]
    fn test_missing_or_empty_resolv_conf() {
        let dir = tempfile::tempdir().unwrap();
        let paths = K3sPaths::under(dir.path());

        let written = ensure_resolv_conf(&paths).unwrap().unwrap();
        assert_eq!(
            std::fs::read_to_string(&written).unwrap(),
            "nameserver 127.0.0.1:9999\n"
        );

        std::fs::write(&paths.system_resolv_conf, "search lan\n").unwrap();
        assert!(ensure_resolv_conf(&paths).unwrap().is_some());
    }
}
