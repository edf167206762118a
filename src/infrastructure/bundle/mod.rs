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

//! Offline installation bundle.
//!
//! Layout:
//!
//! ```text
//! <bundle>/
//!   .bundle              marker
//!   versions.json        manifest
//!   wekahome-<ver>.tgz   chart archive
//!   k3s-*.tar[.gz|tgz]   k3s binary, install.sh, airgap images
//!   images/*.tar[.gz]    extra container images
//! ```

pub mod glob;
pub mod archive;

pub use self::glob::Glob;
pub use self::archive::{CancellableReader, TarArchive, TarCallback, TarEntry};

use crate::infrastructure::constants::{
    BUNDLE_IMAGES_DIR, BUNDLE_MANIFEST_FILE, BUNDLE_MARKER_FILE, CHART_ARCHIVE_GLOB,
};
use crate::shared::error::{HomeError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Contents of `versions.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Chart / application version.
    #[serde(rename = "wekaHome", default)]
    pub weka_home: String,

    /// k3s distribution version, e.g. `v1.28.3+k3s1`.
    #[serde(rename = "k3S", default)]
    pub k3s: String,

    /// Image tarball path (relative to the bundle) to image reference.
    #[serde(rename = "dockerImages", default)]
    pub docker_images: BTreeMap<String, String>,
}

/// Handle to a bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    root: PathBuf,
}

impl Bundle {
    /// Bundle rooted at the parent of the executable's directory
    /// (`<release>/bin/homecli`). The marker is not checked.
    pub fn locate() -> Result<Self> {
        Ok(Self {
            root: Self::default_path()?,
        })
    }

    pub fn default_path() -> Result<PathBuf> {
        let exe = std::env::current_exe()?;
        let exe = std::fs::canonicalize(&exe)?;
        exe.parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or_else(|| {
                HomeError::bundle(format!(
                    "cannot derive bundle directory from {}",
                    exe.display()
                ))
            })
    }

    /// Use `path` as the bundle. Fails unless it is a directory holding the marker.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(HomeError::bundle(format!(
                "bundle directory {} does not exist",
                path.display()
            )));
        }
        if !path.join(BUNDLE_MARKER_FILE).exists() {
            return Err(HomeError::bundle(format!(
                "{} is not a bundle: missing {}",
                path.display(),
                BUNDLE_MARKER_FILE
            )));
        }
        Ok(Self {
            root: path.to_path_buf(),
        })
    }

    /// [`open`](Self::open) an explicit path, or fall back to [`locate`](Self::locate).
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::open(path),
            None => Self::locate(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn is_bundled(&self) -> bool {
        self.root.join(BUNDLE_MARKER_FILE).exists()
    }

    pub fn path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.root.join(relative)
    }

    pub fn manifest(&self) -> Result<Manifest> {
        let path = self.path(BUNDLE_MANIFEST_FILE);
        let data = std::fs::read(&path).map_err(|e| {
            HomeError::bundle(format!("cannot read manifest {}: {}", path.display(), e))
        })?;
        serde_json::from_slice(&data)
            .map_err(|e| HomeError::decode(Some(path.display().to_string()), e))
    }

    /// Regular files directly under `subpath`, sorted by name.
    pub fn walk(&self, subpath: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = self.path(subpath);
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir).map_err(|e| {
            HomeError::bundle(format!("cannot list {}: {}", dir.display(), e))
        })? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// First top-level file whose name matches the glob.
    pub fn find(&self, pattern: &str) -> Result<Option<PathBuf>> {
        let glob = Glob::new(pattern)?;
        Ok(self
            .walk("")?
            .into_iter()
            .find(|p| file_name(p).is_some_and(|n| glob.matches(n))))
    }

    pub fn chart(&self) -> Result<Option<PathBuf>> {
        self.find(CHART_ARCHIVE_GLOB)
    }

    /// The k3s artifact archive (`k3s*.tar`, `k3s*.tar.gz` or `k3s*.tgz`).
    pub fn k3s_archive(&self) -> Result<TarArchive> {
        let re = Regex::new(r"^k3s.*\.(tar(\.gz)?|tgz)$")
            .map_err(|e| HomeError::bundle(e.to_string()))?;
        self.walk("")?
            .into_iter()
            .find(|p| file_name(p).is_some_and(|n| re.is_match(n)))
            .map(TarArchive::new)
            .ok_or_else(|| {
                HomeError::bundle(format!(
                    "no k3s archive found in {}",
                    self.root.display()
                ))
            })
    }

    pub fn image_tarballs(&self) -> Result<Vec<PathBuf>> {
        if !self.path(BUNDLE_IMAGES_DIR).is_dir() {
            return Ok(Vec::new());
        }
        self.walk(BUNDLE_IMAGES_DIR)
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}
