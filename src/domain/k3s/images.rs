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

//! Import of bundle container images into the k3s containerd.

use crate::infrastructure::bundle::Bundle;
use crate::infrastructure::constants::CONTAINERD_NAMESPACE;
use crate::shared::error::{HomeError, Result};
use crate::shared::process::Command;
use flate2::read::GzDecoder;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether the file starts with the gzip magic bytes.
pub fn is_gzip(path: &Path) -> Result<bool> {
    let mut magic = [0u8; 2];
    let mut file = File::open(path)?;
    match file.read_exact(&mut magic) {
        Ok(()) => Ok(magic == GZIP_MAGIC),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Open an image tarball, decompressing it when gzipped.
pub fn open_image(path: &Path) -> Result<Box<dyn Read + Send>> {
    let gzip = is_gzip(path)?;
    let file = BufReader::new(File::open(path)?);
    if gzip {
        Ok(Box::new(GzDecoder::new(file)))
    } else {
        Ok(Box::new(file))
    }
}

pub struct ImageImporter {
    k3s_binary: PathBuf,
    cancel: CancellationToken,
}

impl ImageImporter {
    pub fn new(k3s_binary: impl Into<PathBuf>, cancel: CancellationToken) -> Self {
        Self {
            k3s_binary: k3s_binary.into(),
            cancel,
        }
    }

    fn ctr(&self) -> Command {
        Command::new(self.k3s_binary.display().to_string()).args([
            "ctr",
            "-n",
            CONTAINERD_NAMESPACE,
            "images",
        ])
    }

    /// References already present in the runtime.
    pub async fn existing_images(&self) -> Result<HashSet<String>> {
        let output = self.ctr().args(["ls", "-q"]).output(&self.cancel).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn import_image(&self, path: &Path) -> Result<()> {
        let reader = open_image(path)?;
        self.ctr()
            .args(["import", "-"])
            .stdin_reader(reader)
            .on_stdout(|line| debug!("{}", line))
            .run(&self.cancel)
            .await
            .map_err(|e| e.context(format!("importing {}", path.display())))
    }

    /// Import every image the bundle manifest lists, one at a time, skipping
    /// those the runtime already has.
    ///
    /// With `fail_fast` the first failure is returned; otherwise all
    /// failures are collected into [`HomeError::Imports`]. Cancellation
    /// always stops the run.
    pub async fn import_bundle_images(&self, bundle: &Bundle, fail_fast: bool) -> Result<()> {
        let manifest = bundle.manifest()?;
        if manifest.docker_images.is_empty() {
            debug!("No images listed in bundle manifest");
            return Ok(());
        }
        let existing = self.existing_images().await?;

        let total = manifest.docker_images.len();
        let mut failures = Vec::new();
        for (relative, reference) in &manifest.docker_images {
            if existing.contains(reference) {
                info!(image = %reference, "Image already present, skipping");
                continue;
            }
            info!(image = %reference, "Importing image");
            let result = self.import_image(&bundle.path(relative)).await;
            match result {
                Ok(()) => info!(image = %reference, "Imported image"),
                Err(e) if e.is_cancelled() || fail_fast => return Err(e),
                Err(e) => {
                    warn!(image = %reference, "Image import failed: {}", e);
                    failures.push(format!("{} ({})", reference, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(HomeError::Imports {
                failed: failures.len(),
                total,
                details: failures.join("; "),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_open_image_sniffs_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.tar");
        std::fs::write(&plain, b"plain image").unwrap();

        // compressed content with no .gz suffix
        let packed = dir.path().join("packed.tar");
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"packed image").unwrap();
        std::fs::write(&packed, enc.finish().unwrap()).unwrap();

        let read = |p: &Path| {
            let mut out = String::new();
            open_image(p).unwrap().read_to_string(&mut out).unwrap();
            out
        };
        assert!(!is_gzip(&plain).unwrap());
        assert!(is_gzip(&packed).unwrap());
        assert_eq!(read(&plain), "plain image");
        assert_eq!(read(&packed), "packed image");

        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        assert!(!is_gzip(&empty).unwrap());
    }
}
