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

//! Temporary copies of files an upgrade overwrites.

use crate::infrastructure::constants::BACKUP_DIR_PREFIX;
use crate::shared::error::{HomeError, Result};
use crate::shared::fs::{copy_preserving_mode, write_from_reader};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

fn io_context(err: io::Error, action: &str, path: &Path) -> HomeError {
    io::Error::new(err.kind(), format!("{} {}: {}", action, path.display(), err)).into()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackedUpFile {
    pub original: PathBuf,
    pub mode: u32,
    pub backup: PathBuf,
}

/// Backups in a private temporary directory, removed when the set is dropped.
#[derive(Debug)]
pub struct BackupSet {
    dir: TempDir,
    files: Vec<BackedUpFile>,
}

impl BackupSet {
    /// Copy every file in `files` into a fresh directory under the system
    /// temp dir.
    pub fn create(files: &[PathBuf]) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), files)
    }

    pub fn create_in(parent: &Path, files: &[PathBuf]) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(BACKUP_DIR_PREFIX)
            .tempdir_in(parent)?;
        debug!(dir = %dir.path().display(), "Created backup directory");

        let mut backed_up = Vec::with_capacity(files.len());
        for (index, original) in files.iter().enumerate() {
            let name = original
                .file_name()
                .ok_or_else(|| {
                    HomeError::validation(format!("cannot back up {}", original.display()))
                })?
                .to_string_lossy();
            // index keeps same-named files from different dirs apart
            let backup = dir.path().join(format!("{}_{}", index, name));
            let mode = copy_preserving_mode(original, &backup)
                .map_err(|e| io_context(e, "backing up", original))?;
            info!(file = %original.display(), "Backed up");
            backed_up.push(BackedUpFile {
                original: original.clone(),
                mode,
                backup,
            });
        }

        Ok(Self {
            dir,
            files: backed_up,
        })
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn files(&self) -> &[BackedUpFile] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Stop the directory from being removed on drop and return its path.
    pub fn keep(self) -> PathBuf {
        self.dir.keep()
    }

    /// Copy every backup over its original, with the original mode.
    pub fn restore(&self) -> Result<()> {
        for file in &self.files {
            info!(file = %file.original.display(), "Restoring");
            if let Some(parent) = file.original.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut src = File::open(&file.backup)?;
            write_from_reader(&file.original, &mut src, file.mode)
                .map_err(|e| io_context(e, "restoring", &file.original))?;
        }
        Ok(())
    }
}
