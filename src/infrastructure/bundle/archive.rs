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

//! Streaming access to files inside a tar or tgz archive.
//!
//! The archive is scanned once per callback, in callback order. Every scan
//! reopens the file and builds a fresh gzip decoder.

use super::glob::Glob;
use crate::shared::error::{HomeError, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Metadata of a regular-file entry handed to a callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    /// Path inside the archive.
    pub path: PathBuf,
    /// Last path component, the part patterns are matched against.
    pub name: String,
    pub size: u64,
    pub mode: u32,
}

pub type TarHandler = Box<dyn FnMut(&TarEntry, &mut dyn Read) -> Result<()> + Send + 'static>;

/// A glob pattern paired with the handler for its first matching entry.
pub struct TarCallback {
    pattern: Glob,
    handler: TarHandler,
}

impl TarCallback {
    pub fn new<F>(pattern: &str, handler: F) -> Result<Self>
    where
        F: FnMut(&TarEntry, &mut dyn Read) -> Result<()> + Send + 'static,
    {
        Ok(Self {
            pattern: Glob::new(pattern)?,
            handler: Box::new(handler),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl std::fmt::Debug for TarCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TarCallback")
            .field("pattern", &self.pattern.as_str())
            .finish()
    }
}

/// Reader that fails once the token is cancelled.
pub struct CancellableReader<R> {
    inner: R,
    cancel: CancellationToken,
}

impl<R> CancellableReader<R> {
    pub fn new(inner: R, cancel: CancellationToken) -> Self {
        Self { inner, cancel }
    }
}

impl<R: Read> Read for CancellableReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.cancel.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::Other, HomeError::Cancelled));
        }
        self.inner.read(buf)
    }
}

#[derive(Debug, Clone)]
pub struct TarArchive {
    path: PathBuf,
}

impl TarArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_gzip(&self) -> bool {
        let name = self.path.to_string_lossy();
        name.ends_with(".gz") || name.ends_with(".tgz")
    }

    fn open(&self, cancel: &CancellationToken) -> Result<tar::Archive<Box<dyn Read + Send>>> {
        let file = File::open(&self.path).map_err(|e| {
            HomeError::bundle(format!("cannot open {}: {}", self.path.display(), e))
        })?;
        let reader = CancellableReader::new(BufReader::new(file), cancel.clone());
        let stream: Box<dyn Read + Send> = if self.is_gzip() {
            Box::new(GzDecoder::new(reader))
        } else {
            Box::new(reader)
        };
        Ok(tar::Archive::new(stream))
    }

    fn map_read_error(&self, cancel: &CancellationToken, err: io::Error) -> HomeError {
        if cancel.is_cancelled() {
            HomeError::Cancelled
        } else {
            HomeError::bundle(format!("reading {}: {}", self.path.display(), err))
        }
    }

    /// Run every callback against the first entry matching its pattern,
    /// rescanning the archive from the start for each one.
    ///
    /// Fails on the first callback whose pattern matches nothing.
    pub fn get_files(
        &self,
        cancel: &CancellationToken,
        callbacks: &mut [TarCallback],
    ) -> Result<()> {
        for callback in callbacks.iter_mut() {
            let mut archive = self.open(cancel)?;
            let entries = archive
                .entries()
                .map_err(|e| self.map_read_error(cancel, e))?;

            let mut found = false;
            for entry in entries {
                let mut entry = entry.map_err(|e| self.map_read_error(cancel, e))?;
                if !entry.header().entry_type().is_file() {
                    continue;
                }
                let info = entry_info(&entry).map_err(|e| self.map_read_error(cancel, e))?;
                if !callback.pattern.matches(&info.name) {
                    continue;
                }

                debug!(
                    "{}: '{}' matched {}",
                    self.path.display(),
                    callback.pattern.as_str(),
                    info.path.display()
                );
                (callback.handler)(&info, &mut entry).map_err(|e| {
                    if cancel.is_cancelled() {
                        HomeError::Cancelled
                    } else {
                        e.context(format!("handling {}", info.path.display()))
                    }
                })?;
                found = true;
                break;
            }

            if !found {
                return Err(HomeError::bundle(format!(
                    "no file matching '{}' in {}",
                    callback.pattern.as_str(),
                    self.path.display()
                )));
            }
        }
        Ok(())
    }

    /// [`get_files`](Self::get_files) on the blocking pool.
    pub async fn extract(
        &self,
        cancel: &CancellationToken,
        mut callbacks: Vec<TarCallback>,
    ) -> Result<()> {
        let archive = self.clone();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || archive.get_files(&cancel, &mut callbacks))
            .await
            .map_err(|e| HomeError::bundle(format!("archive worker failed: {}", e)))?
    }

    pub fn list(&self, cancel: &CancellationToken) -> Result<Vec<TarEntry>> {
        let mut archive = self.open(cancel)?;
        let mut out = Vec::new();
        for entry in archive
            .entries()
            .map_err(|e| self.map_read_error(cancel, e))?
        {
            let entry = entry.map_err(|e| self.map_read_error(cancel, e))?;
            if entry.header().entry_type().is_file() {
                out.push(entry_info(&entry).map_err(|e| self.map_read_error(cancel, e))?);
            }
        }
        Ok(out)
    }
}

fn entry_info<R: Read>(entry: &tar::Entry<'_, R>) -> io::Result<TarEntry> {
    let path = entry.path()?.into_owned();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(TarEntry {
        name,
        size: entry.header().size()?,
        mode: entry.header().mode()?,
        path,
    })
}
