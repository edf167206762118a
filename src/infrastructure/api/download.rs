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

//! GET-to-file, single and bulk.
//!
//! A failed download leaves whatever was already written in place.

use super::client::{encode_path_segment, ApiClient, RequestOptions};
use crate::infrastructure::constants::DOWNLOAD_CONCURRENCY;
use crate::shared::error::{HomeError, Result};
use flate2::write::GzDecoder;
use futures::StreamExt;
use reqwest::header::CONTENT_ENCODING;
use reqwest::Method;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

enum Sink {
    Plain(BufWriter<File>),
    Gzip(GzDecoder<BufWriter<File>>),
}

impl Sink {
    fn create(path: &Path, gzip: bool) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(if gzip {
            Sink::Gzip(GzDecoder::new(file))
        } else {
            Sink::Plain(file)
        })
    }

    fn write_all(&mut self, chunk: &[u8]) -> std::io::Result<()> {
        match self {
            Sink::Plain(w) => w.write_all(chunk),
            Sink::Gzip(w) => w.write_all(chunk),
        }
    }

    fn finish(self) -> std::io::Result<()> {
        match self {
            Sink::Plain(mut w) => w.flush(),
            Sink::Gzip(w) => w.finish()?.flush(),
        }
    }
}

/// A single normal path component, so the download stays inside its directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(std::path::Component::Normal(_)), None)
    )
}

impl ApiClient {
    /// Stream `resource` into `dest`, gunzipping when the server sent
    /// `Content-Encoding: gzip`.
    pub async fn download(
        &self,
        resource: &str,
        options: &RequestOptions,
        dest: &Path,
    ) -> Result<()> {
        let url = self.url(resource, options);
        let response = self.execute(Method::GET, &url, None).await?;
        let gzip = response
            .headers()
            .get(CONTENT_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("gzip"));

        debug!("writing {} to {} (gzip: {})", url, dest.display(), gzip);
        let mut sink = Sink::create(dest, gzip)?;
        let mut stream = response.bytes_stream();
        loop {
            let next = self
                .cancellable(async { Ok(stream.next().await) })
                .await?;
            match next {
                Some(chunk) => {
                    let chunk = chunk.map_err(|e| {
                        error!("GET {url} failed while streaming: {e}");
                        HomeError::from(e)
                    })?;
                    sink.write_all(&chunk).map_err(|e| {
                        HomeError::decode(Some(dest.display().to_string()), e)
                    })?;
                }
                None => break,
            }
        }
        sink.finish()
            .map_err(|e| HomeError::decode(Some(dest.display().to_string()), e))?;
        Ok(())
    }

    /// Download every name in `names` into `dest_dir`, substituting it,
    /// percent-encoded, for the single `%s` in `template`. At most 16
    /// requests are in flight.
    ///
    /// All downloads run to completion; failures are collected into one error.
    pub async fn download_many(
        &self,
        template: &str,
        options: &RequestOptions,
        names: &[String],
        dest_dir: &Path,
    ) -> Result<()> {
        if template.matches("%s").count() != 1 {
            return Err(HomeError::validation(format!(
                "download template '{}' must contain exactly one %s",
                template
            )));
        }

        let semaphore = Arc::new(Semaphore::new(DOWNLOAD_CONCURRENCY));
        let mut tasks = JoinSet::new();
        let mut failures = Vec::new();
        for name in names {
            if !is_plain_file_name(name) {
                error!("refusing to download {:?}: not a plain file name", name);
                failures.push(format!("{}: not a plain file name", name));
                continue;
            }
            let client = self.clone();
            let options = options.clone();
            let semaphore = semaphore.clone();
            let resource = template.replacen("%s", &encode_path_segment(name), 1);
            let dest: PathBuf = dest_dir.join(name);
            let name = name.clone();
            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => client.download(&resource, &options, &dest).await,
                    Err(_) => Err(HomeError::Cancelled),
                };
                (name, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => info!("downloaded {}", name),
                Ok((name, Err(e))) => {
                    error!("download of {} failed: {}", name, e);
                    failures.push(format!("{}: {}", name, e));
                }
                Err(e) => {
                    error!("download task failed: {}", e);
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            failures.sort();
            Err(HomeError::Downloads {
                failed: failures.len(),
                total: names.len(),
                details: failures.join("; "),
            })
        }
    }
}
