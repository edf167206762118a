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

use crate::infrastructure::api::{
    encode_path_segment, ApiClient, PagedQuery, QueryParams, RequestOptions,
};
use crate::shared::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Support file uploaded by a cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Diag {
    pub id: i64,
    #[serde(rename = "filename")]
    pub file_name: String,
    pub cluster_id: String,
    #[serde(rename = "hostname")]
    pub host_name: String,
    pub s3_key: String,
    pub completed: bool,
    pub topic: String,
    pub topic_id: String,
    pub upload_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct DiagsQueryOptions {
    pub topic: Option<String>,
    pub topic_id: Option<String>,
    pub page_size: usize,
}

impl DiagsQueryOptions {
    pub fn to_query_params(&self) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(topic) = &self.topic {
            params.set("topic", topic.as_str());
        }
        if let Some(topic_id) = &self.topic_id {
            params.set("topic_id", topic_id.as_str());
        }
        params
    }
}

fn diags_resource(cluster_id: &str) -> String {
    format!("clusters/{}/support/files", cluster_id)
}

impl ApiClient {
    pub async fn query_diags(
        &self,
        cluster_id: &str,
        options: &DiagsQueryOptions,
    ) -> Result<PagedQuery> {
        let request = RequestOptions::new()
            .with_params(options.to_query_params())
            .with_page_size(options.page_size);
        self.query_entities(&diags_resource(cluster_id), request)
            .await
    }

    /// Download one support file into `dest_dir/<file_name>`.
    pub async fn download_diag(
        &self,
        cluster_id: &str,
        file_name: &str,
        dest_dir: &Path,
    ) -> Result<()> {
        info!(cluster_id = %cluster_id, file_name = %file_name, "Downloading diag");
        self.download(
            &format!(
                "{}/{}/content",
                diags_resource(cluster_id),
                encode_path_segment(file_name)
            ),
            &RequestOptions::new(),
            &dest_dir.join(file_name),
        )
        .await
    }

    pub async fn download_diags(
        &self,
        cluster_id: &str,
        file_names: &[String],
        dest_dir: &Path,
    ) -> Result<()> {
        info!(cluster_id = %cluster_id, count = file_names.len(), "Downloading diags");
        self.download_many(
            &format!("{}/%s/content", diags_resource(cluster_id)),
            &RequestOptions::new(),
            file_names,
            dest_dir,
        )
        .await
    }

    /// Download every file the query for `options` yields. Returns how many
    /// files were requested; nothing is downloaded when the query is empty.
    pub async fn download_diags_matching(
        &self,
        cluster_id: &str,
        options: &DiagsQueryOptions,
        dest_dir: &Path,
    ) -> Result<usize> {
        let mut query = self.query_diags(cluster_id, options).await?;
        let file_names = query.diag_file_names().await?;
        if file_names.is_empty() {
            info!(cluster_id = %cluster_id, "No diags matched");
            return Ok(0);
        }
        self.download_diags(cluster_id, &file_names, dest_dir).await?;
        Ok(file_names.len())
    }
}

impl PagedQuery {
    /// Drain the cursor, collecting the file name of every diag.
    pub async fn diag_file_names(&mut self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        while let Some(diag) = self.next_diag().await? {
            names.push(diag.file_name);
        }
        Ok(names)
    }

    pub async fn next_diag(&mut self) -> Result<Option<Diag>> {
        self.next_entity()
            .await
            .map_err(|e| e.context("failed to get next diag"))
    }
}
