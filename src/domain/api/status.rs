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

use crate::infrastructure::api::{ApiClient, RequestOptions};
use crate::shared::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerStatus {
    pub active: bool,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerVersion {
    pub version: String,
}

impl ApiClient {
    pub async fn get_server_status(&self) -> Result<ServerStatus> {
        info!("Fetching server status");
        self.get("status", &RequestOptions::new())
            .await
            .map_err(|e| e.context("could not fetch server status"))
    }

    pub async fn get_server_version(&self) -> Result<ServerVersion> {
        self.get("server-version", &RequestOptions::new())
            .await
            .map_err(|e| e.context("could not fetch server version"))
    }

    pub async fn get_db_status(&self) -> Result<Value> {
        self.get("db/status", &RequestOptions::new()).await
    }

    pub async fn get_cluster_analytics(&self, cluster_id: &str) -> Result<Value> {
        self.get_data(
            &format!("clusters/{}/analytics", cluster_id),
            &RequestOptions::new(),
        )
        .await
    }

    pub async fn get_latest_usage_report(&self, cluster_id: &str) -> Result<Value> {
        self.get_data(
            &format!("clusters/{}/latest-usage-report", cluster_id),
            &RequestOptions::new(),
        )
        .await
    }
}
