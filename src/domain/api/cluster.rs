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

use crate::infrastructure::api::{ApiClient, PagedQuery, QueryParams, RequestOptions};
use crate::infrastructure::constants::ACTIVE_CLUSTER_SEEN_WITHIN_SECS;
use crate::shared::error::{HomeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::customer::Customer;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    pub id: String,
    pub name: String,
    pub created_at: Option<DateTime<Utc>>,
    pub customer_id: String,
    pub event_store: i64,
    pub last_event: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub license_deleted_at: Option<DateTime<Utc>>,
    pub license_sync_time: Option<DateTime<Utc>>,
    pub muted: bool,
    pub mute_time: Option<DateTime<Utc>>,
    pub public_key: String,
    pub skip_license_check: bool,
    pub software_release: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: String,
}

/// Filters selecting clusters seen in the last day that are monitored and not muted.
pub fn active_clusters_params() -> QueryParams {
    [
        (
            "seen_within_seconds",
            ACTIVE_CLUSTER_SEEN_WITHIN_SECS.to_string(),
        ),
        ("muted", "false".to_string()),
        ("monitored", "true".to_string()),
    ]
    .into_iter()
    .collect()
}

impl ApiClient {
    pub async fn get_cluster(&self, id: &str) -> Result<Cluster> {
        info!(id = %id, "Fetching cluster");
        self.get_entity(&format!("clusters/{}", id), &RequestOptions::new())
            .await
            .map_err(|e| e.context(format!("could not fetch cluster {}", id)))
    }

    pub async fn get_cluster_customer(&self, cluster: &Cluster) -> Result<Customer> {
        if cluster.customer_id.is_empty() {
            return Err(HomeError::validation(format!(
                "cluster {} has no customer",
                cluster.id
            )));
        }
        self.get_customer(&cluster.customer_id).await
    }

    pub async fn query_clusters(&self, options: RequestOptions) -> Result<PagedQuery> {
        self.query_entities("clusters", options).await
    }

    pub async fn query_active_clusters(&self) -> Result<PagedQuery> {
        self.query_clusters(RequestOptions::new().with_params(active_clusters_params()))
            .await
    }
}

impl PagedQuery {
    pub async fn next_cluster(&mut self) -> Result<Option<Cluster>> {
        self.next_entity()
            .await
            .map_err(|e| e.context("failed to get next cluster"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_params() {
        assert_eq!(
            active_clusters_params().encode(),
            "seen_within_seconds=86400&muted=false&monitored=true"
        );
    }

    #[test]
    fn test_cluster_tolerates_missing_and_null_fields() {
        let cluster: Cluster = serde_json::from_str(
            r#"{"id":"c1","name":"prod","last_seen":"2024-03-01T10:00:00Z","mute_time":null}"#,
        )
        .unwrap();
        assert_eq!(cluster.name, "prod");
        assert!(cluster.last_seen.is_some());
        assert!(cluster.mute_time.is_none());
        assert!(!cluster.muted);
    }
}
