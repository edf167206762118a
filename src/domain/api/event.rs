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
use crate::infrastructure::constants::EVENTS_API_PREFIX;
use crate::shared::error::{HomeError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: String,
    pub cloud_id: String,
    pub cluster_id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub category: String,
    pub is_backend: bool,
    pub entity: String,
    /// Event-type specific parameters, kept as sent.
    pub params: Value,
    #[serde(rename = "nid")]
    pub node_id: String,
    pub permission: String,
    pub severity: String,
    #[serde(rename = "timestamp")]
    pub time: Option<DateTime<Utc>>,
    #[serde(rename = "cloud_digested_ts")]
    pub ingest_time: Option<DateTime<Utc>>,
    #[serde(rename = "org_id")]
    pub organization_id: i64,
    pub processed: bool,
}

impl Event {
    /// Seconds between the event and its ingestion by the cloud.
    pub fn processing_time(&self) -> Option<f64> {
        let (time, ingest) = (self.time?, self.ingest_time?);
        Some((ingest - time).num_milliseconds() as f64 / 1000.0)
    }
}

/// Filters for the events list endpoint.
#[derive(Debug, Clone, Default)]
pub struct EventQueryOptions {
    pub with_internal_events: bool,
    pub sort_by_ingest_time: bool,
    pub include_types: Vec<String>,
    pub exclude_types: Vec<String>,
    pub node_ids: Vec<u32>,
    pub min_severity: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl EventQueryOptions {
    pub fn to_query_params(&self) -> Result<QueryParams> {
        if !self.include_types.is_empty() {
            return Err(HomeError::validation("--type is not supported yet"));
        }
        if !self.exclude_types.is_empty() {
            return Err(HomeError::validation("--exclude-type is not supported yet"));
        }
        if !self.node_ids.is_empty() {
            return Err(HomeError::validation("--node-ids is not supported yet"));
        }

        let mut params = QueryParams::new();
        if self.with_internal_events {
            params.set("intr", "t");
        }
        if self.sort_by_ingest_time {
            params.set("dt", "t");
        }
        if let Some(severity) = self.min_severity.as_deref().filter(|s| !s.is_empty()) {
            params.set("svr", severity);
        }
        if let Some(start) = self.start_time {
            params.set("frm", start.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        if let Some(end) = self.end_time {
            params.set("to", end.to_rfc3339_opts(SecondsFormat::Secs, true));
        }
        Ok(params)
    }
}

impl ApiClient {
    pub async fn get_event(&self, event_id: &str) -> Result<Event> {
        info!(event_id = %event_id, "Fetching event");
        self.get(
            &format!("events/{}", event_id),
            &RequestOptions::new().with_prefix(EVENTS_API_PREFIX),
        )
        .await
        .map_err(|e| e.context(format!("could not fetch event {}", event_id)))
    }

    /// Events of one cluster. The endpoint returns bare arrays.
    pub async fn query_events(
        &self,
        cluster_id: &str,
        options: &EventQueryOptions,
    ) -> Result<PagedQuery> {
        let options = RequestOptions::new()
            .with_prefix(EVENTS_API_PREFIX)
            .with_params(options.to_query_params()?)
            .raw();
        self.query_entities(&format!("{}/events/list", cluster_id), options)
            .await
    }
}

impl PagedQuery {
    pub async fn next_event(&mut self) -> Result<Option<Event>> {
        self.next_entity()
            .await
            .map_err(|e| e.context("failed to get next event"))
    }
}
