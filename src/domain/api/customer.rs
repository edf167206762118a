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

use crate::infrastructure::api::{ApiClient, PagedQuery, RequestOptions};
use crate::shared::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub monitored: bool,
    pub get_weka_io_last_scrub: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl ApiClient {
    pub async fn get_customer(&self, id: &str) -> Result<Customer> {
        info!(id = %id, "Fetching customer");
        self.get_entity(&format!("customers/{}", id), &RequestOptions::new())
            .await
            .map_err(|e| e.context(format!("could not fetch customer {}", id)))
    }

    /// Customers are listed one page at a time.
    pub async fn query_customers(&self) -> Result<PagedQuery> {
        self.query_entities("customers", RequestOptions::new().no_auto_fetch())
            .await
    }
}

impl PagedQuery {
    pub async fn next_customer(&mut self) -> Result<Option<Customer>> {
        self.next_entity()
            .await
            .map_err(|e| e.context("failed to fetch next customer"))
    }
}
