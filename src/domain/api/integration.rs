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
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Integration {
    pub id: i64,
    pub name: String,
    pub configuration: IntegrationConfiguration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationConfiguration {
    #[serde(rename = "type")]
    pub kind: String,
    pub rule: IntegrationRule,
    pub destinations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationRule {
    pub rule_type: String,
    pub param: Value,
}

impl ApiClient {
    pub async fn get_integration(&self, id: i64) -> Result<Integration> {
        info!(id = id, "Fetching integration");
        self.get_entity(&format!("integrations/{}", id), &RequestOptions::new())
            .await
            .map_err(|e| e.context(format!("could not fetch integration {}", id)))
    }

    pub async fn query_integrations(&self, options: RequestOptions) -> Result<PagedQuery> {
        self.query_entities("integrations", options).await
    }

    /// POST `body` to the integration test endpoint. Request and response
    /// bodies are passed through untouched.
    pub async fn test_integration(&self, id: i64, body: Value) -> Result<Value> {
        info!(id = id, "Testing integration");
        self.post(
            &format!("integrations/{}/test", id),
            &RequestOptions::new().with_body(body),
        )
        .await
    }
}

impl PagedQuery {
    pub async fn next_integration(&mut self) -> Result<Option<Integration>> {
        self.next_entity()
            .await
            .map_err(|e| e.context("failed to get next integration"))
    }
}
