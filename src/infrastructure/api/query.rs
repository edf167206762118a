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

//! Page cursor over list endpoints.
//!
//! Two response shapes are understood:
//!
//! * enveloped: `{"data": [{"id", "type", "attributes"}...], "meta": {"page", "page_size"}}`
//! * raw: `[{...attributes...}, ...]` (selected with [`RequestOptions::raw`])
//!
//! Rows are kept as JSON until [`PagedQuery::next_entity`] decodes them into
//! the caller's type. A cursor has a single consumer.

use super::client::{ApiClient, EntityRow, RequestOptions};
use crate::infrastructure::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::shared::error::{HomeError, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub page_size: usize,
}

#[derive(Debug, Deserialize)]
struct EnvelopedPage {
    #[serde(default)]
    data: Vec<EntityRow>,
    #[serde(default)]
    meta: PageMeta,
}

#[derive(Debug)]
pub struct PagedQuery {
    client: ApiClient,
    resource: String,
    options: RequestOptions,
    page: usize,
    rows: Vec<Option<EntityRow>>,
    meta: Option<PageMeta>,
    has_more_pages: bool,
    index: isize,
    max_index: isize,
}

/// Page size actually requested: 0 selects the default, anything above the
/// server maximum is clamped.
pub fn effective_page_size(requested: usize) -> usize {
    match requested {
        0 => DEFAULT_PAGE_SIZE,
        n => n.min(MAX_PAGE_SIZE),
    }
}

impl ApiClient {
    /// Start a cursor over `resource` and fetch its first page.
    pub async fn query_entities(
        &self,
        resource: &str,
        mut options: RequestOptions,
    ) -> Result<PagedQuery> {
        options.page_size = effective_page_size(options.page_size);
        options
            .params
            .set("page_size", options.page_size.to_string());

        let mut query = PagedQuery {
            client: self.clone(),
            resource: resource.to_string(),
            options,
            page: 0,
            rows: Vec::new(),
            meta: None,
            has_more_pages: false,
            index: -1,
            max_index: -1,
        };
        query.fetch_next_page().await?;
        Ok(query)
    }
}

impl PagedQuery {
    /// Fetch the following page, replacing the rows held by the cursor.
    pub async fn fetch_next_page(&mut self) -> Result<()> {
        self.page += 1;
        self.options.params.set("page", self.page.to_string());

        if self.options.no_metadata {
            let rows: Vec<Value> = self.client.get(&self.resource, &self.options).await?;
            self.has_more_pages = rows.len() == self.options.page_size;
            self.meta = None;
            self.rows = rows
                .into_iter()
                .map(|attributes| {
                    Some(EntityRow {
                        attributes,
                        ..EntityRow::default()
                    })
                })
                .collect();
        } else {
            let page: EnvelopedPage = self.client.get(&self.resource, &self.options).await?;
            self.has_more_pages = page.meta.page_size > 0 && page.data.len() == page.meta.page_size;
            self.meta = Some(page.meta);
            self.rows = page.data.into_iter().map(Some).collect();
        }

        self.index = -1;
        self.max_index = self.rows.len() as isize - 1;
        debug!(
            "{}: page {} has {} rows, more pages: {}",
            self.resource,
            self.page,
            self.rows.len(),
            self.has_more_pages
        );
        Ok(())
    }

    /// Next row decoded as `T`, or `None` once the cursor is exhausted.
    pub async fn next_entity<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        if self.index == self.max_index {
            if !self.has_more_pages || self.options.no_auto_fetch_next_page {
                return Ok(None);
            }
            self.fetch_next_page().await?;
        }
        if self.max_index < 0 {
            return Ok(None);
        }

        self.index += 1;
        let row = self.rows[self.index as usize].take().ok_or_else(|| {
            HomeError::decode(Some(self.resource.clone()), "row already consumed")
        })?;
        row.decode()
            .map(Some)
            .map_err(|e| HomeError::decode(Some(self.resource.clone()), e))
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.options.page_size
    }

    pub fn has_more_pages(&self) -> bool {
        self.has_more_pages
    }

    /// Metadata of the current page; `None` for raw responses.
    pub fn meta(&self) -> Option<PageMeta> {
        self.meta
    }

    pub fn rows_in_page(&self) -> usize {
        self.rows.len()
    }

    /// Rows of the current page not yet returned by [`next_entity`](Self::next_entity).
    pub fn remaining_in_page(&self) -> usize {
        (self.max_index - self.index).max(0) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_page_size() {
        assert_eq!(effective_page_size(0), 50);
        assert_eq!(effective_page_size(1), 1);
        assert_eq!(effective_page_size(1000), 1000);
        assert_eq!(effective_page_size(5000), 1000);
    }
}
