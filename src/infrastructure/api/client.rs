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

use crate::infrastructure::constants::{
    DEFAULT_API_PREFIX, JSON_CONTENT_TYPE, REQUEST_TIMEOUT_SECS,
};
use crate::shared::error::{HomeError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use url::Url;

// ============================================================================
// Query parameters
// ============================================================================

/// Ordered query parameters. Keys may repeat through [`append`](Self::append).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every value of `key` with `value`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let key = key.into();
        let value = value.into();
        match self.0.iter().position(|(k, _)| *k == key) {
            Some(pos) => {
                self.0[pos].1 = value;
                let mut index = 0;
                self.0.retain(|(k, _)| {
                    let keep = index <= pos || *k != key;
                    index += 1;
                    keep
                });
            }
            None => self.0.push((key, value)),
        }
        self
    }

    pub fn append(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.0.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

// ============================================================================
// Request options
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Path prefix between base URL and resource, `api/v3` when unset.
    pub prefix: Option<String>,
    pub params: QueryParams,
    /// Rows per page for paged queries. 0 means the default.
    pub page_size: usize,
    /// Response is a bare JSON array rather than a `{data, meta}` envelope.
    pub no_metadata: bool,
    /// Stop a paged query after the first page.
    pub no_auto_fetch_next_page: bool,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.set(key, value);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn raw(mut self) -> Self {
        self.no_metadata = true;
        self
    }

    pub fn no_auto_fetch(mut self) -> Self {
        self.no_auto_fetch_next_page = true;
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or(DEFAULT_API_PREFIX)
    }
}

// ============================================================================
// Envelopes
// ============================================================================

/// One element of an enveloped `data` array or the `data` of a single entity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityRow {
    #[serde(default)]
    pub id: Value,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: Value,
    #[serde(default)]
    pub relationships: Option<Value>,
}

impl EntityRow {
    /// Decode `attributes`, filling in `id` from the row when the attributes lack one.
    pub fn decode<T: DeserializeOwned>(mut self) -> std::result::Result<T, serde_json::Error> {
        if let Value::Object(attributes) = &mut self.attributes {
            if !attributes.contains_key("id") && !self.id.is_null() {
                attributes.insert("id".to_string(), self.id);
            }
        }
        serde_json::from_value(self.attributes)
    }
}

#[derive(Debug, Deserialize)]
struct EntityEnvelope {
    data: EntityRow,
}

#[derive(Debug, Deserialize)]
struct DataEnvelope {
    #[serde(default)]
    data: Value,
}

// ============================================================================
// Client
// ============================================================================

/// Client for the Home REST API. Cheap to clone; clones share the
/// connection pool and cancellation token.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cancel: CancellationToken,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));
        let mut token = HeaderValue::from_str(&format!("Token {}", api_key))
            .map_err(|e| HomeError::validation(format!("invalid API key: {}", e)))?;
        token.set_sensitive(true);
        headers.insert(AUTHORIZATION, token);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            cancel: CancellationToken::new(),
        })
    }

    /// Abort in-flight requests when `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// `<base>/<prefix>/<resource>?<params>`. `resource` is used as given;
    /// encode user-supplied parts with [`encode_path_segment`].
    pub fn url(&self, resource: &str, options: &RequestOptions) -> String {
        let mut url = format!(
            "{}/{}/{}",
            self.base_url,
            options.prefix().trim_matches('/'),
            resource.trim_start_matches('/')
        );
        if !options.params.is_empty() {
            url.push('?');
            url.push_str(&options.params.encode());
        }
        url
    }

    pub(crate) async fn cancellable<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::select! {
            res = fut => res,
            _ = self.cancel.cancelled() => Err(HomeError::Cancelled),
        }
    }

    /// Send a request and apply the status policy: `[200, 400)` is success.
    pub(crate) async fn execute(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Response> {
        debug!("{method} {url}");

        let mut request = self.http.request(method.clone(), url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = self
            .cancellable(async { request.send().await.map_err(HomeError::from) })
            .await
            .map_err(|e| {
                if !e.is_cancelled() {
                    error!("{method} {url} failed: {e}");
                }
                e
            })?;

        let code = response.status().as_u16();
        if !(200..400).contains(&code) {
            error!("{method} {url} returned HTTP {code}");
            return Err(HomeError::transport(method.as_str(), url, code));
        }
        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(&self, url: &str, response: reqwest::Response) -> Result<T> {
        let body = self
            .cancellable(async { response.text().await.map_err(HomeError::from) })
            .await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            error!("decoding response of {url} failed: {e}");
            HomeError::decode(Some(url), format!("{e} (body preview: {preview:?})"))
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, resource: &str, options: &RequestOptions) -> Result<T> {
        let url = self.url(resource, options);
        let response = self.execute(Method::GET, &url, None).await?;
        self.decode(&url, response).await
    }

    pub async fn post<T: DeserializeOwned>(&self, resource: &str, options: &RequestOptions) -> Result<T> {
        let url = self.url(resource, options);
        let response = self
            .execute(Method::POST, &url, options.body.as_ref())
            .await?;
        self.decode(&url, response).await
    }

    /// GET a single enveloped entity: `{data: {id, type, attributes}}`.
    pub async fn get_entity<T: DeserializeOwned>(
        &self,
        resource: &str,
        options: &RequestOptions,
    ) -> Result<T> {
        let url = self.url(resource, options);
        let envelope: EntityEnvelope = self.get(resource, options).await?;
        envelope
            .data
            .decode()
            .map_err(|e| HomeError::decode(Some(url), e))
    }

    /// GET `{data: <payload>}` and return the payload untouched.
    pub async fn get_data(&self, resource: &str, options: &RequestOptions) -> Result<Value> {
        let envelope: DataEnvelope = self.get(resource, options).await?;
        Ok(envelope.data)
    }
}

/// Percent-encode `segment` as a single URL path segment, `/` included.
pub fn encode_path_segment(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return segment.replace('.', "%2E");
    }
    let Ok(mut url) = Url::parse("http://segment.invalid/") else {
        return segment.to_string();
    };
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.clear().push(segment);
    }
    url.path().trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_path_segment() {
        assert_eq!(encode_path_segment("diag-1.tgz"), "diag-1.tgz");
        assert_eq!(encode_path_segment("a b?c#d.tgz"), "a%20b%3Fc%23d.tgz");
        assert_eq!(encode_path_segment("x/y%z"), "x%2Fy%25z");
        assert_eq!(encode_path_segment(".."), "%2E%2E");
    }

    #[test]
    fn test_url_building() {
        let client = ApiClient::new("https://home.example.com/", "k").unwrap();
        let options = RequestOptions::new()
            .with_param("page", "2")
            .with_param("q", "a b&c");
        assert_eq!(
            client.url("clusters", &options),
            "https://home.example.com/api/v3/clusters?page=2&q=a+b%26c"
        );

        let options = RequestOptions::new().with_prefix("api");
        assert_eq!(
            client.url("c1/events/list", &options),
            "https://home.example.com/api/c1/events/list"
        );
    }

    #[test]
    fn test_query_params_set_overwrites_in_place() {
        let mut params = QueryParams::new();
        params.set("page", "1").append("topic", "a").append("page", "9");
        params.set("page", "2");
        assert_eq!(params.encode(), "page=2&topic=a");

        params.append("topic", "b");
        assert_eq!(params.encode(), "page=2&topic=a&topic=b");
        assert_eq!(params.get("topic"), Some("a"));
    }

    #[test]
    fn test_row_decode_fills_id() {
        #[derive(Deserialize)]
        struct Thing {
            id: String,
            v: u32,
        }

        let row: EntityRow =
            serde_json::from_str(r#"{"id":"abc","type":"thing","attributes":{"v":7}}"#).unwrap();
        let thing: Thing = row.decode().unwrap();
        assert_eq!(thing.id, "abc");
        assert_eq!(thing.v, 7);
    }
}
