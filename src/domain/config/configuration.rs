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

//! Installer configuration.
//!
//! Every optional scalar is an `Option` so that "unset" and "zero" stay
//! distinct; only set fields reach the generated chart values.

use crate::shared::error::{HomeError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Ingress host name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// Primary internal address of this node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_ip: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_ips: Vec<String>,

    pub tls: TlsConfig,
    pub smtp: SmtpConfig,
    pub retention_days: RetentionConfig,
    pub forwarding: ForwardingConfig,

    /// Use autoscaling ranges from the preset instead of fixed replicas.
    pub autoscaling: bool,

    /// Number of monitored Weka nodes, selects the resource preset.
    #[serde(
        rename = "wekaNodesMonitored",
        skip_serializing_if = "Option::is_none"
    )]
    pub weka_nodes_monitored: Option<u32>,

    /// Extra chart values keyed by dotted path. Applied last and win over
    /// generated values.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub helm_overrides: BTreeMap<String, serde_json::Value>,

    /// Extra arguments appended to the k3s server command line.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub k3s_args: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(rename = "tlsCert", alias = "cert", skip_serializing_if = "Option::is_none")]
    pub cert: Option<String>,
    #[serde(rename = "tlsKey", alias = "key", skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl TlsConfig {
    /// Certificate and key, when both are configured.
    pub fn pair(&self) -> Option<(&str, &str)> {
        match (self.cert.as_deref(), self.key.as_deref()) {
            (Some(cert), Some(key)) if !cert.is_empty() && !key.is_empty() => Some((cert, key)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(rename = "senderEmail", skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForwardingConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_events: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_usage_reports: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_analytics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_diagnostics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_stats: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_cluster_registration: Option<bool>,
}

impl Configuration {
    pub fn from_json(json: &str) -> Result<Self> {
        let conf: Self =
            serde_json::from_str(json).map_err(|e| HomeError::decode(None::<String>, e))?;
        conf.validate()?;
        Ok(conf)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let conf: Self = serde_json::from_str(&content)
            .map_err(|e| HomeError::decode(Some(path.display().to_string()), e))?;
        conf.validate()?;
        Ok(conf)
    }

    /// `input` is either a path to a JSON file or the JSON itself.
    pub fn from_json_or_path(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if !trimmed.starts_with('{') && Path::new(trimmed).is_file() {
            Self::from_file(trimmed)
        } else {
            Self::from_json(trimmed)
        }
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ip) = &self.node_ip {
            let addr = parse_ipv4("node_ip", ip)?;
            if addr.is_loopback() {
                return Err(HomeError::validation(format!(
                    "node_ip {} is a loopback address",
                    ip
                )));
            }
        }
        for ip in &self.external_ips {
            parse_ipv4("external_ips", ip)?;
        }
        if self.forwarding.enabled
            && self
                .forwarding
                .url
                .as_deref()
                .is_some_and(|u| u.trim().is_empty())
        {
            return Err(HomeError::validation(
                "forwarding.url must not be empty when set",
            ));
        }
        for (name, days) in [
            ("diagnostics", self.retention_days.diagnostics),
            ("events", self.retention_days.events),
        ] {
            if days == Some(0) {
                return Err(HomeError::validation(format!(
                    "retention_days.{} must be at least 1",
                    name
                )));
            }
        }
        if self.tls.cert.is_some() != self.tls.key.is_some() {
            tracing::warn!("TLS needs both certificate and key; TLS settings are ignored");
        }
        Ok(())
    }
}

fn parse_ipv4(field: &str, value: &str) -> Result<Ipv4Addr> {
    value.parse::<Ipv4Addr>().map_err(|_| {
        HomeError::validation(format!("{} '{}' is not a valid IPv4 address", field, value))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_vs_zero() {
        let conf = Configuration::from_json(r#"{"smtp":{"port":0}}"#).unwrap();
        assert_eq!(conf.smtp.port, Some(0));
        assert_eq!(conf.smtp.host, None);
        assert_eq!(conf.weka_nodes_monitored, None);
    }

    #[test]
    fn test_tls_aliases() {
        let a = Configuration::from_json(r#"{"tls":{"cert":"C","key":"K"}}"#).unwrap();
        let b = Configuration::from_json(r#"{"tls":{"tlsCert":"C","tlsKey":"K"}}"#).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.tls.pair(), Some(("C", "K")));
    }

    #[test]
    fn test_validation() {
        assert!(Configuration::from_json(r#"{"node_ip":"127.0.0.1"}"#).is_err());
        assert!(Configuration::from_json(r#"{"node_ip":"10.0.0.300"}"#).is_err());
        assert!(Configuration::from_json(r#"{"external_ips":["1.2.3.4","x"]}"#).is_err());
        assert!(Configuration::from_json(r#"{"retention_days":{"events":0}}"#).is_err());
        assert!(Configuration::from_json(r#"{"node_ip":"10.0.0.5"}"#).is_ok());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"host":"home.local","wekaNodesMonitored":1200}"#).unwrap();

        let conf = Configuration::from_json_or_path(path.to_str().unwrap()).unwrap();
        assert_eq!(conf.host.as_deref(), Some("home.local"));
        assert_eq!(conf.weka_nodes_monitored, Some(1200));
    }

    #[test]
    fn test_bad_json_is_decode_error() {
        let err = Configuration::from_json_or_path("{oops").unwrap_err();
        assert!(matches!(err, HomeError::Decode { .. }));
    }
}
