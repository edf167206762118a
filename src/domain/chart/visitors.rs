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

//! Built-in values visitors. Each maps one area of the configuration onto
//! chart keys and only writes keys for fields that are set.

use super::values::ValuesTree;
use crate::domain::config::Configuration;
use crate::shared::error::Result;

pub fn ingress(conf: &Configuration) -> Result<ValuesTree> {
    let mut tree = ValuesTree::new();
    tree.write_entry_if_set("ingress.host", conf.host.clone())?;
    tree.write_entry_if_set(
        "workers.alertsDispatcher.emailLinkDomainName",
        conf.host.clone(),
    )?;

    if let Some((cert, key)) = conf.tls.pair() {
        tree.write_entry("ingress.tls.enabled", conf.tls.enabled.unwrap_or(true))?;
        tree.write_entry("ingress.tls.cert", cert)?;
        tree.write_entry("ingress.tls.key", key)?;
    }
    Ok(tree)
}

pub fn smtp(conf: &Configuration) -> Result<ValuesTree> {
    let smtp = &conf.smtp;
    let mut tree = ValuesTree::new();
    tree.write_entry_if_set("smtp.connection.host", smtp.host.clone())?;
    tree.write_entry_if_set("smtp.connection.port", smtp.port)?;
    tree.write_entry_if_set("smtp.connection.username", smtp.user.clone())?;
    tree.write_entry_if_set("smtp.connection.password", smtp.password.clone())?;
    tree.write_entry_if_set("smtp.connection.insecure", smtp.insecure)?;
    tree.write_entry_if_set("smtp.senderEmailName", smtp.sender.clone())?;
    tree.write_entry_if_set("smtp.senderEmail", smtp.sender_email.clone())?;
    Ok(tree)
}

pub fn retention(conf: &Configuration) -> Result<ValuesTree> {
    let days = |d: Option<u32>| d.map(|d| format!("{}d", d));
    let mut tree = ValuesTree::new();
    tree.write_entry_if_set(
        "jobs.garbageCollector.diagnostics.maxAge",
        days(conf.retention_days.diagnostics),
    )?;
    tree.write_entry_if_set(
        "jobs.garbageCollector.events.maxAge",
        days(conf.retention_days.events),
    )?;
    Ok(tree)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplicasPreset {
    pub replicas: u32,
    pub min: u32,
    pub max: u32,
}

const fn replicas(replicas: u32, min: u32, max: u32) -> ReplicasPreset {
    ReplicasPreset { replicas, min, max }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourcePreset {
    /// Smallest monitored node count the preset applies to.
    pub nodes_threshold: u32,
    pub main_api: ReplicasPreset,
    pub stats_api: ReplicasPreset,
    pub stats_worker: ReplicasPreset,
    pub forwarding_worker: ReplicasPreset,
}

impl ResourcePreset {
    fn services(&self) -> [(&'static str, ReplicasPreset); 4] {
        [
            ("api.main", self.main_api),
            ("api.stats", self.stats_api),
            ("workers.stats", self.stats_worker),
            ("workers.forwarding", self.forwarding_worker),
        ]
    }
}

/// Sorted by threshold, largest first.
pub const RESOURCE_PRESETS: [ResourcePreset; 2] = [
    ResourcePreset {
        nodes_threshold: 5000,
        main_api: replicas(5, 5, 8),
        stats_api: replicas(5, 5, 8),
        stats_worker: replicas(10, 10, 20),
        forwarding_worker: replicas(3, 3, 8),
    },
    ResourcePreset {
        nodes_threshold: 1000,
        main_api: replicas(3, 3, 5),
        stats_api: replicas(3, 3, 5),
        stats_worker: replicas(3, 3, 10),
        forwarding_worker: replicas(2, 2, 5),
    },
];

/// Largest preset whose threshold does not exceed `nodes`.
pub fn select_preset(nodes: u32) -> Option<&'static ResourcePreset> {
    RESOURCE_PRESETS
        .iter()
        .find(|preset| preset.nodes_threshold <= nodes)
}

pub fn resources(conf: &Configuration) -> Result<ValuesTree> {
    let mut tree = ValuesTree::new();
    let Some(preset) = conf.weka_nodes_monitored.and_then(select_preset) else {
        return Ok(tree);
    };

    for (service, preset) in preset.services() {
        if conf.autoscaling {
            tree.write_entry(&format!("{}.autoscaling.enabled", service), true)?;
            tree.write_entry(&format!("{}.autoscaling.minReplicas", service), preset.min)?;
            tree.write_entry(&format!("{}.autoscaling.maxReplicas", service), preset.max)?;
        } else {
            tree.write_entry(&format!("{}.replicas", service), preset.replicas)?;
        }
    }
    Ok(tree)
}

pub fn forwarding(conf: &Configuration) -> Result<ValuesTree> {
    let fwd = &conf.forwarding;
    let mut tree = ValuesTree::new();
    if !fwd.enabled {
        return Ok(tree);
    }

    tree.write_entry("forwarding.enabled", true)?;
    tree.write_entry_if_set("forwarding.url", fwd.url.clone())?;
    for (key, value) in [
        ("enableEvents", fwd.enable_events),
        ("enableUsageReports", fwd.enable_usage_reports),
        ("enableAnalytics", fwd.enable_analytics),
        ("enableDiagnostics", fwd.enable_diagnostics),
        ("enableStats", fwd.enable_stats),
        ("enableClusterRegistration", fwd.enable_cluster_registration),
    ] {
        tree.write_entry_if_set(&format!("forwarding.categories.{}", key), value)?;
    }
    Ok(tree)
}
