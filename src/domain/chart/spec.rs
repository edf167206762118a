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
    CHART_NAME, CHART_REPO_NAME, HELM_TIMEOUT_SECS, RELEASE_NAME, RELEASE_NAMESPACE,
};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Where the chart comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartLocation {
    /// Explicit path given by the operator.
    Path(PathBuf),
    /// Archive found inside the offline bundle.
    Bundle(PathBuf),
    /// `<repo>/<chart>` from the public chart repository.
    Remote { repo: String, chart: String },
}

impl ChartLocation {
    pub fn remote() -> Self {
        Self::Remote {
            repo: CHART_REPO_NAME.to_string(),
            chart: CHART_NAME.to_string(),
        }
    }

    /// Chart reference as passed to helm.
    pub fn reference(&self) -> String {
        match self {
            Self::Path(path) | Self::Bundle(path) => path.display().to_string(),
            Self::Remote { repo, chart } => format!("{}/{}", repo, chart),
        }
    }
}

impl fmt::Display for ChartLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reference())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChartSpec {
    pub release_name: String,
    pub namespace: String,
    pub chart: ChartLocation,
    /// Chart version constraint; any version when unset.
    pub version: Option<String>,
    /// Rendered values YAML.
    pub values: String,
    pub create_namespace: bool,
    pub reset_values: bool,
    pub wait: bool,
    pub wait_for_jobs: bool,
    pub timeout: Duration,
}

impl ChartSpec {
    pub fn new(chart: ChartLocation, values: String, namespace: Option<&str>) -> Self {
        Self {
            release_name: RELEASE_NAME.to_string(),
            namespace: namespace.unwrap_or(RELEASE_NAMESPACE).to_string(),
            chart,
            version: None,
            values,
            create_namespace: true,
            reset_values: true,
            wait: true,
            wait_for_jobs: true,
            timeout: Duration::from_secs(HELM_TIMEOUT_SECS),
        }
    }

    pub fn with_version(mut self, version: Option<String>) -> Self {
        self.version = version.filter(|v| !v.is_empty());
        self
    }

    /// Timeout in helm's duration syntax, e.g. `5m0s`.
    pub fn helm_timeout(&self) -> String {
        let secs = self.timeout.as_secs();
        format!("{}m{}s", secs / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let spec = ChartSpec::new(ChartLocation::remote(), String::new(), None);
        assert_eq!(spec.release_name, "wekahome");
        assert_eq!(spec.namespace, "home-weka-io");
        assert_eq!(spec.helm_timeout(), "5m0s");
        assert!(spec.create_namespace && spec.reset_values && spec.wait && spec.wait_for_jobs);
        assert_eq!(spec.chart.reference(), "wekahome/wekahome");
    }
}
