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

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use homecli::domain::chart::{ChartLocation, ChartSpec, HelmOptions, LocationOverride};
    use homecli::infrastructure::helm::HelmBackend;
    use homecli::{Bundle, ChartDriver, Configuration, HomeError, Result};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    /// Records every call; install and upgrade fail when asked to.
    #[derive(Default)]
    struct FakeHelm {
        calls: Mutex<Vec<String>>,
        specs: Mutex<Vec<ChartSpec>>,
        fail_upgrade: Option<fn() -> HomeError>,
    }

    impl FakeHelm {
        fn failing_upgrade(err: fn() -> HomeError) -> Self {
            Self {
                fail_upgrade: Some(err),
                ..Default::default()
            }
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HelmBackend for FakeHelm {
        async fn add_repo(&self, name: &str, url: &str, _: &CancellationToken) -> Result<()> {
            self.record(format!("repo {} {}", name, url));
            Ok(())
        }

        async fn install(&self, spec: &ChartSpec, _: &CancellationToken) -> Result<String> {
            self.record(format!("install {}", spec.chart));
            self.specs.lock().unwrap().push(spec.clone());
            Ok("NOTES".to_string())
        }

        async fn upgrade(&self, spec: &ChartSpec, _: &CancellationToken) -> Result<String> {
            self.record(format!("upgrade {}", spec.chart));
            self.specs.lock().unwrap().push(spec.clone());
            match self.fail_upgrade {
                Some(err) => Err(err()),
                None => Ok(String::new()),
            }
        }

        async fn rollback(&self, spec: &ChartSpec, _: &CancellationToken) -> Result<()> {
            self.record(format!("rollback {}", spec.release_name));
            Ok(())
        }
    }

    fn bundle_with_chart() -> (tempfile::TempDir, Bundle) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".bundle"), "").unwrap();
        std::fs::write(dir.path().join("wekahome-3.1.0.tgz"), b"chart").unwrap();
        let bundle = Bundle::open(dir.path()).unwrap();
        (dir, bundle)
    }

    fn driver(helm: &Arc<FakeHelm>) -> ChartDriver {
        ChartDriver::new(helm.clone()).unwrap()
    }

    #[tokio::test]
    async fn test_explicit_path_wins() {
        let helm = Arc::new(FakeHelm::default());
        let (_dir, bundle) = bundle_with_chart();
        let location = LocationOverride {
            path: Some(PathBuf::from("/charts/custom")),
            remote_download: true,
            version: None,
        };

        let chart = driver(&helm)
            .chart_location(&location, Some(&bundle), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(chart, ChartLocation::Path(PathBuf::from("/charts/custom")));
        assert!(helm.calls().is_empty());
    }

    #[tokio::test]
    async fn test_remote_adds_repository() {
        let helm = Arc::new(FakeHelm::default());
        let (_dir, bundle) = bundle_with_chart();
        let location = LocationOverride {
            remote_download: true,
            ..Default::default()
        };

        let chart = driver(&helm)
            .chart_location(&location, Some(&bundle), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(chart.reference(), "wekahome/wekahome");
        assert_eq!(helm.calls(), vec!["repo wekahome https://weka.github.io/gohome"]);
    }

    #[tokio::test]
    async fn test_bundle_chart_then_error() {
        let helm = Arc::new(FakeHelm::default());
        let (dir, bundle) = bundle_with_chart();
        let driver = driver(&helm);
        let cancel = CancellationToken::new();

        let chart = driver
            .chart_location(&LocationOverride::default(), Some(&bundle), &cancel)
            .await
            .unwrap();
        assert_eq!(
            chart,
            ChartLocation::Bundle(dir.path().join("wekahome-3.1.0.tgz"))
        );

        let err = driver
            .chart_location(&LocationOverride::default(), None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::Validation(_)), "{err}");

        std::fs::remove_file(dir.path().join("wekahome-3.1.0.tgz")).unwrap();
        let err = driver
            .chart_location(&LocationOverride::default(), Some(&bundle), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::Bundle(_)), "{err}");
    }

    #[tokio::test]
    async fn test_install_passes_values_and_version() {
        let helm = Arc::new(FakeHelm::default());
        let conf = Configuration::from_json(r#"{"host":"home.local"}"#).unwrap();
        let opts = HelmOptions {
            location: LocationOverride {
                remote_download: true,
                version: Some("3.1.0".to_string()),
                ..Default::default()
            },
            namespace: Some("custom-ns".to_string()),
            debug: false,
        };

        driver(&helm)
            .install(&conf, &opts, None, &CancellationToken::new())
            .await
            .unwrap();

        let specs = helm.specs.lock().unwrap();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].namespace, "custom-ns");
        assert_eq!(specs[0].version.as_deref(), Some("3.1.0"));
        assert!(specs[0].values.contains("host: home.local"));
        assert_eq!(helm.calls().last().unwrap(), "install wekahome/wekahome");
    }

    fn remote_opts(debug: bool) -> HelmOptions {
        HelmOptions {
            location: LocationOverride {
                remote_download: true,
                ..Default::default()
            },
            namespace: None,
            debug,
        }
    }

    #[tokio::test]
    async fn test_failed_upgrade_rolls_back() {
        let helm = Arc::new(FakeHelm::failing_upgrade(|| {
            HomeError::subprocess("helm upgrade", "exit status: 1", "boom")
        }));
        let err = driver(&helm)
            .upgrade(
                &Configuration::default(),
                &remote_opts(false),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HomeError::Subprocess { .. }), "{err}");
        assert_eq!(helm.calls().last().unwrap(), "rollback wekahome");
    }

    #[tokio::test]
    async fn test_no_rollback_in_debug_or_on_cancel() {
        let helm = Arc::new(FakeHelm::failing_upgrade(|| {
            HomeError::timeout("helm upgrade")
        }));
        let conf = Configuration::default();
        driver(&helm)
            .upgrade(&conf, &remote_opts(true), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(helm.calls().iter().all(|c| !c.starts_with("rollback")));

        let helm = Arc::new(FakeHelm::failing_upgrade(|| HomeError::Cancelled));
        let err = driver(&helm)
            .upgrade(&conf, &remote_opts(false), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(helm.calls().iter().all(|c| !c.starts_with("rollback")));
    }
}
