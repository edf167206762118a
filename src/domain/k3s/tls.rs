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

//! Default ingress certificate for the k3s traefik controller.

use crate::domain::config::TlsConfig;
use crate::infrastructure::constants::{
    TRAEFIK_ENDPOINT_NAME, TRAEFIK_POLL_ATTEMPTS, TRAEFIK_POLL_SECS,
};
use crate::infrastructure::kubernetes::client::HomeKubeClient;
use crate::infrastructure::kubernetes::resources::tls::TlsResourcesBuilder;
use crate::shared::error::{HomeError, Result};
use backon::{ConstantBuilder, Retryable};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Poll interval and attempt budget while waiting for traefik.
#[derive(Debug, Clone, Copy)]
pub struct EndpointWait {
    pub interval: Duration,
    pub attempts: usize,
}

impl Default for EndpointWait {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(TRAEFIK_POLL_SECS),
            attempts: TRAEFIK_POLL_ATTEMPTS,
        }
    }
}

/// Block until the traefik endpoints object exists.
pub async fn wait_for_traefik(
    kube: &dyn HomeKubeClient,
    wait: EndpointWait,
    cancel: &CancellationToken,
) -> Result<()> {
    info!("Waiting for traefik to become ready");
    let probe = || async {
        if kube.endpoints_exist(TRAEFIK_ENDPOINT_NAME).await? {
            Ok(())
        } else {
            Err(HomeError::timeout(format!(
                "endpoints {}/{} not found",
                kube.namespace(),
                TRAEFIK_ENDPOINT_NAME
            )))
        }
    };
    let backoff = ConstantBuilder::default()
        .with_delay(wait.interval)
        .with_max_times(wait.attempts);

    tokio::select! {
        _ = cancel.cancelled() => Err(HomeError::Cancelled),
        result = probe
            .retry(backoff)
            .when(|e: &HomeError| !e.is_cancelled())
            .notify(|e: &HomeError, after: Duration| debug!("{}, retrying in {:?}", e, after)) => result,
    }
}

/// Install the configured certificate as traefik's default.
///
/// Returns [`HomeError::NoTls`] without touching the cluster when the
/// certificate or key is missing.
pub async fn setup_tls(
    kube: &dyn HomeKubeClient,
    tls: &TlsConfig,
    wait: EndpointWait,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some((cert, key)) = tls.pair() else {
        warn!("TLS certificate or key is not set, skipping TLS setup");
        return Err(HomeError::NoTls);
    };

    info!("Setting up TLS");
    let builder = TlsResourcesBuilder::new(cert, key, kube.namespace());
    wait_for_traefik(kube, wait, cancel).await?;

    kube.apply_secret(&builder.build_secret()).await?;
    kube.apply_dynamic(
        &builder.build_tls_store(),
        &TlsResourcesBuilder::tls_store_resource(),
    )
    .await?;
    info!("TLS setup completed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Secret;
    use kube::api::{ApiResource, DynamicObject};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeKube {
        ready_after: usize,
        probes: AtomicUsize,
        applied: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl HomeKubeClient for FakeKube {
        async fn apply_secret(&self, secret: &Secret) -> Result<()> {
            let name = secret.metadata.name.clone().unwrap_or_default();
            self.applied.lock().unwrap().push(format!("Secret/{}", name));
            Ok(())
        }

        async fn apply_dynamic(&self, object: &DynamicObject, resource: &ApiResource) -> Result<()> {
            let name = object.metadata.name.clone().unwrap_or_default();
            self.applied
                .lock()
                .unwrap()
                .push(format!("{}/{}", resource.kind, name));
            Ok(())
        }

        async fn endpoints_exist(&self, _name: &str) -> Result<bool> {
            Ok(self.probes.fetch_add(1, Ordering::SeqCst) + 1 >= self.ready_after)
        }

        fn get_client(&self) -> kube::Client {
            unimplemented!("not used by the TLS step")
        }

        fn namespace(&self) -> &str {
            "kube-system"
        }
    }

    fn quick() -> EndpointWait {
        EndpointWait {
            interval: Duration::from_millis(1),
            attempts: 5,
        }
    }

    fn tls() -> TlsConfig {
        TlsConfig {
            enabled: None,
            cert: Some("CERT".to_string()),
            key: Some("KEY".to_string()),
        }
    }

    #[tokio::test]
    async fn test_waits_for_traefik_then_applies() {
        let kube = FakeKube {
            ready_after: 3,
            ..Default::default()
        };
        setup_tls(&kube, &tls(), quick(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(kube.probes.load(Ordering::SeqCst), 3);
        assert_eq!(
            *kube.applied.lock().unwrap(),
            vec!["Secret/tls-secret", "TLSStore/default"]
        );
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let kube = FakeKube {
            ready_after: 100,
            ..Default::default()
        };
        let err = setup_tls(&kube, &tls(), quick(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert!(kube.applied.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_key_skips() {
        let kube = FakeKube::default();
        let conf = TlsConfig {
            key: None,
            ..tls()
        };
        let err = setup_tls(&kube, &conf, quick(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, HomeError::NoTls));
        assert_eq!(kube.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_wait() {
        let kube = FakeKube {
            ready_after: 100,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let wait = EndpointWait {
            interval: Duration::from_secs(60),
            attempts: 5,
        };
        let err = wait_for_traefik(&kube, wait, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
