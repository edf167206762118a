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

use crate::infrastructure::constants::FIELD_MANAGER;
use crate::shared::error::{HomeError, Result};
use k8s_openapi::api::core::v1::{Endpoints, Secret};
use kube::api::{ApiResource, DynamicObject, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client};
use std::path::Path;
use tracing::debug;

/// The cluster operations the installer needs.
#[async_trait::async_trait]
pub trait HomeKubeClient: Send + Sync {
    async fn apply_secret(&self, secret: &Secret) -> Result<()>;

    async fn apply_dynamic(&self, object: &DynamicObject, resource: &ApiResource) -> Result<()>;

    async fn endpoints_exist(&self, name: &str) -> Result<bool>;

    fn get_client(&self) -> Client;

    fn namespace(&self) -> &str;
}

pub struct HomeKubeClientImpl {
    client: Client,
    namespace: String,
}

impl HomeKubeClientImpl {
    pub fn from_client(client: Client, namespace: impl Into<String>) -> Self {
        Self {
            client,
            namespace: namespace.into(),
        }
    }

    pub async fn new_with_config(
        namespace: String,
        kubeconfig_path: Option<&Path>,
        context: Option<String>,
    ) -> Result<Self> {
        let kubeconfig = match kubeconfig_path {
            Some(path) => Kubeconfig::read_from(path).map_err(|e| {
                HomeError::Kube(format!(
                    "Failed to load kubeconfig {}: {}",
                    path.display(),
                    e
                ))
            })?,
            None => Kubeconfig::read()
                .map_err(|e| HomeError::Kube(format!("Failed to load kubeconfig: {}", e)))?,
        };

        let config_options = KubeConfigOptions {
            context,
            cluster: None,
            user: None,
        };

        let config = kube::Config::from_custom_kubeconfig(kubeconfig, &config_options)
            .await
            .map_err(|e| HomeError::Kube(format!("Failed to create Kubernetes config: {}", e)))?;

        let client = Client::try_from(config)
            .map_err(|e| HomeError::Kube(format!("Failed to create Kubernetes client: {}", e)))?;

        Ok(Self { client, namespace })
    }

    fn patch_params() -> PatchParams {
        PatchParams::apply(FIELD_MANAGER).force()
    }
}

#[async_trait::async_trait]
impl HomeKubeClient for HomeKubeClientImpl {
    async fn apply_secret(&self, secret: &Secret) -> Result<()> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), &self.namespace);
        let name = secret
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| HomeError::validation("Secret name is required"))?;

        debug!(namespace = %self.namespace, name, "Applying secret");
        api.patch(name, &Self::patch_params(), &Patch::Apply(secret))
            .await?;
        Ok(())
    }

    async fn apply_dynamic(&self, object: &DynamicObject, resource: &ApiResource) -> Result<()> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), &self.namespace, resource);
        let name = object
            .metadata
            .name
            .as_deref()
            .ok_or_else(|| HomeError::validation(format!("{} name is required", resource.kind)))?;

        debug!(namespace = %self.namespace, kind = %resource.kind, name, "Applying object");
        api.patch(name, &Self::patch_params(), &Patch::Apply(object))
            .await?;
        Ok(())
    }

    async fn endpoints_exist(&self, name: &str) -> Result<bool> {
        let api: Api<Endpoints> = Api::namespaced(self.client.clone(), &self.namespace);
        Ok(api.get_opt(name).await?.is_some())
    }

    fn get_client(&self) -> Client {
        self.client.clone()
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }
}
