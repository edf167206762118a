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

use crate::infrastructure::constants::{TLS_SECRET_NAME, TLS_STORE_NAME};
use crate::shared::error::Result;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use serde_json::json;
use std::collections::BTreeMap;

/// Traefik's default TLS store and the secret it points at.
pub struct TlsResourcesBuilder {
    cert: String,
    key: String,
    namespace: String,
}

impl TlsResourcesBuilder {
    pub fn new(cert: impl Into<String>, key: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
            namespace: namespace.into(),
        }
    }

    pub fn tls_store_resource() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk(
            "traefik.containo.us",
            "v1alpha1",
            "TLSStore",
        ))
    }

    pub fn build_secret(&self) -> Secret {
        let mut data = BTreeMap::new();
        data.insert(
            "tls.crt".to_string(),
            ByteString(self.cert.as_bytes().to_vec()),
        );
        data.insert(
            "tls.key".to_string(),
            ByteString(self.key.as_bytes().to_vec()),
        );

        Secret {
            metadata: ObjectMeta {
                name: Some(TLS_SECRET_NAME.to_string()),
                namespace: Some(self.namespace.clone()),
                ..Default::default()
            },
            data: Some(data),
            type_: Some("Opaque".to_string()),
            ..Default::default()
        }
    }

    pub fn build_tls_store(&self) -> DynamicObject {
        DynamicObject::new(TLS_STORE_NAME, &Self::tls_store_resource())
            .within(&self.namespace)
            .data(json!({
                "spec": {
                    "defaultCertificate": { "secretName": TLS_SECRET_NAME }
                }
            }))
    }

    /// Both objects as a multi-document YAML manifest. Secret data is base64.
    pub fn render_manifest(&self) -> Result<String> {
        let store = serde_yaml::to_string(&self.build_tls_store())?;
        let secret = serde_yaml::to_string(&self.build_secret())?;
        Ok(format!("---\n{}---\n{}", store, secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_contents() {
        let builder = TlsResourcesBuilder::new("CERT", "KEY", "kube-system");
        let manifest = builder.render_manifest().unwrap();

        assert!(manifest.contains("kind: TLSStore"));
        assert!(manifest.contains("apiVersion: traefik.containo.us/v1alpha1"));
        assert!(manifest.contains("secretName: tls-secret"));
        // "CERT" and "KEY" in base64
        assert!(manifest.contains("tls.crt: Q0VSVA=="));
        assert!(manifest.contains("tls.key: S0VZ"));
        assert!(manifest.contains("namespace: kube-system"));
    }

    #[test]
    fn test_secret_shape() {
        let secret = TlsResourcesBuilder::new("c", "k", "ns").build_secret();
        assert_eq!(secret.metadata.name.as_deref(), Some("tls-secret"));
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
        assert_eq!(secret.data.unwrap().len(), 2);
    }
}
