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

/// Bundle layout
pub const BUNDLE_MARKER_FILE: &str = ".bundle";
pub const BUNDLE_MANIFEST_FILE: &str = "versions.json";
pub const BUNDLE_IMAGES_DIR: &str = "images";
pub const CHART_ARCHIVE_GLOB: &str = "wekahome-*.tgz";

/// Remote API
pub const DEFAULT_CLOUD_URL: &str = "https://api.home.weka.io/";
pub const DEFAULT_API_PREFIX: &str = "api/v3";
pub const EVENTS_API_PREFIX: &str = "api";
pub const REQUEST_TIMEOUT_SECS: u64 = 60;
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 1000;
pub const DOWNLOAD_CONCURRENCY: usize = 16;
pub const ACTIVE_CLUSTER_SEEN_WITHIN_SECS: u64 = 86_400;

/// Local CLI configuration
pub const CONFIG_DIR: &str = ".config/home-cli";
pub const SITE_CONFIG_FILE: &str = "config.toml";
pub const ALIASES_FILE: &str = "aliases.toml";
pub const CONFIG_FILE_MODE: u32 = 0o644;

/// k3s placement
pub const K3S_BIN_DIR: &str = "/usr/local/bin";
pub const K3S_BINARY_NAME: &str = "k3s";
pub const K3S_IMAGES_DIR: &str = "/var/lib/rancher/k3s/agent/images";
pub const K3S_UNINSTALL_SCRIPT: &str = "k3s-uninstall.sh";
pub const K3S_INSTALL_SCRIPT: &str = "install.sh";
pub const K3S_AIRGAP_GLOB: &str = "k3s-airgap-*.tar*";
pub const K3S_LOCAL_STORAGE_PATH: &str = "/opt/local-path-provisioner";
pub const K3S_KUBECONFIG: &str = "/etc/rancher/k3s/k3s.yaml";
pub const K3S_SERVICE_NAME: &str = "k3s";
pub const K3S_BINARY_MODE: u32 = 0o755;
pub const K3S_IMAGE_MODE: u32 = 0o644;

/// DNS workaround
pub const SYSTEM_RESOLV_CONF: &str = "/etc/resolv.conf";
pub const K3S_RESOLV_CONF: &str = "/etc/k3s-resolv.conf";
pub const K3S_RESOLV_CONF_CONTENT: &str = "nameserver 127.0.0.1:9999\n";

/// Firewall
pub const FIREWALL_TCP_PORTS: [u16; 6] = [80, 443, 6443, 10250, 10257, 10259];
pub const K3S_POD_CIDR: &str = "10.42.0.0/16";
pub const K3S_SERVICE_CIDR: &str = "10.43.0.0/16";

/// Interfaces never picked automatically
pub const IGNORED_INTERFACE_PREFIXES: [&str; 4] = ["cni", "veth", "flannel", "docker"];

/// Container runtime
pub const CONTAINERD_NAMESPACE: &str = "k8s.io";

/// Helm release
pub const RELEASE_NAME: &str = "wekahome";
pub const RELEASE_NAMESPACE: &str = "home-weka-io";
pub const CHART_NAME: &str = "wekahome";
pub const CHART_REPO_NAME: &str = "wekahome";
pub const CHART_REPO_URL: &str = "https://weka.github.io/gohome";
pub const HELM_TIMEOUT_SECS: u64 = 300;
pub const FIELD_MANAGER: &str = "homecli";

/// TLS post-step
pub const TLS_NAMESPACE: &str = "kube-system";
pub const TLS_SECRET_NAME: &str = "tls-secret";
pub const TLS_STORE_NAME: &str = "default";
pub const TRAEFIK_ENDPOINT_NAME: &str = "traefik";
pub const TRAEFIK_POLL_SECS: u64 = 5;
pub const TRAEFIK_POLL_ATTEMPTS: usize = 120;

/// Upgrade
pub const BACKUP_DIR_PREFIX: &str = "homecli_backup";
