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

use futures::TryStreamExt;
use k8s_openapi::api::core::v1::Event;
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Reason of events that are expected while pods start and are not reported.
const IGNORED_REASON: &str = "BackOff";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningEvent {
    pub name: String,
    pub reason: String,
    pub message: String,
}

impl WarningEvent {
    fn from_event(event: &Event) -> Option<Self> {
        if event.type_.as_deref() != Some("Warning") {
            return None;
        }
        let reason = event.reason.clone().unwrap_or_default();
        if reason == IGNORED_REASON {
            return None;
        }
        Some(Self {
            name: event.metadata.name.clone().unwrap_or_default(),
            reason,
            message: event.message.clone().unwrap_or_default(),
        })
    }
}

/// Watch `Warning` events in `namespace` until `cancel` fires. Each event is
/// logged at debug as it arrives; the task returns everything it saw.
pub fn watch_warning_events(
    client: Client,
    namespace: &str,
    cancel: CancellationToken,
) -> JoinHandle<Vec<WarningEvent>> {
    let api: Api<Event> = Api::namespaced(client, namespace);
    let config = watcher::Config::default().fields("type=Warning");

    tokio::spawn(async move {
        let mut seen = Vec::new();
        let stream = watcher(api, config).default_backoff().applied_objects();
        futures::pin_mut!(stream);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = stream.try_next() => match next {
                    Ok(Some(event)) => {
                        if let Some(warning) = WarningEvent::from_event(&event) {
                            debug!(name = %warning.name, reason = %warning.reason, "{}", warning.message);
                            seen.push(warning);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Event watch failed: {}", e);
                        break;
                    }
                },
            }
        }
        seen
    })
}

/// Log collected warnings after a failed release operation.
pub fn report_warnings(warnings: &[WarningEvent]) {
    if warnings.is_empty() {
        return;
    }
    tracing::info!("Received next warnings:");
    for warning in warnings {
        warn!(name = %warning.name, "{}", warning.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(type_: &str, reason: &str) -> Event {
        Event {
            type_: Some(type_.to_string()),
            reason: Some(reason.to_string()),
            message: Some("boom".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_filter() {
        assert!(WarningEvent::from_event(&event("Normal", "Pulled")).is_none());
        assert!(WarningEvent::from_event(&event("Warning", "BackOff")).is_none());
        let warning = WarningEvent::from_event(&event("Warning", "FailedMount")).unwrap();
        assert_eq!(warning.message, "boom");
    }
}
