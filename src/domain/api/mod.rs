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

//! Typed entities of the Home API and their cursor adapters.

pub mod cluster;
pub mod customer;
pub mod diag;
pub mod event;
pub mod integration;
pub mod status;

pub use cluster::{active_clusters_params, Cluster};
pub use customer::Customer;
pub use diag::{Diag, DiagsQueryOptions};
pub use event::{Event, EventQueryOptions};
pub use integration::{Integration, IntegrationConfiguration, IntegrationRule};
pub use status::{ServerStatus, ServerVersion};
