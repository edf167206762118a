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

use super::values::{ValueNode, ValuesTree};
use super::visitors;
use crate::domain::config::Configuration;
use crate::shared::error::{HomeError, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// A named contributor to the generated values.
pub type Visitor = Box<dyn Fn(&Configuration) -> Result<ValuesTree> + Send + Sync>;

/// Registry of visitors merged into one values tree.
#[derive(Default)]
pub struct ValuesGenerator {
    visitors: BTreeMap<String, Visitor>,
}

impl ValuesGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generator with every built-in visitor registered.
    pub fn standard() -> Result<Self> {
        let mut generator = Self::new();
        generator.add_visitor("ingress", visitors::ingress)?;
        generator.add_visitor("smtp", visitors::smtp)?;
        generator.add_visitor("retention", visitors::retention)?;
        generator.add_visitor("resources", visitors::resources)?;
        generator.add_visitor("forwarding", visitors::forwarding)?;
        Ok(generator)
    }

    pub fn add_visitor<F>(&mut self, name: &str, visitor: F) -> Result<()>
    where
        F: Fn(&Configuration) -> Result<ValuesTree> + Send + Sync + 'static,
    {
        if self.visitors.contains_key(name) {
            return Err(HomeError::validation(format!(
                "values visitor {} registered twice",
                name
            )));
        }
        self.visitors.insert(name.to_string(), Box::new(visitor));
        Ok(())
    }

    pub fn visitor_names(&self) -> impl Iterator<Item = &str> {
        self.visitors.keys().map(String::as_str)
    }

    /// Run every visitor, merge the partial trees, then apply
    /// `helm_overrides` on top.
    pub fn generate(&self, conf: &Configuration) -> Result<ValuesTree> {
        let mut tree = ValuesTree::new();
        for (name, visitor) in &self.visitors {
            let partial = visitor(conf).map_err(|e| e.context(name))?;
            debug!(visitor = %name, keys = partial.leaf_paths().len(), "Merging chart values");
            tree.merge(partial).map_err(|e| e.context(name))?;
        }

        for (path, value) in &conf.helm_overrides {
            tree.set_override(path, ValueNode::from_json(value)?)?;
        }
        Ok(tree)
    }

    pub fn generate_yaml(&self, conf: &Configuration) -> Result<String> {
        self.generate(conf)?.to_yaml()
    }
}
