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

//! Nested chart values addressed by dotted paths.
//!
//! Keys are kept sorted so serialization is deterministic and the result of
//! a merge does not depend on the order partial trees arrive in.

use crate::shared::error::{HomeError, Result};
use serde::Serialize;
use serde_yaml::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValueNode {
    Leaf(Value),
    Map(ValuesTree),
}

impl ValueNode {
    /// JSON objects become nested maps, everything else a leaf.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Object(object) => {
                let mut tree = ValuesTree::new();
                for (key, child) in object {
                    tree.0.insert(key.clone(), ValueNode::from_json(child)?);
                }
                Ok(ValueNode::Map(tree))
            }
            other => Ok(ValueNode::Leaf(serde_yaml::to_value(other)?)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValuesTree(BTreeMap<String, ValueNode>);

fn split_path(path: &str) -> Result<Vec<&str>> {
    let tokens: Vec<&str> = path.split('.').collect();
    if tokens.iter().any(|t| t.is_empty()) {
        return Err(HomeError::validation(format!("invalid values path '{}'", path)));
    }
    Ok(tokens)
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

impl ValuesTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Write `value` at `path`, creating intermediate maps. Fails when the
    /// key already exists or an intermediate segment holds a leaf.
    pub fn write_entry(&mut self, path: &str, value: impl Into<Value>) -> Result<()> {
        let tokens = split_path(path)?;
        let (last, parents) = tokens
            .split_last()
            .ok_or_else(|| HomeError::validation("empty values path"))?;

        let mut current = self;
        for token in parents {
            let node = current
                .0
                .entry(token.to_string())
                .or_insert_with(|| ValueNode::Map(ValuesTree::new()));
            current = match node {
                ValueNode::Map(map) => map,
                ValueNode::Leaf(_) => {
                    return Err(HomeError::conflict(format!(
                        "conflicting value overrides for key {}",
                        path
                    )))
                }
            };
        }

        if current.0.contains_key(*last) {
            return Err(HomeError::conflict(format!(
                "conflicting value overrides for key {}",
                path
            )));
        }
        current
            .0
            .insert(last.to_string(), ValueNode::Leaf(value.into()));
        Ok(())
    }

    /// [`write_entry`](Self::write_entry) for present values only.
    pub fn write_entry_if_set<T: Into<Value>>(&mut self, path: &str, value: Option<T>) -> Result<()> {
        match value {
            Some(value) => self.write_entry(path, value),
            None => Ok(()),
        }
    }

    /// Set `path` to `node`, replacing whatever is there.
    pub fn set_override(&mut self, path: &str, node: ValueNode) -> Result<()> {
        let tokens = split_path(path)?;
        let (last, parents) = tokens
            .split_last()
            .ok_or_else(|| HomeError::validation("empty values path"))?;

        let mut current = self;
        for token in parents {
            let node = current
                .0
                .entry(token.to_string())
                .or_insert_with(|| ValueNode::Map(ValuesTree::new()));
            if let ValueNode::Leaf(_) = node {
                *node = ValueNode::Map(ValuesTree::new());
            }
            current = match node {
                ValueNode::Map(map) => map,
                ValueNode::Leaf(_) => {
                    return Err(HomeError::conflict(format!("cannot override key {}", path)))
                }
            };
        }
        current.0.insert(last.to_string(), node);
        Ok(())
    }

    /// Merge `other` into `self`. Maps merge recursively; any other overlap
    /// is a conflict.
    pub fn merge(&mut self, other: ValuesTree) -> Result<()> {
        self.merge_at("", other)
    }

    fn merge_at(&mut self, prefix: &str, other: ValuesTree) -> Result<()> {
        for (key, incoming) in other.0 {
            let path = join_path(prefix, &key);
            match (self.0.get_mut(&key), incoming) {
                (None, incoming) => {
                    self.0.insert(key, incoming);
                }
                (Some(ValueNode::Map(existing)), ValueNode::Map(incoming)) => {
                    existing.merge_at(&path, incoming)?;
                }
                (Some(_), _) => {
                    return Err(HomeError::conflict(format!(
                        "conflicting value overrides for key {}",
                        path
                    )))
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&ValueNode> {
        let mut current = self;
        let mut tokens = path.split('.').peekable();
        while let Some(token) = tokens.next() {
            let node = current.0.get(token)?;
            if tokens.peek().is_none() {
                return Some(node);
            }
            match node {
                ValueNode::Map(map) => current = map,
                ValueNode::Leaf(_) => return None,
            }
        }
        None
    }

    /// Leaf value at `path`.
    pub fn leaf(&self, path: &str) -> Option<&Value> {
        match self.get(path)? {
            ValueNode::Leaf(value) => Some(value),
            ValueNode::Map(_) => None,
        }
    }

    /// Dotted paths of every leaf, sorted.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_paths("", &mut out);
        out
    }

    fn collect_paths(&self, prefix: &str, out: &mut Vec<String>) {
        for (key, node) in &self.0 {
            let path = join_path(prefix, key);
            match node {
                ValueNode::Leaf(_) => out.push(path),
                ValueNode::Map(map) => map.collect_paths(&path, out),
            }
        }
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}
