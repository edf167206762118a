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

use crate::shared::error::{HomeError, Result};
use regex::Regex;

/// Shell-style file name pattern (`*`, `?`, `[...]`), matched against a
/// single path component.
#[derive(Debug, Clone)]
pub struct Glob {
    pattern: String,
    regex: Regex,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self> {
        let mut expr = String::with_capacity(pattern.len() * 2 + 2);
        expr.push('^');
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '*' => expr.push_str("[^/]*"),
                '?' => expr.push_str("[^/]"),
                '[' => {
                    expr.push('[');
                    if chars.peek() == Some(&'!') {
                        chars.next();
                        expr.push('^');
                    }
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        if c == '\\' || c == '[' {
                            expr.push('\\');
                        }
                        expr.push(c);
                    }
                    if !closed {
                        return Err(HomeError::validation(format!(
                            "unterminated character class in pattern '{}'",
                            pattern
                        )));
                    }
                    expr.push(']');
                }
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| {
            HomeError::validation(format!("invalid pattern '{}': {}", pattern, e))
        })?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_and_question() {
        let glob = Glob::new("k3s-airgap-*.tar*").unwrap();
        assert!(glob.matches("k3s-airgap-images-amd64.tar.gz"));
        assert!(glob.matches("k3s-airgap-images-amd64.tar"));
        assert!(!glob.matches("k3s"));

        let glob = Glob::new("wekahome-?.?.tgz").unwrap();
        assert!(glob.matches("wekahome-3.1.tgz"));
        assert!(!glob.matches("wekahome-3.10.tgz"));
    }

    #[test]
    fn test_literal_dots_are_escaped() {
        let glob = Glob::new("install.sh").unwrap();
        assert!(glob.matches("install.sh"));
        assert!(!glob.matches("installXsh"));
    }

    #[test]
    fn test_character_class() {
        let glob = Glob::new("k3s-[!x]*").unwrap();
        assert!(glob.matches("k3s-airgap"));
        assert!(!glob.matches("k3s-xyz"));
        assert!(Glob::new("k3s-[ab").is_err());
    }
}
