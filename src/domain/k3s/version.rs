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
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A k3s release version such as `v1.28.3+k3s1`. Build metadata after `+`
/// does not take part in comparisons.
#[derive(Debug, Clone)]
pub struct K3sVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Option<String>,
    pub build: Option<String>,
}

impl FromStr for K3sVersion {
    type Err = HomeError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || HomeError::validation(format!("invalid k3s version {:?}", s));

        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let (rest, build) = match trimmed.split_once('+') {
            Some((rest, build)) => (rest, Some(build.to_string())),
            None => (trimmed, None),
        };
        let (core, pre) = match rest.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(invalid()),
            None => (rest, None),
        };

        let mut parts = core.split('.').map(|p| p.parse::<u64>().map_err(|_| invalid()));
        let major = parts.next().ok_or_else(invalid)??;
        let minor = parts.next().ok_or_else(invalid)??;
        let patch = parts.next().unwrap_or(Ok(0))?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            major,
            minor,
            patch,
            pre,
            build,
        })
    }
}

impl Ord for K3sVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialEq for K3sVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for K3sVersion {}

impl PartialOrd for K3sVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for K3sVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{}", pre)?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// Extract the version from `k3s -v` output:
///
/// ```text
/// k3s version v1.28.3+k3s1 (bbafb86e)
/// go version go1.20.10
/// ```
pub fn parse_version_output(output: &str) -> Result<K3sVersion> {
    output
        .lines()
        .find(|line| line.starts_with("k3s version"))
        .and_then(|line| line.split_whitespace().nth(2))
        .ok_or_else(|| {
            HomeError::validation(format!("unexpected k3s version output: {:?}", output.trim()))
        })?
        .parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> K3sVersion {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse() {
        let version = v("v1.28.3+k3s1");
        assert_eq!((version.major, version.minor, version.patch), (1, 28, 3));
        assert_eq!(version.build.as_deref(), Some("k3s1"));
        assert_eq!(version.to_string(), "v1.28.3+k3s1");
        assert_eq!(v("1.30.0-rc1+k3s1").pre.as_deref(), Some("rc1"));

        assert!("".parse::<K3sVersion>().is_err());
        assert!("v1".parse::<K3sVersion>().is_err());
        assert!("v1.x.3".parse::<K3sVersion>().is_err());
        assert!("v1.2.3.4".parse::<K3sVersion>().is_err());
    }

    #[test]
    fn test_ordering_ignores_build() {
        assert!(v("v1.28.3+k3s1") < v("v1.29.0+k3s1"));
        assert!(v("v1.28.10+k3s1") > v("v1.28.9+k3s1"));
        assert_eq!(v("v1.28.3+k3s1"), v("v1.28.3+k3s2"));
        assert!(v("v1.29.0-rc1+k3s1") < v("v1.29.0+k3s1"));
    }

    #[test]
    fn test_parse_version_output() {
        let out = "k3s version v1.28.3+k3s1 (bbafb86e)\ngo version go1.20.10\n";
        assert_eq!(parse_version_output(out).unwrap(), v("v1.28.3+k3s1"));
        assert!(parse_version_output("command not found").is_err());
    }
}
