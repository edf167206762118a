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

use thiserror::Error;
pub type Result<T> = std::result::Result<T, HomeError>;

#[derive(Error, Debug)]
pub enum HomeError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bundle error: {0}")]
    Bundle(String),

    #[error("{method} {url} returned HTTP {code}")]
    Transport {
        method: String,
        url: String,
        code: u16,
    },

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("{failed} of {total} downloads failed: {details}")]
    Downloads {
        failed: usize,
        total: usize,
        details: String,
    },

    #[error("{failed} of {total} image imports failed: {details}")]
    Imports {
        failed: usize,
        total: usize,
        details: String,
    },

    #[error("{}", decode_message(.source_path, .message))]
    Decode {
        source_path: Option<String>,
        message: String,
    },

    #[error("command '{command}' failed with {status}{}", stderr_suffix(.stderr_tail))]
    Subprocess {
        command: String,
        status: String,
        stderr_tail: String,
    },

    #[error("Malformed configuration: {0}")]
    Conflict(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("k3s is not installed")]
    NotInstalled,

    #[error("k3s is already installed")]
    AlreadyInstalled,

    #[error("TLS certificate and key are not both configured")]
    NoTls,

    #[error("Kubernetes API error: {0}")]
    Kube(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn decode_message(source_path: &Option<String>, message: &str) -> String {
    match source_path {
        Some(path) => format!("Decode error in {}: {}", path, message),
        None => format!("Decode error: {}", message),
    }
}

fn stderr_suffix(tail: &str) -> String {
    if tail.is_empty() {
        String::new()
    } else {
        format!(": {}", tail)
    }
}

impl From<kube::Error> for HomeError {
    fn from(err: kube::Error) -> Self {
        HomeError::Kube(err.to_string())
    }
}

impl From<serde_json::Error> for HomeError {
    fn from(err: serde_json::Error) -> Self {
        HomeError::decode(None::<String>, err)
    }
}

impl From<serde_yaml::Error> for HomeError {
    fn from(err: serde_yaml::Error) -> Self {
        HomeError::decode(None::<String>, err)
    }
}

impl From<toml::de::Error> for HomeError {
    fn from(err: toml::de::Error) -> Self {
        HomeError::decode(None::<String>, err)
    }
}

impl From<toml::ser::Error> for HomeError {
    fn from(err: toml::ser::Error) -> Self {
        HomeError::decode(None::<String>, err)
    }
}

impl From<reqwest::Error> for HomeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HomeError::Timeout(err.to_string())
        } else if err.is_decode() {
            HomeError::decode(None::<String>, err)
        } else {
            HomeError::Http(err.to_string())
        }
    }
}

impl HomeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn bundle(message: impl Into<String>) -> Self {
        Self::Bundle(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout(message.into())
    }

    pub fn transport(method: impl Into<String>, url: impl Into<String>, code: u16) -> Self {
        Self::Transport {
            method: method.into(),
            url: url.into(),
            code,
        }
    }

    pub fn decode(source_path: Option<impl Into<String>>, message: impl ToString) -> Self {
        Self::Decode {
            source_path: source_path.map(Into::into),
            message: message.to_string(),
        }
    }

    pub fn subprocess(
        command: impl Into<String>,
        status: impl Into<String>,
        stderr_tail: impl Into<String>,
    ) -> Self {
        Self::Subprocess {
            command: command.into(),
            status: status.into(),
            stderr_tail: stderr_tail.into(),
        }
    }

    /// Prefix the message of string-carrying variants with `context`.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            Self::Validation(msg) => Self::Validation(format!("{}: {}", context, msg)),
            Self::Bundle(msg) => Self::Bundle(format!("{}: {}", context, msg)),
            Self::Http(msg) => Self::Http(format!("{}: {}", context, msg)),
            Self::Conflict(msg) => Self::Conflict(format!("{}: {}", context, msg)),
            Self::Kube(msg) => Self::Kube(format!("{}: {}", context, msg)),
            Self::Decode {
                source_path,
                message,
            } => Self::Decode {
                source_path,
                message: format!("{}: {}", context, message),
            },
            other => other,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_message() {
        let err = HomeError::transport("GET", "https://h/api/v3/clusters", 404);
        assert_eq!(
            err.to_string(),
            "GET https://h/api/v3/clusters returned HTTP 404"
        );
    }

    #[test]
    fn test_subprocess_message_includes_stderr_tail() {
        let err = HomeError::subprocess("k3s -v", "exit status: 1", "boom");
        assert_eq!(err.to_string(), "command 'k3s -v' failed with exit status: 1: boom");

        let err = HomeError::subprocess("true", "exit status: 2", "");
        assert_eq!(err.to_string(), "command 'true' failed with exit status: 2");
    }

    #[test]
    fn test_context_keeps_kind() {
        let err = HomeError::bundle("marker missing").context("/opt/bundle");
        assert!(matches!(err, HomeError::Bundle(ref m) if m == "/opt/bundle: marker missing"));
        assert!(HomeError::Cancelled.context("x").is_cancelled());
    }
}
