use serde::{Deserialize, Serialize};

use crate::connections::DEFAULT_SUB_PATH;

/// The three persisted notification settings.
///
/// An empty string means "unset". Stored as JSON:
/// `{ "base_endpoint": "https://push.example.org", "sub_path": "/api/notify", "token": "…" }`
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    pub base_endpoint: String,
    pub sub_path: String,
    pub token: String,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            base_endpoint: String::new(),
            sub_path: DEFAULT_SUB_PATH.to_string(),
            token: String::new(),
        }
    }
}

impl Configuration {
    pub fn new(
        base_endpoint: impl Into<String>,
        sub_path: impl Into<String>,
        token: impl Into<String>,
    ) -> Self {
        Self {
            base_endpoint: base_endpoint.into(),
            sub_path: sub_path.into(),
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("base_endpoint", &self.base_endpoint)
            .field("sub_path", &self.sub_path)
            .field("token", &redact(&self.token))
            .finish()
    }
}

/// Shortens a credential for logs: the first 8 characters, then `...`.
pub fn redact(token: &str) -> String {
    if token.is_empty() {
        return "<none>".to_string();
    }
    let head: String = token.chars().take(8).collect();
    if head.len() < token.len() {
        format!("{head}...")
    } else {
        head
    }
}
