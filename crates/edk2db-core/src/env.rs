use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Environment handed to every generator during a parse run.
///
/// Keys are kept sorted so rows derived from the environment are inserted in a
/// stable order.
pub type Env = BTreeMap<String, String>;

/// Correlation key minted once per parse run.
///
/// Rendered as 32 lowercase hex digits (a v4 UUID without hyphens).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Mint a fresh identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
