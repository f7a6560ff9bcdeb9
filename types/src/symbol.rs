//! Transaction symbols — the opaque string identifiers of DAG transactions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The opaque string identifier of a transaction, stable per content.
///
/// Symbols order lexicographically (`Ord` on the underlying string); the
/// conflict resolver relies on this ordering for its deterministic
/// preference tie-break.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Symbol(String);

impl Symbol {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw symbol string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Symbol bytes, used to build bucket keys.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// A stable-length prefix for log output.
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(10)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.short())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
