use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

/// Marks stored text that holds a JSON-encoded scalar rather than a plain string
const TYPED_PREFIX: &str = "\u{1}json:";

/// Plaintext secret material
///
/// Only ever held in memory on its way to or from the store. `Debug` never
/// prints the value and the buffer is zeroed on drop.
#[derive(Clone)]
pub struct SecretValue {
    inner: SecretString,
}

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            inner: SecretString::from(value.into()),
        }
    }

    /// Exposes the secret value for use
    ///
    /// The returned reference must not be logged, persisted, or echoed back
    /// into a configuration tree.
    pub fn expose(&self) -> &str {
        self.inner.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.expose().is_empty()
    }

    /// Stored form of a scalar tree leaf, `None` for null and empty strings
    ///
    /// Strings are stored verbatim. Numbers and booleans keep their JSON type
    /// through a marker prefix; a string that happens to start with the marker
    /// is encoded the same way so decoding stays exact.
    pub fn from_leaf(leaf: &Value) -> Option<Self> {
        match leaf {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) if !s.starts_with(TYPED_PREFIX) => Some(Self::new(s.as_str())),
            other => Some(Self::new(format!("{}{}", TYPED_PREFIX, other))),
        }
    }

    /// The tree leaf this stored value was created from
    ///
    /// Text without the marker, or with a marker but no valid JSON after it,
    /// comes back as a plain string.
    pub fn to_leaf(&self) -> Value {
        let text = self.expose();
        text.strip_prefix(TYPED_PREFIX)
            .and_then(|json| serde_json::from_str(json).ok())
            .unwrap_or_else(|| Value::String(text.to_string()))
    }
}

impl fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretValue([REDACTED])")
    }
}

impl PartialEq for SecretValue {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for SecretValue {}

impl From<&str> for SecretValue {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SecretValue {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
