//! Owner scopes: the identity secrets are grouped under

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::EngineError;

/// Sub-scope used in record names when the caller supplies none
pub const DEFAULT_SUB_SCOPE: &str = "global";

/// Kind of entity owning a configuration tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Plugin,
    Agent,
}

impl ScopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plugin => "plugin",
            Self::Agent => "agent",
        }
    }

    /// Namespace token used in derived record names
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Plugin => "action",
            Self::Agent => "agent",
        }
    }
}

impl FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "plugin" => Ok(Self::Plugin),
            "agent" => Ok(Self::Agent),
            _ => Err(format!("Unknown scope kind: {}", s)),
        }
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity under which secrets are grouped
///
/// Textual form is `kind:name` or `kind:name/sub_scope`, e.g. `plugin:loganal`
/// or `plugin:loganal/ingest`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OwnerScope {
    kind: ScopeKind,
    name: String,
    sub_scope: Option<String>,
}

impl OwnerScope {
    /// Create a scope without a sub-scope
    pub fn new(kind: ScopeKind, name: impl Into<String>) -> Result<Self, EngineError> {
        Self::build(kind, name.into(), None)
    }

    /// Create a scope for one sub-entity of an owner (e.g. a single action)
    pub fn with_sub_scope(
        kind: ScopeKind,
        name: impl Into<String>,
        sub_scope: impl Into<String>,
    ) -> Result<Self, EngineError> {
        Self::build(kind, name.into(), Some(sub_scope.into()))
    }

    pub fn plugin(name: impl Into<String>) -> Result<Self, EngineError> {
        Self::new(ScopeKind::Plugin, name)
    }

    pub fn agent(name: impl Into<String>) -> Result<Self, EngineError> {
        Self::new(ScopeKind::Agent, name)
    }

    fn build(kind: ScopeKind, name: String, sub_scope: Option<String>) -> Result<Self, EngineError> {
        let display = match &sub_scope {
            Some(sub) => format!("{}:{}/{}", kind, name, sub),
            None => format!("{}:{}", kind, name),
        };

        if name.trim().is_empty() {
            return Err(EngineError::invalid_scope(display, "name must not be empty"));
        }
        if name.contains('/') {
            return Err(EngineError::invalid_scope(display, "name must not contain '/'"));
        }
        if let Some(sub) = &sub_scope {
            if sub.trim().is_empty() {
                return Err(EngineError::invalid_scope(
                    display,
                    "sub-scope must not be empty",
                ));
            }
            if sub == DEFAULT_SUB_SCOPE {
                return Err(EngineError::invalid_scope(
                    display,
                    "sub-scope 'global' is reserved",
                ));
            }
        }

        Ok(Self {
            kind,
            name,
            sub_scope,
        })
    }

    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sub_scope(&self) -> Option<&str> {
        self.sub_scope.as_deref()
    }

    /// Key used for ledger storage and per-scope locking
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_scope {
            Some(sub) => write!(f, "{}:{}/{}", self.kind, self.name, sub),
            None => write!(f, "{}:{}", self.kind, self.name),
        }
    }
}

impl FromStr for OwnerScope {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once(':')
            .ok_or_else(|| EngineError::invalid_scope(s, "expected kind:name"))?;
        let kind: ScopeKind = kind
            .parse()
            .map_err(|e: String| EngineError::invalid_scope(s, e))?;

        match rest.split_once('/') {
            Some((name, sub)) => Self::with_sub_scope(kind, name, sub),
            None => Self::new(kind, rest),
        }
    }
}

impl Serialize for OwnerScope {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OwnerScope {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        OwnerScope::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plugin_scope() {
        let scope: OwnerScope = "plugin:loganal".parse().unwrap();
        assert_eq!(scope.kind(), ScopeKind::Plugin);
        assert_eq!(scope.name(), "loganal");
        assert_eq!(scope.sub_scope(), None);
        assert_eq!(scope.to_string(), "plugin:loganal");
    }

    #[test]
    fn test_parse_sub_scope() {
        let scope: OwnerScope = "agent:triage/summarize".parse().unwrap();
        assert_eq!(scope.kind(), ScopeKind::Agent);
        assert_eq!(scope.sub_scope(), Some("summarize"));
        assert_eq!(scope.key(), "agent:triage/summarize");
    }

    #[test]
    fn test_rejects_invalid_scopes() {
        assert!("loganal".parse::<OwnerScope>().is_err());
        assert!("widget:loganal".parse::<OwnerScope>().is_err());
        assert!("plugin:".parse::<OwnerScope>().is_err());
        assert!("plugin:loganal/".parse::<OwnerScope>().is_err());
        assert!("plugin:loganal/global".parse::<OwnerScope>().is_err());
    }

    #[test]
    fn test_scope_serde_uses_text_form() {
        let scope = OwnerScope::with_sub_scope(ScopeKind::Plugin, "loganal", "ingest").unwrap();
        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, "\"plugin:loganal/ingest\"");
        let parsed: OwnerScope = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, scope);
    }
}
