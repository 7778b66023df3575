//! Deterministic secret record names
//!
//! A record name is the join key between the scope ledger and the external
//! store, so derivation is a pure function of the owner scope, the field path
//! and the engine configuration. Names have the shape
//!
//! ```text
//! {scope}--{namespace}{category}--{sub_scope|global}--{scope}{-tail}
//! ```
//!
//! using only lowercase alphanumerics and hyphens. Whenever normalisation
//! altered an input, or the name is longer than the backend allows, the
//! readable part is cut and a hash of the exact inputs is appended after a
//! `--` separator. Every readable component is normalised, so a lossless leaf
//! never contains `--` and a hashed name can never spell out a lossless one.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classify::{Classification, SecretField};
use crate::config::EngineConfig;
use crate::path::{FieldPath, PathSegment};
use crate::scope::{OwnerScope, DEFAULT_SUB_SCOPE};

/// Smallest backend name limit the deriver accepts
pub const MIN_NAME_LENGTH: usize = 32;

/// Hex characters of the disambiguating hash
const HASH_LEN: usize = 12;

const SEPARATOR: &str = "--";
const REFERENCE_PREFIX: &str = "<ref:";
const REFERENCE_SUFFIX: &str = ">";

/// Backend-legal name of one secret record
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretRecordName(String);

impl SecretRecordName {
    /// Wrap a name read back from storage (ledger entries, store listings)
    pub fn from_stored(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The in-tree reference string for this record, e.g. `<ref:name>`
    pub fn to_reference(&self) -> String {
        format!("{}{}{}", REFERENCE_PREFIX, self.0, REFERENCE_SUFFIX)
    }

    /// Extract the record name from a reference string
    pub fn parse_reference(value: &str) -> Option<Self> {
        let name = value
            .strip_prefix(REFERENCE_PREFIX)?
            .strip_suffix(REFERENCE_SUFFIX)?;
        let legal = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        legal.then(|| Self(name.to_string()))
    }
}

impl fmt::Display for SecretRecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where in the tree a secret lives, as reflected in its name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    Credential,
    AdditionalField,
    Field,
}

impl Category {
    fn marker(&self) -> &'static str {
        match self {
            Self::Credential => "",
            Self::AdditionalField => "-addset",
            Self::Field => "-field",
        }
    }
}

/// Turns (scope, field path) into a record name
#[derive(Debug, Clone)]
pub struct NameDeriver {
    suffix: String,
    additional_fields_key: String,
    max_len: usize,
}

impl NameDeriver {
    /// Build a deriver; `config` is expected to be validated already
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            suffix: config.secret_suffix.clone(),
            additional_fields_key: config.additional_fields_key.clone(),
            max_len: config.max_name_length.max(MIN_NAME_LENGTH),
        }
    }

    pub fn derive_for(&self, scope: &OwnerScope, field: &SecretField) -> SecretRecordName {
        self.derive(scope, &field.path, &field.classification)
    }

    pub fn derive(
        &self,
        scope: &OwnerScope,
        path: &FieldPath,
        classification: &Classification,
    ) -> SecretRecordName {
        let category = self.category(path, classification);
        let (tail, tail_lossless) = self.tail(path, classification, category);

        let (name, name_lossless) = component(scope.name());
        let (sub, sub_lossless) = component(scope.sub_scope().unwrap_or(DEFAULT_SUB_SCOPE));

        let namespace = format!("{}{}", scope.kind().namespace(), category.marker());
        let leaf = format!("{}{}", name, tail);
        let readable = [
            name.as_str(),
            namespace.as_str(),
            sub.as_str(),
            leaf.as_str(),
        ]
        .join(SEPARATOR);

        let lossless = name_lossless && sub_lossless && tail_lossless;
        if lossless && readable.len() <= self.max_len {
            return SecretRecordName(readable);
        }

        let hash = self.hash(scope, path, classification, category);
        let keep = self.max_len - HASH_LEN - SEPARATOR.len();
        let cut = &readable[..readable.len().min(keep)];
        SecretRecordName(format!("{}{}{}", cut.trim_end_matches('-'), SEPARATOR, hash))
    }

    fn category(&self, path: &FieldPath, classification: &Classification) -> Category {
        match classification {
            Classification::WellKnown { .. } => Category::Credential,
            Classification::Suffix
                if path.first_key() == Some(self.additional_fields_key.as_str()) =>
            {
                Category::AdditionalField
            }
            Classification::Suffix => Category::Field,
        }
    }

    /// Readable field part of the name and whether it is lossless
    fn tail(
        &self,
        path: &FieldPath,
        classification: &Classification,
        category: Category,
    ) -> (String, bool) {
        if let Classification::WellKnown { alias } = classification {
            return match alias {
                Some(alias) => (format!("-{}", alias), true),
                None => (String::new(), true),
            };
        }

        let segments = path.segments();
        let skip = usize::from(category == Category::AdditionalField);
        let last = segments.len().saturating_sub(1);

        let mut tail = String::new();
        let mut lossless = true;
        for (i, segment) in segments.iter().enumerate().skip(skip) {
            let text = match segment {
                PathSegment::Index(idx) => idx.to_string(),
                PathSegment::Key(key) => {
                    let key = if i == last {
                        key.strip_suffix(self.suffix.as_str()).unwrap_or(key.as_str())
                    } else {
                        key.as_str()
                    };
                    // All-digit keys would read like sequence indices
                    let exact = !key.is_empty()
                        && key.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
                        && !key.chars().all(|c| c.is_ascii_digit());
                    lossless &= exact;
                    normalize(key)
                }
            };
            if !text.is_empty() {
                tail.push('-');
                tail.push_str(&text);
            }
        }
        (tail, lossless)
    }

    /// Short hash over an unambiguous encoding of every input
    fn hash(
        &self,
        scope: &OwnerScope,
        path: &FieldPath,
        classification: &Classification,
        category: Category,
    ) -> String {
        let mut canonical = String::new();
        push_field(&mut canonical, scope.kind().as_str());
        push_field(&mut canonical, scope.name());
        match scope.sub_scope() {
            Some(sub) => push_field(&mut canonical, sub),
            None => canonical.push('~'),
        }
        push_field(&mut canonical, category.marker());
        if let Classification::WellKnown { alias: Some(alias) } = classification {
            push_field(&mut canonical, alias);
        }
        for segment in path.segments() {
            match segment {
                PathSegment::Key(key) => {
                    canonical.push('k');
                    push_field(&mut canonical, key);
                }
                PathSegment::Index(idx) => {
                    canonical.push('i');
                    push_field(&mut canonical, &idx.to_string());
                }
            }
        }

        let digest = Sha256::digest(canonical.as_bytes());
        let mut hex = hex::encode(digest);
        hex.truncate(HASH_LEN);
        hex
    }
}

/// Length-prefixed field, so concatenation stays unambiguous
fn push_field(out: &mut String, value: &str) {
    out.push_str(&value.len().to_string());
    out.push(':');
    out.push_str(value);
}

/// Normalised scope component and whether normalisation left it untouched
fn component(raw: &str) -> (String, bool) {
    let normalized = normalize(raw);
    let lossless = !raw.is_empty() && normalized == raw;
    if normalized.is_empty() {
        ("x".to_string(), false)
    } else {
        (normalized, lossless)
    }
}

/// Lowercase, map everything outside `[a-z0-9]` to `-`, collapse and trim hyphens
pub fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            out.push(c);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;
    use crate::scope::ScopeKind;

    fn deriver() -> NameDeriver {
        NameDeriver::new(&EngineConfig::default())
    }

    fn suffix_path(path: &str) -> FieldPath {
        path.parse().unwrap()
    }

    #[test]
    fn test_primary_credential_name() {
        let scope = OwnerScope::plugin("loganal").unwrap();
        let name = deriver().derive(
            &scope,
            &suffix_path("auth.key"),
            &Classification::WellKnown { alias: None },
        );
        assert_eq!(name.as_str(), "loganal--action--global--loganal");
        assert_eq!(name.to_reference(), "<ref:loganal--action--global--loganal>");
    }

    #[test]
    fn test_additional_field_name() {
        let scope = OwnerScope::plugin("loganal").unwrap();
        let name = deriver().derive(
            &scope,
            &suffix_path("additionalFields.alpha__Secret"),
            &Classification::Suffix,
        );
        assert_eq!(name.as_str(), "loganal--action-addset--global--loganal-alpha");
    }

    #[test]
    fn test_nested_field_and_sub_scope() {
        let scope = OwnerScope::with_sub_scope(ScopeKind::Agent, "triage", "summarize").unwrap();
        let name = deriver().derive(
            &scope,
            &suffix_path("hosts[1].password__Secret"),
            &Classification::Suffix,
        );
        assert_eq!(name.as_str(), "triage--agent-field--summarize--triage-hosts-1-password");
    }

    #[test]
    fn test_aliased_well_known_field() {
        let scope = OwnerScope::plugin("loganal").unwrap();
        let name = deriver().derive(
            &scope,
            &suffix_path("auth.password"),
            &Classification::WellKnown {
                alias: Some("password".into()),
            },
        );
        assert_eq!(name.as_str(), "loganal--action--global--loganal-password");
    }

    #[test]
    fn test_lossy_input_gets_hash() {
        let scope = OwnerScope::plugin("loganal").unwrap();
        let camel = deriver().derive(
            &scope,
            &suffix_path("additionalFields.apiKey__Secret"),
            &Classification::Suffix,
        );
        let lower = deriver().derive(
            &scope,
            &suffix_path("additionalFields.apikey__Secret"),
            &Classification::Suffix,
        );
        assert_eq!(lower.as_str(), "loganal--action-addset--global--loganal-apikey");
        assert!(camel.as_str().starts_with("loganal--action-addset--global--loganal-apikey--"));
        assert_ne!(camel, lower);
    }

    #[test]
    fn test_hash_never_reads_as_a_path_segment() {
        // Same readable part once `Prod` is lowercased, and the second path's
        // last key is the first name's hash
        let upper = OwnerScope::with_sub_scope(ScopeKind::Plugin, "loganal", "Prod").unwrap();
        let lower = OwnerScope::with_sub_scope(ScopeKind::Plugin, "loganal", "prod").unwrap();

        let hashed = deriver().derive(
            &upper,
            &suffix_path("additionalFields.a__Secret"),
            &Classification::Suffix,
        );
        let hash = hashed.as_str().rsplit(SEPARATOR).next().unwrap();
        assert_eq!(hash.len(), HASH_LEN);
        assert_eq!(
            hashed.as_str(),
            format!("loganal--action-addset--prod--loganal-a--{}", hash)
        );

        let plain = deriver().derive(
            &lower,
            &suffix_path(&format!("additionalFields.a.{}__Secret", hash)),
            &Classification::Suffix,
        );
        assert_eq!(
            plain.as_str(),
            format!("loganal--action-addset--prod--loganal-a-{}", hash)
        );
        assert_ne!(hashed, plain);
    }

    #[test]
    fn test_index_and_digit_key_do_not_collide() {
        let scope = OwnerScope::plugin("p").unwrap();
        let index = deriver().derive(&scope, &suffix_path("a[0].x__Secret"), &Classification::Suffix);
        let key = deriver().derive(&scope, &suffix_path("a.0.x__Secret"), &Classification::Suffix);
        assert_ne!(index, key);
    }

    #[test]
    fn test_long_names_are_truncated() {
        let scope = OwnerScope::plugin("p".repeat(100)).unwrap();
        let name = deriver().derive(&scope, &suffix_path("auth.key"), &Classification::WellKnown { alias: None });
        assert_eq!(name.as_str().len(), 127);
        assert!(name.as_str().starts_with("ppp"));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("My Plugin_v2"), "my-plugin-v2");
        assert_eq!(normalize("--a..b--"), "a-b");
        assert_eq!(normalize("___"), "");
    }

    #[test]
    fn test_parse_reference() {
        let name = SecretRecordName::parse_reference("<ref:abc--def>").unwrap();
        assert_eq!(name.as_str(), "abc--def");
        assert!(SecretRecordName::parse_reference("<ref:>").is_none());
        assert!(SecretRecordName::parse_reference("<ref:UPPER>").is_none());
        assert!(SecretRecordName::parse_reference("plain text").is_none());
    }

    fn arb_scope() -> impl Strategy<Value = OwnerScope> {
        (
            prop_oneof![Just(ScopeKind::Plugin), Just(ScopeKind::Agent)],
            "[a-zA-Z0-9_. -]{1,60}",
            proptest::option::of("[a-zA-Z0-9_-]{1,20}"),
        )
            .prop_filter_map("valid scope", |(kind, name, sub)| match sub {
                Some(sub) => OwnerScope::with_sub_scope(kind, name, sub).ok(),
                None => OwnerScope::new(kind, name).ok(),
            })
    }

    fn arb_path() -> impl Strategy<Value = FieldPath> {
        let segment = prop_oneof![
            "[a-zA-Z0-9_.-]{1,30}".prop_map(PathSegment::Key),
            (0usize..4).prop_map(PathSegment::Index),
            Just(PathSegment::Key("additionalFields".to_string())),
        ];
        (proptest::collection::vec(segment, 0..5), "[a-zA-Z0-9_-]{0,40}").prop_map(
            |(mut segments, last)| {
                segments.push(PathSegment::Key(format!("{}__Secret", last)));
                FieldPath::from(segments)
            },
        )
    }

    proptest! {
        #[test]
        fn prop_derivation_is_deterministic(scope in arb_scope(), path in arb_path()) {
            let a = deriver().derive(&scope, &path, &Classification::Suffix);
            let b = deriver().derive(&scope, &path, &Classification::Suffix);
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_names_are_backend_legal(scope in arb_scope(), path in arb_path(), max in 32usize..200) {
            let deriver = NameDeriver::new(&EngineConfig::default().with_max_name_length(max));
            let name = deriver.derive(&scope, &path, &Classification::Suffix);
            prop_assert!(name.as_str().len() <= max);
            prop_assert!(name
                .as_str()
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert_eq!(SecretRecordName::parse_reference(&name.to_reference()), Some(name));
        }

        #[test]
        fn prop_distinct_inputs_never_collide(
            inputs in proptest::collection::vec((arb_scope(), arb_path()), 1..40),
            max in 32usize..128,
        ) {
            let deriver = NameDeriver::new(&EngineConfig::default().with_max_name_length(max));
            let mut seen: HashMap<SecretRecordName, (OwnerScope, FieldPath)> = HashMap::new();
            for (scope, path) in inputs {
                let name = deriver.derive(&scope, &path, &Classification::Suffix);
                if let Some(previous) = seen.get(&name) {
                    prop_assert_eq!(previous, &(scope.clone(), path.clone()));
                }
                seen.insert(name, (scope, path));
            }
        }
    }
}
