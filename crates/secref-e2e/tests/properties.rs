//! Property tests over randomly generated configuration trees

use std::collections::BTreeMap;

use proptest::prelude::*;
use secref_e2e::{scope, string_leaves, TestEngine};
use secref_engine::RevealMode;
use serde_json::{Map, Value};

/// A tree of `groups`, each holding a few secret and plain fields
fn tree_strategy() -> impl Strategy<Value = (Value, Vec<String>)> {
    let group = prop::collection::btree_map(
        "[a-zA-Z][a-zA-Z0-9_]{0,12}",
        ("[ -~]{1,24}", any::<bool>()),
        1..5,
    );
    prop::collection::btree_map("[a-z][a-z0-9]{0,8}", group, 1..4).prop_map(
        |groups: BTreeMap<String, BTreeMap<String, (String, bool)>>| {
            let mut root = Map::new();
            let mut secrets = Vec::new();
            for (group, fields) in groups {
                let mut obj = Map::new();
                for (key, (value, secret)) in fields {
                    if secret {
                        // Non-ASCII prefix: plain values and references can never match it
                        let value = format!("\u{1F511}{}", value);
                        secrets.push(value.clone());
                        obj.insert(format!("{}__Secret", key), Value::String(value));
                    } else {
                        obj.insert(key, Value::String(value));
                    }
                }
                root.insert(group, Value::Object(obj));
            }
            (Value::Object(root), secrets)
        },
    )
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_materialize_removes_plaintext((tree, secrets) in tree_strategy()) {
        let t = TestEngine::new();
        let plugin = scope("plugin:prop");
        let saved = runtime().block_on(t.engine.materialize(&plugin, &tree)).unwrap();

        prop_assert!(saved.is_complete());
        let leaves = string_leaves(&saved.tree);
        for secret in &secrets {
            prop_assert!(!leaves.contains(&secret.as_str()));
        }
    }

    #[test]
    fn prop_reveal_restores_tree((tree, _secrets) in tree_strategy()) {
        let t = TestEngine::new();
        let plugin = scope("agent:prop/dev");
        let revealed = runtime().block_on(t.round_trip(&plugin, &tree));
        prop_assert_eq!(revealed, tree);
    }

    #[test]
    fn prop_redaction_hides_every_secret((tree, secrets) in tree_strategy()) {
        let t = TestEngine::new();
        let plugin = scope("plugin:prop");
        let rt = runtime();
        let saved = rt.block_on(t.engine.materialize(&plugin, &tree)).unwrap();
        let redacted = rt
            .block_on(t.engine.dematerialize(&plugin, &saved.tree, RevealMode::Redact))
            .unwrap();

        let leaves = string_leaves(&redacted.tree);
        for secret in &secrets {
            prop_assert!(!leaves.contains(&secret.as_str()));
        }
    }

    #[test]
    fn prop_purge_empties_scope((tree, _secrets) in tree_strategy()) {
        let t = TestEngine::new();
        let plugin = scope("plugin:prop");
        let rt = runtime();
        rt.block_on(t.engine.materialize(&plugin, &tree)).unwrap();

        prop_assert!(rt.block_on(t.engine.purge(&plugin)).unwrap().is_complete());
        prop_assert!(rt.block_on(t.engine.purge(&plugin)).unwrap().is_complete());
        prop_assert!(t.store.inner().is_empty());
        prop_assert_eq!(t.ledger.scope_count(), 0);
    }
}

