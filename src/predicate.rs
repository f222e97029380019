use crate::config::Config;
use crate::model::ChangeKind;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, RwLock};

/// Read-mostly membership cache for namespace-label selection (§4.3 rule 1). Reads never
/// block each other; membership updates are serialized through `&self` by the single
/// updater that owns the lock.
#[derive(Clone, Default)]
pub struct NamespaceCache {
    members: Arc<RwLock<HashSet<String>>>,
}

impl NamespaceCache {
    pub fn contains(&self, namespace: &str) -> bool {
        self.members.read().expect("namespace cache lock poisoned").contains(namespace)
    }

    pub fn set_members(&self, members: HashSet<String>) {
        *self.members.write().expect("namespace cache lock poisoned") = members;
    }
}

/// Rule 1 (§4.3): reject ignored namespaces; if a namespace cache is installed, admit
/// only namespaces present in it.
pub fn namespace_admitted(namespace: &str, config: &Config, namespace_cache: Option<&NamespaceCache>) -> bool {
    if config.ignored_namespaces.contains(namespace) {
        return false;
    }
    match namespace_cache {
        Some(cache) => cache.contains(namespace),
        None => true,
    }
}

/// Rule 2 (§4.3): admit everything when no selectors are configured; otherwise admit iff
/// any configured selector matches (logical OR across selectors). This k8s label-selector
/// matching is hand-rolled; no example in the corpus implements it, so it follows the
/// standard Kubernetes semantics directly rather than being grounded on a pack file.
pub fn label_selector_admitted(labels: &BTreeMap<String, String>, selectors: &[LabelSelector]) -> bool {
    if selectors.is_empty() {
        return true;
    }
    selectors.iter().any(|selector| matches_label_selector(selector, labels))
}

fn matches_label_selector(selector: &LabelSelector, labels: &BTreeMap<String, String>) -> bool {
    let match_labels_ok = selector
        .match_labels
        .as_ref()
        .is_none_or(|match_labels| match_labels.iter().all(|(k, v)| labels.get(k) == Some(v)));

    let match_expressions_ok = selector
        .match_expressions
        .as_ref()
        .is_none_or(|expressions| expressions.iter().all(|expr| matches_requirement(expr, labels)));

    match_labels_ok && match_expressions_ok
}

fn matches_requirement(requirement: &LabelSelectorRequirement, labels: &BTreeMap<String, String>) -> bool {
    let values = requirement.values.as_deref().unwrap_or(&[]);
    match requirement.operator.as_str() {
        "In" => labels.get(&requirement.key).is_some_and(|v| values.contains(v)),
        "NotIn" => !labels.get(&requirement.key).is_some_and(|v| values.contains(v)),
        "Exists" => labels.contains_key(&requirement.key),
        "DoesNotExist" => !labels.contains_key(&requirement.key),
        _ => false,
    }
}

/// Rule 3 (§4.3): reject resources carrying `ignore="true"`.
pub fn is_ignored(annotations: &BTreeMap<String, String>, ignore_key: &str) -> bool {
    annotations.get(ignore_key).is_some_and(|v| v == "true")
}

/// Rule 4 (§4.3), ConfigMap/Secret events only. `initial_sync` covers the watcher's
/// `Restarted` bookkeeping event, which this controller treats like a Create.
pub fn content_change_admitted(change: ChangeKind, config: &Config, initial_sync: bool, old_hash: &str, new_hash: &str) -> bool {
    match change {
        ChangeKind::Create => config.reload_on_create || initial_sync,
        ChangeKind::Update => old_hash != new_hash,
        ChangeKind::Delete => config.reload_on_delete,
    }
}
