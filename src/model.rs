use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The two resource kinds this controller watches for content changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    ConfigMap,
    Secret,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ConfigMap => write!(f, "configmap"),
            ResourceKind::Secret => write!(f, "secret"),
        }
    }
}

/// The Kubernetes watch event kind, kept distinct from `Generic` (watch bookmarks/errors),
/// which never reaches this far (§4.3 rule 4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Create,
    Update,
    Delete,
}

/// A fully-resolved ConfigMap/Secret change, already past the predicate filters (C3).
#[derive(Debug, Clone)]
pub struct ResourceChange {
    pub kind: ResourceKind,
    pub change: ChangeKind,
    pub name: String,
    pub namespace: String,
    pub annotations: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    /// Already-hashed content. Empty for `ChangeKind::Delete` (the deletion fingerprint
    /// invariant from §3 is enforced by the caller that constructs this, not here).
    pub fingerprint: String,
}

impl ResourceChange {
    pub fn is_ignored(&self, ignore_key: &str) -> bool {
        self.annotations.get(ignore_key).is_some_and(|v| v == "true")
    }

    pub fn has_match_annotation(&self, match_key: &str) -> bool {
        self.annotations.get(match_key).is_some_and(|v| v == "true")
    }
}

/// Outcome of the Matcher (C4) for one (workload, resource change) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadDecision {
    pub should_reload: bool,
    pub auto_reload: bool,
    pub reason: String,
}

impl ReloadDecision {
    pub fn no_reload(reason: impl Into<String>) -> Self {
        ReloadDecision {
            should_reload: false,
            auto_reload: false,
            reason: reason.into(),
        }
    }

    pub fn explicit_reload(reason: impl Into<String>) -> Self {
        ReloadDecision {
            should_reload: true,
            auto_reload: false,
            reason: reason.into(),
        }
    }

    pub fn auto_reload(reason: impl Into<String>) -> Self {
        ReloadDecision {
            should_reload: true,
            auto_reload: true,
            reason: reason.into(),
        }
    }
}

/// Attribution record (§6) written into the pod template's `lastReloadedFrom` annotation
/// on every successful reload, independent of which strategy performed the mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReloadSource {
    pub kind: ResourceKind,
    pub name: String,
    pub namespace: String,
    pub hash: String,
    pub containers: Vec<String>,
    #[serde(rename = "reloadedAt")]
    pub reloaded_at: DateTime<Utc>,
}
