use crate::error::StrategyError;
use crate::model::ReloadSource;
use std::collections::BTreeMap;

/// Applies the annotation strategy (§4.6.2): marshal `source` to JSON and compare it
/// against whatever is already at `key` in the pod template's annotation map.
pub fn apply(annotations: Option<&mut BTreeMap<String, String>>, key: &str, source: &ReloadSource) -> Result<bool, StrategyError> {
    let annotations = annotations.ok_or_else(|| StrategyError::NilAnnotations {
        resource_name: source.name.clone(),
    })?;
    let serialized = serde_json::to_string(source)?;
    if annotations.get(key) == Some(&serialized) {
        return Ok(false);
    }
    annotations.insert(key.to_string(), serialized);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResourceKind;
    use chrono::DateTime;

    fn source() -> ReloadSource {
        ReloadSource {
            kind: ResourceKind::ConfigMap,
            name: "cfg".to_string(),
            namespace: "default".to_string(),
            hash: "abc123".to_string(),
            containers: vec!["app".to_string()],
            reloaded_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().into(),
        }
    }

    #[test]
    fn writes_then_is_idempotent() {
        let mut annotations = BTreeMap::new();
        assert!(apply(Some(&mut annotations), "last-reloaded-from", &source()).unwrap());
        assert!(!apply(Some(&mut annotations), "last-reloaded-from", &source()).unwrap());
    }

    #[test]
    fn nil_annotations_errors() {
        let err = apply(None, "last-reloaded-from", &source()).unwrap_err();
        assert!(matches!(err, StrategyError::NilAnnotations { .. }));
    }
}
