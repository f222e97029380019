use crate::error::StrategyError;
use crate::model::ResourceKind;
use k8s_openapi::api::core::v1::{Container, EnvVar};
use regex::Regex;

/// Upper-cases `name` and collapses every run of non-alphanumeric characters into a
/// single underscore. A leading run produces no leading underscore; a trailing run still
/// produces a trailing underscore (§4.6.1).
pub fn normalize(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    let collapse = Regex::new(r"[^A-Z0-9]+").expect("static pattern is valid");
    collapse.replace_all(&upper, "_").trim_start_matches('_').to_string()
}

fn env_var_name(resource_name: &str, kind: ResourceKind) -> String {
    let postfix = match kind {
        ResourceKind::ConfigMap => "CONFIGMAP",
        ResourceKind::Secret => "SECRET",
    };
    format!("STAKATER_{}_{postfix}", normalize(resource_name))
}

/// Applies the env-var strategy to `container` (§4.6.1). `hash == ""` means the resource
/// was deleted: the variable is removed, using swap-with-last so the rest of the env list
/// keeps its relative identity rather than shifting down.
pub fn apply(container: Option<&mut Container>, resource_name: &str, kind: ResourceKind, hash: &str) -> Result<bool, StrategyError> {
    let container = container.ok_or_else(|| StrategyError::NoTargetContainer {
        resource_name: resource_name.to_string(),
    })?;
    let name = env_var_name(resource_name, kind);
    let env = container.env.get_or_insert_with(Vec::new);

    if hash.is_empty() {
        return Ok(match env.iter().position(|e| e.name == name) {
            Some(idx) => {
                let last = env.len() - 1;
                env.swap(idx, last);
                env.pop();
                true
            }
            None => false,
        });
    }

    if let Some(existing) = env.iter_mut().find(|e| e.name == name) {
        if existing.value.as_deref() == Some(hash) {
            return Ok(false);
        }
        existing.value = Some(hash.to_string());
        return Ok(true);
    }

    env.push(EnvVar {
        name,
        value: Some(hash.to_string()),
        value_from: None,
    });
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_runs_and_drops_leading_underscore() {
        assert_eq!(normalize(".my-config!!"), "MY_CONFIG_");
        assert_eq!(normalize("app-config"), "APP_CONFIG");
        assert_eq!(normalize("cfg"), "CFG");
    }

    fn container() -> Container {
        Container { name: "app".to_string(), ..Default::default() }
    }

    #[test]
    fn add_then_update_then_idempotent() {
        let mut c = container();
        assert!(apply(Some(&mut c), "cfg", ResourceKind::ConfigMap, "hash1").unwrap());
        assert_eq!(c.env.as_ref().unwrap()[0].value.as_deref(), Some("hash1"));
        assert!(apply(Some(&mut c), "cfg", ResourceKind::ConfigMap, "hash2").unwrap());
        assert_eq!(c.env.as_ref().unwrap()[0].value.as_deref(), Some("hash2"));
        assert!(!apply(Some(&mut c), "cfg", ResourceKind::ConfigMap, "hash2").unwrap());
    }

    #[test]
    fn deletion_removes_var_and_preserves_others() {
        let mut c = container();
        c.env = Some(vec![
            EnvVar { name: "KEEP_ME".to_string(), value: Some("1".to_string()), value_from: None },
            EnvVar { name: "STAKATER_CFG_CONFIGMAP".to_string(), value: Some("hash1".to_string()), value_from: None },
        ]);
        assert!(apply(Some(&mut c), "cfg", ResourceKind::ConfigMap, "").unwrap());
        let env = c.env.unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env[0].name, "KEEP_ME");
    }

    #[test]
    fn missing_container_errors() {
        let err = apply(None, "cfg", ResourceKind::ConfigMap, "hash1").unwrap_err();
        assert!(matches!(err, StrategyError::NoTargetContainer { .. }));
    }

    #[test]
    fn remove_then_readd_matches_fresh_add() {
        let mut removed_then_readded = container();
        apply(Some(&mut removed_then_readded), "cfg", ResourceKind::ConfigMap, "hash1").unwrap();
        apply(Some(&mut removed_then_readded), "cfg", ResourceKind::ConfigMap, "").unwrap();
        apply(Some(&mut removed_then_readded), "cfg", ResourceKind::ConfigMap, "hash2").unwrap();

        let mut fresh = container();
        apply(Some(&mut fresh), "cfg", ResourceKind::ConfigMap, "hash2").unwrap();

        assert_eq!(removed_then_readded.env, fresh.env);
    }
}
