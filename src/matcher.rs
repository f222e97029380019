use crate::config::{AnnotationKeys, Config};
use crate::model::{ReloadDecision, ResourceKind};
use regex::Regex;
use std::collections::BTreeMap;

/// Type-specific annotation keys for one resource kind, resolved once per call instead of
/// branching on `kind` at every rule (§4.4).
struct TypeKeys<'a> {
    auto: &'a str,
    reload: &'a str,
    exclude: &'a str,
}

fn type_keys<'a>(annotations: &'a AnnotationKeys, kind: ResourceKind) -> TypeKeys<'a> {
    match kind {
        ResourceKind::ConfigMap => TypeKeys {
            auto: &annotations.configmap_auto,
            reload: &annotations.configmap_reload,
            exclude: &annotations.configmap_exclude,
        },
        ResourceKind::Secret => TypeKeys {
            auto: &annotations.secret_auto,
            reload: &annotations.secret_reload,
            exclude: &annotations.secret_exclude,
        },
    }
}

fn is_true(map: &BTreeMap<String, String>, key: &str) -> bool {
    map.get(key).is_some_and(|v| v == "true")
}

fn is_false(map: &BTreeMap<String, String>, key: &str) -> bool {
    map.get(key).is_some_and(|v| v == "false")
}

fn comma_list_contains(map: &BTreeMap<String, String>, key: &str, needle: &str) -> bool {
    map.get(key)
        .is_some_and(|v| v.split(',').any(|entry| entry.trim() == needle))
}

/// Rule 4 (§4.4): entries are anchored regexes; an entry that fails to compile falls back
/// to an exact string match (§7 "malformed user input").
fn comma_list_regex_matches(map: &BTreeMap<String, String>, key: &str, needle: &str) -> bool {
    let Some(value) = map.get(key) else {
        return false;
    };
    value.split(',').map(str::trim).filter(|e| !e.is_empty()).any(|entry| {
        match Regex::new(&format!("^{entry}$")) {
            Ok(re) => re.is_match(needle),
            Err(_) => entry == needle,
        }
    })
}

fn has_relevant_key(map: &BTreeMap<String, String>, annotations: &AnnotationKeys, type_keys: &TypeKeys) -> bool {
    map.contains_key(type_keys.reload) || map.contains_key(&annotations.search) || map.contains_key(&annotations.auto) || map.contains_key(type_keys.auto)
}

/// Decides whether one workload should reload in response to one resource change,
/// following the eight strictly-ordered precedence rules of §4.4. Never errors: every
/// input yields a decision (§7 "the matcher itself never errors").
pub fn decide(
    config: &Config,
    kind: ResourceKind,
    resource_name: &str,
    resource_annotations: &BTreeMap<String, String>,
    workload_annotations: &BTreeMap<String, String>,
    pod_template_annotations: &BTreeMap<String, String>,
) -> ReloadDecision {
    let annotations = &config.annotations;
    let type_keys = type_keys(annotations, kind);

    // Rule 1: resource-level ignore is unconditional (§9 open question, followed as written).
    if is_true(resource_annotations, &annotations.ignore) {
        return ReloadDecision::no_reload("resource carries ignore=true");
    }

    // Rule 2: pick the effective annotation map.
    let effective = if has_relevant_key(workload_annotations, annotations, &type_keys) {
        workload_annotations
    } else if has_relevant_key(pod_template_annotations, annotations, &type_keys) {
        pod_template_annotations
    } else {
        workload_annotations
    };

    // Rule 3: exclude list.
    if comma_list_contains(effective, type_keys.exclude, resource_name) {
        return ReloadDecision::no_reload(format!("{resource_name} is in the exclude list"));
    }

    // Rule 4: explicit reference (anchored regex, falling back to exact match).
    if comma_list_regex_matches(effective, type_keys.reload, resource_name) {
        return ReloadDecision::explicit_reload(format!("{resource_name} matched an explicit reload entry"));
    }

    // Rule 5: search/match opt-in pair.
    if is_true(effective, &annotations.search) && is_true(resource_annotations, &annotations.r#match) {
        return ReloadDecision::auto_reload("workload search matched resource match annotation");
    }

    // Rule 6: auto annotation (generic or type-specific).
    if is_true(effective, &annotations.auto) || is_true(effective, type_keys.auto) {
        return ReloadDecision::auto_reload("auto annotation is true");
    }

    // Rule 7: global auto-reload-all, unless explicitly suppressed.
    if config.auto_reload_all && !is_false(effective, &annotations.auto) && !is_false(effective, type_keys.auto) {
        return ReloadDecision::auto_reload("autoReloadAll is enabled and not suppressed");
    }

    // Rule 8.
    ReloadDecision::no_reload("no matching rule")
}
