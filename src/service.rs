use crate::config::Config;
use crate::matcher;
use crate::model::{ReloadDecision, ReloadSource, ResourceChange, ResourceKind};
use crate::pause;
use crate::strategy::{self, StrategyInput};
use crate::target;
use crate::workload::{UpdateStrategy, WorkloadObject};
use anyhow::Result;
use chrono::Utc;
use kube::Client;
use tracing::{debug, info, warn};

/// Per-workload outcome of the decision phase (§4.7 step 3), paired with the workload's
/// index in the batch so the caller can apply it without re-matching by name.
pub struct PipelineEntry {
    pub workload_index: usize,
    pub decision: ReloadDecision,
}

/// Runs §4.7 steps 1-3 over a batch of workloads for one admitted resource change,
/// returning one decision per workload that was not skipped outright by namespace or
/// kind filtering. Pure and synchronous; touches no apiserver state.
pub fn decide(config: &Config, change: &ResourceChange, workloads: &[WorkloadObject]) -> Vec<PipelineEntry> {
    let mut entries = Vec::with_capacity(workloads.len());

    for (workload_index, workload) in workloads.iter().enumerate() {
        if workload.namespace() != change.namespace {
            continue;
        }
        if config.ignored_workload_kinds.contains(workload.kind().as_str()) {
            continue;
        }

        let uses_resource = match change.kind {
            ResourceKind::ConfigMap => workload.uses_configmap(&change.name),
            ResourceKind::Secret => workload.uses_secret(&change.name),
        };

        let mut decision = matcher::decide(
            config,
            change.kind,
            &change.name,
            &change.annotations,
            &workload.annotations(),
            &workload.pod_template_annotations(),
        );

        if decision.auto_reload && !uses_resource {
            decision = ReloadDecision::no_reload("auto rule does not apply: workload does not consume this resource");
        }

        debug!(
            "Decision for {} {}/{}: should_reload={} auto_reload={} reason={}",
            workload.kind(),
            workload.namespace(),
            workload.name(),
            decision.should_reload,
            decision.auto_reload,
            decision.reason
        );

        entries.push(PipelineEntry { workload_index, decision });
    }

    entries
}

/// Applies one positive decision (§4.7 "Applying a decision"): locates the target
/// container, invokes the configured strategy, writes the attribution annotation on
/// change, and persists according to the workload's update strategy. A no-op if
/// `decision.should_reload` is false.
pub async fn apply_decision(
    client: &Client,
    config: &Config,
    workload: &mut WorkloadObject,
    change: &ResourceChange,
    decision: &ReloadDecision,
) -> Result<()> {
    if !decision.should_reload {
        return Ok(());
    }

    let target = target::find_target_container(workload, &change.name, change.kind, decision.auto_reload);
    let container_name = target.map(|t| t.0).unwrap_or_default();

    let input = StrategyInput {
        resource_name: &change.name,
        resource_kind: change.kind,
        hash: &change.fingerprint,
    };
    let source = ReloadSource {
        kind: change.kind,
        name: change.name.clone(),
        namespace: change.namespace.clone(),
        hash: change.fingerprint.clone(),
        containers: if container_name.is_empty() { Vec::new() } else { vec![container_name.clone()] },
        reloaded_at: Utc::now(),
    };

    let changed = strategy::apply(
        config.reload_strategy,
        workload,
        &container_name,
        &input,
        &config.annotations.last_reloaded_from,
        &source,
    )?;

    if !changed {
        debug!("No change for {} {}/{} from {}", workload.kind(), workload.namespace(), workload.name(), change.name);
        return Ok(());
    }

    // Attribution annotation is orthogonal to strategy choice (§4.6.3); failures here are
    // logged only and never fail the reload.
    match serde_json::to_string(&source) {
        Ok(json) => {
            workload.pod_template_annotations_mut().insert(config.annotations.last_reloaded_from.clone(), json);
        }
        Err(e) => warn!("Failed to marshal attribution annotation for {}/{}: {e}", workload.namespace(), workload.name()),
    }

    workload.apply_rollout_strategy(&config.annotations.rollout_strategy);

    match workload.update_strategy() {
        UpdateStrategy::Patch => workload.update(client).await?,
        UpdateStrategy::Recreate | UpdateStrategy::CreateNew => workload.perform_special_update(client).await?,
    }

    info!(
        "Reloaded {} {}/{} (container {:?}) from {} {}",
        workload.kind(),
        workload.namespace(),
        workload.name(),
        container_name,
        change.kind,
        change.name
    );

    if pause::should_pause(workload, config) {
        if let Err(e) = pause::apply_pause(client, workload, config).await {
            warn!("Failed to apply post-reload pause to {}/{}: {e}", workload.namespace(), workload.name());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeKind;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::api::core::v1::{ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Volume, VolumeMount};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use std::collections::BTreeMap;

    fn deployment(namespace: &str, annotations: &[(&str, &str)]) -> WorkloadObject {
        WorkloadObject::from_deployment(Deployment {
            metadata: ObjectMeta {
                name: Some("app".to_string()),
                namespace: Some(namespace.to_string()),
                annotations: Some(annotations.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        volumes: Some(vec![Volume {
                            name: "cfg-vol".to_string(),
                            config_map: Some(ConfigMapVolumeSource { name: Some("cfg".to_string()), ..Default::default() }),
                            ..Default::default()
                        }]),
                        containers: vec![Container {
                            name: "app".to_string(),
                            volume_mounts: Some(vec![VolumeMount { name: "cfg-vol".to_string(), mount_path: "/etc/cfg".to_string(), ..Default::default() }]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn change(namespace: &str, name: &str, kind: ChangeKind, fingerprint: &str) -> ResourceChange {
        ResourceChange {
            kind: ResourceKind::ConfigMap,
            change: kind,
            name: name.to_string(),
            namespace: namespace.to_string(),
            annotations: BTreeMap::new(),
            labels: BTreeMap::new(),
            fingerprint: fingerprint.to_string(),
        }
    }

    #[test]
    fn scenario_cross_namespace_isolation() {
        let config = Config::default();
        let a = deployment("a", &[("reloader.stakater.com/auto", "true")]);
        let b = deployment("b", &[("reloader.stakater.com/auto", "true")]);
        let change = change("a", "cfg", ChangeKind::Update, "newhash");

        let entries = decide(&config, &change, &[a, b]);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].workload_index, 0);
        assert!(entries[0].decision.should_reload);
    }

    #[test]
    fn scenario_auto_reload_via_volume_mount() {
        let config = Config::default();
        let workload = deployment("default", &[("reloader.stakater.com/auto", "true")]);
        let change = change("default", "cfg", ChangeKind::Update, "newhash");

        let entries = decide(&config, &change, std::slice::from_ref(&workload));
        assert_eq!(entries.len(), 1);
        assert!(entries[0].decision.should_reload);
        assert!(entries[0].decision.auto_reload);
    }

    #[test]
    fn auto_rule_suppressed_when_workload_does_not_consume_resource() {
        let config = Config::default();
        let workload = deployment("default", &[("reloader.stakater.com/auto", "true")]);
        let change = change("default", "unrelated-cfg", ChangeKind::Update, "newhash");

        let entries = decide(&config, &change, std::slice::from_ref(&workload));
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].decision.should_reload);
    }

    #[test]
    fn scenario_explicit_reference_overrides_auto() {
        let config = Config::default();
        let workload = deployment(
            "default",
            &[
                ("reloader.stakater.com/auto", "true"),
                ("configmap.reloader.stakater.com/reload", "cfg"),
            ],
        );
        let change = change("default", "cfg", ChangeKind::Update, "newhash");

        let entries = decide(&config, &change, std::slice::from_ref(&workload));
        assert_eq!(entries.len(), 1);
        assert!(entries[0].decision.should_reload);
        assert!(!entries[0].decision.auto_reload, "explicit reference is not auto-reload");
    }

    #[test]
    fn scenario_excluded_resource_suppresses_auto() {
        let config = Config::default();
        let workload = deployment(
            "default",
            &[
                ("reloader.stakater.com/auto", "true"),
                ("configmaps.exclude.reloader.stakater.com/reload", "cfg"),
            ],
        );
        let change = change("default", "cfg", ChangeKind::Update, "newhash");

        let entries = decide(&config, &change, std::slice::from_ref(&workload));
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].decision.should_reload);
    }

    #[test]
    fn scenario_regex_match_in_explicit_list() {
        let config = Config::default();
        let workload = deployment("default", &[("configmap.reloader.stakater.com/reload", "app-config-.*")]);
        let change = change("default", "app-config-v2", ChangeKind::Update, "newhash");

        let entries = decide(&config, &change, std::slice::from_ref(&workload));
        assert_eq!(entries.len(), 1);
        assert!(entries[0].decision.should_reload);
        assert!(!entries[0].decision.auto_reload);
    }

    #[test]
    fn scenario_delete_event_removes_env_var() {
        let config = Config::default();
        let mut workload = deployment("default", &[("configmap.reloader.stakater.com/reload", "cfg")]);
        if let Some(c) = workload.container_mut("app") {
            c.env = Some(vec![k8s_openapi::api::core::v1::EnvVar {
                name: "STAKATER_CFG_CONFIGMAP".to_string(),
                value: Some("oldhash".to_string()),
                value_from: None,
            }]);
        }

        let change = change("default", "cfg", ChangeKind::Delete, "");
        let decision = matcher::decide(&config, change.kind, &change.name, &change.annotations, &workload.annotations(), &workload.pod_template_annotations());
        assert!(decision.should_reload, "explicit reference still matches on delete");

        let target = target::find_target_container(&workload, &change.name, change.kind, decision.auto_reload).unwrap();
        let input = StrategyInput { resource_name: &change.name, resource_kind: change.kind, hash: &change.fingerprint };
        let source = ReloadSource {
            kind: change.kind,
            name: change.name.clone(),
            namespace: change.namespace.clone(),
            hash: change.fingerprint.clone(),
            containers: vec![target.0.clone()],
            reloaded_at: Utc::now(),
        };
        let changed = strategy::apply(config.reload_strategy, &mut workload, &target.0, &input, &config.annotations.last_reloaded_from, &source).unwrap();
        assert!(changed);

        let env = workload.container_mut("app").and_then(|c| c.env.clone()).unwrap_or_default();
        assert!(env.iter().all(|e| e.name != "STAKATER_CFG_CONFIGMAP"));
    }
}
