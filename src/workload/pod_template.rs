use k8s_openapi::api::core::v1::{Container, PodTemplateSpec, Volume};
use std::collections::BTreeMap;

/// Returns the pod template's annotation map, allocating an empty one on first access so
/// callers (notably the annotation strategy, C6) never have to special-case a nil map
/// (§4.7 "pod-template-annotations map lifecycle").
pub fn annotations_mut(template: &mut PodTemplateSpec) -> &mut BTreeMap<String, String> {
    template
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(BTreeMap::new)
}

pub fn annotations(template: &PodTemplateSpec) -> BTreeMap<String, String> {
    template
        .metadata
        .as_ref()
        .and_then(|m| m.annotations.clone())
        .unwrap_or_default()
}

pub fn containers(template: &PodTemplateSpec) -> &[Container] {
    template
        .spec
        .as_ref()
        .map(|s| s.containers.as_slice())
        .unwrap_or(&[])
}

pub fn containers_mut(template: &mut PodTemplateSpec) -> &mut Vec<Container> {
    &mut template.spec.get_or_insert_with(Default::default).containers
}

pub fn init_containers(template: &PodTemplateSpec) -> &[Container] {
    template
        .spec
        .as_ref()
        .and_then(|s| s.init_containers.as_ref())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn volumes(template: &PodTemplateSpec) -> &[Volume] {
    template
        .spec
        .as_ref()
        .and_then(|s| s.volumes.as_ref())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// True iff `template` references `name` as a ConfigMap anywhere: a direct `configMap`
/// volume, a `configMap` projected-volume source, a container/init-container `envFrom`
/// `configMapRef`, or an env `valueFrom.configMapKeyRef` (§4.2 "usage predicate
/// semantics").
pub fn uses_configmap(template: &PodTemplateSpec, name: &str) -> bool {
    volumes(template).iter().any(|v| volume_references_configmap(v, name))
        || all_containers(template).any(|c| container_references_configmap(c, name))
}

/// Same as [`uses_configmap`] but for Secrets (volumes, projected sources, `secretRef`,
/// `secretKeyRef`).
pub fn uses_secret(template: &PodTemplateSpec, name: &str) -> bool {
    volumes(template).iter().any(|v| volume_references_secret(v, name))
        || all_containers(template).any(|c| container_references_secret(c, name))
}

fn all_containers(template: &PodTemplateSpec) -> impl Iterator<Item = &Container> {
    containers(template).iter().chain(init_containers(template).iter())
}

fn volume_references_configmap(volume: &Volume, name: &str) -> bool {
    if let Some(cm) = &volume.config_map {
        if cm.name.as_deref() == Some(name) {
            return true;
        }
    }
    if let Some(projected) = &volume.projected {
        if let Some(sources) = &projected.sources {
            return sources.iter().any(|s| {
                s.config_map
                    .as_ref()
                    .is_some_and(|cm| cm.name.as_deref() == Some(name))
            });
        }
    }
    false
}

fn volume_references_secret(volume: &Volume, name: &str) -> bool {
    if let Some(secret) = &volume.secret {
        if secret.secret_name.as_deref() == Some(name) {
            return true;
        }
    }
    if let Some(projected) = &volume.projected {
        if let Some(sources) = &projected.sources {
            return sources.iter().any(|s| {
                s.secret
                    .as_ref()
                    .is_some_and(|secret| secret.name.as_deref() == Some(name))
            });
        }
    }
    false
}

fn container_references_configmap(container: &Container, name: &str) -> bool {
    if let Some(env_from) = &container.env_from {
        if env_from
            .iter()
            .any(|e| e.config_map_ref.as_ref().is_some_and(|r| r.name.as_deref() == Some(name)))
        {
            return true;
        }
    }
    if let Some(env) = &container.env {
        return env.iter().any(|e| {
            e.value_from
                .as_ref()
                .and_then(|vf| vf.config_map_key_ref.as_ref())
                .is_some_and(|r| r.name.as_deref() == Some(name))
        });
    }
    false
}

fn container_references_secret(container: &Container, name: &str) -> bool {
    if let Some(env_from) = &container.env_from {
        if env_from
            .iter()
            .any(|e| e.secret_ref.as_ref().is_some_and(|r| r.name.as_deref() == Some(name)))
        {
            return true;
        }
    }
    if let Some(env) = &container.env {
        return env.iter().any(|e| {
            e.value_from
                .as_ref()
                .and_then(|vf| vf.secret_key_ref.as_ref())
                .is_some_and(|r| r.name.as_deref() == Some(name))
        });
    }
    false
}

/// Names of the main containers (not init containers) that mount a volume named
/// `volume_name`. Used by the target locator (C5) once it has found the volume backing a
/// changed resource.
pub fn containers_mounting_volume<'a>(template: &'a PodTemplateSpec, volume_name: &str) -> Vec<&'a str> {
    containers(template)
        .iter()
        .filter(|c| {
            c.volume_mounts
                .as_ref()
                .is_some_and(|mounts| mounts.iter().any(|m| m.name == volume_name))
        })
        .map(|c| c.name.as_str())
        .collect()
}

pub fn init_containers_mounting_volume<'a>(template: &'a PodTemplateSpec, volume_name: &str) -> Vec<&'a str> {
    init_containers(template)
        .iter()
        .filter(|c| {
            c.volume_mounts
                .as_ref()
                .is_some_and(|mounts| mounts.iter().any(|m| m.name == volume_name))
        })
        .map(|c| c.name.as_str())
        .collect()
}

/// Name of the volume (if any) backing `resource_name` for the given resource kind.
pub fn find_volume_name_for_configmap(template: &PodTemplateSpec, resource_name: &str) -> Option<&str> {
    volumes(template)
        .iter()
        .find(|v| volume_references_configmap(v, resource_name))
        .map(|v| v.name.as_str())
}

pub fn find_volume_name_for_secret(template: &PodTemplateSpec, resource_name: &str) -> Option<&str> {
    volumes(template)
        .iter()
        .find(|v| volume_references_secret(v, resource_name))
        .map(|v| v.name.as_str())
}

/// Names of main containers with a direct env/envFrom reference to `resource_name`
/// (ConfigMap variant).
pub fn containers_with_configmap_env_ref<'a>(template: &'a PodTemplateSpec, resource_name: &str) -> Vec<&'a str> {
    containers(template)
        .iter()
        .filter(|c| container_references_configmap(c, resource_name))
        .map(|c| c.name.as_str())
        .collect()
}

pub fn containers_with_secret_env_ref<'a>(template: &'a PodTemplateSpec, resource_name: &str) -> Vec<&'a str> {
    containers(template)
        .iter()
        .filter(|c| container_references_secret(c, resource_name))
        .map(|c| c.name.as_str())
        .collect()
}

pub fn init_containers_with_configmap_env_ref(template: &PodTemplateSpec, resource_name: &str) -> bool {
    init_containers(template)
        .iter()
        .any(|c| container_references_configmap(c, resource_name))
}

pub fn init_containers_with_secret_env_ref(template: &PodTemplateSpec, resource_name: &str) -> bool {
    init_containers(template)
        .iter()
        .any(|c| container_references_secret(c, resource_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        ConfigMapEnvSource, ConfigMapVolumeSource, Container, EnvFromSource, PodSpec, PodTemplateSpec, Volume,
    };

    fn template_with_volume(configmap_name: &str, volume_name: &str, mounted_by: &str) -> PodTemplateSpec {
        PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                volumes: Some(vec![Volume {
                    name: volume_name.to_string(),
                    config_map: Some(ConfigMapVolumeSource {
                        name: Some(configmap_name.to_string()),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                containers: vec![Container {
                    name: mounted_by.to_string(),
                    volume_mounts: Some(vec![k8s_openapi::api::core::v1::VolumeMount {
                        name: volume_name.to_string(),
                        mount_path: "/etc/cfg".to_string(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        }
    }

    #[test]
    fn detects_configmap_volume_mount() {
        let tpl = template_with_volume("cfg", "cfg-vol", "app");
        assert!(uses_configmap(&tpl, "cfg"));
        assert!(!uses_configmap(&tpl, "other"));
        assert_eq!(containers_mounting_volume(&tpl, "cfg-vol"), vec!["app"]);
    }

    #[test]
    fn detects_configmap_env_from() {
        let tpl = PodTemplateSpec {
            metadata: None,
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "app".to_string(),
                    env_from: Some(vec![EnvFromSource {
                        config_map_ref: Some(ConfigMapEnvSource {
                            name: Some("cfg".to_string()),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
        };
        assert!(uses_configmap(&tpl, "cfg"));
        assert_eq!(containers_with_configmap_env_ref(&tpl, "cfg"), vec!["app"]);
    }

    #[test]
    fn annotations_mut_lazily_allocates() {
        let mut tpl = PodTemplateSpec { metadata: None, spec: None };
        annotations_mut(&mut tpl).insert("k".to_string(), "v".to_string());
        assert_eq!(annotations(&tpl).get("k"), Some(&"v".to_string()));
    }
}
