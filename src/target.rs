use crate::model::ResourceKind;
use crate::workload::{TargetContainer, WorkloadObject};

/// Locates the container a reload strategy should mutate (§4.5). Never touches the
/// cluster; pure read-only traversal over the workload's in-memory pod template.
pub fn find_target_container(
    workload: &WorkloadObject,
    resource_name: &str,
    resource_kind: ResourceKind,
    auto_reload: bool,
) -> Option<TargetContainer> {
    let containers = workload.container_names();
    let first_main = TargetContainer(containers.first()?.clone());

    if !auto_reload {
        return Some(first_main);
    }

    let (volume_name, mounting, init_mounting) = workload.find_volume_mounting_containers(resource_name, resource_kind);
    if volume_name.is_some() {
        if let Some(name) = mounting.into_iter().next() {
            return Some(TargetContainer(name));
        }
        if !init_mounting.is_empty() {
            return Some(first_main);
        }
    }

    let (env_containers, init_env_ref) = workload.find_env_ref_containers(resource_name, resource_kind);
    if let Some(name) = env_containers.into_iter().next() {
        return Some(TargetContainer(name));
    }
    if init_env_ref {
        return Some(first_main);
    }

    Some(first_main)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::WorkloadObject;
    use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
    use k8s_openapi::api::core::v1::{
        Container, ConfigMapVolumeSource, EnvFromSource, ConfigMapEnvSource, PodSpec, PodTemplateSpec, Volume, VolumeMount,
    };

    fn deployment_with_volume_mount() -> WorkloadObject {
        WorkloadObject::from_deployment(Deployment {
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        volumes: Some(vec![Volume {
                            name: "cfg-vol".to_string(),
                            config_map: Some(ConfigMapVolumeSource {
                                name: Some("cfg".to_string()),
                                ..Default::default()
                            }),
                            ..Default::default()
                        }]),
                        containers: vec![
                            Container { name: "sidecar".to_string(), ..Default::default() },
                            Container {
                                name: "app".to_string(),
                                volume_mounts: Some(vec![VolumeMount { name: "cfg-vol".to_string(), mount_path: "/etc/cfg".to_string(), ..Default::default() }]),
                                ..Default::default()
                            },
                        ],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    #[test]
    fn auto_reload_picks_volume_mounting_container() {
        let workload = deployment_with_volume_mount();
        let target = find_target_container(&workload, "cfg", ResourceKind::ConfigMap, true);
        assert_eq!(target, Some(TargetContainer("app".to_string())));
    }

    #[test]
    fn explicit_reference_picks_first_main_container() {
        let workload = deployment_with_volume_mount();
        let target = find_target_container(&workload, "unrelated", ResourceKind::ConfigMap, false);
        assert_eq!(target, Some(TargetContainer("sidecar".to_string())));
    }

    #[test]
    fn auto_reload_falls_back_to_env_ref_container() {
        let workload = WorkloadObject::from_deployment(Deployment {
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: None,
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "app".to_string(),
                            env_from: Some(vec![EnvFromSource {
                                config_map_ref: Some(ConfigMapEnvSource { name: Some("cfg".to_string()), ..Default::default() }),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        });
        let target = find_target_container(&workload, "cfg", ResourceKind::ConfigMap, true);
        assert_eq!(target, Some(TargetContainer("app".to_string())));
    }

    #[test]
    fn zero_containers_returns_none() {
        let workload = WorkloadObject::from_deployment(Deployment::default());
        assert_eq!(find_target_container(&workload, "cfg", ResourceKind::ConfigMap, true), None);
    }
}
