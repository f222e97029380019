use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::{ListableResource, Metadata, NamespaceResourceScope, Resource};
use serde::{Deserialize, Serialize};

/// An OpenShift `DeploymentConfig` (`apps.openshift.io/v1`). Not part of `k8s-openapi`;
/// modeled by hand the same way [`super::rollout::Rollout`] is, with only the fields this
/// controller touches.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct DeploymentConfig {
    pub metadata: ObjectMeta,
    pub spec: Option<DeploymentConfigSpec>,
    pub status: Option<DeploymentConfigStatus>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigSpec {
    pub replicas: Option<i32>,
    pub selector: Option<std::collections::BTreeMap<String, String>>,
    pub template: Option<PodTemplateSpec>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentConfigStatus {
    pub replicas: Option<i32>,
    pub available_replicas: Option<i32>,
}

impl Resource for DeploymentConfig {
    const API_VERSION: &'static str = "apps.openshift.io/v1";
    const GROUP: &'static str = "apps.openshift.io";
    const KIND: &'static str = "DeploymentConfig";
    const VERSION: &'static str = "v1";
    const URL_PATH_SEGMENT: &'static str = "deploymentconfigs";
    type Scope = NamespaceResourceScope;
}

impl ListableResource for DeploymentConfig {
    const LIST_KIND: &'static str = "DeploymentConfigList";
}

impl Metadata for DeploymentConfig {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}

