use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::{ListableResource, Metadata, NamespaceResourceScope, Resource};
use serde::{Deserialize, Serialize};

/// An Argo Rollout (`argoproj.io/v1alpha1`). `k8s-openapi` has no type for this CRD, so it
/// is modeled by hand, the way `mirrord-kube`'s `Rollout` type does: only the fields this
/// controller reads or writes are present, and `k8s_openapi::Resource`/`Metadata` are
/// implemented manually instead of deriving `CustomResource` (this controller never needs
/// to install or own the CRD, only patch existing instances of it).
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct Rollout {
    pub metadata: ObjectMeta,
    pub spec: Option<RolloutSpec>,
    pub status: Option<RolloutStatus>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RolloutSpec {
    pub replicas: Option<i32>,
    pub selector: Option<LabelSelector>,
    /// Argo Rollouts' inline `template` field has the same shape as a standard pod
    /// template, so it is reused here verbatim rather than duplicating the type.
    pub template: Option<PodTemplateSpec>,
    pub paused: Option<bool>,
    pub restart_at: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RolloutStatus {
    pub available_replicas: Option<i32>,
    pub replicas: Option<i32>,
}

impl Resource for Rollout {
    const API_VERSION: &'static str = "argoproj.io/v1alpha1";
    const GROUP: &'static str = "argoproj.io";
    const KIND: &'static str = "Rollout";
    const VERSION: &'static str = "v1alpha1";
    const URL_PATH_SEGMENT: &'static str = "rollouts";
    type Scope = NamespaceResourceScope;
}

impl ListableResource for Rollout {
    const LIST_KIND: &'static str = "RolloutList";
}

impl Metadata for Rollout {
    type Ty = ObjectMeta;

    fn metadata(&self) -> &Self::Ty {
        &self.metadata
    }

    fn metadata_mut(&mut self) -> &mut Self::Ty {
        &mut self.metadata
    }
}
