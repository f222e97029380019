pub mod deployment_config;
pub mod pod_template;
pub mod rollout;

pub use deployment_config::DeploymentConfig;
pub use rollout::Rollout;

use anyhow::{Context, Result};
use chrono::Utc;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{Container, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams, PropagationPolicy};
use kube::{Api, Client, ResourceExt};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

pub const FIELD_MANAGER: &str = "reloader";

/// The seven workload kinds this controller knows how to reload (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkloadKind {
    Deployment,
    DaemonSet,
    StatefulSet,
    Job,
    CronJob,
    Rollout,
    DeploymentConfig,
}

impl WorkloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "Deployment",
            WorkloadKind::DaemonSet => "DaemonSet",
            WorkloadKind::StatefulSet => "StatefulSet",
            WorkloadKind::Job => "Job",
            WorkloadKind::CronJob => "CronJob",
            WorkloadKind::Rollout => "Rollout",
            WorkloadKind::DeploymentConfig => "DeploymentConfig",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a workload's mutation reaches the cluster (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStrategy {
    Patch,
    Recreate,
    CreateNew,
}

/// Identifies the container a strategy (C6) should mutate, by name. Kubernetes requires
/// container names to be unique within a pod template, so name is a sufficient key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetContainer(pub String);

/// Bridges the handful of shapes `k8s-openapi` (and our hand-rolled CRD types) use for
/// "a spec with an embedded pod template" so the rest of the abstraction can be written
/// once instead of per-kind (§9 "avoid duplicated volume/env traversal").
trait PodTemplateOwner {
    fn template(&self) -> PodTemplateSpec;
    fn template_mut(&mut self) -> &mut PodTemplateSpec;
}

impl PodTemplateOwner for Deployment {
    fn template(&self) -> PodTemplateSpec {
        self.spec.as_ref().map(|s| s.template.clone()).unwrap_or_default()
    }
    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

impl PodTemplateOwner for DaemonSet {
    fn template(&self) -> PodTemplateSpec {
        self.spec.as_ref().map(|s| s.template.clone()).unwrap_or_default()
    }
    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

impl PodTemplateOwner for StatefulSet {
    fn template(&self) -> PodTemplateSpec {
        self.spec.as_ref().map(|s| s.template.clone()).unwrap_or_default()
    }
    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

impl PodTemplateOwner for Job {
    fn template(&self) -> PodTemplateSpec {
        self.spec.as_ref().map(|s| s.template.clone()).unwrap_or_default()
    }
    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

impl PodTemplateOwner for CronJob {
    fn template(&self) -> PodTemplateSpec {
        self.spec
            .as_ref()
            .and_then(|s| s.job_template.spec.as_ref())
            .map(|js| js.template.clone())
            .unwrap_or_default()
    }
    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        let spec = self.spec.get_or_insert_with(Default::default);
        let job_spec = spec.job_template.spec.get_or_insert_with(Default::default);
        &mut job_spec.template
    }
}

impl PodTemplateOwner for Rollout {
    fn template(&self) -> PodTemplateSpec {
        self.spec.as_ref().and_then(|s| s.template.clone()).unwrap_or_default()
    }
    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        let spec = self.spec.get_or_insert_with(Default::default);
        spec.template.get_or_insert_with(Default::default)
    }
}

impl PodTemplateOwner for DeploymentConfig {
    fn template(&self) -> PodTemplateSpec {
        self.spec.as_ref().and_then(|s| s.template.clone()).unwrap_or_default()
    }
    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        let spec = self.spec.get_or_insert_with(Default::default);
        spec.template.get_or_insert_with(Default::default)
    }
}

/// The snapshot/baseline pattern for Patch-strategy workloads (§3 "Workload snapshot",
/// §9 "builder with baseline"): `original` is diffed against `current` at persistence
/// time and replaced wholesale after a successful patch or a conflict refetch.
#[derive(Debug, Clone)]
struct PatchState<K> {
    original: K,
    current: K,
}

impl<K: Clone> PatchState<K> {
    fn new(current: K) -> Self {
        PatchState {
            original: current.clone(),
            current,
        }
    }

    fn reset_original(&mut self) {
        self.original = self.current.clone();
    }
}

/// Uniform polymorphic access over the seven workload variants (C2). Backed by an enum
/// rather than a trait object, since persistence is async and each variant needs its own
/// `Api<K>`; the uniform *surface* callers see (matcher, target locator, service, pause
/// handler) is this type's inherent methods.
pub enum WorkloadObject {
    Deployment(PatchState<Deployment>),
    DaemonSet(PatchState<DaemonSet>),
    StatefulSet(PatchState<StatefulSet>),
    Job(Job),
    CronJob(CronJob),
    Rollout(PatchState<Rollout>),
    DeploymentConfig(PatchState<DeploymentConfig>),
}

impl WorkloadObject {
    pub fn from_deployment(d: Deployment) -> Self {
        WorkloadObject::Deployment(PatchState::new(d))
    }
    pub fn from_daemonset(d: DaemonSet) -> Self {
        WorkloadObject::DaemonSet(PatchState::new(d))
    }
    pub fn from_statefulset(s: StatefulSet) -> Self {
        WorkloadObject::StatefulSet(PatchState::new(s))
    }
    pub fn from_job(j: Job) -> Self {
        WorkloadObject::Job(j)
    }
    pub fn from_cronjob(c: CronJob) -> Self {
        WorkloadObject::CronJob(c)
    }
    pub fn from_rollout(r: Rollout) -> Self {
        WorkloadObject::Rollout(PatchState::new(r))
    }
    pub fn from_deployment_config(d: DeploymentConfig) -> Self {
        WorkloadObject::DeploymentConfig(PatchState::new(d))
    }

    pub fn kind(&self) -> WorkloadKind {
        match self {
            WorkloadObject::Deployment(_) => WorkloadKind::Deployment,
            WorkloadObject::DaemonSet(_) => WorkloadKind::DaemonSet,
            WorkloadObject::StatefulSet(_) => WorkloadKind::StatefulSet,
            WorkloadObject::Job(_) => WorkloadKind::Job,
            WorkloadObject::CronJob(_) => WorkloadKind::CronJob,
            WorkloadObject::Rollout(_) => WorkloadKind::Rollout,
            WorkloadObject::DeploymentConfig(_) => WorkloadKind::DeploymentConfig,
        }
    }

    pub fn update_strategy(&self) -> UpdateStrategy {
        match self {
            WorkloadObject::Job(_) => UpdateStrategy::Recreate,
            WorkloadObject::CronJob(_) => UpdateStrategy::CreateNew,
            _ => UpdateStrategy::Patch,
        }
    }

    pub fn name(&self) -> String {
        match self {
            WorkloadObject::Deployment(s) => s.current.name_any(),
            WorkloadObject::DaemonSet(s) => s.current.name_any(),
            WorkloadObject::StatefulSet(s) => s.current.name_any(),
            WorkloadObject::Job(j) => j.name_any(),
            WorkloadObject::CronJob(c) => c.name_any(),
            WorkloadObject::Rollout(s) => s.current.name_any(),
            WorkloadObject::DeploymentConfig(s) => s.current.name_any(),
        }
    }

    pub fn namespace(&self) -> String {
        match self {
            WorkloadObject::Deployment(s) => s.current.namespace(),
            WorkloadObject::DaemonSet(s) => s.current.namespace(),
            WorkloadObject::StatefulSet(s) => s.current.namespace(),
            WorkloadObject::Job(j) => j.namespace(),
            WorkloadObject::CronJob(c) => c.namespace(),
            WorkloadObject::Rollout(s) => s.current.namespace(),
            WorkloadObject::DeploymentConfig(s) => s.current.namespace(),
        }
        .unwrap_or_default()
    }

    pub fn annotations(&self) -> BTreeMap<String, String> {
        match self {
            WorkloadObject::Deployment(s) => s.current.annotations().clone(),
            WorkloadObject::DaemonSet(s) => s.current.annotations().clone(),
            WorkloadObject::StatefulSet(s) => s.current.annotations().clone(),
            WorkloadObject::Job(j) => j.annotations().clone(),
            WorkloadObject::CronJob(c) => c.annotations().clone(),
            WorkloadObject::Rollout(s) => s.current.annotations().clone(),
            WorkloadObject::DeploymentConfig(s) => s.current.annotations().clone(),
        }
    }

    pub fn owner_references(&self) -> Vec<OwnerReference> {
        match self {
            WorkloadObject::Deployment(s) => s.current.owner_references().to_vec(),
            WorkloadObject::DaemonSet(s) => s.current.owner_references().to_vec(),
            WorkloadObject::StatefulSet(s) => s.current.owner_references().to_vec(),
            WorkloadObject::Job(j) => j.owner_references().to_vec(),
            WorkloadObject::CronJob(c) => c.owner_references().to_vec(),
            WorkloadObject::Rollout(s) => s.current.owner_references().to_vec(),
            WorkloadObject::DeploymentConfig(s) => s.current.owner_references().to_vec(),
        }
    }

    fn template(&self) -> PodTemplateSpec {
        match self {
            WorkloadObject::Deployment(s) => s.current.template(),
            WorkloadObject::DaemonSet(s) => s.current.template(),
            WorkloadObject::StatefulSet(s) => s.current.template(),
            WorkloadObject::Job(j) => j.template(),
            WorkloadObject::CronJob(c) => c.template(),
            WorkloadObject::Rollout(s) => s.current.template(),
            WorkloadObject::DeploymentConfig(s) => s.current.template(),
        }
    }

    fn template_mut(&mut self) -> &mut PodTemplateSpec {
        match self {
            WorkloadObject::Deployment(s) => s.current.template_mut(),
            WorkloadObject::DaemonSet(s) => s.current.template_mut(),
            WorkloadObject::StatefulSet(s) => s.current.template_mut(),
            WorkloadObject::Job(j) => j.template_mut(),
            WorkloadObject::CronJob(c) => c.template_mut(),
            WorkloadObject::Rollout(s) => s.current.template_mut(),
            WorkloadObject::DeploymentConfig(s) => s.current.template_mut(),
        }
    }

    pub fn uses_configmap(&self, name: &str) -> bool {
        pod_template::uses_configmap(&self.template(), name)
    }

    pub fn uses_secret(&self, name: &str) -> bool {
        pod_template::uses_secret(&self.template(), name)
    }

    pub fn pod_template_annotations(&self) -> BTreeMap<String, String> {
        pod_template::annotations(&self.template())
    }

    pub fn pod_template_annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        pod_template::annotations_mut(self.template_mut())
    }

    /// Main container names in declaration order; used by the target locator (C5) to
    /// decide "zero containers" and to pick "the first main container".
    pub fn container_names(&self) -> Vec<String> {
        pod_template::containers(&self.template()).iter().map(|c| c.name.clone()).collect()
    }

    pub fn find_volume_mounting_containers(&self, resource_name: &str, kind: crate::model::ResourceKind) -> (Option<String>, Vec<String>, Vec<String>) {
        let template = self.template();
        let volume_name = match kind {
            crate::model::ResourceKind::ConfigMap => pod_template::find_volume_name_for_configmap(&template, resource_name),
            crate::model::ResourceKind::Secret => pod_template::find_volume_name_for_secret(&template, resource_name),
        };
        let Some(volume_name) = volume_name else {
            return (None, Vec::new(), Vec::new());
        };
        let mounting = pod_template::containers_mounting_volume(&template, volume_name)
            .into_iter()
            .map(str::to_string)
            .collect();
        let init_mounting = pod_template::init_containers_mounting_volume(&template, volume_name)
            .into_iter()
            .map(str::to_string)
            .collect();
        (Some(volume_name.to_string()), mounting, init_mounting)
    }

    pub fn find_env_ref_containers(&self, resource_name: &str, kind: crate::model::ResourceKind) -> (Vec<String>, bool) {
        let template = self.template();
        match kind {
            crate::model::ResourceKind::ConfigMap => (
                pod_template::containers_with_configmap_env_ref(&template, resource_name)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                pod_template::init_containers_with_configmap_env_ref(&template, resource_name),
            ),
            crate::model::ResourceKind::Secret => (
                pod_template::containers_with_secret_env_ref(&template, resource_name)
                    .into_iter()
                    .map(str::to_string)
                    .collect(),
                pod_template::init_containers_with_secret_env_ref(&template, resource_name),
            ),
        }
    }

    pub fn container_mut(&mut self, name: &str) -> Option<&mut Container> {
        let template = self.template_mut();
        pod_template::containers_mut(template).iter_mut().find(|c| c.name == name)
    }

    /// Current `spec.paused` value; `None` for every kind but Deployment (§4.8 applies
    /// only to Deployment workloads).
    pub fn is_paused(&self) -> Option<bool> {
        match self {
            WorkloadObject::Deployment(s) => Some(s.current.spec.as_ref().and_then(|spec| spec.paused).unwrap_or(false)),
            _ => None,
        }
    }

    /// Sets `spec.paused`. No-op (returns `false`) for every kind but Deployment.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        match self {
            WorkloadObject::Deployment(s) => {
                s.current.spec.get_or_insert_with(Default::default).paused = Some(paused);
                true
            }
            _ => false,
        }
    }

    pub fn annotations_mut(&mut self) -> &mut BTreeMap<String, String> {
        match self {
            WorkloadObject::Deployment(s) => s.current.metadata.annotations.get_or_insert_with(Default::default),
            WorkloadObject::DaemonSet(s) => s.current.metadata.annotations.get_or_insert_with(Default::default),
            WorkloadObject::StatefulSet(s) => s.current.metadata.annotations.get_or_insert_with(Default::default),
            WorkloadObject::Job(j) => j.metadata.annotations.get_or_insert_with(Default::default),
            WorkloadObject::CronJob(c) => c.metadata.annotations.get_or_insert_with(Default::default),
            WorkloadObject::Rollout(s) => s.current.metadata.annotations.get_or_insert_with(Default::default),
            WorkloadObject::DeploymentConfig(s) => s.current.metadata.annotations.get_or_insert_with(Default::default),
        }
    }

    pub fn reset_original(&mut self) {
        match self {
            WorkloadObject::Deployment(s) => s.reset_original(),
            WorkloadObject::DaemonSet(s) => s.reset_original(),
            WorkloadObject::StatefulSet(s) => s.reset_original(),
            WorkloadObject::Rollout(s) => s.reset_original(),
            WorkloadObject::DeploymentConfig(s) => s.reset_original(),
            WorkloadObject::Job(_) | WorkloadObject::CronJob(_) => {}
        }
    }

    /// Applies the `rolloutStrategy` annotation (§4.2 "Rollout specifics") before
    /// persisting. A no-op for every kind but Rollout.
    pub fn apply_rollout_strategy(&mut self, rollout_strategy_annotation_key: &str) {
        if let WorkloadObject::Rollout(state) = self {
            let strategy = state.current.metadata.annotations.as_ref().and_then(|a| a.get(rollout_strategy_annotation_key)).map(String::as_str).unwrap_or("rollout");
            if strategy == "restart" {
                state
                    .current
                    .spec
                    .get_or_insert_with(Default::default)
                    .restart_at = Some(Utc::now().to_rfc3339());
            }
        }
    }

    /// Persists a Patch-strategy workload. No-op for Recreate/CreateNew kinds, which
    /// persist via [`Self::perform_special_update`] instead (§4.2).
    pub async fn update(&self, client: &Client) -> Result<()> {
        match self {
            WorkloadObject::Deployment(s) => patch_workload::<Deployment>(client, &s.original, &s.current).await,
            WorkloadObject::DaemonSet(s) => patch_workload::<DaemonSet>(client, &s.original, &s.current).await,
            WorkloadObject::StatefulSet(s) => patch_workload::<StatefulSet>(client, &s.original, &s.current).await,
            WorkloadObject::Rollout(s) => patch_rollout(client, &s.original, &s.current).await,
            WorkloadObject::DeploymentConfig(s) => patch_workload::<DeploymentConfig>(client, &s.original, &s.current).await,
            WorkloadObject::Job(_) | WorkloadObject::CronJob(_) => Ok(()),
        }
    }

    /// Persists a Recreate (Job) or CreateNew (CronJob) workload. No-op for Patch-strategy
    /// kinds, which persist via [`Self::update`] instead (§4.2).
    pub async fn perform_special_update(&mut self, client: &Client) -> Result<()> {
        match self {
            WorkloadObject::Job(job) => recreate_job(client, job).await,
            WorkloadObject::CronJob(cron_job) => create_child_job(client, cron_job).await,
            _ => Ok(()),
        }
    }
}

/// Builds and sends the minimal strategic-merge patch that carries the pod template
/// mutation (annotations + per-container env changes) from `current` back to the
/// original's namespace/name. `original` is retained for the conflict-retry lifecycle
/// (§5) even though the wire patch itself only ever touches the two subtrees this
/// controller's strategies mutate, rather than a generic whole-object diff.
async fn patch_workload<K>(client: &Client, original: &K, current: &K) -> Result<()>
where
    K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope, DynamicType = ()>
        + k8s_openapi::Resource
        + Clone
        + serde::Serialize
        + serde::de::DeserializeOwned
        + fmt::Debug
        + Send
        + Sync
        + 'static,
{
    let name = current.name_any();
    let ns = current.namespace().context("workload is missing a namespace")?;
    let kind = K::KIND;

    let patch_body = pod_template_diff(&template_of(original), &template_of(current));
    if patch_body.is_none() {
        debug!("No pod template change to patch for {} {}/{}", kind, ns, name);
        return Ok(());
    }

    let api: Api<K> = Api::namespaced(client.clone(), &ns);
    let body = json!({ "spec": { "template": patch_body } });
    debug!("Patching {} {}/{} with {:?}", kind, ns, name, body);
    api.patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Strategic(&body))
        .await
        .with_context(|| format!("Failed to patch {kind} {ns}/{name}"))?;
    Ok(())
}

/// Same as [`patch_workload`] but also carries the Rollout-specific `spec.restartAt` field
/// (§4.2 "Rollout specifics"), which lives outside the pod template.
async fn patch_rollout(client: &Client, original: &Rollout, current: &Rollout) -> Result<()> {
    let name = current.metadata.name.clone().context("rollout is missing a name")?;
    let ns = current.metadata.namespace.clone().context("rollout is missing a namespace")?;

    let mut spec_patch = pod_template_diff(&original.template(), &current.template())
        .map(|template| json!({ "template": template }))
        .unwrap_or_else(|| json!({}));

    let original_restart_at = original.spec.as_ref().and_then(|s| s.restart_at.clone());
    let current_restart_at = current.spec.as_ref().and_then(|s| s.restart_at.clone());
    if original_restart_at != current_restart_at {
        spec_patch["restartAt"] = json!(current_restart_at);
    }

    if spec_patch.as_object().is_some_and(|o| o.is_empty()) {
        debug!("No change to patch for Rollout {}/{}", ns, name);
        return Ok(());
    }

    let api: Api<Rollout> = Api::namespaced(client.clone(), &ns);
    let body = json!({ "spec": spec_patch });
    debug!("Patching Rollout {}/{} with {:?}", ns, name, body);
    api.patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Strategic(&body))
        .await
        .with_context(|| format!("Failed to patch Rollout {ns}/{name}"))?;
    Ok(())
}

fn template_of<K: PodTemplateOwner>(k: &K) -> PodTemplateSpec {
    k.template()
}

/// Diffs two pod templates down to the subtrees this controller's strategies mutate:
/// the template annotation map and, per main container, its env list. Returns `None` when
/// nothing changed.
fn pod_template_diff(original: &PodTemplateSpec, current: &PodTemplateSpec) -> Option<Value> {
    let original_annotations = pod_template::annotations(original);
    let current_annotations = pod_template::annotations(current);

    let mut metadata_patch = serde_json::Map::new();
    for (key, value) in &current_annotations {
        if original_annotations.get(key) != Some(value) {
            metadata_patch.insert(key.clone(), json!(value));
        }
    }

    let original_containers = pod_template::containers(original);
    let current_containers = pod_template::containers(current);

    let mut container_patches = Vec::new();
    for container in current_containers {
        let original_env = original_containers
            .iter()
            .find(|c| c.name == container.name)
            .and_then(|c| c.env.clone())
            .unwrap_or_default();
        let current_env = container.env.clone().unwrap_or_default();

        let mut env_patch = Vec::new();
        for env in &current_env {
            let changed = original_env.iter().find(|e| e.name == env.name) != Some(env);
            if changed {
                env_patch.push(json!({ "name": env.name, "value": env.value }));
            }
        }
        for env in &original_env {
            if !current_env.iter().any(|e| e.name == env.name) {
                env_patch.push(json!({ "name": env.name, "$patch": "delete" }));
            }
        }

        if !env_patch.is_empty() {
            container_patches.push(json!({ "name": container.name, "env": env_patch }));
        }
    }

    if metadata_patch.is_empty() && container_patches.is_empty() {
        return None;
    }

    let mut patch = serde_json::Map::new();
    if !metadata_patch.is_empty() {
        patch.insert("metadata".to_string(), json!({ "annotations": metadata_patch }));
    }
    if !container_patches.is_empty() {
        patch.insert("spec".to_string(), json!({ "containers": container_patches }));
    }
    Some(Value::Object(patch))
}

/// Recreate strategy (Job, §4.2): delete the existing Job (tolerating not-found) and
/// create a clone with identity/status fields and controller-generated selectors/labels
/// stripped, so the apiserver treats it as a brand-new object.
async fn recreate_job(client: &Client, job: &mut Job) -> Result<()> {
    let name = job.name_any();
    let ns = job.namespace().context("job is missing a namespace")?;
    let api: Api<Job> = Api::namespaced(client.clone(), &ns);

    info!("Recreating Job {}/{} to trigger reload", ns, name);

    let dp = DeleteParams {
        propagation_policy: Some(PropagationPolicy::Background),
        ..Default::default()
    };
    match api.delete(&name, &dp).await {
        Ok(_) => {}
        Err(kube::Error::Api(e)) if e.code == 404 => {
            warn!("Job {}/{} already gone, proceeding to recreate", ns, name);
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to delete Job {ns}/{name}")),
    }

    let mut clone = job.clone();
    clone.metadata.resource_version = None;
    clone.metadata.uid = None;
    clone.metadata.creation_timestamp = None;
    clone.metadata.generation = None;
    clone.metadata.managed_fields = None;
    clone.status = None;
    if let Some(spec) = clone.spec.as_mut() {
        spec.selector = None;
        spec.template.metadata.get_or_insert_with(Default::default).labels = spec
            .template
            .metadata
            .as_ref()
            .and_then(|m| m.labels.clone())
            .map(|mut labels| {
                for key in ["controller-uid", "job-name", "batch.kubernetes.io/controller-uid", "batch.kubernetes.io/job-name"] {
                    labels.remove(key);
                }
                labels
            });
    }
    clone.metadata.labels = clone.metadata.labels.map(|mut labels| {
        for key in ["controller-uid", "batch.kubernetes.io/controller-uid"] {
            labels.remove(key);
        }
        labels
    });

    api.create(&PostParams::default(), &clone)
        .await
        .with_context(|| format!("Failed to recreate Job {ns}/{name}"))?;
    *job = clone;
    Ok(())
}

/// CreateNew strategy (CronJob, §4.2): create a new child Job from `jobTemplate`, with
/// `generateName`, the manual-instantiation annotation, inherited labels, and an
/// owner-reference back to the CronJob.
async fn create_child_job(client: &Client, cron_job: &CronJob) -> Result<()> {
    let name = cron_job.name_any();
    let ns = cron_job.namespace().context("cronjob is missing a namespace")?;
    let api: Api<Job> = Api::namespaced(client.clone(), &ns);

    info!("Creating child Job from CronJob {}/{} to trigger reload", ns, name);

    let job_template = cron_job
        .spec
        .as_ref()
        .map(|s| s.job_template.clone())
        .unwrap_or_default();

    let mut child = Job {
        metadata: k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
            generate_name: Some(format!("{name}-")),
            namespace: Some(ns.clone()),
            labels: job_template.metadata.as_ref().and_then(|m| m.labels.clone()),
            annotations: Some(BTreeMap::from([(
                "cronjob.kubernetes.io/instantiate".to_string(),
                "manual".to_string(),
            )])),
            owner_references: Some(vec![cron_job.controller_owner_ref(&()).context("failed to build owner reference")?]),
            ..Default::default()
        },
        spec: job_template.spec,
        status: None,
    };
    child.metadata.annotations = job_template
        .metadata
        .as_ref()
        .and_then(|m| m.annotations.clone())
        .map(|mut a| {
            a.insert("cronjob.kubernetes.io/instantiate".to_string(), "manual".to_string());
            a
        })
        .or(child.metadata.annotations);

    api.create(&PostParams::default(), &child)
        .await
        .with_context(|| format!("Failed to create child Job for CronJob {ns}/{name}"))?;
    Ok(())
}
