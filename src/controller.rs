use crate::config::Config;
use crate::hash;
use crate::model::{ChangeKind, ResourceChange, ResourceKind};
use crate::pause;
use crate::predicate::{self, NamespaceCache};
use crate::service;
use crate::workload::deployment_config::DeploymentConfig;
use crate::workload::rollout::Rollout;
use crate::workload::{WorkloadKind, WorkloadObject};
use anyhow::{Context as _, Result};
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment, StatefulSet};
use k8s_openapi::api::batch::v1::{CronJob, Job};
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Api, Client, ResourceExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub async fn create_client() -> Result<Client> {
    Client::try_default().await.context("Failed to create Kubernetes client")
}

fn binary_data(cm: &ConfigMap) -> std::collections::BTreeMap<String, Vec<u8>> {
    cm.binary_data.clone().unwrap_or_default().into_iter().map(|(k, v)| (k, v.0)).collect()
}

/// Shared, read-only context handed to every spawned watch loop and the pause-expiry
/// timer (§5 "shared state").
#[derive(Clone)]
pub struct Context {
    pub client: Client,
    pub config: Arc<Config>,
    pub namespace_cache: Option<NamespaceCache>,
}

/// Runs the two trigger watch loops (ConfigMap, Secret) and the pause-expiry timer
/// concurrently until `cancel` fires (§4.9, §5). Replaces the teacher's single cron poll
/// with push-driven watch streams, per the one behavioral redesign this spec calls for.
pub async fn run(ctx: Context, cancel: CancellationToken) -> Result<()> {
    tokio::select! {
        _ = cancel.cancelled() => {
            info!("Controller shutting down");
            Ok(())
        }
        res = watch_configmaps(ctx.clone()) => res,
        res = watch_secrets(ctx.clone()) => res,
        res = recheck_paused_deployments(ctx.clone()) => res,
    }
}

async fn watch_configmaps(ctx: Context) -> Result<()> {
    let api: Api<ConfigMap> = Api::all(ctx.client.clone());
    let mut stream = Box::pin(watcher::watcher(api, watcher::Config::default()).default_backoff());
    let mut seen_hashes: HashMap<(String, String), String> = HashMap::new();

    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Apply(cm)) => {
                let hash = hash::hash_configmap(&cm.data.clone().unwrap_or_default(), &binary_data(&cm));
                let key = (cm.namespace().unwrap_or_default(), cm.name_any());
                let is_new = !seen_hashes.contains_key(&key);
                let old_hash = seen_hashes.get(&key).cloned().unwrap_or_default();
                seen_hashes.insert(key, hash.clone());
                handle_resource_event(&ctx, ResourceKind::ConfigMap, if is_new { ChangeKind::Create } else { ChangeKind::Update }, false, &old_hash, &hash, cm.name_any(), cm.namespace().unwrap_or_default(), cm.annotations().clone(), cm.labels().clone()).await;
            }
            Ok(watcher::Event::Delete(cm)) => {
                let key = (cm.namespace().unwrap_or_default(), cm.name_any());
                seen_hashes.remove(&key);
                handle_resource_event(&ctx, ResourceKind::ConfigMap, ChangeKind::Delete, false, "", "", cm.name_any(), cm.namespace().unwrap_or_default(), cm.annotations().clone(), cm.labels().clone()).await;
            }
            Ok(watcher::Event::InitApply(cm)) => {
                let hash = hash::hash_configmap(&cm.data.clone().unwrap_or_default(), &binary_data(&cm));
                let key = (cm.namespace().unwrap_or_default(), cm.name_any());
                seen_hashes.insert(key, hash.clone());
                handle_resource_event(&ctx, ResourceKind::ConfigMap, ChangeKind::Create, true, "", &hash, cm.name_any(), cm.namespace().unwrap_or_default(), cm.annotations().clone(), cm.labels().clone()).await;
            }
            Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
            Err(e) => warn!("ConfigMap watch error: {e}"),
        }
    }
    Ok(())
}

async fn watch_secrets(ctx: Context) -> Result<()> {
    let api: Api<Secret> = Api::all(ctx.client.clone());
    let mut stream = Box::pin(watcher::watcher(api, watcher::Config::default()).default_backoff());
    let mut seen_hashes: HashMap<(String, String), String> = HashMap::new();

    while let Some(event) = stream.next().await {
        match event {
            Ok(watcher::Event::Apply(secret)) => {
                let hash = hash::hash_secret(&secret.data.clone().unwrap_or_default().into_iter().map(|(k, v)| (k, v.0)).collect());
                let key = (secret.namespace().unwrap_or_default(), secret.name_any());
                let is_new = !seen_hashes.contains_key(&key);
                let old_hash = seen_hashes.get(&key).cloned().unwrap_or_default();
                seen_hashes.insert(key, hash.clone());
                handle_resource_event(&ctx, ResourceKind::Secret, if is_new { ChangeKind::Create } else { ChangeKind::Update }, false, &old_hash, &hash, secret.name_any(), secret.namespace().unwrap_or_default(), secret.annotations().clone(), secret.labels().clone()).await;
            }
            Ok(watcher::Event::Delete(secret)) => {
                let key = (secret.namespace().unwrap_or_default(), secret.name_any());
                seen_hashes.remove(&key);
                handle_resource_event(&ctx, ResourceKind::Secret, ChangeKind::Delete, false, "", "", secret.name_any(), secret.namespace().unwrap_or_default(), secret.annotations().clone(), secret.labels().clone()).await;
            }
            Ok(watcher::Event::InitApply(secret)) => {
                let hash = hash::hash_secret(&secret.data.clone().unwrap_or_default().into_iter().map(|(k, v)| (k, v.0)).collect());
                let key = (secret.namespace().unwrap_or_default(), secret.name_any());
                seen_hashes.insert(key, hash.clone());
                handle_resource_event(&ctx, ResourceKind::Secret, ChangeKind::Create, true, "", &hash, secret.name_any(), secret.namespace().unwrap_or_default(), secret.annotations().clone(), secret.labels().clone()).await;
            }
            Ok(watcher::Event::Init | watcher::Event::InitDone) => {}
            Err(e) => warn!("Secret watch error: {e}"),
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_resource_event(
    ctx: &Context,
    kind: ResourceKind,
    change_kind: ChangeKind,
    initial_sync: bool,
    old_hash: &str,
    new_hash: &str,
    name: String,
    namespace: String,
    annotations: std::collections::BTreeMap<String, String>,
    labels: std::collections::BTreeMap<String, String>,
) {
    if !predicate::namespace_admitted(&namespace, &ctx.config, ctx.namespace_cache.as_ref()) {
        return;
    }
    if !predicate::label_selector_admitted(&labels, &ctx.config.resource_selectors) {
        return;
    }
    if predicate::is_ignored(&annotations, &ctx.config.annotations.ignore) {
        return;
    }
    if !predicate::content_change_admitted(change_kind, &ctx.config, initial_sync, old_hash, new_hash) {
        return;
    }

    let fingerprint = if matches!(change_kind, ChangeKind::Delete) { String::new() } else { new_hash.to_string() };
    let change = ResourceChange {
        kind,
        change: change_kind,
        name,
        namespace,
        annotations,
        labels,
        fingerprint,
    };

    debug!("Admitted {} change for {}/{}", change.kind, change.namespace, change.name);
    reconcile(ctx, change).await;
}

async fn reconcile(ctx: &Context, change: ResourceChange) {
    let mut batch = list_workload_batch(&ctx.client, &change.namespace, &ctx.config).await;
    let entries = service::decide(&ctx.config, &change, &batch);

    for entry in entries {
        let workload = &mut batch[entry.workload_index];
        if let Err(e) = service::apply_decision(&ctx.client, &ctx.config, workload, &change, &entry.decision).await {
            error!(
                "Failed to apply reload decision for {} {}/{}: {e:#}",
                workload.kind(),
                workload.namespace(),
                workload.name()
            );
        }
    }
}

/// Lists every enabled workload kind in `namespace` on demand (§4.9). Rollout and
/// DeploymentConfig are best-effort: a missing CRD is logged once and skipped rather than
/// failing the whole batch.
async fn list_workload_batch(client: &Client, namespace: &str, config: &Config) -> Vec<WorkloadObject> {
    let mut batch = Vec::new();

    if !config.ignored_workload_kinds.contains(WorkloadKind::Deployment.as_str()) {
        match Api::<Deployment>::namespaced(client.clone(), namespace).list(&Default::default()).await {
            Ok(list) => batch.extend(list.items.into_iter().map(WorkloadObject::from_deployment)),
            Err(e) => warn!("Failed to list Deployments in {namespace}: {e}"),
        }
    }
    if !config.ignored_workload_kinds.contains(WorkloadKind::DaemonSet.as_str()) {
        match Api::<DaemonSet>::namespaced(client.clone(), namespace).list(&Default::default()).await {
            Ok(list) => batch.extend(list.items.into_iter().map(WorkloadObject::from_daemonset)),
            Err(e) => warn!("Failed to list DaemonSets in {namespace}: {e}"),
        }
    }
    if !config.ignored_workload_kinds.contains(WorkloadKind::StatefulSet.as_str()) {
        match Api::<StatefulSet>::namespaced(client.clone(), namespace).list(&Default::default()).await {
            Ok(list) => batch.extend(list.items.into_iter().map(WorkloadObject::from_statefulset)),
            Err(e) => warn!("Failed to list StatefulSets in {namespace}: {e}"),
        }
    }
    if !config.ignored_workload_kinds.contains(WorkloadKind::Job.as_str()) {
        match Api::<Job>::namespaced(client.clone(), namespace).list(&Default::default()).await {
            Ok(list) => batch.extend(list.items.into_iter().map(WorkloadObject::from_job)),
            Err(e) => warn!("Failed to list Jobs in {namespace}: {e}"),
        }
    }
    if !config.ignored_workload_kinds.contains(WorkloadKind::CronJob.as_str()) {
        match Api::<CronJob>::namespaced(client.clone(), namespace).list(&Default::default()).await {
            Ok(list) => batch.extend(list.items.into_iter().map(WorkloadObject::from_cronjob)),
            Err(e) => warn!("Failed to list CronJobs in {namespace}: {e}"),
        }
    }
    if !config.ignored_workload_kinds.contains(WorkloadKind::Rollout.as_str()) {
        match Api::<Rollout>::namespaced(client.clone(), namespace).list(&Default::default()).await {
            Ok(list) => batch.extend(list.items.into_iter().map(WorkloadObject::from_rollout)),
            Err(kube::Error::Api(e)) if e.code == 404 => debug!("Rollout CRD not installed, skipping"),
            Err(e) => warn!("Failed to list Rollouts in {namespace}: {e}"),
        }
    }
    if !config.ignored_workload_kinds.contains(WorkloadKind::DeploymentConfig.as_str()) {
        match Api::<DeploymentConfig>::namespaced(client.clone(), namespace).list(&Default::default()).await {
            Ok(list) => batch.extend(list.items.into_iter().map(WorkloadObject::from_deployment_config)),
            Err(kube::Error::Api(e)) if e.code == 404 => debug!("DeploymentConfig CRD not installed, skipping"),
            Err(e) => warn!("Failed to list DeploymentConfigs in {namespace}: {e}"),
        }
    }

    batch
}

/// Lower-frequency timer driving the pause-expiry recheck (C8) over every Deployment
/// carrying `pausedAt`, across every namespace admitted by the namespace predicate.
async fn recheck_paused_deployments(ctx: Context) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs(30));
    loop {
        ticker.tick().await;
        let api: Api<Deployment> = Api::all(ctx.client.clone());
        let deployments = match api.list(&Default::default()).await {
            Ok(list) => list.items,
            Err(e) => {
                warn!("Failed to list Deployments for pause recheck: {e}");
                continue;
            }
        };

        for deployment in deployments {
            let namespace = deployment.namespace().unwrap_or_default();
            if !predicate::namespace_admitted(&namespace, &ctx.config, ctx.namespace_cache.as_ref()) {
                continue;
            }
            let mut workload = WorkloadObject::from_deployment(deployment);
            if !pause::is_paused_by_reloader(&workload, &ctx.config) {
                continue;
            }
            match pause::check_pause_expired(&workload, &ctx.config, chrono::Utc::now()) {
                Ok(pause::PauseStatus::Expired) => {
                    info!("Pause expired for Deployment {}/{}, clearing", workload.namespace(), workload.name());
                    if let Err(e) = pause::clear_pause(&ctx.client, &mut workload, &ctx.config).await {
                        warn!("Failed to clear pause for {}/{}: {e}", workload.namespace(), workload.name());
                    }
                }
                Ok(pause::PauseStatus::Remaining(_)) => {}
                Err(e) => warn!("Failed to check pause expiry for {}/{}: {e}", workload.namespace(), workload.name()),
            }
        }
    }
}
