pub mod annotation;
pub mod env_var;

use crate::config::ReloadStrategyKind;
use crate::error::StrategyError;
use crate::model::{ReloadSource, ResourceKind};
use crate::workload::WorkloadObject;

/// The mutation one strategy applies to a located container and/or the pod template's
/// annotation map (§4.6). `container` is resolved by the target locator (C5); it is
/// `None` when the workload has no containers at all.
pub struct StrategyInput<'a> {
    pub resource_name: &'a str,
    pub resource_kind: ResourceKind,
    pub hash: &'a str,
}

/// Applies the configured reload strategy to `workload`'s located container, returning
/// whether anything actually changed (§4.6's `apply(input) -> (changed, error)` contract).
pub fn apply(
    reload_strategy: ReloadStrategyKind,
    workload: &mut WorkloadObject,
    container_name: &str,
    input: &StrategyInput,
    last_reloaded_from_key: &str,
    source: &ReloadSource,
) -> Result<bool, StrategyError> {
    match reload_strategy {
        ReloadStrategyKind::EnvVars => {
            let container = workload.container_mut(container_name);
            env_var::apply(container, input.resource_name, input.resource_kind, input.hash)
        }
        ReloadStrategyKind::Annotations => {
            let annotations = Some(workload.pod_template_annotations_mut());
            annotation::apply(annotations, last_reloaded_from_key, source)
        }
    }
}
