use crate::config::Config;
use crate::error::PauseError;
use crate::workload::{WorkloadObject, FIELD_MANAGER};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};
use serde_json::json;
use std::str::FromStr;

/// A pause-period literal: a single integer followed by `s`, `m`, `h`, or `d` (§4.8).
/// Modeled the way the teacher's duration parsing is a hand-rolled state machine rather
/// than delegating to a general-purpose duration crate, simplified here to one unit since
/// `pausePeriod` is never a composite literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseDuration(pub Duration);

impl FromStr for PauseDuration {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Err("empty duration literal".to_string());
        }
        let (digits, unit) = value.split_at(value.len() - 1);
        let amount: i64 = digits.parse().map_err(|_| format!("not an integer: {digits}"))?;
        let duration = match unit {
            "s" => Duration::seconds(amount),
            "m" => Duration::minutes(amount),
            "h" => Duration::hours(amount),
            "d" => Duration::days(amount),
            other => return Err(format!("unrecognized unit {other:?}, expected one of s/m/h/d")),
        };
        Ok(PauseDuration(duration))
    }
}

/// True iff `workload` is a Deployment carrying a non-empty `pausePeriod` annotation.
pub fn should_pause(workload: &WorkloadObject, config: &Config) -> bool {
    matches!(workload.kind(), crate::workload::WorkloadKind::Deployment)
        && workload
            .annotations()
            .get(&config.annotations.pause_period)
            .is_some_and(|v| !v.is_empty())
}

/// Sets `spec.paused = true` and writes `pausedAt = now` in-memory, then persists both
/// fields directly against the apiserver (§4.8 ApplyPause).
pub async fn apply_pause(client: &Client, workload: &mut WorkloadObject, config: &Config) -> Result<()> {
    let now = Utc::now();
    workload.set_paused(true);
    workload
        .annotations_mut()
        .insert(config.annotations.paused_at.clone(), now.to_rfc3339());
    persist(client, workload, &config.annotations.paused_at, Some(&now.to_rfc3339()), true).await
}

/// Sets `spec.paused = false` and removes `pausedAt`, preserving `pausePeriod`
/// (§4.8 ClearPause).
pub async fn clear_pause(client: &Client, workload: &mut WorkloadObject, config: &Config) -> Result<()> {
    workload.set_paused(false);
    workload.annotations_mut().remove(&config.annotations.paused_at);
    persist(client, workload, &config.annotations.paused_at, None, false).await
}

async fn persist(client: &Client, workload: &WorkloadObject, paused_at_key: &str, paused_at_value: Option<&str>, paused: bool) -> Result<()> {
    let name = workload.name();
    let ns = workload.namespace();
    let api: Api<Deployment> = Api::namespaced(client.clone(), &ns);
    let body = json!({
        "metadata": { "annotations": { paused_at_key: paused_at_value } },
        "spec": { "paused": paused },
    });
    api.patch(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&body))
        .await
        .with_context(|| format!("Failed to patch pause state for Deployment {ns}/{name}"))?;
    Ok(())
}

pub enum PauseStatus {
    Expired,
    Remaining(Duration),
}

/// Parses the `pausedAt`/`pausePeriod` annotation pair and decides whether the pause has
/// expired (§4.8 CheckPauseExpired). Fails if either annotation is absent or malformed;
/// this failure only ever surfaces from the pause-expiry recheck (§7).
pub fn check_pause_expired(workload: &WorkloadObject, config: &Config, now: DateTime<Utc>) -> Result<PauseStatus, PauseError> {
    let annotations = workload.annotations();

    let paused_at_raw = annotations
        .get(&config.annotations.paused_at)
        .ok_or(PauseError::MissingAnnotation("pausedAt"))?;
    let paused_at = DateTime::parse_from_rfc3339(paused_at_raw)
        .map_err(|e| PauseError::MalformedAnnotation {
            annotation: "pausedAt",
            value: paused_at_raw.clone(),
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);

    let pause_period_raw = annotations
        .get(&config.annotations.pause_period)
        .ok_or(PauseError::MissingAnnotation("pausePeriod"))?;
    let pause_period = PauseDuration::from_str(pause_period_raw)
        .map_err(|reason| PauseError::MalformedAnnotation {
            annotation: "pausePeriod",
            value: pause_period_raw.clone(),
            reason,
        })?
        .0;

    let elapsed = now - paused_at;
    if elapsed >= pause_period {
        Ok(PauseStatus::Expired)
    } else {
        Ok(PauseStatus::Remaining(pause_period - elapsed))
    }
}

/// True iff the Deployment is currently paused by this controller (as opposed to paused
/// by an operator directly) — `spec.paused` plus both lifecycle annotations present
/// (§4.8 IsPausedByReloader).
pub fn is_paused_by_reloader(workload: &WorkloadObject, config: &Config) -> bool {
    workload.is_paused() == Some(true)
        && workload.annotations().contains_key(&config.annotations.paused_at)
        && workload.annotations().contains_key(&config.annotations.pause_period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::Deployment;

    fn deployment_with_annotations(pairs: &[(&str, &str)]) -> WorkloadObject {
        let mut workload = WorkloadObject::from_deployment(Deployment::default());
        for (k, v) in pairs {
            workload.annotations_mut().insert(k.to_string(), v.to_string());
        }
        workload
    }

    #[test]
    fn parses_unit_literals() {
        assert_eq!(PauseDuration::from_str("30m").unwrap().0, Duration::minutes(30));
        assert_eq!(PauseDuration::from_str("2h").unwrap().0, Duration::hours(2));
        assert_eq!(PauseDuration::from_str("1d").unwrap().0, Duration::days(1));
        assert!(PauseDuration::from_str("nonsense").is_err());
    }

    #[test]
    fn should_pause_requires_nonempty_period_on_deployment() {
        let config = Config::default();
        let with_period = deployment_with_annotations(&[(&config.annotations.pause_period, "30m")]);
        assert!(should_pause(&with_period, &config));
        let without = deployment_with_annotations(&[]);
        assert!(!should_pause(&without, &config));
    }

    #[test]
    fn expiry_reports_remaining_then_expired() {
        let config = Config::default();
        let paused_at = Utc::now() - Duration::minutes(10);
        let workload = deployment_with_annotations(&[
            (&config.annotations.paused_at, &paused_at.to_rfc3339()),
            (&config.annotations.pause_period, "30m"),
        ]);
        match check_pause_expired(&workload, &config, Utc::now()).unwrap() {
            PauseStatus::Remaining(_) => {}
            PauseStatus::Expired => panic!("expected remaining"),
        }

        let long_paused_at = Utc::now() - Duration::hours(1);
        let expired_workload = deployment_with_annotations(&[
            (&config.annotations.paused_at, &long_paused_at.to_rfc3339()),
            (&config.annotations.pause_period, "30m"),
        ]);
        match check_pause_expired(&expired_workload, &config, Utc::now()).unwrap() {
            PauseStatus::Expired => {}
            PauseStatus::Remaining(_) => panic!("expected expired"),
        }
    }

    #[test]
    fn missing_annotation_errors() {
        let config = Config::default();
        let workload = deployment_with_annotations(&[]);
        let err = check_pause_expired(&workload, &config, Utc::now()).unwrap_err();
        assert!(matches!(err, PauseError::MissingAnnotation(_)));
    }
}
