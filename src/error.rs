use thiserror::Error;

/// Strategy precondition failures (§7 "Strategy preconditions"). These are programmer
/// errors — the caller handed the strategy an input it promised never to hand it — and
/// fail the reconciliation for that one workload without touching the others.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("no target container was found for resource {resource_name}")]
    NoTargetContainer { resource_name: String },

    #[error("pod template annotations map was nil for resource {resource_name}")]
    NilAnnotations { resource_name: String },

    #[error("failed to serialize reload source: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },
}

/// Pause-lifecycle failures (§4.8, §7 "Malformed user input"). These only ever surface
/// from the pause-expiry check; they never fail a reload.
#[derive(Debug, Error)]
pub enum PauseError {
    #[error("deployment is missing the {0} annotation")]
    MissingAnnotation(&'static str),

    #[error("failed to parse {annotation} value {value:?}: {reason}")]
    MalformedAnnotation {
        annotation: &'static str,
        value: String,
        reason: String,
    },
}
