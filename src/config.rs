use anyhow::{Context, Result};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::{env, fs};
use tracing::info;

/// The two interchangeable pod-template mutations that trigger a rollout (C6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReloadStrategyKind {
    EnvVars,
    Annotations,
}

impl Default for ReloadStrategyKind {
    fn default() -> Self {
        ReloadStrategyKind::EnvVars
    }
}

/// The full, customizable annotation-key vocabulary (§6). Every field defaults to the
/// `reloader.stakater.com/...` keys documented in the spec; an operator overriding one of
/// them still gets defaults for the rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnnotationKeys {
    pub ignore: String,
    pub auto: String,
    pub configmap_auto: String,
    pub secret_auto: String,
    pub configmap_reload: String,
    pub secret_reload: String,
    pub configmap_exclude: String,
    pub secret_exclude: String,
    pub search: String,
    pub r#match: String,
    pub pause_period: String,
    pub paused_at: String,
    pub last_reloaded_from: String,
    pub rollout_strategy: String,
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        AnnotationKeys {
            ignore: "reloader.stakater.com/ignore".to_string(),
            auto: "reloader.stakater.com/auto".to_string(),
            configmap_auto: "configmap.reloader.stakater.com/auto".to_string(),
            secret_auto: "secret.reloader.stakater.com/auto".to_string(),
            configmap_reload: "configmap.reloader.stakater.com/reload".to_string(),
            secret_reload: "secret.reloader.stakater.com/reload".to_string(),
            configmap_exclude: "configmaps.exclude.reloader.stakater.com/reload".to_string(),
            secret_exclude: "secrets.exclude.reloader.stakater.com/reload".to_string(),
            search: "reloader.stakater.com/search".to_string(),
            r#match: "reloader.stakater.com/match".to_string(),
            pause_period: "reloader.stakater.com/pause-period".to_string(),
            paused_at: "reloader.stakater.com/paused-at".to_string(),
            last_reloaded_from: "reloader.stakater.com/last-reloaded-from".to_string(),
            rollout_strategy: "reloader.stakater.com/rollout-strategy".to_string(),
        }
    }
}

/// Process-wide immutable settings (§3 "Configuration"). Loaded once at startup by
/// [`load_config`] and never mutated afterwards (§5).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub annotations: AnnotationKeys,
    pub reload_strategy: ReloadStrategyKind,
    pub auto_reload_all: bool,
    pub reload_on_create: bool,
    pub reload_on_delete: bool,
    pub ignored_namespaces: HashSet<String>,
    pub ignored_workload_kinds: HashSet<String>,
    pub resource_selectors: Vec<LabelSelector>,
    pub namespace_selector: Option<LabelSelector>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            annotations: AnnotationKeys::default(),
            reload_strategy: ReloadStrategyKind::default(),
            auto_reload_all: false,
            reload_on_create: false,
            reload_on_delete: false,
            ignored_namespaces: HashSet::new(),
            ignored_workload_kinds: HashSet::new(),
            resource_selectors: Vec::new(),
            namespace_selector: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        for selector in &self.resource_selectors {
            if let Some(expressions) = &selector.match_expressions {
                for expr in expressions {
                    if expr.key.is_empty() {
                        anyhow::bail!("resourceSelectors entry has an empty matchExpressions key");
                    }
                }
            }
        }
        Ok(())
    }

    /// Applies the handful of settings an operator tunes most often via plain environment
    /// variables, layered on top of whatever the YAML file (or the defaults) produced.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = env::var("RELOADER_RELOAD_STRATEGY") {
            match v.to_lowercase().as_str() {
                "env-vars" | "envvars" | "env" => self.reload_strategy = ReloadStrategyKind::EnvVars,
                "annotations" | "annotation" => self.reload_strategy = ReloadStrategyKind::Annotations,
                other => tracing::warn!("Ignoring unrecognized RELOADER_RELOAD_STRATEGY value {}", other),
            }
        }
        if let Ok(v) = env::var("RELOADER_AUTO_RELOAD_ALL") {
            self.auto_reload_all = parse_bool_env(&v);
        }
        if let Ok(v) = env::var("RELOADER_RELOAD_ON_CREATE") {
            self.reload_on_create = parse_bool_env(&v);
        }
        if let Ok(v) = env::var("RELOADER_RELOAD_ON_DELETE") {
            self.reload_on_delete = parse_bool_env(&v);
        }
        if let Ok(v) = env::var("RELOADER_IGNORED_NAMESPACES") {
            self.ignored_namespaces = v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();
        }
    }
}

fn parse_bool_env(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Loads [`Config`] from an optional YAML file, falling back to defaults when the file is
/// absent, then layers environment-variable overrides on top.
pub fn load_config() -> Result<Config> {
    let mut config = match env::var("RELOADER_CONFIG_PATH") {
        Ok(path) => load_config_file(&path)?,
        Err(_) => {
            info!("RELOADER_CONFIG_PATH not set, using default configuration");
            Config::default()
        }
    };

    config.apply_env_overrides();
    config.validate()?;

    info!(
        "Parsed valid application config:\n{}",
        serde_yaml_ng::to_string(&config)?
    );

    Ok(config)
}

fn load_config_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    info!("Loading config from file {}", path.as_ref().display());
    let yaml_str = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

    let expanded = expand_env_vars(&yaml_str)?;

    let config: Config = serde_yaml_ng::from_str(&expanded)
        .context("Failed to parse YAML config after environment variable expansion")?;
    config.validate()?;

    Ok(config)
}

/// Replaces `${VAR}` placeholders with environment variables values.
/// Returns an error if any env var is missing or regex fails.
fn expand_env_vars(input: &str) -> Result<String> {
    let regex =
        Regex::new(r"\$\{([^}]+)}").context("Invalid regex pattern for env var substitution")?;

    let mut first_error: Option<String> = None;
    let result = regex.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        env::var(var_name).unwrap_or_else(|_| {
            first_error.get_or_insert_with(|| var_name.to_string());
            String::new()
        })
    });
    let result = result.into_owned();

    if let Some(missing) = first_error {
        anyhow::bail!("Missing environment variable: {}", missing);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_expand_env_vars_success() {
        unsafe {
            env::set_var("TEST_VAR", "value123");
        }
        let input = "This is a test: ${TEST_VAR}";
        let expanded = expand_env_vars(input).expect("Expansion should succeed");
        assert_eq!(expanded, "This is a test: value123");
        unsafe {
            env::remove_var("TEST_VAR");
        }
    }

    #[test]
    fn test_expand_env_vars_missing_var() {
        let input = "This will fail: ${MISSING_VAR_FOR_TEST}";
        let err = expand_env_vars(input).unwrap_err();
        assert!(err.to_string().contains("MISSING_VAR_FOR_TEST"));
    }

    #[test]
    fn test_expand_env_vars_multiple_vars() {
        unsafe {
            env::set_var("CONFIG_VAR1", "foo");
            env::set_var("CONFIG_VAR2", "bar");
        }
        let input = "${CONFIG_VAR1} and ${CONFIG_VAR2}";
        let expanded = expand_env_vars(input).expect("Expansion should succeed");
        assert_eq!(expanded, "foo and bar");
        unsafe {
            env::remove_var("CONFIG_VAR1");
            env::remove_var("CONFIG_VAR2");
        }
    }

    #[test]
    fn test_expand_env_vars_no_vars() {
        let input = "No variables here";
        let expanded = expand_env_vars(input).expect("Expansion should succeed");
        assert_eq!(expanded, input);
    }

    #[test]
    fn test_load_config_file() {
        let yaml_content = r#"
reloadStrategy: annotations
autoReloadAll: true
reloadOnCreate: true
ignoredNamespaces:
  - kube-system
"#;
        let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        fs::write(tmp_file.path(), yaml_content).expect("Failed to write to temp file");

        let config = load_config_file(tmp_file.path()).expect("Should load config");
        assert_eq!(config.reload_strategy, ReloadStrategyKind::Annotations);
        assert!(config.auto_reload_all);
        assert!(config.reload_on_create);
        assert!(config.ignored_namespaces.contains("kube-system"));
        // unspecified keys still default
        assert_eq!(config.annotations.ignore, "reloader.stakater.com/ignore");
    }

    #[test]
    fn test_load_config_with_env_vars() {
        unsafe {
            env::set_var("TEST_IGNORED_NS", "my-namespace");
        }
        let yaml_content = r#"
ignoredNamespaces:
  - ${TEST_IGNORED_NS}
"#;
        let tmp_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        fs::write(tmp_file.path(), yaml_content).expect("Failed to write to temp file");

        let config = load_config_file(tmp_file.path()).expect("Should load config with env vars");
        assert!(config.ignored_namespaces.contains("my-namespace"));

        unsafe {
            env::remove_var("TEST_IGNORED_NS");
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }
}
