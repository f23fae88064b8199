use std::path::Path;

use anyhow::{anyhow, Result};
use rand::Rng;
use regex::Regex;
use tracing::{debug, error, warn};

use crate::config::proc_validator;
use crate::config::service::ServiceConfig;
use crate::config::settings::LoggingConfig;
use crate::observability::metrics::get_metrics;

const GENERATED_SECRET_BYTES: usize = 64;

/// Load and validate config from YAML file
pub async fn file_to_config(path: &Path) -> Result<ServiceConfig> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow!("cannot read config '{}': {}", path.display(), e))?;

    let expanded = expand_env_vars(&content);
    parse_config(expanded).await
}

pub async fn parse_config(content: String) -> Result<ServiceConfig> {
    let metrics = get_metrics().await;
    let mut service_config: ServiceConfig = serde_yaml::from_str(&content).inspect_err(|e| {
        error!("parse config error: {}", e);
        metrics.config_validation_errors.inc();
    })?;

    // Apply defaults
    if service_config.settings.logging.is_none() {
        service_config.settings.logging = Some(LoggingConfig::default());
    }

    debug!("validation config ...");
    proc_validator::validate_service_config(&service_config).map_err(|errors| {
        metrics.config_validation_errors.inc_by(errors.len() as u64);
        anyhow!("invalid config:\n  - {}", errors.join("\n  - "))
    })?;

    Ok(service_config)
}

/// Fill an empty signing secret with a random per-process one. Returns `true` when generated.
/// Call after logging is initialised so the warning reaches the operator.
pub fn resolve_secret(service_config: &mut ServiceConfig) -> bool {
    if !service_config.signing.secret.trim().is_empty() {
        return false;
    }
    warn!("signing secret is not configured, generating a random one; tokens will not verify after restart");
    service_config.signing.secret = generate_secret();
    true
}

/// Replace `${VAR}` and `${VAR:default}` with environment values.
pub fn expand_env_vars(input: &str) -> String {
    let re = Regex::new(r"\$\{(\w+)(?::([^\}]*))?\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        std::env::var(var).unwrap_or_else(|_| default.to_string())
    })
    .to_string()
}

fn generate_secret() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_SECRET_BYTES)
        .map(|_| format!("{:02x}", rng.random::<u8>()))
        .collect()
}
