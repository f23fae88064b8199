//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * server / metrics / logging settings
//!   * signing window
//!   * identity tiers (local candidates, remote url, deadline)
//!   * store location and notify endpoint when enabled
//!   * retry invariants
//!   * scheduler cadence

use reqwest::Url;
use tracing::{error, info};

use crate::config::service::{
    IdentitiesConfig, NotifyConfig, SchedulerConfig, ServiceConfig, SigningConfig, StoreConfig,
};
use crate::config::settings::{RetryConfig, SettingsConfig};
use crate::resilience::retry::RETRY_MAX_DELAY_MS_DEFAULT;
use crate::scheduler::parse_cadence;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_signing(&cfg.signing, &mut errors);
    validate_identities(&cfg.identities, &mut errors);

    if cfg.tokens.cache_path.trim().is_empty() {
        errors.push("tokens.cache_path cannot be empty".to_string());
    }

    validate_store(&cfg.store, &mut errors);
    validate_notify(&cfg.notify, &mut errors);
    validate_scheduler(&cfg.scheduler, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push(format!(
            "settings.server.host '{}' must be valid",
            settings.server.host
        ));
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_signing(signing: &SigningConfig, errors: &mut Vec<String>) {
    if signing.validity_seconds == 0 {
        errors.push("signing.validity_seconds must be > 0".to_string());
    }
    if signing.server_id.trim().is_empty() {
        errors.push("signing.server_id cannot be empty".to_string());
    }
}

fn validate_identities(identities: &IdentitiesConfig, errors: &mut Vec<String>) {
    if identities.local_paths.is_empty() {
        errors.push("identities.local_paths must include at least one candidate path".to_string());
    }
    for (i, path) in identities.local_paths.iter().enumerate() {
        if path.trim().is_empty() {
            errors.push(format!("identities.local_paths[{}] cannot be empty", i));
        }
    }
    if let Some(url) = &identities.remote_url {
        validate_url("identities.remote_url", url, errors);
    }
    if identities.remote_timeout_ms == 0 {
        errors.push("identities.remote_timeout_ms must be > 0".to_string());
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &store.retry {
        validate_retry("store.retry", retry, errors);
    }
    if store.timeout_ms == 0 {
        errors.push("store.timeout_ms must be > 0".to_string());
    }
    // location only matters when publishing is enabled
    if store.token.is_empty() {
        return;
    }
    validate_url("store.api_base", &store.api_base, errors);
    for (name, value) in [("owner", &store.owner), ("repo", &store.repo), ("path", &store.path)] {
        if value.trim().is_empty() {
            errors.push(format!("store.{} cannot be empty when store.token is set", name));
        }
    }
}

fn validate_notify(notify: &NotifyConfig, errors: &mut Vec<String>) {
    if let Some(retry) = &notify.retry {
        validate_retry("notify.retry", retry, errors);
    }
    if notify.timeout_ms == 0 {
        errors.push("notify.timeout_ms must be > 0".to_string());
    }
    if !notify.webhook_url.is_empty() {
        validate_url("notify.webhook_url", &notify.webhook_url, errors);
    }
}

fn validate_scheduler(scheduler: &SchedulerConfig, errors: &mut Vec<String>) {
    if let Err(e) = parse_cadence(&scheduler.cadence) {
        errors.push(format!("scheduler.cadence '{}' invalid: {}", scheduler.cadence, e));
    }
}

fn validate_retry(path: &str, retry: &RetryConfig, errors: &mut Vec<String>) {
    if let Some(attempts) = retry.attempts {
        if attempts == 0 {
            errors.push(format!("{}.attempts must be > 0", path));
        }
    }
    if let Some(base) = retry.base_delay_ms {
        let max = retry.max_delay_ms.unwrap_or(RETRY_MAX_DELAY_MS_DEFAULT);
        if max < base {
            errors.push(format!(
                "{}.max_delay_ms ({}) must be >= base_delay_ms ({})",
                path, max, base
            ));
        }
    }
}

fn validate_url(path: &str, url: &str, errors: &mut Vec<String>) {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => errors.push(format!(
            "{} '{}' must use http or https, got '{}'",
            path,
            url,
            parsed.scheme()
        )),
        Err(e) => errors.push(format!("{} '{}' is not a valid url: {}", path, url, e)),
    }
}
