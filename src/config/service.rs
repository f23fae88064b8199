use serde::Deserialize;

use crate::config::settings::{RetryConfig, SettingsConfig};

pub const TOKEN_VALIDITY_SECONDS_DEFAULT: u64 = 4 * 60 * 60;
pub const REMOTE_TIMEOUT_MS_DEFAULT: u64 = 15_000;
pub const STORE_TIMEOUT_MS_DEFAULT: u64 = 15_000;
pub const NOTIFY_TIMEOUT_MS_DEFAULT: u64 = 15_000;
pub const CADENCE_DEFAULT: &str = "0 */4 * * *";

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub identities: IdentitiesConfig,
    #[serde(default)]
    pub tokens: TokensConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// ================================
/// Token signing
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SigningConfig {
    /// HMAC secret. Empty means "generate one for this process".
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_validity_seconds")]
    pub validity_seconds: u64,
    /// value of the `svr` header field
    #[serde(default = "default_server_id")]
    pub server_id: String,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            validity_seconds: default_validity_seconds(),
            server_id: default_server_id(),
        }
    }
}

/// ================================
/// Identity sourcing tiers
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct IdentitiesConfig {
    /// Candidate local files, tried in order. The first one is the write-back target.
    #[serde(default = "default_local_paths")]
    pub local_paths: Vec<String>,
    /// Remote JSON document; the tier is skipped when absent.
    pub remote_url: Option<String>,
    #[serde(default = "default_remote_timeout_ms")]
    pub remote_timeout_ms: u64,
}

impl Default for IdentitiesConfig {
    fn default() -> Self {
        Self {
            local_paths: default_local_paths(),
            remote_url: None,
            remote_timeout_ms: default_remote_timeout_ms(),
        }
    }
}

/// ================================
/// Local token batch cache
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct TokensConfig {
    #[serde(default = "default_cache_path")]
    pub cache_path: String,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self { cache_path: default_cache_path() }
    }
}

/// ================================
/// Versioned content store (GitHub contents API)
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_api")]
    pub api_base: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default = "default_store_path")]
    pub path: String,
    pub branch: Option<String>,
    /// Access token; publishing is disabled when empty.
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_committer_name")]
    pub committer_name: String,
    #[serde(default = "default_committer_email")]
    pub committer_email: String,
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,
    /// Extra attempts for transient failures. Conflicts always get exactly one retry.
    pub retry: Option<RetryConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            api_base: default_store_api(),
            owner: String::new(),
            repo: String::new(),
            path: default_store_path(),
            branch: None,
            token: String::new(),
            committer_name: default_committer_name(),
            committer_email: default_committer_email(),
            timeout_ms: default_store_timeout_ms(),
            retry: None,
        }
    }
}

/// ================================
/// Notification webhook
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct NotifyConfig {
    /// Webhook URL; notifications are disabled when empty.
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
    pub retry: Option<RetryConfig>,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { webhook_url: String::new(), timeout_ms: default_notify_timeout_ms(), retry: None }
    }
}

/// ================================
/// Scheduler
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// cron expression, 5 fields (min hour dom month dow) or 6/7 with seconds
    #[serde(default = "default_cadence")]
    pub cadence: String,
    /// human readable cadence shown in notifications
    pub description: Option<String>,
    #[serde(default = "default_true")]
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { cadence: default_cadence(), description: None, run_on_start: true }
    }
}

impl SchedulerConfig {
    pub fn cadence_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| format!("cron '{}' (UTC)", self.cadence))
    }
}

fn default_validity_seconds() -> u64 {
    TOKEN_VALIDITY_SECONDS_DEFAULT
}

fn default_server_id() -> String {
    "1".to_string()
}

fn default_local_paths() -> Vec<String> {
    vec!["data/guest_accounts.json".to_string()]
}

fn default_remote_timeout_ms() -> u64 {
    REMOTE_TIMEOUT_MS_DEFAULT
}

fn default_cache_path() -> String {
    "data/generated_tokens.json".to_string()
}

fn default_store_api() -> String {
    "https://api.github.com".to_string()
}

fn default_store_path() -> String {
    "tokens/tokens.json".to_string()
}

fn default_committer_name() -> String {
    "Token Relay".to_string()
}

fn default_committer_email() -> String {
    "noreply@token-relay.local".to_string()
}

fn default_store_timeout_ms() -> u64 {
    STORE_TIMEOUT_MS_DEFAULT
}

fn default_notify_timeout_ms() -> u64 {
    NOTIFY_TIMEOUT_MS_DEFAULT
}

fn default_cadence() -> String {
    CADENCE_DEFAULT.to_string()
}

fn default_true() -> bool {
    true
}
