use crate::error::{CoffeeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tables {
    #[serde(default = "default_participants_table")]
    pub participants: String,
    #[serde(default = "default_pairings_table")]
    pub pairings: String,
    #[serde(default = "default_communities_table")]
    pub communities: String,
    #[serde(default = "default_logs_table")]
    pub notification_logs: String,
}

fn default_participants_table() -> String {
    "Participants".to_string()
}

fn default_pairings_table() -> String {
    "Pairings".to_string()
}

fn default_communities_table() -> String {
    "Communities".to_string()
}

fn default_logs_table() -> String {
    "Notification_Logs".to_string()
}

impl Default for Tables {
    fn default() -> Self {
        Self {
            participants: default_participants_table(),
            pairings: default_pairings_table(),
            communities: default_communities_table(),
            notification_logs: default_logs_table(),
        }
    }
}

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub base_url: String,
    #[serde(default)]
    pub base_id: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_store_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between write chunks and result pages.
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    #[serde(default)]
    pub tables: Tables,
}

fn default_store_url() -> String {
    "https://api.airtable.com/v0".to_string()
}

fn default_store_key_env() -> String {
    "AIRTABLE_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_batch_pause_ms() -> u64 {
    250
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_url(),
            base_id: String::new(),
            api_key_env: default_store_key_env(),
            timeout_secs: default_timeout_secs(),
            batch_pause_ms: default_batch_pause_ms(),
            tables: Tables::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// GatewayConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_gateway_url")]
    pub base_url: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Pause between consecutive messages in a batch send.
    #[serde(default = "default_send_pause_ms")]
    pub send_pause_ms: u64,
}

fn default_gateway_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_token_env() -> String {
    "TELEGRAM_BOT_TOKEN".to_string()
}

fn default_send_pause_ms() -> u64 {
    100
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: default_gateway_url(),
            token_env: default_token_env(),
            timeout_secs: default_timeout_secs(),
            send_pause_ms: default_send_pause_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// AdminConfig / PolicyConfig / PoolsConfig / JournalConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Recipient for run summaries and test-mode redirects.
    #[serde(default)]
    pub chat_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Flip engaged participants back to Active during the sweep.
    #[serde(default)]
    pub reactivate_engaged: bool,
    /// Tell the odd participant out that no partner was found.
    #[serde(default = "default_true")]
    pub notify_leftover: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            reactivate_engaged: false,
            notify_leftover: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolsConfig {
    /// Pause between consecutive pool runs in `match-all`.
    #[serde(default = "default_pool_pause_ms")]
    pub pause_ms: u64,
}

fn default_pool_pause_ms() -> u64 {
    2000
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            pause_ms: default_pool_pause_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalConfig {
    #[serde(default = "default_journal_path")]
    pub path: PathBuf,
    /// A `Running` entry older than this is treated as a crashed run.
    #[serde(default = "default_stale_minutes")]
    pub stale_after_minutes: u64,
}

fn default_journal_path() -> PathBuf {
    PathBuf::from(".coffee/journal.redb")
}

fn default_stale_minutes() -> u64 {
    360
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            path: default_journal_path(),
            stale_after_minutes: default_stale_minutes(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub pools: PoolsConfig,
    #[serde(default)]
    pub journal: JournalConfig,
}

impl Config {
    /// Load from a YAML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Config = serde_yaml::from_str(&data)?;
        // Relative journal paths are anchored at the config file's directory.
        if config.journal.path.is_relative() {
            if let Some(dir) = path.parent() {
                config.journal.path = dir.join(&config.journal.path);
            }
        }
        Ok(config)
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();
        let mut push = |level: WarnLevel, message: String| {
            warnings.push(ConfigWarning { level, message });
        };

        if self.store.base_id.trim().is_empty() {
            push(WarnLevel::Error, "store.base_id is empty".to_string());
        }
        if reqwest::Url::parse(&self.store.base_url).is_err() {
            push(
                WarnLevel::Error,
                format!("store.base_url '{}' is not a valid URL", self.store.base_url),
            );
        }
        if reqwest::Url::parse(&self.gateway.base_url).is_err() {
            push(
                WarnLevel::Error,
                format!(
                    "gateway.base_url '{}' is not a valid URL",
                    self.gateway.base_url
                ),
            );
        }
        if self.admin.chat_id.as_deref().map(str::trim).unwrap_or("").is_empty() {
            push(
                WarnLevel::Warning,
                "admin.chat_id is not set: run summaries are logged only and --test cannot be used"
                    .to_string(),
            );
        }
        if self.store.batch_pause_ms == 0 {
            push(
                WarnLevel::Warning,
                "store.batch_pause_ms is 0: bulk writes may hit the store's rate limit".to_string(),
            );
        }
        if self.gateway.send_pause_ms == 0 {
            push(
                WarnLevel::Warning,
                "gateway.send_pause_ms is 0: batch sends may hit the gateway's rate limit"
                    .to_string(),
            );
        }
        if self.journal.stale_after_minutes == 0 {
            push(
                WarnLevel::Error,
                "journal.stale_after_minutes must be positive".to_string(),
            );
        }
        warnings
    }

    pub fn admin_chat_id(&self) -> Option<&str> {
        self.admin
            .chat_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// Read a secret from the environment. Missing or blank is an error.
pub fn read_secret(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(CoffeeError::MissingSecret(var.to_string())),
    }
}
