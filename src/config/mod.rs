use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILENAME: &str = "botherd.toml";

/// Problems a config file can parse cleanly but still be unusable with.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("no accounts configured (accounts.usernames is empty)")]
    NoAccounts,
    #[error("account '{0}' is listed more than once")]
    DuplicateAccount(String),
    #[error("console.prefix must be exactly one character, got {0:?}")]
    BadPrefix(String),
    #[error("{0} must be greater than zero")]
    ZeroInterval(&'static str),
}

/// Teleport request kinds, in classification priority order.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TeleportKind {
    /// The requester wants us to come to them (`/tpahere`).
    Here,
    /// The requester wants to come to us (`/tpa`).
    To,
    /// Server-specific wording that doesn't say which way.
    Generic,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_auth")]
    pub auth: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_address")]
    pub address: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountsConfig {
    #[serde(default)]
    pub usernames: Vec<String>,
    #[serde(default = "default_join_delay_ms")]
    pub join_delay_ms: u64,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_login_command")]
    pub login_command: String,
    /// Sent once after a successful login, e.g. `/joinqueue survival`.
    #[serde(default)]
    pub queue_command: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TeleportConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Only requests from this account are accepted when set.
    #[serde(default)]
    pub master: Option<String>,
    #[serde(default = "default_accept_command")]
    pub accept_command: String,
    #[serde(default = "default_confirm_item")]
    pub confirm_item: String,
    #[serde(default = "default_confirm_kinds")]
    pub confirm_kinds: Vec<TeleportKind>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AntiIdleConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_anti_idle_interval_ms")]
    pub interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: Option<String>,
    /// Discord user id pinged in every message.
    #[serde(default)]
    pub mention: Option<String>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_true")]
    pub active_on_start: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatsConfig {
    #[serde(default = "default_balance_command")]
    pub balance_command: String,
    #[serde(default = "default_shard_command")]
    pub shard_command: String,
}

/// Every delay the automation uses, in milliseconds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_login_delay_ms")]
    pub login_delay_ms: u64,
    #[serde(default = "default_queue_delay_ms")]
    pub queue_delay_ms: u64,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_respawn_delay_ms")]
    pub respawn_delay_ms: u64,
    #[serde(default = "default_teleport_accept_delay_ms")]
    pub teleport_accept_delay_ms: u64,
    #[serde(default = "default_teleport_confirm_timeout_ms")]
    pub teleport_confirm_timeout_ms: u64,
    #[serde(default = "default_aggregate_window_ms")]
    pub aggregate_window_ms: u64,
    #[serde(default = "default_balance_shard_gap_ms")]
    pub balance_shard_gap_ms: u64,
    #[serde(default = "default_stats_report_delay_ms")]
    pub stats_report_delay_ms: u64,
    #[serde(default = "default_anti_idle_release_ms")]
    pub anti_idle_release_ms: u64,
}

/// Phrase lists for the chat classifier. Matching is case-insensitive
/// substring matching.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatternsConfig {
    #[serde(default = "default_login_prompt")]
    pub login_prompt: Vec<String>,
    #[serde(default = "default_login_success")]
    pub login_success: Vec<String>,
    #[serde(default = "default_queue_confirmed")]
    pub queue_confirmed: Vec<String>,
    #[serde(default = "default_world_joined")]
    pub world_joined: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConsoleConfig {
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    25565
}

fn default_version() -> String {
    "1.20.4".to_string()
}

fn default_auth() -> String {
    "offline".to_string()
}

fn default_bridge_address() -> String {
    "127.0.0.1:25580".to_string()
}

fn default_join_delay_ms() -> u64 {
    5000
}

fn default_login_command() -> String {
    "/login".to_string()
}

fn default_accept_command() -> String {
    "/tpaccept".to_string()
}

fn default_confirm_item() -> String {
    "lime_stained_glass_pane".to_string()
}

fn default_confirm_kinds() -> Vec<TeleportKind> {
    vec![TeleportKind::Here]
}

fn default_anti_idle_interval_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    300_000
}

fn default_true() -> bool {
    true
}

fn default_balance_command() -> String {
    "/balance".to_string()
}

fn default_shard_command() -> String {
    "/shard balance".to_string()
}

fn default_login_delay_ms() -> u64 {
    1000
}

fn default_queue_delay_ms() -> u64 {
    2000
}

fn default_reconnect_delay_ms() -> u64 {
    10_000
}

fn default_respawn_delay_ms() -> u64 {
    1000
}

fn default_teleport_accept_delay_ms() -> u64 {
    1000
}

fn default_teleport_confirm_timeout_ms() -> u64 {
    10_000
}

fn default_aggregate_window_ms() -> u64 {
    500
}

fn default_balance_shard_gap_ms() -> u64 {
    3000
}

fn default_stats_report_delay_ms() -> u64 {
    10_000
}

fn default_anti_idle_release_ms() -> u64 {
    500
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_login_prompt() -> Vec<String> {
    strings(&[
        "/login",
        "please login",
        "you are not logged in",
        "authentication required",
    ])
}

fn default_login_success() -> Vec<String> {
    strings(&[
        "successfully logged in",
        "logged in successfully",
        "login successful",
        "welcome back",
    ])
}

fn default_queue_confirmed() -> Vec<String> {
    strings(&["added to the queue", "position in queue"])
}

fn default_world_joined() -> Vec<String> {
    strings(&["welcome to", "joined the game", "you have joined"])
}

fn default_prefix() -> String {
    ".".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            version: default_version(),
            auth: default_auth(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: default_bridge_address(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            usernames: Vec::new(),
            join_delay_ms: default_join_delay_ms(),
            password: String::new(),
            login_command: default_login_command(),
            queue_command: None,
        }
    }
}

impl Default for TeleportConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            master: None,
            accept_command: default_accept_command(),
            confirm_item: default_confirm_item(),
            confirm_kinds: default_confirm_kinds(),
        }
    }
}

impl Default for AntiIdleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_anti_idle_interval_ms(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            mention: None,
            poll_interval_ms: default_poll_interval_ms(),
            active_on_start: default_true(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            balance_command: default_balance_command(),
            shard_command: default_shard_command(),
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            login_delay_ms: default_login_delay_ms(),
            queue_delay_ms: default_queue_delay_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            respawn_delay_ms: default_respawn_delay_ms(),
            teleport_accept_delay_ms: default_teleport_accept_delay_ms(),
            teleport_confirm_timeout_ms: default_teleport_confirm_timeout_ms(),
            aggregate_window_ms: default_aggregate_window_ms(),
            balance_shard_gap_ms: default_balance_shard_gap_ms(),
            stats_report_delay_ms: default_stats_report_delay_ms(),
            anti_idle_release_ms: default_anti_idle_release_ms(),
        }
    }
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            login_prompt: default_login_prompt(),
            login_success: default_login_success(),
            queue_confirmed: default_queue_confirmed(),
            world_joined: default_world_joined(),
        }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FleetConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub accounts: AccountsConfig,
    #[serde(default)]
    pub teleport: TeleportConfig,
    #[serde(default)]
    pub anti_idle: AntiIdleConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub patterns: PatternsConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
}

impl FleetConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: FleetConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.usernames.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        let mut seen = HashSet::new();
        for name in &self.accounts.usernames {
            if !seen.insert(name.as_str()) {
                return Err(ConfigError::DuplicateAccount(name.clone()));
            }
        }
        if self.console.prefix.chars().count() != 1 {
            return Err(ConfigError::BadPrefix(self.console.prefix.clone()));
        }
        if self.webhook.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("webhook.poll_interval_ms"));
        }
        if self.anti_idle.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("anti_idle.interval_ms"));
        }
        Ok(())
    }

    pub fn prefix(&self) -> char {
        self.console.prefix.chars().next().unwrap_or('.')
    }
}
