use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_FEED_HOST: &str = "127.0.0.1";
pub const DEFAULT_FEED_PORT: u16 = 8888;
pub const DEFAULT_PORT: u16 = 18790;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Chunks shorter than this are keep-alive noise from the feed.
pub const DEFAULT_MIN_CHUNK_BYTES: usize = 20;
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30; // viewer tick cadence

/// Top-level config (feedbridge.toml + FEEDBRIDGE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub commands: CommandsConfig,
    #[serde(default)]
    pub ignore: IgnoreConfig,
    #[serde(default)]
    pub backends: BackendsConfig,
}

/// Upstream chat feed connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_feed_host")]
    pub host: String,
    #[serde(default = "default_feed_port")]
    pub port: u16,
    #[serde(default = "default_min_chunk_bytes")]
    pub min_chunk_bytes: usize,
    /// Write an empty line this often to keep the upstream session alive.
    /// Disabled when unset.
    pub keepalive_secs: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: default_feed_host(),
            port: default_feed_port(),
            min_chunk_bytes: default_min_chunk_bytes(),
            keepalive_secs: None,
        }
    }
}

/// Viewer-facing HTTP/WS server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on cached records; oldest are evicted first.
    /// Unbounded when unset.
    pub max_records: Option<usize>,
    /// Cap on the records the startup backfill pulls from the event log.
    /// The whole log is loaded when unset.
    pub backfill_limit: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_records: None,
            backfill_limit: None,
        }
    }
}

/// Which value the command router reports as its "matched" signal.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MatchSignal {
    /// Result of the last table entry only. Keyword alerts run whenever the
    /// final entry did not match, even if an earlier one did.
    #[default]
    LastEntry,
    /// True when any table entry matched.
    AnyEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    /// Literal prefix in front of every command word (e.g. `!calc`).
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub match_signal: MatchSignal,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            match_signal: MatchSignal::default(),
        }
    }
}

/// Regex patterns; records whose message or host match are never keyword-tested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreConfig {
    #[serde(default)]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendsConfig {
    pub translate: Option<TranslateConfig>,
    pub dialogue: Option<DialogueConfig>,
    pub paste: Option<PasteConfig>,
}

/// LibreTranslate-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    #[serde(default = "default_dialogue_base_url")]
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_dialogue_model")]
    pub model: String,
}

/// GitHub gist publishing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasteConfig {
    #[serde(default = "default_paste_api_url")]
    pub api_url: String,
    pub token: String,
    #[serde(default)]
    pub public: bool,
}

fn default_feed_host() -> String {
    DEFAULT_FEED_HOST.to_string()
}
fn default_feed_port() -> u16 {
    DEFAULT_FEED_PORT
}
fn default_min_chunk_bytes() -> usize {
    DEFAULT_MIN_CHUNK_BYTES
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_prefix() -> String {
    "!".to_string()
}
fn default_dialogue_base_url() -> String {
    "https://api.openai.com".to_string()
}
fn default_dialogue_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_paste_api_url() -> String {
    "https://api.github.com".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.feedbridge/feedbridge.db", home)
}

impl BridgeConfig {
    /// Load config from a TOML file with FEEDBRIDGE_* env var overrides.
    ///
    /// Uses the explicit path when given, else `~/.feedbridge/feedbridge.toml`.
    /// A missing file is fine; every field has a default except backend
    /// credentials.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: BridgeConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("FEEDBRIDGE_").split("__"))
            .extract()
            .map_err(|e| crate::error::BridgeError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.feedbridge/feedbridge.toml", home)
}
