//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

// Re-export policy structs owned by their modules
pub use crate::expectation::ExpectationPolicy;
pub use crate::mania::{BlendWeights, ManiaWeights};
pub use crate::scoring::ScoringWeights;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub scoring: ScoringWeights,
    #[serde(default)]
    pub mania: ManiaConfig,
    #[serde(default)]
    pub blend: BlendWeights,
    #[serde(default)]
    pub expectation: ExpectationPolicy,
    #[serde(default)]
    pub safety: SafetyConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
}

/// New-pair scanning configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScanConfig {
    /// How far back to consider a pair "new" (hours)
    #[serde(default = "default_hours_back")]
    pub hours_back: u32,
    /// How many top-scored candidates go through the full pipeline
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// How many DexScreener profiles to check per scan
    #[serde(default = "default_profile_limit")]
    pub profile_limit: usize,
    /// Fixed delay between per-token pair lookups (ms)
    #[serde(default = "default_pair_delay_ms")]
    pub pair_delay_ms: u64,
    /// Pairs below this liquidity are dropped at discovery
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    /// Symbols matching any of these regexes are skipped
    #[serde(default)]
    pub blocked_symbol_patterns: Vec<String>,
}

fn default_hours_back() -> u32 {
    24
}
fn default_top_n() -> usize {
    10
}
fn default_profile_limit() -> usize {
    30
}
fn default_pair_delay_ms() -> u64 {
    300
}
fn default_min_liquidity_usd() -> f64 {
    1_000.0
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            hours_back: default_hours_back(),
            top_n: default_top_n(),
            profile_limit: default_profile_limit(),
            pair_delay_ms: default_pair_delay_ms(),
            min_liquidity_usd: default_min_liquidity_usd(),
            blocked_symbol_patterns: vec![],
        }
    }
}

/// Mania scoring configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ManiaConfig {
    /// Enable the mania enhancement pass
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Known sophisticated wallets (allow-list for smart-money counting)
    #[serde(default)]
    pub smart_wallets: Vec<String>,
    /// Fixed delay between per-candidate holder lookups (ms)
    #[serde(default = "default_holder_delay_ms")]
    pub holder_delay_ms: u64,
    /// Composite weights
    #[serde(default)]
    pub weights: ManiaWeights,
}

fn default_holder_delay_ms() -> u64 {
    300
}

impl Default for ManiaConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            smart_wallets: vec![],
            holder_delay_ms: default_holder_delay_ms(),
            weights: ManiaWeights::default(),
        }
    }
}

/// Safety check configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SafetyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-report fetch timeout (seconds)
    #[serde(default = "default_safety_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_safety_timeout_secs() -> u64 {
    15
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: default_safety_timeout_secs(),
        }
    }
}

/// State persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// Directory holding state.json / history.json
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Notification channel configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    /// Discord webhook URL (empty = disabled)
    #[serde(default)]
    pub discord_webhook_url: String,
    /// Telegram bot token (empty = disabled)
    #[serde(default)]
    pub telegram_bot_token: String,
    /// Telegram chat id
    #[serde(default)]
    pub telegram_chat_id: String,
}

/// Realtime watch-lists
///
/// Recognized keys only: wallet entries are `address:label` (label
/// optional), token entries are mint addresses, ranges are per-asset
/// low/high bounds with 0/0 meaning disabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub wallets: Vec<String>,
    #[serde(default)]
    pub tokens: Vec<String>,
    #[serde(default)]
    pub sol_range: RangeBounds,
    #[serde(default)]
    pub btc_range: RangeBounds,
    #[serde(default)]
    pub eth_range: RangeBounds,
}

/// Price range bounds; both zero disables the watch
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RangeBounds {
    #[serde(default)]
    pub low: f64,
    #[serde(default)]
    pub high: f64,
}

impl RangeBounds {
    pub fn is_set(&self) -> bool {
        self.low > 0.0 && self.high > 0.0
    }
}

impl WatchConfig {
    /// Parse `address:label` wallet entries into (address, label) pairs.
    /// Entries without a label get a positional one.
    pub fn wallet_watchlist(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        for entry in &self.wallets {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            match entry.split_once(':') {
                Some((addr, label)) => {
                    out.push((addr.trim().to_string(), label.trim().to_string()))
                }
                None => out.push((entry.to_string(), format!("Wallet {}", out.len() + 1))),
            }
        }
        out
    }

    /// Configured price ranges as (coingecko id, bounds)
    pub fn ranges(&self) -> Vec<(&'static str, RangeBounds)> {
        let mut out = Vec::new();
        if self.sol_range.is_set() {
            out.push(("solana", self.sol_range));
        }
        if self.btc_range.is_set() {
            out.push(("bitcoin", self.btc_range));
        }
        if self.eth_range.is_set() {
            out.push(("ethereum", self.eth_range));
        }
        out
    }
}

/// Daemon scheduling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// Main screening interval (minutes)
    #[serde(default = "default_scan_interval")]
    pub scan_interval_minutes: u64,
    /// Realtime monitor interval (minutes)
    #[serde(default = "default_realtime_interval")]
    pub realtime_interval_minutes: u64,
    /// Daily report hour (local, 0-23)
    #[serde(default = "default_report_hour")]
    pub daily_report_hour: u32,
}

fn default_scan_interval() -> u64 {
    30
}
fn default_realtime_interval() -> u64 {
    5
}
fn default_report_hour() -> u32 {
    9
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            scan_interval_minutes: default_scan_interval(),
            realtime_interval_minutes: default_realtime_interval(),
            daily_report_hour: default_report_hour(),
        }
    }
}

/// Solana RPC configuration (wallet watcher only)
#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    /// Helius API key; when set, overrides the endpoint
    #[serde(default)]
    pub helius_api_key: String,
}

fn default_rpc_endpoint() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            helius_api_key: String::new(),
        }
    }
}

impl RpcConfig {
    /// Effective RPC URL
    pub fn url(&self) -> String {
        if self.helius_api_key.is_empty() {
            self.endpoint.clone()
        } else {
            format!(
                "https://mainnet.helius-rpc.com/?api-key={}",
                self.helius_api_key
            )
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from TOML file with environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix SCREENER_)
            .add_source(
                config::Environment::with_prefix("SCREENER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if self.scan.top_n == 0 {
            anyhow::bail!("scan.top_n must be positive");
        }

        if self.scan.hours_back == 0 {
            anyhow::bail!("scan.hours_back must be positive");
        }

        // Validate symbol patterns (compile regex to check)
        for pattern in &self.scan.blocked_symbol_patterns {
            regex::Regex::new(pattern)
                .with_context(|| format!("Invalid blocked_symbol_pattern regex: {}", pattern))?;
        }

        // Validate watch wallet addresses
        for (addr, _) in self.watch.wallet_watchlist() {
            if addr.len() < 32 || addr.len() > 44 {
                anyhow::bail!("Invalid watch wallet address: {}", addr);
            }
        }

        for (asset, bounds) in self.watch.ranges() {
            if bounds.low >= bounds.high {
                anyhow::bail!(
                    "Invalid {} range: low {} must be below high {}",
                    asset,
                    bounds.low,
                    bounds.high
                );
            }
        }

        if self.schedule.scan_interval_minutes == 0 || self.schedule.realtime_interval_minutes == 0
        {
            anyhow::bail!("schedule intervals must be positive");
        }

        if self.schedule.daily_report_hour > 23 {
            anyhow::bail!("daily_report_hour must be 0-23");
        }

        self.blend.validate()?;
        self.mania.weights.validate()?;

        Ok(())
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Scan:
    hours_back: {}h
    top_n: {}
    min_liquidity: ${}
  Mania:
    enabled: {}
    smart_wallets: {}
  Safety:
    enabled: {}
  State:
    data_dir: {}
  Notify:
    discord: {}
    telegram: {}
  Watch:
    wallets: {}
    tokens: {}
    ranges: {:?}
  Schedule:
    scan: every {}min
    realtime: every {}min
    daily report: {}:00
  RPC:
    endpoint: {}
"#,
            self.scan.hours_back,
            self.scan.top_n,
            self.scan.min_liquidity_usd,
            self.mania.enabled,
            self.mania.smart_wallets.len(),
            self.safety.enabled,
            self.state.data_dir,
            if self.notify.discord_webhook_url.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            if self.notify.telegram_bot_token.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.watch.wallets.len(),
            self.watch.tokens.len(),
            self.watch
                .ranges()
                .iter()
                .map(|(a, _)| *a)
                .collect::<Vec<_>>(),
            self.schedule.scan_interval_minutes,
            self.schedule.realtime_interval_minutes,
            self.schedule.daily_report_hour,
            mask_url(&self.rpc.url()),
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan: ScanConfig::default(),
            scoring: ScoringWeights::default(),
            mania: ManiaConfig::default(),
            blend: BlendWeights::default(),
            expectation: ExpectationPolicy::default(),
            safety: SafetyConfig::default(),
            state: StateConfig::default(),
            notify: NotifyConfig::default(),
            watch: WatchConfig::default(),
            schedule: ScheduleConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}
