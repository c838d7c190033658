//! Realtime watchers: wallets, liquidity, price ranges
//!
//! Notification-only; nothing here trades. Watch-lists come from typed
//! config, upstream failures degrade to empty alert lists.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use tracing::{debug, info};

use crate::config::{RangeBounds, RpcConfig, WatchConfig};
use crate::scanner::TokenPairsResponse;

const DEXSCREENER_BASE: &str = "https://api.dexscreener.com";
const COINGECKO_BASE: &str = "https://api.coingecko.com/api/v3";

/// Fixed delay between per-target upstream calls (ms)
const WATCH_DELAY_MS: u64 = 300;

/// Liquidity drop below this marks the pool as effectively removed
const REMOVED_FLOOR_USD: f64 = 1_000.0;

/// Liquidity change thresholds (percent)
const DROP_SEVERE_PCT: f64 = -50.0;
const DROP_PCT: f64 = -20.0;
const SURGE_PCT: f64 = 100.0;

// ---------------------------------------------------------------------------
// Wallet tracker
// ---------------------------------------------------------------------------

/// A new transaction on a watched wallet
#[derive(Debug, Clone)]
pub struct WalletActivity {
    pub wallet: String,
    pub label: String,
    pub signature: String,
    pub timestamp: DateTime<Utc>,
}

impl fmt::Display for WalletActivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sig_prefix: String = self.signature.chars().take(16).collect();
        write!(f, "👛 **{}** が新規TX: `{}...`", self.label, sig_prefix)
    }
}

#[derive(Debug, Deserialize)]
struct RpcSignaturesResponse {
    #[serde(default)]
    result: Vec<SigInfo>,
}

#[derive(Debug, Deserialize)]
struct SigInfo {
    #[serde(default)]
    signature: String,
    #[serde(default)]
    err: Option<serde_json::Value>,
    #[serde(rename = "blockTime", default)]
    block_time: Option<i64>,
}

/// Polls watched wallets for new transactions
pub struct WalletTracker {
    client: reqwest::Client,
    rpc_url: String,
    watch_list: Vec<(String, String)>,
    last_signatures: DashMap<String, String>,
}

impl WalletTracker {
    pub fn new(watch: &WatchConfig, rpc: &RpcConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            rpc_url: rpc.url(),
            watch_list: watch.wallet_watchlist(),
            last_signatures: DashMap::new(),
        }
    }

    /// Check all watched wallets; per-wallet failures degrade to nothing
    pub async fn check_all(&self) -> Vec<WalletActivity> {
        if self.watch_list.is_empty() {
            return Vec::new();
        }

        let mut activities = Vec::new();
        for (addr, label) in &self.watch_list {
            match self.check_wallet(addr, label).await {
                Ok(mut found) => activities.append(&mut found),
                Err(e) => debug!("Wallet check failed for {}: {}", addr, e),
            }
            tokio::time::sleep(std::time::Duration::from_millis(WATCH_DELAY_MS)).await;
        }

        if !activities.is_empty() {
            info!("Wallet watch: {} new activities", activities.len());
        }
        activities
    }

    async fn check_wallet(
        &self,
        address: &str,
        label: &str,
    ) -> crate::error::Result<Vec<WalletActivity>> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "getSignaturesForAddress",
            "params": [address, { "limit": 5 }],
        });

        let resp = self.client.post(&self.rpc_url).json(&payload).send().await?;
        if !resp.status().is_success() {
            return Err(crate::error::Error::UpstreamStatus {
                endpoint: "solana-rpc".to_string(),
                status: resp.status().as_u16(),
            });
        }
        let data: RpcSignaturesResponse = resp.json().await?;

        let last_seen = self
            .last_signatures
            .get(address)
            .map(|entry| entry.value().clone());

        let fresh = new_signatures(&data.result, last_seen.as_deref());
        let activities = fresh
            .iter()
            .map(|sig| WalletActivity {
                wallet: address.to_string(),
                label: label.to_string(),
                signature: sig.signature.clone(),
                timestamp: sig
                    .block_time
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
                    .unwrap_or_else(Utc::now),
            })
            .collect();

        if let Some(newest) = data.result.first() {
            self.last_signatures
                .insert(address.to_string(), newest.signature.clone());
        }

        Ok(activities)
    }
}

/// Signatures newer than the last seen one, failed transactions skipped
fn new_signatures<'a>(sigs: &'a [SigInfo], last_seen: Option<&str>) -> Vec<&'a SigInfo> {
    let mut fresh = Vec::new();
    for sig in sigs {
        if Some(sig.signature.as_str()) == last_seen {
            break;
        }
        if sig.err.is_some() {
            continue;
        }
        fresh.push(sig);
    }
    fresh
}

// ---------------------------------------------------------------------------
// Liquidity monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiquidityAlertKind {
    Drop,
    Surge,
    Removed,
}

impl LiquidityAlertKind {
    fn as_str(&self) -> &'static str {
        match self {
            LiquidityAlertKind::Drop => "drop",
            LiquidityAlertKind::Surge => "surge",
            LiquidityAlertKind::Removed => "removed",
        }
    }
}

/// A liquidity movement on a watched token
#[derive(Debug, Clone)]
pub struct LiquidityAlert {
    pub token_address: String,
    pub token_symbol: String,
    pub kind: LiquidityAlertKind,
    pub prev_liquidity: f64,
    pub current_liquidity: f64,
    pub change_pct: f64,
}

impl fmt::Display for LiquidityAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let emoji = match self.kind {
            LiquidityAlertKind::Surge => "💧",
            _ => "🚨",
        };
        write!(
            f,
            "{} **${}** LP{}: ${:.0} → ${:.0} ({:+.1}%)",
            emoji,
            self.token_symbol,
            self.kind.as_str(),
            self.prev_liquidity,
            self.current_liquidity,
            self.change_pct
        )
    }
}

/// Detects LP pulls and surges on watched tokens
pub struct LiquidityMonitor {
    client: reqwest::Client,
    watch_tokens: Vec<String>,
    prev_liquidity: DashMap<String, f64>,
}

impl LiquidityMonitor {
    pub fn new(watch: &WatchConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            watch_tokens: watch.tokens.clone(),
            prev_liquidity: DashMap::new(),
        }
    }

    pub async fn check_all(&self) -> Vec<LiquidityAlert> {
        let mut alerts = Vec::new();
        for token in &self.watch_tokens {
            if let Some(alert) = self.check_token(token).await {
                alerts.push(alert);
            }
            tokio::time::sleep(std::time::Duration::from_millis(WATCH_DELAY_MS)).await;
        }
        alerts
    }

    async fn check_token(&self, token_address: &str) -> Option<LiquidityAlert> {
        let url = format!("{}/latest/dex/tokens/{}", DEXSCREENER_BASE, token_address);
        let resp = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!("Liquidity check {}: status {}", token_address, resp.status());
                return None;
            }
            Err(e) => {
                debug!("Liquidity check {} failed: {}", token_address, e);
                return None;
            }
        };

        let data: TokenPairsResponse = resp.json().await.ok()?;
        let pair = data.pairs.and_then(|pairs| pairs.into_iter().next())?;

        let current = pair.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
        let symbol = pair.base_token.symbol.unwrap_or_else(|| "???".to_string());

        let prev = self
            .prev_liquidity
            .insert(token_address.to_string(), current);

        let prev = match prev {
            Some(p) if p > 0.0 => p,
            _ => return None,
        };

        let change_pct = (current - prev) / prev * 100.0;
        let kind = classify_liquidity_change(change_pct, current)?;

        Some(LiquidityAlert {
            token_address: token_address.to_string(),
            token_symbol: symbol,
            kind,
            prev_liquidity: prev,
            current_liquidity: current,
            change_pct: (change_pct * 10.0).round() / 10.0,
        })
    }
}

/// Threshold classification for a liquidity change
fn classify_liquidity_change(change_pct: f64, current: f64) -> Option<LiquidityAlertKind> {
    if change_pct <= DROP_SEVERE_PCT {
        if current < REMOVED_FLOOR_USD {
            Some(LiquidityAlertKind::Removed)
        } else {
            Some(LiquidityAlertKind::Drop)
        }
    } else if change_pct <= DROP_PCT {
        Some(LiquidityAlertKind::Drop)
    } else if change_pct >= SURGE_PCT {
        Some(LiquidityAlertKind::Surge)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Range monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBreach {
    Above,
    Below,
}

/// A watched asset left its configured range
#[derive(Debug, Clone)]
pub struct RangeAlert {
    pub asset: String,
    pub current_price: f64,
    pub range_low: f64,
    pub range_high: f64,
    pub breach: RangeBreach,
    pub change_24h: f64,
}

impl fmt::Display for RangeAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (emoji, what) = match self.breach {
            RangeBreach::Above => ("📈", "上限突破"),
            RangeBreach::Below => ("📉", "下限割れ"),
        };
        write!(
            f,
            "{} **{}** レンジ{}: ${:.2} (24h: {:+.1}%) [レンジ: ${:.0}-${:.0}]",
            emoji, self.asset, what, self.current_price, self.change_24h, self.range_low,
            self.range_high
        )
    }
}

#[derive(Debug, Deserialize)]
struct CoinPrice {
    #[serde(default)]
    usd: f64,
    #[serde(rename = "usd_24h_change", default)]
    usd_24h_change: Option<f64>,
}

/// Watches asset prices against configured ranges
pub struct RangeMonitor {
    client: reqwest::Client,
    ranges: Vec<(&'static str, RangeBounds)>,
}

impl RangeMonitor {
    pub fn new(watch: &WatchConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            ranges: watch.ranges(),
        }
    }

    pub async fn check_all(&self) -> Vec<RangeAlert> {
        if self.ranges.is_empty() {
            return Vec::new();
        }

        let ids: Vec<&str> = self.ranges.iter().map(|(id, _)| *id).collect();
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd&include_24hr_change=true",
            COINGECKO_BASE,
            ids.join(",")
        );

        let prices: std::collections::HashMap<String, CoinPrice> =
            match self.client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.json().await {
                    Ok(prices) => prices,
                    Err(e) => {
                        debug!("Price payload decode failed: {}", e);
                        return Vec::new();
                    }
                },
                Ok(resp) => {
                    debug!("Price check: status {}", resp.status());
                    return Vec::new();
                }
                Err(e) => {
                    debug!("Price check failed: {}", e);
                    return Vec::new();
                }
            };

        let mut alerts = Vec::new();
        for (id, bounds) in &self.ranges {
            let Some(price) = prices.get(*id) else {
                continue;
            };
            if price.usd <= 0.0 {
                continue;
            }

            if let Some(breach) = breach_for(price.usd, bounds) {
                let asset: String = id.to_uppercase().chars().take(3).collect();
                info!("Range breach: {} at ${:.2}", asset, price.usd);
                alerts.push(RangeAlert {
                    asset,
                    current_price: price.usd,
                    range_low: bounds.low,
                    range_high: bounds.high,
                    breach,
                    change_24h: price.usd_24h_change.unwrap_or(0.0),
                });
            }
        }
        alerts
    }
}

/// Range breach check; inside the range yields nothing
fn breach_for(price: f64, bounds: &RangeBounds) -> Option<RangeBreach> {
    if price < bounds.low {
        Some(RangeBreach::Below)
    } else if price > bounds.high {
        Some(RangeBreach::Above)
    } else {
        None
    }
}
