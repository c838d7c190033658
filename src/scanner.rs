//! DexScreener scanner: new-pair discovery and candidate construction
//!
//! Everything fetched here is trusted as given; failures degrade to empty
//! results, never errors.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::ScanConfig;
use crate::error::Result;
use crate::mania::ManiaBreakdown;

const DEXSCREENER_BASE: &str = "https://api.dexscreener.com";
const FXTWITTER_BASE: &str = "https://api.fxtwitter.com";

/// One token under evaluation in a single pipeline cycle
#[derive(Debug, Clone, Serialize)]
pub struct TokenCandidate {
    pub address: String,
    pub symbol: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub liquidity_usd: f64,
    pub volume_24h_usd: f64,
    pub price_change_24h: f64,
    pub buys_24h: u32,
    pub sells_24h: u32,
    /// Twitter handle from the token profile, if any
    pub twitter: Option<String>,
    /// Primary score (0-100), written by the scoring engine and blended
    /// by the mania aggregator
    pub total_score: f64,
    /// Per-category score points, written only by the scoring engine
    pub scores: HashMap<String, f64>,
    /// Raw social payload from the social-data collaborator
    pub social: Option<SocialProfile>,
    /// Raw mania evidence from the aggregator
    pub mania: Option<ManiaBreakdown>,
}

impl TokenCandidate {
    /// Age of the pair in days, floored at 0.1 to avoid division by zero
    pub fn age_days(&self, now: DateTime<Utc>) -> f64 {
        let secs = (now - self.created_at).num_seconds() as f64;
        (secs / 86_400.0).max(0.1)
    }
}

/// Raw social profile fields, fetched per candidate per cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SocialProfile {
    pub followers: u64,
    pub following: u64,
    pub tweets: u64,
    pub likes: u64,
}

// ---------------------------------------------------------------------------
// DexScreener API payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TokenProfile {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "tokenAddress")]
    pub token_address: String,
    pub description: Option<String>,
    #[serde(default)]
    pub links: Vec<ProfileLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProfileLink {
    #[serde(rename = "type")]
    pub link_type: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenPairsResponse {
    pub pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DexPair {
    #[serde(rename = "chainId")]
    pub chain_id: String,
    #[serde(rename = "dexId")]
    pub dex_id: String,
    #[serde(rename = "pairAddress")]
    pub pair_address: String,
    #[serde(rename = "baseToken")]
    pub base_token: BaseToken,
    #[serde(rename = "priceChange")]
    pub price_change: Option<PriceChange>,
    pub txns: Option<Txns>,
    pub volume: Option<Volume>,
    pub liquidity: Option<Liquidity>,
    #[serde(rename = "pairCreatedAt")]
    pub pair_created_at: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BaseToken {
    pub address: String,
    pub name: Option<String>,
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceChange {
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Txns {
    pub h24: Option<TxnCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TxnCount {
    pub buys: u32,
    pub sells: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Volume {
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Liquidity {
    pub usd: Option<f64>,
}

// fxtwitter user payload (social-data collaborator)

#[derive(Debug, Deserialize)]
struct FxUserResponse {
    user: Option<FxUser>,
}

#[derive(Debug, Deserialize)]
struct FxUser {
    #[serde(default)]
    followers: u64,
    #[serde(default)]
    following: u64,
    #[serde(default)]
    tweets: u64,
    #[serde(default)]
    likes: u64,
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// DexScreener scanner client
pub struct Scanner {
    client: reqwest::Client,
    config: ScanConfig,
    blocked: Vec<regex::Regex>,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        // Patterns were validated at config load; skip any that fail here
        let blocked = config
            .blocked_symbol_patterns
            .iter()
            .filter_map(|p| regex::Regex::new(p).ok())
            .collect();

        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            config,
            blocked,
        }
    }

    /// Fetch latest token profiles
    async fn get_latest_profiles(&self) -> Result<Vec<TokenProfile>> {
        let url = format!("{}/token-profiles/latest/v1", DEXSCREENER_BASE);
        let resp = self.client.get(&url).send().await?;
        let profiles: Vec<TokenProfile> = resp.json().await?;
        Ok(profiles)
    }

    /// Fetch the best pair for a token (first pair returned)
    pub async fn get_pair(&self, mint: &str) -> Result<Option<DexPair>> {
        let url = format!("{}/latest/dex/tokens/{}", DEXSCREENER_BASE, mint);
        let resp = self.client.get(&url).send().await?;
        let data: TokenPairsResponse = resp.json().await?;
        Ok(data.pairs.and_then(|pairs| pairs.into_iter().next()))
    }

    /// Discover new candidates from the latest profiles.
    ///
    /// Solana pairs only, younger than the configured window, above the
    /// liquidity floor, deduplicated by mint. All upstream failures
    /// degrade to an empty or shorter list.
    pub async fn fetch_new_pairs(&self) -> Vec<TokenCandidate> {
        let now = Utc::now();
        let mut candidates = Vec::new();
        let mut seen_mints = HashSet::new();

        let profiles = match self.get_latest_profiles().await {
            Ok(profiles) => profiles,
            Err(e) => {
                warn!("Failed to fetch token profiles: {}", e);
                return candidates;
            }
        };

        let solana_profiles: Vec<_> = profiles
            .into_iter()
            .filter(|p| p.chain_id == "solana")
            .take(self.config.profile_limit)
            .collect();

        info!(
            "Checking {} Solana profiles from DexScreener",
            solana_profiles.len()
        );

        for profile in solana_profiles {
            if !seen_mints.insert(profile.token_address.clone()) {
                continue;
            }

            let pair = match self.get_pair(&profile.token_address).await {
                Ok(Some(pair)) => pair,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Pair lookup failed for {}: {}", profile.token_address, e);
                    continue;
                }
            };

            if let Some(candidate) = self.candidate_from_pair(&profile, &pair, now) {
                candidates.push(candidate);
            }

            // Rate limiting
            tokio::time::sleep(std::time::Duration::from_millis(self.config.pair_delay_ms))
                .await;
        }

        info!("Discovered {} new candidates", candidates.len());
        candidates
    }

    /// Build a candidate from a profile + pair, applying discovery filters
    fn candidate_from_pair(
        &self,
        profile: &TokenProfile,
        pair: &DexPair,
        now: DateTime<Utc>,
    ) -> Option<TokenCandidate> {
        let created_at = pair
            .pair_created_at
            .and_then(DateTime::<Utc>::from_timestamp_millis)?;

        if now - created_at > Duration::hours(self.config.hours_back as i64) {
            return None;
        }

        let liquidity_usd = pair.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0);
        if liquidity_usd < self.config.min_liquidity_usd {
            return None;
        }

        let symbol = pair
            .base_token
            .symbol
            .clone()
            .unwrap_or_else(|| "???".to_string());

        if self.blocked.iter().any(|re| re.is_match(&symbol)) {
            debug!("Skipping blocked symbol: {}", symbol);
            return None;
        }

        let (buys_24h, sells_24h) = pair
            .txns
            .as_ref()
            .and_then(|t| t.h24.as_ref())
            .map(|h| (h.buys, h.sells))
            .unwrap_or((0, 0));

        Some(TokenCandidate {
            address: pair.base_token.address.clone(),
            symbol,
            name: pair
                .base_token
                .name
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            created_at,
            liquidity_usd,
            volume_24h_usd: pair.volume.as_ref().and_then(|v| v.h24).unwrap_or(0.0),
            price_change_24h: pair
                .price_change
                .as_ref()
                .and_then(|pc| pc.h24)
                .unwrap_or(0.0),
            buys_24h,
            sells_24h,
            twitter: twitter_handle(profile),
            total_score: 0.0,
            scores: HashMap::new(),
            social: None,
            mania: None,
        })
    }

    /// Fetch the social payload for a candidate, degrading to None
    pub async fn fetch_social(&self, candidate: &TokenCandidate) -> Option<SocialProfile> {
        let handle = candidate.twitter.as_deref()?;
        let url = format!("{}/{}", FXTWITTER_BASE, handle);

        let resp = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!("Social lookup for @{}: status {}", handle, resp.status());
                return None;
            }
            Err(e) => {
                debug!("Social lookup for @{} failed: {}", handle, e);
                return None;
            }
        };

        let body: FxUserResponse = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                debug!("Social payload decode for @{} failed: {}", handle, e);
                return None;
            }
        };

        body.user.map(|u| SocialProfile {
            followers: u.followers,
            following: u.following,
            tweets: u.tweets,
            likes: u.likes,
        })
    }
}

/// Extract a twitter handle from profile links
fn twitter_handle(profile: &TokenProfile) -> Option<String> {
    for link in &profile.links {
        let is_twitter = link
            .link_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("twitter"))
            || link
                .url
                .as_deref()
                .is_some_and(|u| u.contains("twitter.com/") || u.contains("x.com/"));

        if !is_twitter {
            continue;
        }

        if let Some(url) = &link.url {
            let handle = url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .trim_start_matches('@');
            if !handle.is_empty() && !handle.contains('.') {
                return Some(handle.to_string());
            }
        }
    }
    None
}
