//! Holder quality analysis
//!
//! Inspects top-holder concentration: smart-money matches, dev-wallet
//! concentration risk, and a distribution-quality score.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::error::Result;

const RUGCHECK_BASE: &str = "https://api.rugcheck.xyz/v1";

/// Top holders sampled per token
const TOP_HOLDER_SAMPLE: usize = 20;

/// Points per known smart-money holder
const SMART_MONEY_POINTS: f64 = 25.0;

/// A single holder exceeding this share of the sampled total flags dev risk
const DEV_CONCENTRATION_PCT: f64 = 30.0;

/// One (owner, amount) entry, ordered by balance descending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderBalance {
    pub owner: String,
    pub amount: f64,
}

/// Top holders of one token, fetched per evaluation
#[derive(Debug, Clone, Default)]
pub struct RawHolderSet {
    pub holders: Vec<HolderBalance>,
}

impl RawHolderSet {
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }
}

/// Dev-wallet concentration flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevWalletRisk {
    /// No holder data, or no holder above the concentration threshold
    Unknown,
    /// A single holder exceeds the concentration threshold
    High,
}

/// Holder analysis output
#[derive(Debug, Clone, Serialize)]
pub struct HolderAnalysis {
    pub smart_money_score: f64,
    pub smart_money_count: u32,
    pub holder_quality: f64,
    pub dev_wallet_risk: DevWalletRisk,
}

impl Default for HolderAnalysis {
    fn default() -> Self {
        Self {
            smart_money_score: 0.0,
            smart_money_count: 0,
            holder_quality: 0.0,
            dev_wallet_risk: DevWalletRisk::Unknown,
        }
    }
}

/// Pure holder-quality analyzer
pub struct HolderQualityAnalyzer {
    smart_wallets: HashSet<String>,
}

impl HolderQualityAnalyzer {
    pub fn new(smart_wallets: impl IntoIterator<Item = String>) -> Self {
        Self {
            smart_wallets: smart_wallets.into_iter().collect(),
        }
    }

    /// Analyze the top holders of one token.
    ///
    /// Empty input yields the all-zero default rather than an error.
    pub fn analyze(&self, holders: &RawHolderSet) -> HolderAnalysis {
        let mut result = HolderAnalysis::default();

        if holders.is_empty() {
            return result;
        }

        let top: Vec<&HolderBalance> = holders.holders.iter().take(TOP_HOLDER_SAMPLE).collect();
        let total_balance: f64 = top.iter().map(|h| h.amount).sum();

        let mut smart_count = 0u32;
        for holder in &top {
            if self.smart_wallets.contains(&holder.owner) {
                smart_count += 1;
            }

            if total_balance > 0.0 {
                let pct = holder.amount / total_balance * 100.0;
                if pct > DEV_CONCENTRATION_PCT {
                    result.dev_wallet_risk = DevWalletRisk::High;
                }
            }
        }

        result.smart_money_count = smart_count;
        result.smart_money_score = (smart_count as f64 * SMART_MONEY_POINTS).min(100.0);

        // Distribution quality from the top-1 share; needs at least two
        // sampled holders to say anything about spread
        if total_balance > 0.0 && top.len() > 1 {
            let mut balances: Vec<f64> = top.iter().map(|h| h.amount).collect();
            balances.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
            let top1_share = balances[0] / total_balance;

            result.holder_quality = if top1_share < 0.1 {
                90.0
            } else if top1_share < 0.2 {
                70.0
            } else if top1_share < 0.3 {
                50.0
            } else if top1_share < 0.5 {
                30.0
            } else {
                10.0
            };
        }

        result
    }
}

// ---------------------------------------------------------------------------
// Holder report collaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct HolderReport {
    #[serde(rename = "topHolders", default)]
    top_holders: Vec<ReportHolder>,
}

#[derive(Debug, Deserialize)]
struct ReportHolder {
    #[serde(default)]
    owner: String,
    #[serde(default)]
    amount: f64,
}

/// Fetches top-holder data from the RugCheck report endpoint
pub struct HolderClient {
    client: reqwest::Client,
}

impl HolderClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Fetch the top holders for a token, degrading to an empty set on
    /// any upstream failure
    pub async fn top_holders(&self, token_address: &str) -> RawHolderSet {
        match self.try_top_holders(token_address).await {
            Ok(set) => set,
            Err(e) => {
                debug!("Holder fetch for {} failed: {}", token_address, e);
                RawHolderSet::default()
            }
        }
    }

    async fn try_top_holders(&self, token_address: &str) -> Result<RawHolderSet> {
        let url = format!("{}/tokens/{}/report/summary", RUGCHECK_BASE, token_address);
        let resp = self.client.get(&url).send().await?;

        if !resp.status().is_success() {
            return Err(crate::error::Error::UpstreamStatus {
                endpoint: "rugcheck".to_string(),
                status: resp.status().as_u16(),
            });
        }

        let report: HolderReport = resp.json().await?;
        Ok(RawHolderSet {
            holders: report
                .top_holders
                .into_iter()
                .map(|h| HolderBalance {
                    owner: h.owner,
                    amount: h.amount,
                })
                .collect(),
        })
    }
}

impl Default for HolderClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holders(amounts: &[f64]) -> RawHolderSet {
        RawHolderSet {
            holders: amounts
                .iter()
                .enumerate()
                .map(|(i, &amount)| HolderBalance {
                    owner: format!("wallet{}", i),
                    amount,
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_set_yields_defaults() {
        let analyzer = HolderQualityAnalyzer::new(vec![]);
        let result = analyzer.analyze(&RawHolderSet::default());

        assert_eq!(result.smart_money_score, 0.0);
        assert_eq!(result.smart_money_count, 0);
        assert_eq!(result.holder_quality, 0.0);
        assert_eq!(result.dev_wallet_risk, DevWalletRisk::Unknown);
    }

    #[test]
    fn test_well_distributed_holders() {
        let analyzer = HolderQualityAnalyzer::new(vec![]);
        // 20 equal holders: top-1 share = 5%
        let result = analyzer.analyze(&holders(&[100.0; 20]));

        assert_eq!(result.holder_quality, 90.0);
        assert_eq!(result.dev_wallet_risk, DevWalletRisk::Unknown);
    }

    #[test]
    fn test_concentrated_holder_flags_dev_risk() {
        let analyzer = HolderQualityAnalyzer::new(vec![]);
        // Top holder owns 60% of the sampled total
        let result = analyzer.analyze(&holders(&[600.0, 100.0, 100.0, 100.0, 100.0]));

        assert_eq!(result.dev_wallet_risk, DevWalletRisk::High);
        assert_eq!(result.holder_quality, 10.0);
    }

    #[test]
    fn test_quality_buckets() {
        let analyzer = HolderQualityAnalyzer::new(vec![]);

        // top-1 = 15% -> 70
        let result = analyzer.analyze(&holders(&[15.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 5.0]));
        assert_eq!(result.holder_quality, 70.0);

        // top-1 = 25% -> 50
        let result = analyzer.analyze(&holders(&[25.0, 25.0, 25.0, 25.0]));
        assert_eq!(result.holder_quality, 50.0);

        // top-1 = 40% -> 30
        let result = analyzer.analyze(&holders(&[40.0, 30.0, 30.0]));
        assert_eq!(result.holder_quality, 30.0);
    }

    #[test]
    fn test_single_holder_keeps_zero_quality() {
        let analyzer = HolderQualityAnalyzer::new(vec![]);
        let result = analyzer.analyze(&holders(&[1_000.0]));

        assert_eq!(result.holder_quality, 0.0);
        // Owns 100% of the sample
        assert_eq!(result.dev_wallet_risk, DevWalletRisk::High);
    }

    #[test]
    fn test_smart_money_scoring() {
        let analyzer = HolderQualityAnalyzer::new(vec![
            "wallet0".to_string(),
            "wallet1".to_string(),
            "wallet2".to_string(),
            "wallet3".to_string(),
            "wallet4".to_string(),
        ]);
        let result = analyzer.analyze(&holders(&[10.0; 10]));

        assert_eq!(result.smart_money_count, 5);
        // 5 x 25 capped at 100
        assert_eq!(result.smart_money_score, 100.0);
    }

    #[test]
    fn test_sample_limited_to_top_twenty() {
        let analyzer = HolderQualityAnalyzer::new(vec!["wallet25".to_string()]);
        let result = analyzer.analyze(&holders(&[10.0; 30]));

        // wallet25 is outside the sampled top 20
        assert_eq!(result.smart_money_count, 0);
    }
}
