//! Primary scoring engine
//!
//! Converts raw market metrics into a 0-100 score per candidate. Weights
//! are tunable policy, not algorithmic necessity.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::scanner::TokenCandidate;

/// Per-category weights, in score points. Components are normalized to
/// [0, 1] before weighting, so the weights sum to the maximum score.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringWeights {
    #[serde(default = "default_liquidity_weight")]
    pub liquidity: f64,
    #[serde(default = "default_volume_weight")]
    pub volume: f64,
    #[serde(default = "default_momentum_weight")]
    pub momentum: f64,
    #[serde(default = "default_buy_pressure_weight")]
    pub buy_pressure: f64,
    #[serde(default = "default_freshness_weight")]
    pub freshness: f64,
    #[serde(default = "default_social_weight")]
    pub social: f64,
}

fn default_liquidity_weight() -> f64 {
    25.0
}
fn default_volume_weight() -> f64 {
    20.0
}
fn default_momentum_weight() -> f64 {
    20.0
}
fn default_buy_pressure_weight() -> f64 {
    15.0
}
fn default_freshness_weight() -> f64 {
    10.0
}
fn default_social_weight() -> f64 {
    10.0
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            liquidity: default_liquidity_weight(),
            volume: default_volume_weight(),
            momentum: default_momentum_weight(),
            buy_pressure: default_buy_pressure_weight(),
            freshness: default_freshness_weight(),
            social: default_social_weight(),
        }
    }
}

/// Buy/sell ratio cap; ratios beyond this are treated as wash trading noise
const MAX_BUY_SELL_RATIO: f64 = 5.0;

/// The primary scoring engine
pub struct ScoringEngine {
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Score candidates in place and sort them best-first.
    ///
    /// Sort is stable: equal scores keep discovery order.
    pub fn score_candidates(&self, candidates: &mut Vec<TokenCandidate>, now: DateTime<Utc>) {
        for candidate in candidates.iter_mut() {
            self.score_one(candidate, now);
        }

        candidates.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Compute the category breakdown and total for one candidate
    fn score_one(&self, candidate: &mut TokenCandidate, now: DateTime<Utc>) {
        let w = &self.weights;

        let liquidity = log_norm(candidate.liquidity_usd, 1_000.0, 3.0);
        let volume = log_norm(candidate.volume_24h_usd, 1_000.0, 3.0);
        let momentum = (candidate.price_change_24h / 100.0).clamp(0.0, 1.0);
        let buy_pressure = buy_pressure_norm(candidate.buys_24h, candidate.sells_24h);
        let freshness = (1.0 - candidate.age_days(now)).clamp(0.0, 1.0);
        let social = if candidate.twitter.is_some() { 1.0 } else { 0.0 };

        let points = [
            ("liquidity", liquidity * w.liquidity),
            ("volume", volume * w.volume),
            ("momentum", momentum * w.momentum),
            ("buy_pressure", buy_pressure * w.buy_pressure),
            ("freshness", freshness * w.freshness),
            ("social", social * w.social),
        ];

        let mut total = 0.0;
        for (category, value) in points {
            candidate.scores.insert(category.to_string(), round1(value));
            total += value;
        }

        candidate.total_score = round1(total.clamp(0.0, 100.0));
        debug!(
            "Scored {}: {:.1} ({:?})",
            candidate.symbol, candidate.total_score, candidate.scores
        );
    }
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(ScoringWeights::default())
    }
}

/// Log-scale normalization: 0 at `floor`, 1 after `decades` orders of
/// magnitude above it
fn log_norm(value: f64, floor: f64, decades: f64) -> f64 {
    if value <= floor {
        return 0.0;
    }
    ((value / floor).log10() / decades).clamp(0.0, 1.0)
}

/// Buy/sell imbalance normalized to [0, 1], ratio capped against wash trading
fn buy_pressure_norm(buys: u32, sells: u32) -> f64 {
    if buys == 0 {
        return 0.0;
    }
    let ratio = if sells > 0 {
        (buys as f64 / sells as f64).min(MAX_BUY_SELL_RATIO)
    } else {
        MAX_BUY_SELL_RATIO
    };
    ((ratio - 1.0) / (MAX_BUY_SELL_RATIO - 1.0)).clamp(0.0, 1.0)
}

/// Round to one decimal place
pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::collections::HashMap;

    fn test_candidate(symbol: &str, liquidity: f64, volume: f64, change: f64) -> TokenCandidate {
        TokenCandidate {
            address: format!("mint-{}", symbol),
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            created_at: Utc::now() - Duration::hours(3),
            liquidity_usd: liquidity,
            volume_24h_usd: volume,
            price_change_24h: change,
            buys_24h: 100,
            sells_24h: 50,
            twitter: Some("handle".to_string()),
            total_score: 0.0,
            scores: HashMap::new(),
            social: None,
            mania: None,
        }
    }

    #[test]
    fn test_score_bounded() {
        let engine = ScoringEngine::default();
        let mut extreme = test_candidate("MAX", 1e12, 1e12, 10_000.0);
        engine.score_one(&mut extreme, Utc::now());
        assert!(extreme.total_score <= 100.0);

        let mut zero = test_candidate("MIN", 0.0, 0.0, -99.0);
        zero.buys_24h = 0;
        zero.twitter = None;
        engine.score_one(&mut zero, Utc::now());
        assert!(zero.total_score >= 0.0);
        // Freshness is the only component left
        assert!(zero.total_score <= 10.0);
    }

    #[test]
    fn test_stronger_candidate_scores_higher() {
        let engine = ScoringEngine::default();
        let mut candidates = vec![
            test_candidate("WEAK", 2_000.0, 2_000.0, 1.0),
            test_candidate("STRONG", 500_000.0, 800_000.0, 60.0),
        ];
        engine.score_candidates(&mut candidates, Utc::now());

        assert_eq!(candidates[0].symbol, "STRONG");
        assert!(candidates[0].total_score > candidates[1].total_score);
    }

    #[test]
    fn test_category_points_recorded() {
        let engine = ScoringEngine::default();
        let mut candidate = test_candidate("CAT", 100_000.0, 50_000.0, 25.0);
        engine.score_one(&mut candidate, Utc::now());

        for key in [
            "liquidity",
            "volume",
            "momentum",
            "buy_pressure",
            "freshness",
            "social",
        ] {
            assert!(candidate.scores.contains_key(key), "missing {}", key);
        }
    }

    #[test]
    fn test_sort_stability_on_ties() {
        let engine = ScoringEngine::default();
        let mut a = test_candidate("A", 10_000.0, 10_000.0, 10.0);
        let mut b = test_candidate("B", 10_000.0, 10_000.0, 10.0);
        a.created_at = b.created_at;
        let mut candidates = vec![a, b];
        engine.score_candidates(&mut candidates, Utc::now());

        assert_eq!(candidates[0].symbol, "A");
        assert_eq!(candidates[1].symbol, "B");
    }

    #[test]
    fn test_buy_pressure_norm() {
        assert_eq!(buy_pressure_norm(0, 10), 0.0);
        assert_eq!(buy_pressure_norm(100, 0), 1.0);
        assert!((buy_pressure_norm(100, 50) - 0.25).abs() < 1e-9);
        // Capped at 5:1
        assert_eq!(buy_pressure_norm(1000, 10), 1.0);
    }

    #[test]
    fn test_log_norm() {
        assert_eq!(log_norm(500.0, 1_000.0, 3.0), 0.0);
        assert!((log_norm(10_000.0, 1_000.0, 3.0) - (1.0 / 3.0)).abs() < 1e-9);
        assert_eq!(log_norm(1e9, 1_000.0, 3.0), 1.0);
    }
}
