//! Mania scoring: the secondary composite blended into the primary score
//!
//! Runs the holder-quality, social-velocity and bot-likelihood analyzers
//! per candidate and folds them into one composite. Bot suspicion enters
//! as a penalty against a neutral baseline, not a direct subtraction, so
//! a bot-free token with weak other signals is not over-punished.

pub mod bot_likelihood;
pub mod holder_quality;
pub mod social_velocity;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::config::ManiaConfig;
use crate::scanner::TokenCandidate;
use crate::scoring::round1;

pub use bot_likelihood::{BotAnalysis, BotLikelihoodAnalyzer, BotRisk};
pub use holder_quality::{
    DevWalletRisk, HolderAnalysis, HolderBalance, HolderClient, HolderQualityAnalyzer,
    RawHolderSet,
};
pub use social_velocity::{SocialVelocityAnalyzer, VelocityAnalysis};

/// Neutral baseline the bot penalty is applied against
const BOT_NEUTRAL_BASELINE: f64 = 50.0;

/// Fraction of the bot score subtracted from the baseline
const BOT_PENALTY_FACTOR: f64 = 0.3;

/// Composite weights for the mania total
#[derive(Debug, Clone, Deserialize)]
pub struct ManiaWeights {
    #[serde(default = "default_smart_money_weight")]
    pub smart_money: f64,
    #[serde(default = "default_holder_quality_weight")]
    pub holder_quality: f64,
    #[serde(default = "default_social_velocity_weight")]
    pub social_velocity: f64,
    #[serde(default = "default_bot_weight")]
    pub bot: f64,
}

fn default_smart_money_weight() -> f64 {
    0.2
}
fn default_holder_quality_weight() -> f64 {
    0.3
}
fn default_social_velocity_weight() -> f64 {
    0.3
}
fn default_bot_weight() -> f64 {
    0.2
}

impl Default for ManiaWeights {
    fn default() -> Self {
        Self {
            smart_money: default_smart_money_weight(),
            holder_quality: default_holder_quality_weight(),
            social_velocity: default_social_velocity_weight(),
            bot: default_bot_weight(),
        }
    }
}

impl ManiaWeights {
    pub fn validate(&self) -> anyhow::Result<()> {
        let sum = self.smart_money + self.holder_quality + self.social_velocity + self.bot;
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("mania weights must sum to 1.0, got {}", sum);
        }
        Ok(())
    }
}

/// Primary/mania blend weights
#[derive(Debug, Clone, Deserialize)]
pub struct BlendWeights {
    #[serde(default = "default_primary_weight")]
    pub primary: f64,
    #[serde(default = "default_mania_weight")]
    pub mania: f64,
}

fn default_primary_weight() -> f64 {
    0.8
}
fn default_mania_weight() -> f64 {
    0.2
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            primary: default_primary_weight(),
            mania: default_mania_weight(),
        }
    }
}

impl BlendWeights {
    pub fn validate(&self) -> anyhow::Result<()> {
        let sum = self.primary + self.mania;
        if (sum - 1.0).abs() > 1e-6 {
            anyhow::bail!("blend weights must sum to 1.0, got {}", sum);
        }
        Ok(())
    }
}

/// Raw evidence from one mania evaluation, kept on the candidate
#[derive(Debug, Clone, Serialize)]
pub struct ManiaBreakdown {
    pub holder: HolderAnalysis,
    pub velocity: VelocityAnalysis,
    pub bot: BotAnalysis,
    pub mania_total: f64,
}

/// Runs the sub-analyzers for one candidate set and blends the composite
/// into each candidate's primary score
pub struct ManiaAggregator {
    holder_client: HolderClient,
    holder_analyzer: HolderQualityAnalyzer,
    velocity_analyzer: SocialVelocityAnalyzer,
    bot_analyzer: BotLikelihoodAnalyzer,
    weights: ManiaWeights,
    blend: BlendWeights,
    holder_delay_ms: u64,
}

impl ManiaAggregator {
    pub fn new(config: &ManiaConfig, blend: BlendWeights) -> Self {
        Self {
            holder_client: HolderClient::new(),
            holder_analyzer: HolderQualityAnalyzer::new(config.smart_wallets.iter().cloned()),
            velocity_analyzer: SocialVelocityAnalyzer::new(),
            bot_analyzer: BotLikelihoodAnalyzer::new(),
            weights: config.weights.clone(),
            blend,
            holder_delay_ms: config.holder_delay_ms,
        }
    }

    /// Enhance every candidate, then re-sort by blended score descending.
    ///
    /// The sort is stable, so equal scores keep their prior order. The
    /// holder upstream imposes a fixed inter-call delay.
    pub async fn enhance_all(&self, candidates: &mut Vec<TokenCandidate>, now: DateTime<Utc>) {
        for candidate in candidates.iter_mut() {
            self.enhance(candidate, now).await;
            tokio::time::sleep(std::time::Duration::from_millis(self.holder_delay_ms)).await;
        }

        candidates.sort_by(|a, b| {
            b.total_score
                .partial_cmp(&a.total_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    /// Enhance one candidate: run the analyzers, attach the breakdown,
    /// blend the composite into the primary score
    pub async fn enhance(&self, candidate: &mut TokenCandidate, now: DateTime<Utc>) {
        let holders = self.holder_client.top_holders(&candidate.address).await;
        let social = candidate.social.clone().unwrap_or_default();

        // The analyzers are independent: holder data came from its own
        // fetch, the other two are pure functions of the social payload.
        let holder = self.holder_analyzer.analyze(&holders);
        let velocity = self
            .velocity_analyzer
            .analyze(candidate.created_at, social.followers, now);
        let bot = self.bot_analyzer.analyze(&social);

        let mania_total = self.compose_total(&holder, &velocity, &bot);
        let blended = round1(
            candidate.total_score * self.blend.primary + mania_total * self.blend.mania,
        );

        debug!(
            "Mania {}: total={:.1} (holder={:.0} velocity={:.0} bot={:.0}) blended={:.1}",
            candidate.symbol,
            mania_total,
            holder.holder_quality,
            velocity.velocity_score,
            bot.bot_score,
            blended
        );

        candidate.mania = Some(ManiaBreakdown {
            holder,
            velocity,
            bot,
            mania_total,
        });
        candidate.total_score = blended;
    }

    /// Weighted composite; bot suspicion is a penalty on a neutral
    /// baseline, floored at zero
    fn compose_total(
        &self,
        holder: &HolderAnalysis,
        velocity: &VelocityAnalysis,
        bot: &BotAnalysis,
    ) -> f64 {
        let bot_component =
            (BOT_NEUTRAL_BASELINE - bot.bot_score * BOT_PENALTY_FACTOR).max(0.0);

        round1(
            holder.smart_money_score * self.weights.smart_money
                + holder.holder_quality * self.weights.holder_quality
                + velocity.velocity_score * self.weights.social_velocity
                + bot_component * self.weights.bot,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManiaConfig;

    fn aggregator() -> ManiaAggregator {
        ManiaAggregator::new(&ManiaConfig::default(), BlendWeights::default())
    }

    fn holder(smart: f64, quality: f64) -> HolderAnalysis {
        HolderAnalysis {
            smart_money_score: smart,
            smart_money_count: (smart / 25.0) as u32,
            holder_quality: quality,
            dev_wallet_risk: DevWalletRisk::Unknown,
        }
    }

    fn velocity(score: f64) -> VelocityAnalysis {
        VelocityAnalysis {
            velocity_score: score,
            followers_per_day: 0.0,
            age_days: 1.0,
        }
    }

    fn bot(score: f64) -> BotAnalysis {
        BotAnalysis {
            bot_risk: BotRisk::Low,
            bot_score: score,
            indicators: vec![],
        }
    }

    #[test]
    fn test_compose_neutral_bot_baseline() {
        let agg = aggregator();
        // No signals at all: the bot-free baseline still contributes
        // 50 * 0.2 = 10
        let total = agg.compose_total(&holder(0.0, 0.0), &velocity(0.0), &bot(0.0));
        assert!((total - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_compose_strong_signals() {
        let agg = aggregator();
        // 100*0.2 + 90*0.3 + 80*0.3 + 50*0.2 = 20+27+24+10 = 81
        let total = agg.compose_total(&holder(100.0, 90.0), &velocity(80.0), &bot(0.0));
        assert!((total - 81.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_bot_penalty_floors_at_zero() {
        let agg = aggregator();
        // bot 100: 50 - 30 = 20, component 20*0.2 = 4
        let with_max_bot = agg.compose_total(&holder(0.0, 0.0), &velocity(0.0), &bot(100.0));
        assert!((with_max_bot - 4.0).abs() < f64::EPSILON);

        // The component never goes negative even if the penalty exceeds
        // the baseline (not reachable with current constants, but the
        // floor is part of the contract)
        let clamped = (BOT_NEUTRAL_BASELINE - 200.0 * BOT_PENALTY_FACTOR).max(0.0);
        assert_eq!(clamped, 0.0);
    }

    #[test]
    fn test_bot_penalty_reduces_total() {
        let agg = aggregator();
        let clean = agg.compose_total(&holder(50.0, 70.0), &velocity(60.0), &bot(0.0));
        let botty = agg.compose_total(&holder(50.0, 70.0), &velocity(60.0), &bot(80.0));
        assert!(botty < clean);
    }

    #[test]
    fn test_weights_validate() {
        assert!(ManiaWeights::default().validate().is_ok());
        let bad = ManiaWeights {
            smart_money: 0.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        assert!(BlendWeights::default().validate().is_ok());
        let bad = BlendWeights {
            primary: 0.9,
            mania: 0.2,
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_blend_applied_to_candidate() {
        // enhance() hits the holder upstream; the fetch degrades to an
        // empty set without a network, so the math is deterministic
        let agg = aggregator();
        let now = Utc::now();
        let mut candidate = crate::scanner::TokenCandidate {
            address: "1111111111111111111111111111111111111111111".to_string(),
            symbol: "BLND".to_string(),
            name: "Blend".to_string(),
            created_at: now - chrono::Duration::days(1),
            liquidity_usd: 0.0,
            volume_24h_usd: 0.0,
            price_change_24h: 0.0,
            buys_24h: 0,
            sells_24h: 0,
            twitter: None,
            total_score: 60.0,
            scores: Default::default(),
            social: None,
            mania: None,
        };

        agg.enhance(&mut candidate, now).await;

        let breakdown = candidate.mania.as_ref().expect("breakdown attached");
        // No holders, no social: mania_total = bot baseline only = 10
        assert!((breakdown.mania_total - 10.0).abs() < 0.2);
        // 60*0.8 + 10*0.2 = 50
        assert!((candidate.total_score - 50.0).abs() < 0.2);
    }
}
