//! Expectation-value fusion
//!
//! Combines the primary score, safety classification, mania composite and
//! optional trust/market-trend inputs into a heat level, confidence and
//! recommended position size. Reference values only; the final call is
//! always human.

use serde::{Deserialize, Serialize};

use crate::mania::{BotRisk, ManiaBreakdown};
use crate::safety::{RiskLevel, SafetyReport};
use crate::scoring::round1;

/// Score bands for the base heat level
const BAND_VERY_HIGH: f64 = 75.0;
const BAND_HIGH: f64 = 60.0;
const BAND_MEDIUM: f64 = 45.0;
const BAND_LOW: f64 = 30.0;

/// Mania modifier thresholds
const MANIA_BONUS_MIN: f64 = 70.0;
const MANIA_PENALTY_MAX: f64 = 20.0;

/// Trust modifier thresholds
const TRUST_BONUS_MIN: f64 = 70.0;
const TRUST_PENALTY_MAX: f64 = 30.0;

/// Confidence: dispersion penalty factor and clamp bounds
const VARIANCE_PENALTY: f64 = 15.0;
const CONFIDENCE_MIN: f64 = 10.0;
const CONFIDENCE_MAX: f64 = 100.0;

/// SOL market trend, when a market-context collaborator provides one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketTrend {
    Bullish,
    Bearish,
}

/// Expectation report for one candidate; immutable once computed
#[derive(Debug, Clone, Serialize)]
pub struct ExpectationValue {
    /// 1-5 (count of 🔥)
    pub heat_level: u8,
    pub heat_label: String,
    /// 0-100, clamped to [10, 100]
    pub confidence: f64,
    /// Recommended position size, percent of bankroll
    pub position_pct: f64,
    pub position_label: String,
    pub risk_reward: String,
    /// One line per decision, in evaluation order
    pub reasoning: Vec<String>,
}

/// One row of the position-size table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionTier {
    pub heat: u8,
    pub pct: f64,
    pub label: String,
}

/// Position-size policy, user-tunable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectationPolicy {
    #[serde(default = "default_tiers")]
    pub tiers: Vec<PositionTier>,
}

fn default_tiers() -> Vec<PositionTier> {
    vec![
        PositionTier {
            heat: 5,
            pct: 10.0,
            label: "強め（10%）".to_string(),
        },
        PositionTier {
            heat: 4,
            pct: 5.0,
            label: "標準（5%）".to_string(),
        },
        PositionTier {
            heat: 3,
            pct: 2.0,
            label: "少額（2%）".to_string(),
        },
        PositionTier {
            heat: 2,
            pct: 0.5,
            label: "最小（0.5%）".to_string(),
        },
        PositionTier {
            heat: 1,
            pct: 0.0,
            label: "見送り".to_string(),
        },
    ]
}

impl Default for ExpectationPolicy {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
        }
    }
}

impl ExpectationPolicy {
    fn position_for(&self, heat: u8) -> PositionTier {
        self.tiers
            .iter()
            .find(|t| t.heat == heat)
            .or_else(|| self.tiers.iter().min_by_key(|t| t.heat))
            .cloned()
            .unwrap_or(PositionTier {
                heat: 1,
                pct: 0.0,
                label: "見送り".to_string(),
            })
    }
}

fn heat_label(heat: u8) -> &'static str {
    match heat {
        5 => "🔥🔥🔥🔥🔥 超高",
        4 => "🔥🔥🔥🔥 高",
        3 => "🔥🔥🔥 中",
        2 => "🔥🔥 低",
        _ => "🔥 様子見",
    }
}

/// Fuses partial scores into one expectation value
pub struct ExpectationCalculator {
    policy: ExpectationPolicy,
}

impl ExpectationCalculator {
    pub fn new(policy: ExpectationPolicy) -> Self {
        Self { policy }
    }

    /// Compute the expectation value.
    ///
    /// Total over its input domain: missing optional inputs contribute a
    /// zero modifier, and the result is always heat 1-5 with confidence
    /// in [10, 100].
    pub fn calculate(
        &self,
        total_score: f64,
        safety: &SafetyReport,
        mania: Option<&ManiaBreakdown>,
        trust_score: Option<f64>,
        market_trend: Option<MarketTrend>,
    ) -> ExpectationValue {
        let mut reasoning = Vec::new();

        // 1. Base heat from the primary score
        let base_heat: i32 = if total_score >= BAND_VERY_HIGH {
            reasoning.push(format!("スコア{:.0}/100（非常に高い）", total_score));
            5
        } else if total_score >= BAND_HIGH {
            reasoning.push(format!("スコア{:.0}/100（高い）", total_score));
            4
        } else if total_score >= BAND_MEDIUM {
            reasoning.push(format!("スコア{:.0}/100（中程度）", total_score));
            3
        } else if total_score >= BAND_LOW {
            reasoning.push(format!("スコア{:.0}/100（低め）", total_score));
            2
        } else {
            reasoning.push(format!("スコア{:.0}/100（低い）", total_score));
            1
        };

        // 2. Safety modifier
        let safety_mod: i32 = match safety.risk_level {
            RiskLevel::Danger => {
                reasoning.push("🔴 安全性DANGER（大幅減点）".to_string());
                -2
            }
            RiskLevel::Warning => {
                reasoning.push("🟡 安全性WARNING（減点）".to_string());
                -1
            }
            RiskLevel::Safe => {
                reasoning.push("🟢 安全性OK".to_string());
                0
            }
            RiskLevel::Unknown => 0,
        };

        // 3. Mania modifier; an absent breakdown behaves as zero and
        // lands in the penalty band, same as the low-evidence case
        let mania_total = mania.map(|m| m.mania_total).unwrap_or(0.0);
        let mut mania_mod: i32 = 0;
        if mania_total >= MANIA_BONUS_MIN {
            mania_mod = 1;
            reasoning.push(format!("マニア基準{:.0}（高評価、ボーナス）", mania_total));
        } else if mania_total <= MANIA_PENALTY_MAX {
            mania_mod = -1;
            reasoning.push(format!("マニア基準{:.0}（低評価、減点）", mania_total));
        }

        if mania.map(|m| m.bot.bot_risk) == Some(BotRisk::High) {
            mania_mod -= 1;
            reasoning.push("🤖 Bot水増し疑い（減点）".to_string());
        }

        // 4. Trust modifier
        let mut trust_mod: i32 = 0;
        if let Some(trust) = trust_score {
            if trust >= TRUST_BONUS_MIN {
                trust_mod = 1;
                reasoning.push(format!("プロジェクト信頼度{:.0}（高い）", trust));
            } else if trust <= TRUST_PENALTY_MAX {
                trust_mod = -1;
                reasoning.push(format!("プロジェクト信頼度{:.0}（低い）", trust));
            }
        }

        // 5. Market context modifier
        let market_mod: i32 = match market_trend {
            Some(MarketTrend::Bullish) => {
                reasoning.push("SOL上昇トレンド（ボーナス）".to_string());
                1
            }
            Some(MarketTrend::Bearish) => {
                reasoning.push("SOL下落トレンド（減点）".to_string());
                -1
            }
            None => 0,
        };

        let final_heat =
            (base_heat + safety_mod + mania_mod + trust_mod + market_mod).clamp(1, 5) as u8;

        // Confidence: agreement between the contributing signals.
        // A dispersion heuristic, not a statistical guarantee; the market
        // trend is context, not a signal, and stays out of the vector.
        let factors = [
            base_heat as f64,
            (3 + safety_mod) as f64,
            (3 + mania_mod) as f64,
            (3 + trust_mod) as f64,
        ];
        let avg = factors.iter().sum::<f64>() / factors.len() as f64;
        let variance =
            factors.iter().map(|f| (f - avg).powi(2)).sum::<f64>() / factors.len() as f64;
        let confidence = round1(
            (CONFIDENCE_MAX - variance * VARIANCE_PENALTY).clamp(CONFIDENCE_MIN, CONFIDENCE_MAX),
        );

        let position = self.policy.position_for(final_heat);

        let risk_reward = if final_heat >= 4
            && matches!(safety.risk_level, RiskLevel::Safe | RiskLevel::Unknown)
        {
            "高リターン期待・リスク管理済み"
        } else if final_heat >= 4 && safety.risk_level == RiskLevel::Warning {
            "ハイリスク・ハイリターン"
        } else if final_heat <= 2 {
            "ローリターン・リスク高め"
        } else {
            "標準的なリスク・リターン"
        };

        ExpectationValue {
            heat_level: final_heat,
            heat_label: heat_label(final_heat).to_string(),
            confidence,
            position_pct: position.pct,
            position_label: position.label,
            risk_reward: risk_reward.to_string(),
            reasoning,
        }
    }

    /// Notification-ready summary text
    pub fn format_for_notification(&self, ev: &ExpectationValue) -> String {
        format!(
            "期待値: {}\n推奨: {}\n確信度: {:.0}%\nR/R: {}",
            ev.heat_label, ev.position_label, ev.confidence, ev.risk_reward
        )
    }
}

impl Default for ExpectationCalculator {
    fn default() -> Self {
        Self::new(ExpectationPolicy::default())
    }
}
