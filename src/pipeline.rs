//! Cycle orchestration
//!
//! Wires scanner → scoring → mania → dedup → safety → expectation →
//! notification → state checkpoint. State writes happen only at the end
//! of a cycle, so an abandoned cycle persists nothing partial.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::expectation::{ExpectationCalculator, ExpectationValue};
use crate::mania::ManiaAggregator;
use crate::monitors::{LiquidityMonitor, RangeMonitor, WalletTracker};
use crate::notify::NotificationHub;
use crate::safety::{SafetyClient, SafetyReport};
use crate::scanner::{Scanner, TokenCandidate};
use crate::scoring::ScoringEngine;
use crate::state::StateStore;

/// Outcome of one screening cycle
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleSummary {
    pub discovered: usize,
    pub evaluated: usize,
    pub notified: usize,
}

/// The screening pipeline and its collaborators
pub struct ScreeningPipeline {
    config: Config,
    scanner: Scanner,
    scoring: ScoringEngine,
    mania: ManiaAggregator,
    safety: SafetyClient,
    expectation: ExpectationCalculator,
    state: StateStore,
    hub: NotificationHub,
    wallet_tracker: WalletTracker,
    liquidity_monitor: LiquidityMonitor,
    range_monitor: RangeMonitor,
}

impl ScreeningPipeline {
    pub fn new(config: Config) -> Self {
        let scanner = Scanner::new(config.scan.clone());
        let scoring = ScoringEngine::new(config.scoring.clone());
        let mania = ManiaAggregator::new(&config.mania, config.blend.clone());
        let safety = SafetyClient::new(&config.safety);
        let expectation = ExpectationCalculator::new(config.expectation.clone());
        let state = StateStore::new(&config.state.data_dir);
        let hub = NotificationHub::new(&config.notify);
        let wallet_tracker = WalletTracker::new(&config.watch, &config.rpc);
        let liquidity_monitor = LiquidityMonitor::new(&config.watch);
        let range_monitor = RangeMonitor::new(&config.watch);

        Self {
            config,
            scanner,
            scoring,
            mania,
            safety,
            expectation,
            state,
            hub,
            wallet_tracker,
            liquidity_monitor,
            range_monitor,
        }
    }

    /// Load persisted state; never fails (corrupt files become defaults)
    pub async fn init(&self) {
        self.state.load().await;
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.hub
    }

    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// One full screening cycle: discover, score, dedup, classify,
    /// fuse, notify, checkpoint.
    pub async fn run_screening_cycle(&self) -> Result<CycleSummary> {
        let now = Utc::now();
        info!("🚀 Screening cycle started");

        // Step 1: discovery
        let mut candidates = self.scanner.fetch_new_pairs().await;
        let discovered = candidates.len();
        if candidates.is_empty() {
            info!("No new candidates this cycle");
            return Ok(CycleSummary::default());
        }

        // Step 2: primary scoring, keep the top N
        self.scoring.score_candidates(&mut candidates, now);
        candidates.truncate(self.config.scan.top_n);

        // Step 3: social payloads + mania enhancement
        if self.config.mania.enabled {
            for candidate in candidates.iter_mut() {
                let social = self.scanner.fetch_social(candidate).await;
                candidate.social = social;
            }
            self.mania.enhance_all(&mut candidates, now).await;
        }

        // Step 4: score-change pre-pass, then dedup
        let score_changes = self.state.get_score_changes(&candidates).await;
        let new_candidates = self.state.filter_new(candidates.clone()).await;
        if new_candidates.is_empty() {
            info!("✅ Nothing new to notify");
            self.state.save_scan(&candidates).await;
            return Ok(CycleSummary {
                discovered,
                evaluated: candidates.len(),
                notified: 0,
            });
        }

        // Step 5: safety classification
        let safety_results = if self.config.safety.enabled {
            self.safety.check_multiple(&new_candidates).await
        } else {
            HashMap::new()
        };

        // Step 6: expectation values
        let expectations =
            compute_expectations(&self.expectation, &new_candidates, &safety_results);
        for candidate in &new_candidates {
            if let Some(ev) = expectations.get(&candidate.address) {
                info!(
                    "  {}: {} | {} | 確信度{:.0}%",
                    candidate.symbol, ev.heat_label, ev.position_label, ev.confidence
                );
            }
        }

        // Step 7: notification
        self.hub
            .notify_candidates(
                &new_candidates,
                &score_changes,
                &safety_results,
                &expectations,
            )
            .await;

        // Step 8: end-of-cycle checkpoint
        self.state.mark_notified(&new_candidates).await;
        self.state.save_scan(&candidates).await;

        info!("🏁 Cycle complete: {} notified", new_candidates.len());
        Ok(CycleSummary {
            discovered,
            evaluated: candidates.len(),
            notified: new_candidates.len(),
        })
    }

    /// One realtime monitoring cycle: wallets, liquidity, ranges
    pub async fn run_realtime_cycle(&self) {
        let (wallet_activities, liquidity_alerts, range_alerts) = tokio::join!(
            self.wallet_tracker.check_all(),
            self.liquidity_monitor.check_all(),
            self.range_monitor.check_all(),
        );

        let mut lines: Vec<String> = Vec::new();
        lines.extend(wallet_activities.iter().map(|a| a.to_string()));
        lines.extend(liquidity_alerts.iter().map(|a| a.to_string()));
        lines.extend(range_alerts.iter().map(|a| a.to_string()));

        if lines.is_empty() {
            info!("Realtime: no alerts");
            return;
        }

        let text = format!("🔔 **リアルタイムアラート**\n\n{}", lines.join("\n"));
        self.hub.broadcast(&text).await;
        info!("Realtime: {} alerts sent", lines.len());
    }

    /// Daily 24h statistics summary
    pub async fn run_daily_report(&self) {
        let now = Utc::now();
        let (scan_count, candidate_count) =
            self.state.scan_stats_since(now - Duration::days(1)).await;
        let notified = self.state.notified_count().await;

        let report = format!(
            "📋 **デイリーレポート** {}\n\n**📊 24h統計**\n  スキャン回数: {}回\n  検出プロジェクト: {}件\n  通知済み: {}件",
            now.format("%Y/%m/%d"),
            scan_count,
            candidate_count,
            notified
        );

        self.hub.broadcast(&report).await;
        info!("Daily report sent");
    }

    /// Route a cycle-level failure to the operator channel
    pub async fn report_cycle_error(&self, err: &crate::error::Error) {
        warn!("Cycle failed: {}", err);
        self.hub.error_alert(&err.to_string()).await;
    }
}

/// Expectation values per candidate; a missing safety report contributes
/// the Unknown default
fn compute_expectations(
    calculator: &ExpectationCalculator,
    candidates: &[TokenCandidate],
    safety: &HashMap<String, SafetyReport>,
) -> HashMap<String, ExpectationValue> {
    let unknown = SafetyReport::default();

    candidates
        .iter()
        .map(|c| {
            let report = safety.get(&c.address).unwrap_or(&unknown);
            let ev = calculator.calculate(
                c.total_score,
                report,
                c.mania.as_ref(),
                None,
                None,
            );
            (c.address.clone(), ev)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safety::RiskLevel;

    fn candidate(address: &str, score: f64) -> TokenCandidate {
        TokenCandidate {
            address: address.to_string(),
            symbol: "TEST".to_string(),
            name: "Test".to_string(),
            created_at: Utc::now(),
            liquidity_usd: 0.0,
            volume_24h_usd: 0.0,
            price_change_24h: 0.0,
            buys_24h: 0,
            sells_24h: 0,
            twitter: None,
            total_score: score,
            scores: Default::default(),
            social: None,
            mania: None,
        }
    }

    #[test]
    fn test_expectations_cover_all_candidates() {
        let calc = ExpectationCalculator::default();
        let candidates = vec![candidate("a", 80.0), candidate("b", 20.0)];
        let evs = compute_expectations(&calc, &candidates, &HashMap::new());

        assert_eq!(evs.len(), 2);
        assert!(evs.get("a").unwrap().heat_level >= evs.get("b").unwrap().heat_level);
    }

    #[test]
    fn test_missing_safety_report_is_unknown() {
        let calc = ExpectationCalculator::default();
        let candidates = vec![candidate("a", 50.0)];
        let evs = compute_expectations(&calc, &candidates, &HashMap::new());

        // Unknown safety adds no reasoning line and no modifier:
        // band 3 minus the missing-mania penalty
        let ev = evs.get("a").unwrap();
        assert_eq!(ev.heat_level, 2);
        assert!(!ev.reasoning.iter().any(|r| r.contains("安全性")));
    }

    #[test]
    fn test_danger_report_lowers_heat() {
        let calc = ExpectationCalculator::default();
        let candidates = vec![candidate("a", 50.0)];

        let mut safety = HashMap::new();
        safety.insert(
            "a".to_string(),
            SafetyReport {
                risk_level: RiskLevel::Danger,
                is_safe: false,
                ..Default::default()
            },
        );
        let evs = compute_expectations(&calc, &candidates, &safety);

        // band 3, danger -2, missing mania -1 -> clamped to 1
        assert_eq!(evs.get("a").unwrap().heat_level, 1);
    }
}
