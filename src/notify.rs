//! Notification delivery: Discord webhook + Telegram bot
//!
//! Channels implement one trait; the hub formats candidate reports and
//! broadcasts to every enabled channel. Delivery failures are logged and
//! swallowed, never propagated into the cycle.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::error::{Error, Result};
use crate::expectation::ExpectationValue;
use crate::safety::SafetyReport;
use crate::scanner::TokenCandidate;
use crate::state::ScoreChange;

/// Telegram hard-caps message length; stay under it
const TELEGRAM_MAX_CHARS: usize = 4_000;

/// Error alerts carry at most this much detail
const ERROR_DETAIL_MAX_CHARS: usize = 1_500;

/// One outbound alert channel
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;
    fn enabled(&self) -> bool;
    async fn send(&self, text: &str) -> Result<()>;
}

/// Discord webhook channel
pub struct DiscordChannel {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordChannel {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl AlertChannel for DiscordChannel {
    fn name(&self) -> &'static str {
        "discord"
    }

    fn enabled(&self) -> bool {
        !self.webhook_url.is_empty()
    }

    async fn send(&self, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&json!({ "content": text }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Notification(format!(
                "discord returned status {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Telegram bot channel
pub struct TelegramChannel {
    token: String,
    chat_id: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            token,
            chat_id,
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl AlertChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn enabled(&self) -> bool {
        !self.token.is_empty() && !self.chat_id.is_empty()
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": truncate(text, TELEGRAM_MAX_CHARS),
            }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Error::Notification(format!(
                "telegram returned status {}",
                resp.status()
            )));
        }
        Ok(())
    }
}

/// Formats reports and broadcasts to every enabled channel
pub struct NotificationHub {
    channels: Vec<Box<dyn AlertChannel>>,
}

impl NotificationHub {
    pub fn new(config: &NotifyConfig) -> Self {
        let channels: Vec<Box<dyn AlertChannel>> = vec![
            Box::new(DiscordChannel::new(config.discord_webhook_url.clone())),
            Box::new(TelegramChannel::new(
                config.telegram_bot_token.clone(),
                config.telegram_chat_id.clone(),
            )),
        ];
        Self { channels }
    }

    pub fn has_enabled_channel(&self) -> bool {
        self.channels.iter().any(|c| c.enabled())
    }

    /// Send one text to all enabled channels; failures are swallowed
    pub async fn broadcast(&self, text: &str) {
        for channel in &self.channels {
            if !channel.enabled() {
                continue;
            }
            match channel.send(text).await {
                Ok(()) => debug!("Sent alert via {}", channel.name()),
                Err(e) => warn!("Alert via {} failed: {}", channel.name(), e),
            }
        }
    }

    /// Per-candidate report messages plus a combined expectation summary
    pub async fn notify_candidates(
        &self,
        candidates: &[TokenCandidate],
        changes: &HashMap<String, ScoreChange>,
        safety: &HashMap<String, SafetyReport>,
        expectations: &HashMap<String, ExpectationValue>,
    ) {
        if !self.has_enabled_channel() {
            info!("No notification channel configured; skipping delivery");
            return;
        }

        for candidate in candidates {
            let text = format_candidate(
                candidate,
                changes.get(&candidate.address),
                safety.get(&candidate.address),
                expectations.get(&candidate.address),
            );
            self.broadcast(&text).await;
        }

        if let Some(summary) = format_expectation_summary(candidates, expectations) {
            self.broadcast(&summary).await;
        }
    }

    /// Cycle-level failure report to the operator
    pub async fn error_alert(&self, detail: &str) {
        let text = format!(
            "⚠️ **SOL Screener エラー**\n```\n{}\n```",
            truncate(detail, ERROR_DETAIL_MAX_CHARS)
        );
        self.broadcast(&text).await;
    }
}

/// Format one candidate report
fn format_candidate(
    candidate: &TokenCandidate,
    change: Option<&ScoreChange>,
    safety: Option<&SafetyReport>,
    expectation: Option<&ExpectationValue>,
) -> String {
    let mut lines = Vec::new();

    lines.push(format!("🚀 **${}** {}", candidate.symbol, candidate.name));

    let delta_note = change
        .and_then(|c| c.delta)
        .map(|d| format!(" ({:+.1})", d))
        .unwrap_or_default();
    lines.push(format!(
        "スコア: {:.1}/100{}",
        candidate.total_score, delta_note
    ));

    lines.push(format!(
        "LP: ${:.0} | Vol(24h): ${:.0}",
        candidate.liquidity_usd, candidate.volume_24h_usd
    ));
    lines.push(format!("`{}`", candidate.address));

    if let Some(safety) = safety {
        if !safety.warnings.is_empty() {
            lines.push("⚠️ 警告:".to_string());
            for warning in &safety.warnings {
                lines.push(format!("  {}", warning));
            }
        }
    }

    if let Some(ev) = expectation {
        lines.push(format!(
            "期待値: {} | {} | 確信度{:.0}%",
            ev.heat_label, ev.position_label, ev.confidence
        ));
        lines.push("判定理由:".to_string());
        for reason in &ev.reasoning {
            lines.push(format!("  ・{}", reason));
        }
    }

    lines.join("\n")
}

/// Combined expectation report across notified candidates
fn format_expectation_summary(
    candidates: &[TokenCandidate],
    expectations: &HashMap<String, ExpectationValue>,
) -> Option<String> {
    let mut lines = Vec::new();
    for candidate in candidates {
        if let Some(ev) = expectations.get(&candidate.address) {
            lines.push(format!(
                "**${}** → {} | {} | 確信度{:.0}%",
                candidate.symbol, ev.heat_label, ev.position_label, ev.confidence
            ));
        }
    }

    if lines.is_empty() {
        return None;
    }

    Some(format!("📊 **期待値レポート**\n{}", lines.join("\n")))
}

/// Char-boundary-safe truncation
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expectation::ExpectationCalculator;
    use crate::safety::{RawRiskReport, RiskFinding, SafetyClassifier};
    use chrono::Utc;

    fn candidate(score: f64) -> TokenCandidate {
        TokenCandidate {
            address: "MintAddr111".to_string(),
            symbol: "TEST".to_string(),
            name: "Test Token".to_string(),
            created_at: Utc::now(),
            liquidity_usd: 25_000.0,
            volume_24h_usd: 50_000.0,
            price_change_24h: 10.0,
            buys_24h: 100,
            sells_24h: 50,
            twitter: None,
            total_score: score,
            scores: Default::default(),
            social: None,
            mania: None,
        }
    }

    #[test]
    fn test_channel_enablement() {
        assert!(!DiscordChannel::new(String::new()).enabled());
        assert!(DiscordChannel::new("https://discord.com/api/webhooks/x".into()).enabled());

        assert!(!TelegramChannel::new("token".into(), String::new()).enabled());
        assert!(TelegramChannel::new("token".into(), "123".into()).enabled());
    }

    #[test]
    fn test_format_candidate_with_delta_and_warnings() {
        let classifier = SafetyClassifier::new();
        let raw = RawRiskReport {
            risks: vec![RiskFinding {
                name: "LP unlocked".to_string(),
                level: "danger".to_string(),
                description: "LP can be pulled".to_string(),
            }],
            ..Default::default()
        };
        let safety = classifier.classify(Some(&raw));

        let change = ScoreChange {
            previous: Some(40.0),
            delta: Some(15.0),
        };

        let calc = ExpectationCalculator::default();
        let ev = calc.calculate(55.0, &safety, None, None, None);

        let text = format_candidate(&candidate(55.0), Some(&change), Some(&safety), Some(&ev));

        assert!(text.contains("$TEST"));
        assert!(text.contains("(+15.0)"));
        assert!(text.contains("⚠️ 警告:"));
        assert!(text.contains("🔴"));
        assert!(text.contains("判定理由:"));
    }

    #[test]
    fn test_format_candidate_without_extras() {
        let text = format_candidate(&candidate(42.0), None, None, None);

        assert!(text.contains("スコア: 42.0/100"));
        assert!(!text.contains("(+"));
        assert!(!text.contains("警告"));
    }

    #[test]
    fn test_expectation_summary() {
        let calc = ExpectationCalculator::default();
        let c = candidate(80.0);
        let ev = calc.calculate(80.0, &SafetyReport::default(), None, None, None);
        let mut evs = HashMap::new();
        evs.insert(c.address.clone(), ev);

        let summary = format_expectation_summary(&[c], &evs).unwrap();
        assert!(summary.starts_with("📊 **期待値レポート**"));
        assert!(summary.contains("**$TEST**"));
    }

    #[test]
    fn test_empty_summary_is_none() {
        let summary = format_expectation_summary(&[candidate(10.0)], &HashMap::new());
        assert!(summary.is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "あいうえお".repeat(1_000);
        let cut = truncate(&text, TELEGRAM_MAX_CHARS);
        assert_eq!(cut.chars().count(), TELEGRAM_MAX_CHARS);

        assert_eq!(truncate("short", 100), "short");
    }

    #[tokio::test]
    async fn test_hub_without_channels_is_noop() {
        let hub = NotificationHub::new(&NotifyConfig::default());
        assert!(!hub.has_enabled_channel());
        // Must not panic or block
        hub.broadcast("nothing to send").await;
    }
}
