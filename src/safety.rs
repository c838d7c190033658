//! Safety classification: rug-pull / honeypot / LP-lock findings
//!
//! A pure classifier maps raw risk-report findings to a three-level risk
//! classification; the report fetch is a degradable collaborator.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::config::SafetyConfig;
use crate::scanner::TokenCandidate;
use crate::scoring::round1;

const RUGCHECK_BASE: &str = "https://api.rugcheck.xyz/v1";

/// Top-10 holder concentration thresholds (percent of supply)
const CONCENTRATION_DANGER_PCT: f64 = 50.0;
const CONCENTRATION_WARN_PCT: f64 = 30.0;

/// Discrete risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Warning,
    Danger,
    /// Upstream absent: neither safe nor unsafe asserted
    Unknown,
}

/// Warning severity bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnSeverity {
    Danger,
    Caution,
}

/// One structured warning
#[derive(Debug, Clone, Serialize)]
pub struct SafetyWarning {
    pub severity: WarnSeverity,
    pub message: String,
}

impl SafetyWarning {
    fn danger(message: impl Into<String>) -> Self {
        Self {
            severity: WarnSeverity::Danger,
            message: message.into(),
        }
    }

    fn caution(message: impl Into<String>) -> Self {
        Self {
            severity: WarnSeverity::Caution,
            message: message.into(),
        }
    }
}

impl fmt::Display for SafetyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let emoji = match self.severity {
            WarnSeverity::Danger => "🔴",
            WarnSeverity::Caution => "🟡",
        };
        write!(f, "{} {}", emoji, self.message)
    }
}

/// Classification result for one token; immutable once produced
#[derive(Debug, Clone, Serialize)]
pub struct SafetyReport {
    pub risk_level: RiskLevel,
    pub is_safe: bool,
    pub warnings: Vec<SafetyWarning>,
    pub rugcheck_score: Option<f64>,
    pub mint_authority_active: Option<bool>,
    pub lp_locked: Option<bool>,
    pub top_holders_pct: Option<f64>,
}

impl Default for SafetyReport {
    fn default() -> Self {
        Self {
            risk_level: RiskLevel::Unknown,
            is_safe: true,
            warnings: Vec::new(),
            rugcheck_score: None,
            mint_authority_active: None,
            lp_locked: None,
            top_holders_pct: None,
        }
    }
}

impl SafetyReport {
    fn danger_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.severity == WarnSeverity::Danger)
            .count()
    }

    fn caution_count(&self) -> usize {
        self.warnings
            .iter()
            .filter(|w| w.severity == WarnSeverity::Caution)
            .count()
    }
}

// ---------------------------------------------------------------------------
// Raw report payloads
// ---------------------------------------------------------------------------

/// Raw risk report as returned by the safety collaborator
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawRiskReport {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub risks: Vec<RiskFinding>,
    #[serde(rename = "topHolders", default)]
    pub top_holders: Vec<TopHolder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskFinding {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub level: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TopHolder {
    #[serde(default)]
    pub pct: f64,
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Pure classification of a raw risk report
pub struct SafetyClassifier;

impl SafetyClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Map raw findings into the discrete risk level plus warning list.
    ///
    /// `None` means the upstream was absent: the result stays Unknown.
    /// Total over its input domain; never fails.
    pub fn classify(&self, report: Option<&RawRiskReport>) -> SafetyReport {
        let mut safety = SafetyReport::default();

        let Some(report) = report else {
            return safety;
        };

        safety.rugcheck_score = report.score;

        // Generic findings by severity bucket
        for risk in &report.risks {
            match risk.level.as_str() {
                "danger" | "critical" => safety
                    .warnings
                    .push(SafetyWarning::danger(format!(
                        "{}: {}",
                        risk.name, risk.description
                    ))),
                "warn" => safety.warnings.push(SafetyWarning::caution(format!(
                    "{}: {}",
                    risk.name, risk.description
                ))),
                _ => {}
            }
        }

        // Mint authority
        if report
            .risks
            .iter()
            .any(|r| r.name.to_lowercase().contains("mint"))
        {
            safety.mint_authority_active = Some(true);
            safety
                .warnings
                .push(SafetyWarning::danger("ミント権限が放棄されていない"));
        }

        // LP lock
        let lp_locked = !report.risks.iter().any(|r| {
            r.name.to_lowercase().contains("lp")
                && matches!(r.level.as_str(), "danger" | "critical")
        });
        safety.lp_locked = Some(lp_locked);
        if !lp_locked {
            safety
                .warnings
                .push(SafetyWarning::danger("LP未ロック（ラグプルリスク）"));
        }

        // Top-holder concentration
        if !report.top_holders.is_empty() {
            let total_pct: f64 = report.top_holders.iter().take(10).map(|h| h.pct).sum();
            safety.top_holders_pct = Some(round1(total_pct));
            if total_pct > CONCENTRATION_DANGER_PCT {
                safety.warnings.push(SafetyWarning::danger(format!(
                    "上位10ホルダーが{:.0}%保有（集中リスク）",
                    total_pct
                )));
            } else if total_pct > CONCENTRATION_WARN_PCT {
                safety.warnings.push(SafetyWarning::caution(format!(
                    "上位10ホルダーが{:.0}%保有",
                    total_pct
                )));
            }
        }

        // Final level from warning counts
        let danger_count = safety.danger_count();
        let caution_count = safety.caution_count();

        if danger_count >= 2 {
            safety.risk_level = RiskLevel::Danger;
            safety.is_safe = false;
        } else if danger_count == 1 {
            safety.risk_level = RiskLevel::Warning;
        } else if caution_count >= 2 {
            safety.risk_level = RiskLevel::Warning;
        } else {
            safety.risk_level = RiskLevel::Safe;
        }

        safety
    }
}

impl Default for SafetyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Report collaborator
// ---------------------------------------------------------------------------

/// Fetches raw risk reports and runs the classifier over candidate sets
pub struct SafetyClient {
    client: reqwest::Client,
    classifier: SafetyClassifier,
}

impl SafetyClient {
    pub fn new(config: &SafetyConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .build()
                .unwrap_or_default(),
            classifier: SafetyClassifier::new(),
        }
    }

    /// Fetch and classify one token. Upstream failure yields the Unknown
    /// default, never an error.
    pub async fn check(&self, token_address: &str) -> SafetyReport {
        let raw = self.fetch_report(token_address).await;
        self.classifier.classify(raw.as_ref())
    }

    /// Check a batch concurrently; per-token failures degrade individually
    pub async fn check_multiple(
        &self,
        candidates: &[TokenCandidate],
    ) -> HashMap<String, SafetyReport> {
        let checks = candidates
            .iter()
            .map(|c| async { (c.address.clone(), self.check(&c.address).await) });

        join_all(checks).await.into_iter().collect()
    }

    async fn fetch_report(&self, token_address: &str) -> Option<RawRiskReport> {
        let url = format!("{}/tokens/{}/report/summary", RUGCHECK_BASE, token_address);

        let resp = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                debug!("RugCheck {}: status {}", token_address, resp.status());
                return None;
            }
            Err(e) => {
                debug!("RugCheck {} failed: {}", token_address, e);
                return None;
            }
        };

        match resp.json::<RawRiskReport>().await {
            Ok(report) => Some(report),
            Err(e) => {
                debug!("RugCheck {} decode failed: {}", token_address, e);
                None
            }
        }
    }
}
