//! Bot-likelihood analysis
//!
//! Detects inflated social accounts from follower/following ratios,
//! tweet cadence, engagement, and round-number artifacts. Each signal is
//! independent and additive, so the score never decreases as a signal
//! worsens.

use serde::Serialize;

use crate::scanner::SocialProfile;

/// Follow-back farming: following outnumbers followers on a sizable account
const FOLLOWBACK_PENALTY: f64 = 25.0;
const FOLLOWBACK_MAX_RATIO: f64 = 0.5;
const FOLLOWBACK_MIN_FOLLOWERS: u64 = 1_000;

/// Large audience with almost no tweets
const SILENT_PENALTY: f64 = 30.0;
const SILENT_MIN_FOLLOWERS: u64 = 5_000;
const SILENT_MAX_TWEETS: u64 = 10;

/// Engagement below one like per tweet on a sizable account
const ENGAGEMENT_PENALTY: f64 = 20.0;
const ENGAGEMENT_MIN_FOLLOWERS: u64 = 1_000;

/// Purchased-follower heuristic: suspiciously round follower count
const ROUND_NUMBER_PENALTY: f64 = 15.0;
const ROUND_NUMBER_MIN_FOLLOWERS: u64 = 500;
const ROUND_NUMBER_MIN_ZEROS: usize = 3;

/// Classification thresholds
const HIGH_THRESHOLD: f64 = 50.0;
const MEDIUM_THRESHOLD: f64 = 25.0;

/// Bot suspicion level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BotRisk {
    Low,
    Medium,
    High,
}

/// Bot analysis output
#[derive(Debug, Clone, Serialize)]
pub struct BotAnalysis {
    pub bot_risk: BotRisk,
    /// 0-100, higher = stronger bot suspicion
    pub bot_score: f64,
    /// One evidence string per triggered signal
    pub indicators: Vec<String>,
}

impl Default for BotAnalysis {
    fn default() -> Self {
        Self {
            bot_risk: BotRisk::Low,
            bot_score: 0.0,
            indicators: Vec::new(),
        }
    }
}

/// Pure bot-likelihood analyzer
pub struct BotLikelihoodAnalyzer;

impl BotLikelihoodAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Accumulate the penalty score for one social profile.
    ///
    /// Zero followers short-circuits to the default low-risk result.
    pub fn analyze(&self, profile: &SocialProfile) -> BotAnalysis {
        let mut result = BotAnalysis::default();

        if profile.followers == 0 {
            return result;
        }

        let followers = profile.followers;
        let following = profile.following.max(1);
        let tweets = profile.tweets;
        let likes = profile.likes;

        let mut score = 0.0;

        // 1. Follow-back farming pattern
        let ratio = followers as f64 / following as f64;
        if ratio < FOLLOWBACK_MAX_RATIO && followers > FOLLOWBACK_MIN_FOLLOWERS {
            score += FOLLOWBACK_PENALTY;
            result
                .indicators
                .push("フォロー数がフォロワーより多い".to_string());
        }

        // 2. Audience/activity mismatch
        if followers > SILENT_MIN_FOLLOWERS && tweets < SILENT_MAX_TWEETS {
            score += SILENT_PENALTY;
            result.indicators.push(format!(
                "フォロワー{}に対しツイート{}件",
                followers, tweets
            ));
        }

        // 3. Engagement rate
        if tweets > 0 {
            let likes_per_tweet = likes as f64 / tweets as f64;
            if followers > ENGAGEMENT_MIN_FOLLOWERS && likes_per_tweet < 1.0 {
                score += ENGAGEMENT_PENALTY;
                result
                    .indicators
                    .push("ツイートあたりのいいねが極端に少ない".to_string());
            }
        }

        // 4. Round-number follower count
        if followers > ROUND_NUMBER_MIN_FOLLOWERS
            && trailing_zeros(followers) >= ROUND_NUMBER_MIN_ZEROS
        {
            score += ROUND_NUMBER_PENALTY;
            result
                .indicators
                .push(format!("フォロワー数がキリ番（{}）", followers));
        }

        result.bot_score = score.min(100.0);
        result.bot_risk = if result.bot_score >= HIGH_THRESHOLD {
            BotRisk::High
        } else if result.bot_score >= MEDIUM_THRESHOLD {
            BotRisk::Medium
        } else {
            BotRisk::Low
        };

        result
    }
}

impl Default for BotLikelihoodAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Count trailing zero digits in the decimal representation
fn trailing_zeros(mut n: u64) -> usize {
    if n == 0 {
        return 0;
    }
    let mut count = 0;
    while n % 10 == 0 {
        count += 1;
        n /= 10;
    }
    count
}
