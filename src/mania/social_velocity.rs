//! Social velocity analysis
//!
//! Scores follower growth rate rather than absolute follower count:
//! 1000 followers/day saturates near 100, 10/day lands near 40.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::scoring::round1;

/// Log-scale factor: log10(followers/day) * 33, capped at 100
const LOG_SCALE: f64 = 33.0;

/// Minimum age in days, avoids division by zero for brand-new pairs
const MIN_AGE_DAYS: f64 = 0.1;

/// Fresh project bonus: younger than this with real traction
const FRESH_AGE_DAYS: f64 = 3.0;
const FRESH_MIN_FOLLOWERS: u64 = 500;
const FRESH_MULTIPLIER: f64 = 1.5;

/// Stale project penalty: older than this with no traction
const STALE_AGE_DAYS: f64 = 30.0;
const STALE_MAX_FOLLOWERS: u64 = 100;
const STALE_MULTIPLIER: f64 = 0.3;

/// Velocity analysis output
#[derive(Debug, Clone, Default, Serialize)]
pub struct VelocityAnalysis {
    pub velocity_score: f64,
    pub followers_per_day: f64,
    pub age_days: f64,
}

/// Pure social-velocity analyzer
pub struct SocialVelocityAnalyzer;

impl SocialVelocityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    /// Convert follower count and project age into a growth-rate score.
    ///
    /// Zero followers yields the all-zero output.
    pub fn analyze(
        &self,
        created_at: DateTime<Utc>,
        followers: u64,
        now: DateTime<Utc>,
    ) -> VelocityAnalysis {
        if followers == 0 {
            return VelocityAnalysis::default();
        }

        let age = ((now - created_at).num_seconds() as f64 / 86_400.0).max(MIN_AGE_DAYS);
        let fpd = followers as f64 / age;

        let mut velocity = (fpd.max(1.0).log10() * LOG_SCALE).min(100.0);

        if age < FRESH_AGE_DAYS && followers > FRESH_MIN_FOLLOWERS {
            velocity = (velocity * FRESH_MULTIPLIER).min(100.0);
        }

        if age > STALE_AGE_DAYS && followers < STALE_MAX_FOLLOWERS {
            velocity *= STALE_MULTIPLIER;
        }

        VelocityAnalysis {
            velocity_score: round1(velocity),
            followers_per_day: round1(fpd),
            age_days: round1(age),
        }
    }
}

impl Default for SocialVelocityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_zero_followers_yields_zeros() {
        let analyzer = SocialVelocityAnalyzer::new();
        let now = Utc::now();
        let result = analyzer.analyze(now - Duration::days(5), 0, now);

        assert_eq!(result.velocity_score, 0.0);
        assert_eq!(result.followers_per_day, 0.0);
        assert_eq!(result.age_days, 0.0);
    }

    #[test]
    fn test_log_curve_saturates_near_hundred() {
        let analyzer = SocialVelocityAnalyzer::new();
        let now = Utc::now();
        // 10_000 followers in 10 days = 1000/day -> log10(1000)*33 = 99
        let result = analyzer.analyze(now - Duration::days(10), 10_000, now);

        assert!((result.velocity_score - 99.0).abs() < 0.5);
        assert!((result.followers_per_day - 1_000.0).abs() < 1.0);
    }

    #[test]
    fn test_moderate_growth_lands_near_forty() {
        let analyzer = SocialVelocityAnalyzer::new();
        let now = Utc::now();
        // 100 followers in 10 days = 10/day -> log10(10)*33 = 33
        let result = analyzer.analyze(now - Duration::days(10), 100, now);

        assert!((result.velocity_score - 33.0).abs() < 0.5);
    }

    #[test]
    fn test_fresh_project_bonus() {
        let analyzer = SocialVelocityAnalyzer::new();
        let now = Utc::now();
        // 1 day old, 600 followers: 600/day -> log10(600)*33 = 91.6, x1.5 capped
        let result = analyzer.analyze(now - Duration::days(1), 600, now);

        assert_eq!(result.velocity_score, 100.0);
    }

    #[test]
    fn test_stale_project_penalty() {
        let analyzer = SocialVelocityAnalyzer::new();
        let now = Utc::now();
        // 50 days old, 50 followers: 1/day -> 0, penalty keeps it at 0;
        // use a slightly larger count to see the multiplier bite
        let result = analyzer.analyze(now - Duration::days(40), 80, now);
        // 2/day -> log10(2)*33 = 9.93, x0.3 = 2.98
        assert!((result.velocity_score - 3.0).abs() < 0.2);
    }

    #[test]
    fn test_age_floor() {
        let analyzer = SocialVelocityAnalyzer::new();
        let now = Utc::now();
        let result = analyzer.analyze(now, 10, now);

        assert_eq!(result.age_days, 0.1);
        assert!((result.followers_per_day - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_score_bounded() {
        let analyzer = SocialVelocityAnalyzer::new();
        let now = Utc::now();
        let result = analyzer.analyze(now, 10_000_000, now);

        assert!(result.velocity_score <= 100.0);
    }
}
