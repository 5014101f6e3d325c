//! Fraud and low-quality signals
//!
//! Conservative by construction: signals never accuse anyone, they only
//! lower confidence. Three signals are hard exclusions (spam page, store or
//! brand account, follower ceiling); the rest add weighted points to a
//! fraud score in [0, 1]. A field that is missing never fires a signal.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{CreatorProfile, FraudConfig};

/// Individual fraud signals, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudFlag {
    /// Bio or handle matches a spam keyword
    SpamKeyword,
    /// Looks like a store or brand rather than a creator
    BrandAccount,
    /// Follower count above the hard ceiling
    FollowerCeiling,
    /// Engagement rate below the configured floor
    LowEngagement,
    /// Too few posts to judge
    LowPostCount,
    /// Follower/following ratio outside the plausible band
    FollowerRatio,
}

impl FraudFlag {
    /// Whether this flag excludes the creator outright
    pub fn is_hard(&self) -> bool {
        matches!(
            self,
            FraudFlag::SpamKeyword | FraudFlag::BrandAccount | FraudFlag::FollowerCeiling
        )
    }
}

/// Outcome of fraud evaluation for one creator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudReport {
    /// Weighted soft-signal score (0.0 - 1.0), higher is riskier
    pub fraud_score: f64,
    pub flags: BTreeSet<FraudFlag>,
    pub hard_exclude: bool,
}

impl FraudReport {
    pub fn clean() -> Self {
        Self {
            fraud_score: 0.0,
            flags: BTreeSet::new(),
            hard_exclude: false,
        }
    }

    pub fn has(&self, flag: FraudFlag) -> bool {
        self.flags.contains(&flag)
    }
}

/// Evaluate all fraud signals for a profile
pub fn evaluate_fraud(profile: &CreatorProfile, config: &FraudConfig) -> FraudReport {
    let mut flags = BTreeSet::new();

    if is_spammy(profile, config) {
        flags.insert(FraudFlag::SpamKeyword);
    }
    if looks_like_brand(profile, config) {
        flags.insert(FraudFlag::BrandAccount);
    }
    if profile
        .follower_count
        .is_some_and(|f| f > config.max_followers)
    {
        flags.insert(FraudFlag::FollowerCeiling);
    }
    if profile
        .avg_engagement_rate
        .is_some_and(|er| er < config.min_engagement_rate)
    {
        flags.insert(FraudFlag::LowEngagement);
    }
    if profile.post_count.is_some_and(|p| p < config.min_posts) {
        flags.insert(FraudFlag::LowPostCount);
    }
    if let (Some(followers), Some(following)) = (profile.follower_count, profile.following_count) {
        if following > 0 {
            let ratio = followers as f64 / following as f64;
            if ratio < config.min_follower_ratio || ratio > config.max_follower_ratio {
                flags.insert(FraudFlag::FollowerRatio);
            }
        }
    }

    let weights = &config.weights;
    let fraud_score: f64 = flags
        .iter()
        .map(|flag| match flag {
            FraudFlag::LowEngagement => weights.low_engagement,
            FraudFlag::LowPostCount => weights.low_post_count,
            FraudFlag::FollowerRatio => weights.follower_ratio,
            _ => 0.0,
        })
        .sum();

    FraudReport {
        fraud_score: fraud_score.clamp(0.0, 1.0),
        hard_exclude: flags.iter().any(FraudFlag::is_hard),
        flags,
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles
        .iter()
        .filter(|n| !n.is_empty())
        .any(|n| haystack.contains(&n.to_lowercase()))
}

fn is_spammy(profile: &CreatorProfile, config: &FraudConfig) -> bool {
    let bio = profile.bio_text.to_lowercase();
    contains_any(&profile.handle, &config.spam_handle_fragments)
        || contains_any(&bio, &config.spam_keywords)
}

fn looks_like_brand(profile: &CreatorProfile, config: &FraudConfig) -> bool {
    if contains_any(&profile.handle, &config.brand_handle_fragments) {
        return true;
    }

    let bio = profile.bio_text.to_lowercase();
    if !contains_any(&bio, &config.shop_terms) {
        return false;
    }
    profile.external_url.is_some() || contains_any(&bio, &config.commerce_cues)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy() -> CreatorProfile {
        CreatorProfile::new("glowwithana")
            .with_followers(40_000)
            .with_following(800)
            .with_posts(320)
            .with_engagement(0.04)
            .with_bio("Natural skincare and herbal rituals")
    }

    #[test]
    fn test_healthy_profile_is_clean() {
        let report = evaluate_fraud(&healthy(), &FraudConfig::default());
        assert_eq!(report, FraudReport::clean());
    }

    #[test]
    fn test_spam_keyword_is_hard_exclude() {
        let profile = healthy().with_bio("DM for promo, fast growth");
        let report = evaluate_fraud(&profile, &FraudConfig::default());
        assert!(report.hard_exclude);
        assert!(report.has(FraudFlag::SpamKeyword));
        assert_eq!(report.fraud_score, 0.0);
    }

    #[test]
    fn test_spam_handle_fragment() {
        let mut profile = healthy();
        profile.handle = "daily_giveaways".to_string();
        let report = evaluate_fraud(&profile, &FraudConfig::default());
        assert!(report.has(FraudFlag::SpamKeyword));
    }

    #[test]
    fn test_brand_heuristics() {
        let config = FraudConfig::default();

        let mut by_handle = healthy();
        by_handle.handle = "sheabutter_shop".to_string();
        assert!(evaluate_fraud(&by_handle, &config).has(FraudFlag::BrandAccount));

        let by_bio = healthy().with_bio("Order now! Free shipping on all butters");
        assert!(evaluate_fraud(&by_bio, &config).has(FraudFlag::BrandAccount));

        let by_url = healthy()
            .with_bio("Visit our store")
            .with_external_url("https://example.com");
        assert!(evaluate_fraud(&by_url, &config).has(FraudFlag::BrandAccount));

        // shop term alone is not enough
        let creator = healthy().with_bio("I love to shop thrift finds");
        assert!(!evaluate_fraud(&creator, &config).hard_exclude);
    }

    #[test]
    fn test_follower_ceiling() {
        let config = FraudConfig::default();
        let at_ceiling = healthy().with_followers(250_000).with_following(1_000);
        assert!(!evaluate_fraud(&at_ceiling, &config).has(FraudFlag::FollowerCeiling));

        let above = healthy().with_followers(250_001).with_following(1_000);
        let report = evaluate_fraud(&above, &config);
        assert!(report.has(FraudFlag::FollowerCeiling));
        assert!(report.hard_exclude);
    }

    #[test]
    fn test_soft_signals_accumulate() {
        let profile = healthy()
            .with_engagement(0.001)
            .with_posts(3)
            .with_following(200_000);
        let report = evaluate_fraud(&profile, &FraudConfig::default());

        assert!(!report.hard_exclude);
        let flags: Vec<_> = report.flags.iter().copied().collect();
        assert_eq!(
            flags,
            vec![
                FraudFlag::LowEngagement,
                FraudFlag::LowPostCount,
                FraudFlag::FollowerRatio
            ]
        );
        assert!((report.fraud_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_fields_do_not_fire() {
        let profile = CreatorProfile::new("mystery");
        let report = evaluate_fraud(&profile, &FraudConfig::default());
        assert!(report.flags.is_empty());
        assert_eq!(report.fraud_score, 0.0);
    }

    #[test]
    fn test_zero_following_is_neutral() {
        let profile = healthy().with_following(0);
        let report = evaluate_fraud(&profile, &FraudConfig::default());
        assert!(!report.has(FraudFlag::FollowerRatio));
    }
}
