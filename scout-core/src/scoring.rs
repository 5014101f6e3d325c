//! Creator scoring
//!
//! Four sub-scores in [0, 1] are blended with configured weights into a
//! 0-100 integer score:
//! - **audience_fit**: follower count against the sweet spot
//! - **niche_alignment**: niche phrases found in bio, posts and hashtags
//! - **engagement**: engagement rate against a reference rate
//! - **authenticity**: `1 - fraud_score`
//!
//! A sub-score whose input is missing contributes [`NEUTRAL_SUBSCORE`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{CreatorProfile, FraudFlag, FraudReport, ScoringConfig, NEUTRAL_SUBSCORE};

/// Extra weight for a niche phrase found in the bio
const BIO_KEYWORD_BOOST: f64 = 1.5;

/// Final disposition of a scored creator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreDecision {
    Accept,
    Archive,
    Exclude,
}

/// Per-component breakdown, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub audience_fit: f64,
    pub niche_alignment: f64,
    pub engagement: f64,
    pub authenticity: f64,
}

/// Score and decision for one creator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub creator_id: String,
    /// 0 - 100
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    pub decision: ScoreDecision,
    pub fraud_flags: BTreeSet<FraudFlag>,
    /// Niche phrases that matched, in configuration order
    pub matched_niches: Vec<String>,
}

impl ScoreResult {
    pub fn is_accepted(&self) -> bool {
        self.decision == ScoreDecision::Accept
    }
}

/// Score a profile given its fraud report
pub fn score_creator(
    profile: &CreatorProfile,
    fraud: &FraudReport,
    config: &ScoringConfig,
    max_followers: u64,
) -> ScoreResult {
    let niche = niche_alignment(profile, config);
    let breakdown = ScoreBreakdown {
        audience_fit: audience_fit(profile.follower_count, config, max_followers)
            .unwrap_or(NEUTRAL_SUBSCORE),
        niche_alignment: niche.score.unwrap_or(NEUTRAL_SUBSCORE),
        engagement: engagement(profile.avg_engagement_rate, config).unwrap_or(NEUTRAL_SUBSCORE),
        authenticity: (1.0 - fraud.fraud_score).clamp(0.0, 1.0),
    };

    let w = &config.weights;
    let blended = w.audience_fit * breakdown.audience_fit
        + w.niche_alignment * breakdown.niche_alignment
        + w.engagement * breakdown.engagement
        + w.authenticity * breakdown.authenticity;
    let score = (100.0 * blended).round().clamp(0.0, 100.0) as u8;

    let decision = if fraud.hard_exclude {
        ScoreDecision::Exclude
    } else if score < config.min_score {
        ScoreDecision::Archive
    } else {
        ScoreDecision::Accept
    };

    ScoreResult {
        creator_id: profile.handle.clone(),
        score,
        breakdown,
        decision,
        fraud_flags: fraud.flags.clone(),
        matched_niches: niche.matched,
    }
}

/// 1.0 inside the sweet spot, linear decay to 0 outside it.
///
/// Below the range the decay span is `sweet_spot_min`; above it the span
/// runs from `sweet_spot_max` to the follower ceiling.
pub fn audience_fit(followers: Option<u64>, config: &ScoringConfig, max_followers: u64) -> Option<f64> {
    let followers = followers? as f64;
    let min = config.sweet_spot_min as f64;
    let max = config.sweet_spot_max as f64;

    let fit = if followers < min {
        1.0 - (min - followers) / min
    } else if followers > max {
        let span = (max_followers as f64 - max).max(1.0);
        1.0 - (followers - max) / span
    } else {
        1.0
    };
    Some(fit.clamp(0.0, 1.0))
}

/// Engagement rate relative to the reference rate
pub fn engagement(rate: Option<f64>, config: &ScoringConfig) -> Option<f64> {
    let rate = rate?;
    Some((rate / config.reference_engagement_rate).clamp(0.0, 1.0))
}

/// Niche keyword alignment with the phrases that matched
#[derive(Debug, Clone, PartialEq)]
pub struct NicheAlignment {
    pub score: Option<f64>,
    pub matched: Vec<String>,
}

/// Each phrase counts once per source: bio hits weigh more than post hits,
/// and longer phrases weigh slightly more than short ones.
pub fn niche_alignment(profile: &CreatorProfile, config: &ScoringConfig) -> NicheAlignment {
    let bio = profile.bio_text.to_lowercase();
    let posts = profile.post_corpus();
    let tags: Vec<String> = profile.content_tags().into_iter().collect();

    if config.target_niches.is_empty() || (bio.is_empty() && posts.is_empty()) {
        return NicheAlignment {
            score: None,
            matched: Vec::new(),
        };
    }

    let mut raw = 0.0;
    let mut matched = Vec::new();
    for niche in &config.target_niches {
        let phrase = niche.trim().to_lowercase();
        if phrase.is_empty() {
            continue;
        }
        let value = 1.0 + (phrase.chars().count() as f64 / 20.0).min(1.0);
        let squashed = phrase.replace([' ', '-'], "");

        let in_bio = bio.contains(&phrase);
        let in_posts = posts.contains(&phrase) || tags.iter().any(|t| *t == squashed);

        if in_bio {
            raw += value * BIO_KEYWORD_BOOST;
        }
        if in_posts {
            raw += value;
        }
        if in_bio || in_posts {
            matched.push(phrase);
        }
    }

    NicheAlignment {
        score: Some((raw / config.niche_saturation).clamp(0.0, 1.0)),
        matched,
    }
}
