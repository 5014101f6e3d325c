//! Creator profiles and normalization
//!
//! Import collaborators hand over loosely typed records: counts may be
//! numbers or abbreviated text ("12.5k"), engagement may be a fraction or a
//! percentage. [`normalize`] turns such a record into a canonical
//! [`CreatorProfile`] or reports why it cannot.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;
use thiserror::Error;

static HANDLE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9._]{2,30}$").unwrap());

static MENTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@([A-Za-z0-9_.]{2,30})").unwrap());

static HASHTAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#([A-Za-z0-9_]{2,50})").unwrap());

/// A record that cannot be scored
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataQualityError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid handle: '{0}'")]
    InvalidHandle(String),

    #[error("Malformed {field}: '{value}'")]
    Malformed { field: &'static str, value: String },
}

/// A number as it arrives from an import: numeric or text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Number(f64),
    Text(String),
}

/// Loosely typed creator record from a scraping or import collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawCreatorRecord {
    pub handle: Option<String>,
    #[serde(alias = "followers", alias = "followers_est")]
    pub follower_count: Option<RawNumber>,
    #[serde(alias = "following")]
    pub following_count: Option<RawNumber>,
    #[serde(alias = "posts", alias = "posts_count")]
    pub post_count: Option<RawNumber>,
    #[serde(alias = "engagement_rate")]
    pub avg_engagement_rate: Option<RawNumber>,
    #[serde(alias = "bio")]
    pub bio_text: Option<String>,
    pub recent_post_summaries: Option<Vec<String>>,
    pub external_url: Option<String>,
}

impl RawCreatorRecord {
    /// Best-effort label for logs and reports, even when invalid
    pub fn label(&self) -> String {
        self.handle
            .as_deref()
            .map(|h| h.trim().trim_start_matches('@').to_lowercase())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "<unknown>".to_string())
    }
}

/// Canonical creator snapshot for one discovery cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorProfile {
    /// Lowercase handle without the leading `@`; doubles as the stable creator id
    pub handle: String,
    pub follower_count: Option<u64>,
    pub following_count: Option<u64>,
    pub post_count: Option<u64>,
    /// Fraction of followers engaging per post (0.035 = 3.5%)
    pub avg_engagement_rate: Option<f64>,
    pub bio_text: String,
    pub recent_post_summaries: Vec<String>,
    pub external_url: Option<String>,
}

impl CreatorProfile {
    /// Minimal profile with only a handle
    pub fn new(handle: &str) -> Self {
        Self {
            handle: handle.trim().trim_start_matches('@').to_lowercase(),
            follower_count: None,
            following_count: None,
            post_count: None,
            avg_engagement_rate: None,
            bio_text: String::new(),
            recent_post_summaries: Vec::new(),
            external_url: None,
        }
    }

    pub fn with_followers(mut self, followers: u64) -> Self {
        self.follower_count = Some(followers);
        self
    }

    pub fn with_following(mut self, following: u64) -> Self {
        self.following_count = Some(following);
        self
    }

    pub fn with_posts(mut self, posts: u64) -> Self {
        self.post_count = Some(posts);
        self
    }

    pub fn with_engagement(mut self, rate: f64) -> Self {
        self.avg_engagement_rate = Some(rate);
        self
    }

    pub fn with_bio(mut self, bio: &str) -> Self {
        self.bio_text = collapse_whitespace(bio);
        self
    }

    pub fn with_post(mut self, summary: &str) -> Self {
        self.recent_post_summaries.push(summary.trim().to_string());
        self
    }

    pub fn with_external_url(mut self, url: &str) -> Self {
        self.external_url = Some(url.to_string());
        self
    }

    /// Stable creator id
    pub fn id(&self) -> &str {
        &self.handle
    }

    /// Hashtags from bio and posts, lowercased, sorted, deduplicated
    pub fn content_tags(&self) -> BTreeSet<String> {
        std::iter::once(self.bio_text.as_str())
            .chain(self.recent_post_summaries.iter().map(String::as_str))
            .flat_map(|text| HASHTAG_REGEX.captures_iter(text))
            .map(|cap| cap[1].to_lowercase())
            .collect()
    }

    /// Handles mentioned in recent posts, excluding the creator itself
    pub fn mentions(&self) -> BTreeSet<String> {
        self.recent_post_summaries
            .iter()
            .flat_map(|text| MENTION_REGEX.captures_iter(text))
            .map(|cap| cap[1].trim_end_matches('.').to_lowercase())
            .filter(|h| h.len() >= 2 && !h.chars().all(|c| c.is_ascii_digit()))
            .filter(|h| *h != self.handle)
            .collect()
    }

    /// Lowercased post text, for keyword matching
    pub fn post_corpus(&self) -> String {
        self.recent_post_summaries.join("\n").to_lowercase()
    }
}

/// Clean and validate a raw record
pub fn normalize(raw: RawCreatorRecord) -> Result<CreatorProfile, DataQualityError> {
    let handle = raw
        .handle
        .as_deref()
        .map(|h| h.trim().trim_start_matches('@').to_lowercase())
        .filter(|h| !h.is_empty())
        .ok_or(DataQualityError::MissingField("handle"))?;

    if !HANDLE_REGEX.is_match(&handle) {
        return Err(DataQualityError::InvalidHandle(handle));
    }

    let follower_count = raw
        .follower_count
        .as_ref()
        .map(|n| parse_count("follower_count", n))
        .transpose()?;
    let following_count = raw
        .following_count
        .as_ref()
        .map(|n| parse_count("following_count", n))
        .transpose()?;
    let post_count = raw
        .post_count
        .as_ref()
        .map(|n| parse_count("post_count", n))
        .transpose()?;
    let avg_engagement_rate = raw
        .avg_engagement_rate
        .as_ref()
        .map(parse_rate)
        .transpose()?;

    let recent_post_summaries = raw
        .recent_post_summaries
        .unwrap_or_default()
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let external_url = raw
        .external_url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    Ok(CreatorProfile {
        handle,
        follower_count,
        following_count,
        post_count,
        avg_engagement_rate,
        bio_text: collapse_whitespace(raw.bio_text.as_deref().unwrap_or_default()),
        recent_post_summaries,
        external_url,
    })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn malformed(field: &'static str, value: impl ToString) -> DataQualityError {
    DataQualityError::Malformed {
        field,
        value: value.to_string(),
    }
}

/// Parse counts such as `12000`, `"12,000"`, `"12.5k"` or `"1.2M"`
fn parse_count(field: &'static str, raw: &RawNumber) -> Result<u64, DataQualityError> {
    let value = match raw {
        RawNumber::Number(n) => *n,
        RawNumber::Text(text) => {
            let cleaned: String = text
                .chars()
                .filter(|c| !c.is_whitespace() && *c != ',' && *c != '_')
                .collect::<String>()
                .to_lowercase();
            let (digits, multiplier) = match cleaned.chars().last() {
                Some('k') => (&cleaned[..cleaned.len() - 1], 1_000.0),
                Some('m') => (&cleaned[..cleaned.len() - 1], 1_000_000.0),
                Some('b') => (&cleaned[..cleaned.len() - 1], 1_000_000_000.0),
                _ => (cleaned.as_str(), 1.0),
            };
            digits
                .parse::<f64>()
                .map_err(|_| malformed(field, text))?
                * multiplier
        }
    };

    if !value.is_finite() || value < 0.0 {
        return Err(malformed(field, format!("{:?}", raw)));
    }
    Ok(value.round() as u64)
}

/// Parse an engagement rate into a fraction
fn parse_rate(raw: &RawNumber) -> Result<f64, DataQualityError> {
    const FIELD: &str = "avg_engagement_rate";

    let (value, percent) = match raw {
        RawNumber::Number(n) => (*n, false),
        RawNumber::Text(text) => {
            let trimmed = text.trim();
            let (digits, percent) = match trimmed.strip_suffix('%') {
                Some(rest) => (rest.trim(), true),
                None => (trimmed, false),
            };
            let value = digits.parse::<f64>().map_err(|_| malformed(FIELD, text))?;
            (value, percent)
        }
    };

    if !value.is_finite() || value < 0.0 {
        return Err(malformed(FIELD, value));
    }
    if percent || value > 1.0 {
        if value > 100.0 {
            return Err(malformed(FIELD, value));
        }
        return Ok(value / 100.0);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: &str) -> RawCreatorRecord {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_normalize_full_record() {
        let profile = normalize(record(
            r#"{
                "handle": "  @Glow.With.Ana ",
                "followers": "12.5k",
                "following": 640,
                "posts": "1,204",
                "engagement_rate": "4.2%",
                "bio": "  shea   lover \n natural skincare ",
                "recent_post_summaries": ["Morning routine #SelfCare with @tia_brown", "  "]
            }"#,
        ))
        .unwrap();

        assert_eq!(profile.handle, "glow.with.ana");
        assert_eq!(profile.follower_count, Some(12_500));
        assert_eq!(profile.following_count, Some(640));
        assert_eq!(profile.post_count, Some(1_204));
        assert!((profile.avg_engagement_rate.unwrap() - 0.042).abs() < 1e-9);
        assert_eq!(profile.bio_text, "shea lover natural skincare");
        assert_eq!(profile.recent_post_summaries.len(), 1);
    }

    #[test]
    fn test_missing_fields_are_neutral() {
        let profile = normalize(record(r#"{"handle": "quiet_creator"}"#)).unwrap();
        assert_eq!(profile.follower_count, None);
        assert_eq!(profile.avg_engagement_rate, None);
        assert!(profile.bio_text.is_empty());
    }

    #[test]
    fn test_missing_handle_is_data_quality_error() {
        let err = normalize(record(r#"{"followers": 1000}"#)).unwrap_err();
        assert_eq!(err, DataQualityError::MissingField("handle"));
    }

    #[test]
    fn test_invalid_handle_rejected() {
        let err = normalize(record(r#"{"handle": "not a handle!"}"#)).unwrap_err();
        assert!(matches!(err, DataQualityError::InvalidHandle(_)));
    }

    #[test]
    fn test_malformed_counts_rejected() {
        let err = normalize(record(r#"{"handle": "ana", "followers": "lots"}"#)).unwrap_err();
        assert!(matches!(
            err,
            DataQualityError::Malformed { field: "follower_count", .. }
        ));

        let err = normalize(record(r#"{"handle": "ana", "posts": -3}"#)).unwrap_err();
        assert!(matches!(err, DataQualityError::Malformed { field: "post_count", .. }));
    }

    #[test]
    fn test_engagement_rate_forms() {
        let as_fraction = normalize(record(r#"{"handle": "ana", "engagement_rate": 0.05}"#)).unwrap();
        let as_percent = normalize(record(r#"{"handle": "ana", "engagement_rate": 5}"#)).unwrap();
        assert!((as_fraction.avg_engagement_rate.unwrap() - 0.05).abs() < 1e-9);
        assert!((as_percent.avg_engagement_rate.unwrap() - 0.05).abs() < 1e-9);

        let too_big = normalize(record(r#"{"handle": "ana", "engagement_rate": 250}"#));
        assert!(too_big.is_err());
    }

    #[test]
    fn test_tags_and_mentions() {
        let profile = CreatorProfile::new("ana")
            .with_bio("Herbal rituals #Wellness")
            .with_post("Shea haul with @Tia_Brown and @ana #bodybutter")
            .with_post("Thanks @tia_brown. #wellness 12345 @2024");

        let tags: Vec<_> = profile.content_tags().into_iter().collect();
        assert_eq!(tags, vec!["bodybutter", "wellness"]);

        let mentions: Vec<_> = profile.mentions().into_iter().collect();
        assert_eq!(mentions, vec!["tia_brown"]);
    }
}
