//! Operator configuration
//!
//! Weights and thresholds live here instead of in branching code so they can
//! be retuned without a redeploy. A [`ConfigHandle`] swaps a validated
//! snapshot in place; every evaluation reads the snapshot current at the
//! time it starts.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::{ActionMode, DEFAULT_EMA_ALPHA, DEFAULT_MAX_FOLLOWERS, MAX_EXPANSION_DEPTH};

/// Tolerance when checking that weights sum to one
const WEIGHT_EPSILON: f64 = 1e-6;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Complete operator configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub scoring: ScoringConfig,
    pub fraud: FraudConfig,
    pub graph: GraphConfig,
    pub limits: RateLimitConfig,
    pub safety: SafetyConfig,
}

/// Relative weight of each score component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub audience_fit: f64,
    pub niche_alignment: f64,
    pub engagement: f64,
    pub authenticity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            audience_fit: 0.25,
            niche_alignment: 0.30,
            engagement: 0.25,
            authenticity: 0.20,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.audience_fit + self.niche_alignment + self.engagement + self.authenticity
    }

    fn all(&self) -> [f64; 4] {
        [
            self.audience_fit,
            self.niche_alignment,
            self.engagement,
            self.authenticity,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Lower bound of the preferred follower range
    pub sweet_spot_min: u64,
    /// Upper bound of the preferred follower range
    pub sweet_spot_max: u64,
    /// Scores below this are archived
    pub min_score: u8,
    /// Engagement rate that maps to a full engagement sub-score
    pub reference_engagement_rate: f64,
    /// Niche phrases matched against bio and post text
    pub target_niches: Vec<String>,
    /// Raw keyword score that saturates niche alignment at 1.0
    pub niche_saturation: f64,
    pub weights: ScoreWeights,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            sweet_spot_min: 5_000,
            sweet_spot_max: 80_000,
            min_score: 50,
            reference_engagement_rate: 0.06,
            target_niches: strings(&[
                "natural skincare",
                "body butter",
                "body oil",
                "shea",
                "self care",
                "selfcare",
                "skin barrier",
                "wellness",
                "herbal",
                "gut health",
                "plant based",
                "black owned",
            ]),
            niche_saturation: 4.0,
            weights: ScoreWeights::default(),
        }
    }
}

/// Weights of the soft fraud signals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudWeights {
    pub low_engagement: f64,
    pub low_post_count: f64,
    pub follower_ratio: f64,
}

impl Default for FraudWeights {
    fn default() -> Self {
        Self {
            low_engagement: 0.40,
            low_post_count: 0.25,
            follower_ratio: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FraudConfig {
    /// Engagement rate below which the low-engagement signal fires
    pub min_engagement_rate: f64,
    /// Post count below which the low-post-count signal fires
    pub min_posts: u64,
    /// Plausible follower/following band (inclusive)
    pub min_follower_ratio: f64,
    pub max_follower_ratio: f64,
    /// Hard ceiling; anything above is excluded
    pub max_followers: u64,
    /// Bio phrases that mark a spam page
    pub spam_keywords: Vec<String>,
    /// Handle fragments that mark a spam page
    pub spam_handle_fragments: Vec<String>,
    /// Handle fragments that mark a store or brand account
    pub brand_handle_fragments: Vec<String>,
    /// Bio terms that suggest a shop
    pub shop_terms: Vec<String>,
    /// Bio terms that, next to a shop term, suggest selling
    pub commerce_cues: Vec<String>,
    pub weights: FraudWeights,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for FraudConfig {
    fn default() -> Self {
        Self {
            min_engagement_rate: 0.005,
            min_posts: 8,
            min_follower_ratio: 0.5,
            max_follower_ratio: 2_000.0,
            max_followers: DEFAULT_MAX_FOLLOWERS,
            spam_keywords: strings(&[
                "dm for promo",
                "dm for collab",
                "free money",
                "forex",
                "crypto",
                "betting",
                "giveaway page",
                "cashapp",
                "onlyfans",
                "telegram",
            ]),
            spam_handle_fragments: strings(&["giveaway", "promo", "forex", "crypto"]),
            brand_handle_fragments: strings(&["shop", "store", "official", "boutique", "brand"]),
            shop_terms: strings(&["shop", "store", "order"]),
            commerce_cues: strings(&["link in bio", "shipping"]),
            weights: FraudWeights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Smoothing factor for repeated edge observations
    pub ema_alpha: f64,
    /// Maximum traversal depth for similarity expansion
    pub max_depth: usize,
    /// Creators seen within this many hours are not re-surfaced
    pub cooldown_hours: i64,
    /// Similarity edges kept per base creator
    pub similarity_top_k: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            ema_alpha: DEFAULT_EMA_ALPHA,
            max_depth: 2,
            cooldown_hours: 72,
            similarity_top_k: 25,
        }
    }
}

/// Quotas for outward actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Rolling one-hour quota across all action types
    pub max_actions_per_hour: u32,
    pub max_dms_per_day: u32,
    pub max_comments_per_day: u32,
    pub max_exports_per_day: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_actions_per_hour: 30,
            max_dms_per_day: 40,
            max_comments_per_day: 120,
            max_exports_per_day: 500,
        }
    }
}

/// Initial safety posture. Starts locked down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub kill_switch: bool,
    pub action_mode: ActionMode,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            kill_switch: true,
            action_mode: ActionMode::Review,
        }
    }
}

impl ScoutConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScoutConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: ScoutConfig = toml::from_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SCOUT_ACTION_MODE`, `SCOUT_KILL_SWITCH` and
    /// `SCOUT_MAX_ACTIONS_PER_HOUR` if present
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(mode) = lookup("SCOUT_ACTION_MODE") {
            self.safety.action_mode = mode.parse()?;
        }
        if let Some(kill) = lookup("SCOUT_KILL_SWITCH") {
            self.safety.kill_switch = match kill.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "SCOUT_KILL_SWITCH must be a boolean, got '{}'",
                        other
                    )))
                }
            };
        }
        if let Some(max) = lookup("SCOUT_MAX_ACTIONS_PER_HOUR") {
            self.limits.max_actions_per_hour = max.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!(
                    "SCOUT_MAX_ACTIONS_PER_HOUR must be an integer, got '{}'",
                    max
                ))
            })?;
        }
        Ok(())
    }

    /// Check weights, ranges and orderings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.scoring;
        let w = &s.weights;
        if w.all().iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(ConfigError::Invalid(
                "score weights must be non-negative".to_string(),
            ));
        }
        if (w.sum() - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::Invalid(format!(
                "score weights must sum to 1, got {:.4}",
                w.sum()
            )));
        }
        if s.sweet_spot_min == 0 || s.sweet_spot_min > s.sweet_spot_max {
            return Err(ConfigError::Invalid(
                "sweet spot must satisfy 0 < min <= max".to_string(),
            ));
        }
        if s.min_score > 100 {
            return Err(ConfigError::Invalid("min_score must be <= 100".to_string()));
        }
        if !(s.reference_engagement_rate > 0.0) || !(s.niche_saturation > 0.0) {
            return Err(ConfigError::Invalid(
                "reference_engagement_rate and niche_saturation must be positive".to_string(),
            ));
        }

        let f = &self.fraud;
        if f.max_followers <= s.sweet_spot_max {
            return Err(ConfigError::Invalid(
                "max_followers must exceed sweet_spot_max".to_string(),
            ));
        }
        if !(f.min_follower_ratio >= 0.0) || f.min_follower_ratio > f.max_follower_ratio {
            return Err(ConfigError::Invalid(
                "follower ratio band must satisfy 0 <= min <= max".to_string(),
            ));
        }
        let fw = &f.weights;
        if [fw.low_engagement, fw.low_post_count, fw.follower_ratio]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(ConfigError::Invalid(
                "fraud weights must be non-negative".to_string(),
            ));
        }

        let g = &self.graph;
        if !(g.ema_alpha > 0.0 && g.ema_alpha <= 1.0) {
            return Err(ConfigError::Invalid("ema_alpha must be in (0, 1]".to_string()));
        }
        if g.max_depth == 0 || g.max_depth > MAX_EXPANSION_DEPTH {
            return Err(ConfigError::Invalid(format!(
                "max_depth must be between 1 and {}",
                MAX_EXPANSION_DEPTH
            )));
        }
        if g.cooldown_hours < 0 {
            return Err(ConfigError::Invalid(
                "cooldown_hours must not be negative".to_string(),
            ));
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Shared, swappable configuration snapshot
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    inner: Arc<RwLock<Arc<ScoutConfig>>>,
}

impl ConfigHandle {
    pub fn new(config: ScoutConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(Arc::new(config))),
        })
    }

    /// Current snapshot; stays consistent for the caller even if an update lands
    pub fn snapshot(&self) -> Arc<ScoutConfig> {
        self.inner.read().clone()
    }

    /// Apply a change; the candidate is validated before it becomes visible
    pub fn update<F>(&self, change: F) -> Result<Arc<ScoutConfig>, ConfigError>
    where
        F: FnOnce(&mut ScoutConfig),
    {
        let mut guard = self.inner.write();
        let mut candidate = (**guard).clone();
        change(&mut candidate);
        candidate.validate()?;
        let next = Arc::new(candidate);
        *guard = next.clone();
        Ok(next)
    }

    /// Replace the whole configuration
    pub fn replace(&self, config: ScoutConfig) -> Result<Arc<ScoutConfig>, ConfigError> {
        self.update(|current| *current = config)
    }
}
