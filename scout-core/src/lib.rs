//! Creator Scout Core - creator intelligence primitives
//!
//! This crate provides the building blocks of the discovery pipeline:
//! - Profile normalization from loosely typed import records
//! - Fraud signals with hard exclusions
//! - Weighted 0-100 scoring with accept/archive/exclude decisions
//! - A creator graph with moving-average edge upserts
//! - Similarity expansion from known-good seed creators
//! - Deterministic outreach drafts

pub mod actions;
pub mod config;
pub mod fraud;
pub mod graph;
pub mod outreach;
pub mod profile;
pub mod scoring;
pub mod similarity;

pub use actions::*;
pub use config::*;
pub use fraud::*;
pub use graph::*;
pub use outreach::*;
pub use profile::*;
pub use scoring::*;
pub use similarity::*;

/// Follower count above which a creator is always excluded
pub const DEFAULT_MAX_FOLLOWERS: u64 = 250_000;

/// Deepest similarity expansion allowed; path enumeration grows exponentially
pub const MAX_EXPANSION_DEPTH: usize = 4;

/// Default smoothing factor for repeated edge observations
pub const DEFAULT_EMA_ALPHA: f64 = 0.3;

/// Contribution of a sub-score whose input is missing
pub const NEUTRAL_SUBSCORE: f64 = 0.5;

/// Minimum edge weight
pub const MIN_WEIGHT: f64 = 0.0;

/// Maximum edge weight
pub const MAX_WEIGHT: f64 = 1.0;
