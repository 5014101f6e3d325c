//! Outward action vocabulary shared by configuration and the safety gate

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Operating posture of the safety gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ActionMode {
    /// Draft only; nothing is ever authorized
    #[default]
    Review,
    /// Approved actions are exported for a human to perform
    Manual,
    /// Actions may be authorized automatically within quota
    Live,
}

impl ActionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionMode::Review => "review",
            ActionMode::Manual => "manual",
            ActionMode::Live => "live",
        }
    }
}

impl fmt::Display for ActionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "review" => Ok(ActionMode::Review),
            "manual" => Ok(ActionMode::Manual),
            "live" => Ok(ActionMode::Live),
            other => Err(ConfigError::Invalid(format!(
                "unknown action mode '{}' (expected review, manual or live)",
                other
            ))),
        }
    }
}

/// Kinds of outward action that must pass the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Dm,
    Comment,
    Export,
}

impl ActionType {
    pub const ALL: [ActionType; 3] = [ActionType::Dm, ActionType::Comment, ActionType::Export];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Dm => "dm",
            ActionType::Comment => "comment",
            ActionType::Export => "export",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dm" => Ok(ActionType::Dm),
            "comment" => Ok(ActionType::Comment),
            "export" => Ok(ActionType::Export),
            other => Err(ConfigError::Invalid(format!("unknown action type '{}'", other))),
        }
    }
}
