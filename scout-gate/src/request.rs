//! Action requests and their lifecycle
//!
//! ```text
//! created ──► pending ──► held | exported | authorized | rate_limited | blocked
//!                                     │           │
//!                                     └──► executed / rejected ◄──┘
//! ```
//!
//! Held, rate-limited and blocked requests may be submitted again later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use scout_core::{ActionType, OutreachDraft};

/// Errors from request lifecycle operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("Request {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: Uuid,
        from: ActionState,
        to: ActionState,
    },

    #[error("Gate call for request {id} did not complete: {reason}")]
    Interrupted { id: Uuid, reason: String },
}

/// Outcome of a gate evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Review mode: draft only
    Held,
    /// Manual mode: handed to a human
    Exported,
    /// Live mode with quota: the executor may act
    Authorized,
    /// Live mode, quota exhausted; may be requeued
    RateLimited,
    /// Kill switch engaged
    Blocked,
}

impl Decision {
    pub const ALL: [Decision; 5] = [
        Decision::Held,
        Decision::Exported,
        Decision::Authorized,
        Decision::RateLimited,
        Decision::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Held => "held",
            Decision::Exported => "exported",
            Decision::Authorized => "authorized",
            Decision::RateLimited => "rate_limited",
            Decision::Blocked => "blocked",
        }
    }
}

/// Lifecycle state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionState {
    Created,
    Pending,
    Held,
    Exported,
    Authorized,
    RateLimited,
    Blocked,
    Executed,
    Rejected,
}

impl From<Decision> for ActionState {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Held => ActionState::Held,
            Decision::Exported => ActionState::Exported,
            Decision::Authorized => ActionState::Authorized,
            Decision::RateLimited => ActionState::RateLimited,
            Decision::Blocked => ActionState::Blocked,
        }
    }
}

impl ActionState {
    /// States from which a request may be (re)submitted to the gate
    pub fn is_submittable(&self) -> bool {
        matches!(
            self,
            ActionState::Created | ActionState::Held | ActionState::RateLimited | ActionState::Blocked
        )
    }

    /// States holding a gate decision
    pub fn is_decided(&self) -> bool {
        matches!(
            self,
            ActionState::Held
                | ActionState::Exported
                | ActionState::Authorized
                | ActionState::RateLimited
                | ActionState::Blocked
        )
    }
}

/// A request to perform one outward action for one creator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub id: Uuid,
    pub action_type: ActionType,
    pub creator_id: String,
    /// Reference to the payload, e.g. an outreach draft id
    pub payload_ref: String,
    pub state: ActionState,
    pub created_at: DateTime<Utc>,
    pub decided_at: Option<DateTime<Utc>>,
    /// Number of gate evaluations so far
    pub attempts: u32,
}

impl ActionRequest {
    pub fn new(action_type: ActionType, creator_id: &str, payload_ref: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            action_type,
            creator_id: creator_id.to_string(),
            payload_ref: payload_ref.to_string(),
            state: ActionState::Created,
            created_at: Utc::now(),
            decided_at: None,
            attempts: 0,
        }
    }

    /// Request an action carrying an outreach draft
    pub fn for_draft(action_type: ActionType, draft: &OutreachDraft) -> Self {
        Self::new(action_type, &draft.creator_id, &draft.draft_id)
    }

    fn transition(&mut self, to: ActionState, allowed: bool) -> Result<(), GateError> {
        if !allowed {
            return Err(GateError::InvalidTransition {
                id: self.id,
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    pub(crate) fn begin_evaluation(&mut self) -> Result<(), GateError> {
        let allowed = self.state.is_submittable();
        self.transition(ActionState::Pending, allowed)?;
        self.attempts += 1;
        Ok(())
    }

    pub(crate) fn record_decision(&mut self, decision: Decision, at: DateTime<Utc>) {
        self.state = decision.into();
        self.decided_at = Some(at);
    }

    /// The action was carried out, by the executor or by a human
    pub fn mark_executed(&mut self) -> Result<(), GateError> {
        let allowed = matches!(self.state, ActionState::Authorized | ActionState::Exported);
        self.transition(ActionState::Executed, allowed)
    }

    /// The action was dropped after a decision
    pub fn reject(&mut self) -> Result<(), GateError> {
        let allowed = self.state.is_decided();
        self.transition(ActionState::Rejected, allowed)
    }
}
