//! Safety Gate
//!
//! The single authority deciding whether an outward action may proceed.
//!
//! A decision holds the read side of the safety-state lock for its whole
//! duration, including the quota check-and-consume. Changing the kill switch
//! or mode takes the write side, so once [`SafetyGate::set_kill_switch`]
//! returns, no decision can still be running against the old value and
//! every later decision sees the new one.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

use scout_core::{ActionMode, ActionType, RateLimitConfig, SafetyConfig};

use crate::{ActionRequest, Decision, GateError, RateLimiter, WindowUsage};

/// Process-wide safety posture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SafetyState {
    pub kill_switch: bool,
    pub action_mode: ActionMode,
}

impl From<SafetyConfig> for SafetyState {
    fn from(config: SafetyConfig) -> Self {
        Self {
            kill_switch: config.kill_switch,
            action_mode: config.action_mode,
        }
    }
}

impl From<SafetyState> for SafetyConfig {
    fn from(state: SafetyState) -> Self {
        Self {
            kill_switch: state.kill_switch,
            action_mode: state.action_mode,
        }
    }
}

/// Per-decision counters
#[derive(Debug, Default)]
struct DecisionCounters {
    held: AtomicU64,
    exported: AtomicU64,
    authorized: AtomicU64,
    rate_limited: AtomicU64,
    blocked: AtomicU64,
}

impl DecisionCounters {
    fn counter(&self, decision: Decision) -> &AtomicU64 {
        match decision {
            Decision::Held => &self.held,
            Decision::Exported => &self.exported,
            Decision::Authorized => &self.authorized,
            Decision::RateLimited => &self.rate_limited,
            Decision::Blocked => &self.blocked,
        }
    }

    fn record(&self, decision: Decision) {
        self.counter(decision).fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BTreeMap<Decision, u64> {
        Decision::ALL
            .iter()
            .map(|d| (*d, self.counter(*d).load(Ordering::Relaxed)))
            .collect()
    }
}

/// Admission control for DMs, comments and exports
#[derive(Debug)]
pub struct SafetyGate {
    state: RwLock<SafetyState>,
    limiter: RateLimiter,
    counters: DecisionCounters,
}

impl SafetyGate {
    pub fn new(safety: SafetyConfig, limits: &RateLimitConfig) -> Self {
        Self {
            state: RwLock::new(safety.into()),
            limiter: RateLimiter::new(limits),
            counters: DecisionCounters::default(),
        }
    }

    /// Current safety posture
    pub fn safety_state(&self) -> SafetyState {
        *self.state.read()
    }

    /// Flip the kill switch; takes effect for every decision after this returns
    pub fn set_kill_switch(&self, engaged: bool) {
        let mut state = self.state.write();
        if state.kill_switch != engaged {
            warn!("Kill switch {}", if engaged { "ENGAGED" } else { "released" });
        }
        state.kill_switch = engaged;
    }

    pub fn set_action_mode(&self, mode: ActionMode) {
        let mut state = self.state.write();
        if state.action_mode != mode {
            info!("Action mode {} -> {}", state.action_mode, mode);
        }
        state.action_mode = mode;
    }

    /// Apply a whole safety posture at once
    pub fn apply_safety(&self, safety: SafetyConfig) {
        let mut state = self.state.write();
        if state.kill_switch != safety.kill_switch || state.action_mode != safety.action_mode {
            info!(
                "Safety posture: kill_switch={} mode={}",
                safety.kill_switch, safety.action_mode
            );
        }
        *state = safety.into();
    }

    /// Change quotas for subsequent decisions
    pub fn set_limits(&self, limits: &RateLimitConfig) {
        self.limiter.set_limits(limits);
        debug!("Rate limits updated: {:?}", limits);
    }

    /// Decide a request now
    pub fn authorize(&self, request: &mut ActionRequest) -> Result<Decision, GateError> {
        self.authorize_at(request, Utc::now())
    }

    /// Decide a request as of `now`.
    ///
    /// Only requests that are new, held, rate-limited or blocked may be
    /// submitted; anything else is an invalid transition.
    pub fn authorize_at(
        &self,
        request: &mut ActionRequest,
        now: DateTime<Utc>,
    ) -> Result<Decision, GateError> {
        request.begin_evaluation()?;
        let decision = self.decide(request.action_type, now);
        request.record_decision(decision, now);

        info!(
            "Gate {} {} -> {} for {} (attempt {})",
            request.id,
            request.action_type,
            decision.as_str(),
            request.creator_id,
            request.attempts
        );
        Ok(decision)
    }

    fn decide(&self, action: ActionType, now: DateTime<Utc>) -> Decision {
        let state = self.state.read();

        let decision = if state.kill_switch {
            Decision::Blocked
        } else {
            match state.action_mode {
                ActionMode::Review => Decision::Held,
                ActionMode::Manual => Decision::Exported,
                ActionMode::Live => match self.limiter.try_consume(action, now) {
                    Ok(()) => Decision::Authorized,
                    Err(scope) => {
                        debug!("{} refused: {} quota exhausted", action, scope);
                        Decision::RateLimited
                    }
                },
            }
        };
        drop(state);

        self.counters.record(decision);
        decision
    }

    /// Gate statistics
    pub fn stats(&self) -> GateStats {
        self.stats_at(Utc::now())
    }

    pub fn stats_at(&self, now: DateTime<Utc>) -> GateStats {
        let state = self.safety_state();
        GateStats {
            kill_switch: state.kill_switch,
            action_mode: state.action_mode,
            decisions: self.counters.snapshot(),
            windows: self.limiter.usage(now),
        }
    }
}

/// Gate statistics
#[derive(Debug, Clone, Serialize)]
pub struct GateStats {
    pub kill_switch: bool,
    pub action_mode: ActionMode,
    pub decisions: BTreeMap<Decision, u64>,
    pub windows: Vec<WindowUsage>,
}
