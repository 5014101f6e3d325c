//! Pipeline Coordinator
//!
//! Runs a batch of raw records through the evaluation chain:
//! - normalize, fraud check and score every record concurrently
//! - isolate failures per creator (bad data or a panicking task)
//! - feed accepted creators into the creator graph
//! - route outward actions through the safety gate

use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use scout_core::{
    evaluate_fraud, expand, generate_draft, most_similar, normalize, observe_mentions,
    record_overlap, record_similarity, score_creator, ActionMode, CampaignContext, Candidate,
    ConfigError, ConfigHandle, CreatorGraph, CreatorProfile, DataQualityError, DraftError,
    ExpansionParams, FraudReport, GraphStats, OutreachDraft, RawCreatorRecord, SafetyConfig,
    ScoreDecision, ScoreResult, ScoutConfig, SimilarityKey,
};
use scout_gate::{ActionRequest, Decision, GateError, GateStats, SafetyGate};

use crate::ProfileSource;

/// One fully evaluated creator
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub profile: CreatorProfile,
    pub fraud: FraudReport,
    pub score: ScoreResult,
}

/// A record that produced no evaluation
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRecord {
    /// Best-effort creator label
    pub creator: String,
    pub reason: String,
}

/// Outcome of one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub evaluations: Vec<Evaluation>,
    pub skipped: Vec<SkippedRecord>,
    /// Edge observations recorded into the graph
    pub edges_observed: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchReport {
    fn count(&self, decision: ScoreDecision) -> usize {
        self.evaluations
            .iter()
            .filter(|e| e.score.decision == decision)
            .count()
    }

    pub fn accepted(&self) -> usize {
        self.count(ScoreDecision::Accept)
    }

    pub fn archived(&self) -> usize {
        self.count(ScoreDecision::Archive)
    }

    pub fn excluded(&self) -> usize {
        self.count(ScoreDecision::Exclude)
    }

    /// Accepted evaluations, best score first
    pub fn shortlist(&self) -> Vec<&Evaluation> {
        let mut accepted: Vec<&Evaluation> = self
            .evaluations
            .iter()
            .filter(|e| e.score.is_accepted())
            .collect();
        accepted.sort_by(|a, b| {
            b.score
                .score
                .cmp(&a.score.score)
                .then_with(|| a.profile.handle.cmp(&b.profile.handle))
        });
        accepted
    }

    pub fn find(&self, handle: &str) -> Option<&Evaluation> {
        self.evaluations.iter().find(|e| e.profile.handle == handle)
    }
}

/// Normalize, fraud-check and score one record
pub fn evaluate_record(
    raw: RawCreatorRecord,
    config: &ScoutConfig,
) -> Result<Evaluation, DataQualityError> {
    let profile = normalize(raw)?;
    let fraud = evaluate_fraud(&profile, &config.fraud);
    let score = score_creator(&profile, &fraud, &config.scoring, config.fraud.max_followers);
    Ok(Evaluation {
        profile,
        fraud,
        score,
    })
}

/// A request together with the gate's answer for it
pub type GateOutcome = (ActionRequest, Result<Decision, GateError>);

/// The creator-scout pipeline.
///
/// The gate is the only owner of the kill switch and action mode. The
/// `safety` section kept in the configuration handle is a mirror refreshed
/// on every update.
pub struct Pipeline {
    config: ConfigHandle,
    graph: Arc<CreatorGraph>,
    gate: Arc<SafetyGate>,
    updates: Mutex<()>,
}

impl Pipeline {
    /// Create a pipeline from a validated configuration
    pub fn new(config: ScoutConfig) -> Result<Self, ConfigError> {
        let handle = ConfigHandle::new(config)?;
        let snapshot = handle.snapshot();
        let graph = CreatorGraph::with_alpha(snapshot.graph.ema_alpha);
        let gate = SafetyGate::new(snapshot.safety, &snapshot.limits);

        info!(
            "Pipeline ready: kill_switch={} mode={} max_actions_per_hour={}",
            snapshot.safety.kill_switch,
            snapshot.safety.action_mode,
            snapshot.limits.max_actions_per_hour
        );

        Ok(Self {
            config: handle,
            graph: Arc::new(graph),
            gate: Arc::new(gate),
            updates: Mutex::new(()),
        })
    }

    /// Current configuration, with the safety section read from the gate
    pub fn config(&self) -> Arc<ScoutConfig> {
        let snapshot = self.config.snapshot();
        let live = SafetyConfig::from(self.gate.safety_state());
        if snapshot.safety == live {
            return snapshot;
        }
        let mut config = (*snapshot).clone();
        config.safety = live;
        Arc::new(config)
    }

    pub fn graph(&self) -> &Arc<CreatorGraph> {
        &self.graph
    }

    pub fn gate(&self) -> &Arc<SafetyGate> {
        &self.gate
    }

    /// Change configuration at runtime.
    ///
    /// The change sees the gate's current kill switch and mode, and only the
    /// safety fields it actually changes are pushed back to the gate. The
    /// candidate is validated first; on success the gate and graph pick up
    /// the new limits and smoothing factor before this returns. Updates are
    /// serialized, so they reach the gate in commit order.
    pub fn update_config<F>(&self, change: F) -> Result<Arc<ScoutConfig>, ConfigError>
    where
        F: FnOnce(&mut ScoutConfig),
    {
        let _serial = self.updates.lock();
        let mut base = self.gate.safety_state();
        let next = self.config.update(|config| {
            base = self.gate.safety_state();
            config.safety = base.into();
            change(config);
        })?;

        self.gate.set_limits(&next.limits);
        if next.safety.kill_switch != base.kill_switch {
            self.gate.set_kill_switch(next.safety.kill_switch);
        }
        if next.safety.action_mode != base.action_mode {
            self.gate.set_action_mode(next.safety.action_mode);
        }
        self.graph.set_alpha(next.graph.ema_alpha);
        info!("Configuration updated");
        Ok(next)
    }

    /// Engage or release the kill switch
    pub fn set_kill_switch(&self, engaged: bool) {
        self.gate.set_kill_switch(engaged);
    }

    pub fn set_action_mode(&self, mode: ActionMode) {
        self.gate.set_action_mode(mode);
    }

    /// Fetch everything from a source and evaluate it
    pub async fn run_source(&self, source: &dyn ProfileSource) -> anyhow::Result<BatchReport> {
        let records = source.fetch().await?;
        info!("Fetched {} records from {}", records.len(), source.name());
        Ok(self.evaluate_batch(records).await)
    }

    /// Evaluate a batch and feed accepted creators into the graph
    pub async fn evaluate_batch(&self, records: Vec<RawCreatorRecord>) -> BatchReport {
        self.evaluate_batch_with(records, evaluate_record).await
    }

    /// Evaluate a batch with a custom per-record stage
    pub async fn evaluate_batch_with<F>(&self, records: Vec<RawCreatorRecord>, stage: F) -> BatchReport
    where
        F: Fn(RawCreatorRecord, &ScoutConfig) -> Result<Evaluation, DataQualityError>
            + Send
            + Sync
            + 'static,
    {
        let started_at = Utc::now();
        let total = records.len();
        let stage = Arc::new(stage);
        let mut tasks = JoinSet::new();

        for (index, raw) in records.into_iter().enumerate() {
            let config = self.config.snapshot();
            let stage = stage.clone();
            tasks.spawn(async move {
                let label = raw.label();
                let outcome = AssertUnwindSafe(async { stage(raw, &config) })
                    .catch_unwind()
                    .await;
                (index, label, outcome)
            });
        }

        let mut evaluated: Vec<(usize, Evaluation)> = Vec::with_capacity(total);
        let mut skipped = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, _, Ok(Ok(evaluation)))) => {
                    debug!(
                        "{} scored {} ({:?})",
                        evaluation.profile.handle, evaluation.score.score, evaluation.score.decision
                    );
                    if evaluation.fraud.hard_exclude {
                        info!(
                            "Excluded {}: {:?}",
                            evaluation.profile.handle, evaluation.fraud.flags
                        );
                    }
                    evaluated.push((index, evaluation));
                }
                Ok((_, label, Ok(Err(e)))) => {
                    warn!("Skipping {}: {}", label, e);
                    skipped.push(SkippedRecord {
                        creator: label,
                        reason: e.to_string(),
                    });
                }
                Ok((_, label, Err(panic))) => {
                    let reason = panic_message(panic.as_ref());
                    error!("Evaluation of {} panicked: {}", label, reason);
                    skipped.push(SkippedRecord {
                        creator: label,
                        reason: format!("panicked: {}", reason),
                    });
                }
                Err(e) => {
                    error!("Evaluation task failed: {}", e);
                    skipped.push(SkippedRecord {
                        creator: "<unknown>".to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        evaluated.sort_by_key(|(index, _)| *index);
        let evaluations: Vec<Evaluation> = evaluated.into_iter().map(|(_, e)| e).collect();

        let accepted: Vec<(CreatorProfile, u8)> = evaluations
            .iter()
            .filter(|e| e.score.is_accepted())
            .map(|e| (e.profile.clone(), e.score.score))
            .collect();
        let graph = self.graph.clone();
        let top_k = self.config.snapshot().graph.similarity_top_k;
        let edges_observed =
            match tokio::task::spawn_blocking(move || feed_graph(&graph, &accepted, top_k, started_at))
                .await
            {
                Ok(observed) => observed,
                Err(e) => {
                    error!("Graph update failed: {}", e);
                    0
                }
            };

        let report = BatchReport {
            evaluations,
            skipped,
            edges_observed,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Batch of {}: {} accepted, {} archived, {} excluded, {} skipped, {} edge observations",
            total,
            report.accepted(),
            report.archived(),
            report.excluded(),
            report.skipped.len(),
            report.edges_observed
        );
        report
    }

    /// Rank new candidates reachable from known-good seeds
    pub fn expand(&self, seeds: &[String], limit: usize) -> Vec<Candidate> {
        let config = self.config.snapshot();
        let params = ExpansionParams::from_config(&config.graph).with_limit(limit);
        expand(&self.graph, seeds, &params, Utc::now())
    }

    /// Render an outreach draft for an accepted creator
    pub fn draft_for(
        &self,
        evaluation: &Evaluation,
        campaign: &CampaignContext,
    ) -> Result<OutreachDraft, DraftError> {
        generate_draft(&evaluation.profile, &evaluation.score, campaign, Utc::now())
    }

    /// Put one request through the gate
    pub fn submit(&self, request: &mut ActionRequest) -> Result<Decision, GateError> {
        self.gate.authorize(request)
    }

    /// Put many requests through the gate concurrently.
    ///
    /// Every request comes back, in input order; one whose gate call did not
    /// complete is returned unchanged with [`GateError::Interrupted`].
    pub async fn submit_all(&self, requests: Vec<ActionRequest>) -> Vec<GateOutcome> {
        let pending = requests
            .into_iter()
            .map(|request| {
                let gate = self.gate.clone();
                let mut submitted = request.clone();
                let call = tokio::task::spawn_blocking(move || {
                    let decision = gate.authorize(&mut submitted);
                    (submitted, decision)
                });
                (request, call)
            })
            .collect();
        collect_decisions(pending).await
    }

    pub fn graph_stats(&self) -> GraphStats {
        self.graph.stats()
    }

    pub fn gate_stats(&self) -> GateStats {
        self.gate.stats()
    }
}

/// Record accepted creators and their relationships.
///
/// Tags are extracted once per creator. Similarity and overlap edges are only
/// written between a creator and its `top_k` most similar peers.
fn feed_graph(
    graph: &CreatorGraph,
    accepted: &[(CreatorProfile, u8)],
    top_k: usize,
    seen_at: DateTime<Utc>,
) -> usize {
    for (profile, score) in accepted {
        graph.upsert_node(&profile.handle, Some(*score), seen_at);
    }

    let mut observed = 0;
    for (profile, _) in accepted {
        observed += observe_mentions(graph, profile);
    }

    let keys: Vec<SimilarityKey> = accepted.iter().map(|(p, _)| SimilarityKey::of(p)).collect();
    let mut overlapped: BTreeSet<(&str, &str)> = BTreeSet::new();
    for key in &keys {
        let peers = most_similar(key, &keys, top_k);
        observed += record_similarity(graph, key, &peers);

        for (peer, _) in &peers {
            let pair = if key.handle < peer.handle {
                (key.handle.as_str(), peer.handle.as_str())
            } else {
                (peer.handle.as_str(), key.handle.as_str())
            };
            if overlapped.insert(pair) && record_overlap(graph, key, peer).is_some() {
                observed += 1;
            }
        }
    }
    observed
}

async fn collect_decisions(pending: Vec<(ActionRequest, JoinHandle<GateOutcome>)>) -> Vec<GateOutcome> {
    let (originals, calls): (Vec<ActionRequest>, Vec<JoinHandle<GateOutcome>>) =
        pending.into_iter().unzip();

    futures::future::join_all(calls)
        .await
        .into_iter()
        .zip(originals)
        .map(|(joined, original)| match joined {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Gate call for request {} failed: {}", original.id, e);
                let id = original.id;
                (
                    original,
                    Err(GateError::Interrupted {
                        id,
                        reason: e.to_string(),
                    }),
                )
            }
        })
        .collect()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
