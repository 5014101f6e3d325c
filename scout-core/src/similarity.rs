//! Similarity Expansion - finding more creators like the ones that worked
//!
//! Starting from seed creators (typically past successful collaborators),
//! every simple path of at most `max_depth` hops contributes
//! `product(step weights) / hops` to the creator at its end. A step between
//! two creators uses the strongest edge among the considered types.
//! Candidates rank by total contribution, then by their strongest final-hop
//! edge, then by id.
//!
//! The module also hosts the deterministic edge builders that feed the graph:
//! tag similarity, @mention links and approximate audience overlap.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::{CreatorGraph, CreatorProfile, EdgeType, GraphConfig, MAX_EXPANSION_DEPTH};

/// Bonus when two creators share a follower bucket
const SAME_BUCKET_BONUS: f64 = 0.1;

/// Blend of tag and graph-neighbor similarity in audience overlap
const OVERLAP_TAG_SHARE: f64 = 0.7;
const OVERLAP_GRAPH_SHARE: f64 = 0.3;

/// Traversal parameters
#[derive(Debug, Clone)]
pub struct ExpansionParams {
    pub max_depth: usize,
    /// Candidates seen more recently than this are not re-surfaced
    pub cooldown: Duration,
    pub edge_types: Vec<EdgeType>,
    /// Maximum candidates returned (0 = unlimited)
    pub limit: usize,
}

impl Default for ExpansionParams {
    fn default() -> Self {
        Self::from_config(&GraphConfig::default())
    }
}

impl ExpansionParams {
    pub fn from_config(config: &GraphConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            cooldown: Duration::hours(config.cooldown_hours),
            edge_types: EdgeType::ALL.to_vec(),
            limit: 0,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_edge_types(mut self, types: &[EdgeType]) -> Self {
        self.edge_types = types.to_vec();
        self
    }
}

/// A creator surfaced by expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub creator_id: String,
    /// Σ path weight / path length
    pub score: f64,
    /// Strongest edge on a final hop into this candidate
    pub best_edge_weight: f64,
    /// Fewest hops from any seed
    pub distance: usize,
    pub path_count: usize,
}

impl Candidate {
    fn new(creator_id: &str, distance: usize) -> Self {
        Self {
            creator_id: creator_id.to_string(),
            score: 0.0,
            best_edge_weight: 0.0,
            distance,
            path_count: 0,
        }
    }
}

/// Rank candidates reachable from `seeds` within the depth bound
pub fn expand(
    graph: &CreatorGraph,
    seeds: &[String],
    params: &ExpansionParams,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let seeds: BTreeSet<&str> = seeds.iter().map(String::as_str).collect();
    let mut found: HashMap<String, Candidate> = HashMap::new();

    for seed in &seeds {
        let mut path = vec![seed.to_string()];
        walk(graph, &seeds, params, &mut path, 1.0, &mut found);
    }

    let cooled_down = |id: &str| {
        graph
            .node(id)
            .and_then(|n| n.last_seen)
            .is_some_and(|seen| now - seen < params.cooldown)
    };

    let mut ranked: Vec<Candidate> = found
        .into_values()
        .filter(|c| !cooled_down(&c.creator_id))
        .collect();
    ranked.sort_by(rank_order);
    if params.limit > 0 {
        ranked.truncate(params.limit);
    }

    debug!(
        "Expansion from {} seeds surfaced {} candidates",
        seeds.len(),
        ranked.len()
    );
    ranked
}

fn walk(
    graph: &CreatorGraph,
    seeds: &BTreeSet<&str>,
    params: &ExpansionParams,
    path: &mut Vec<String>,
    product: f64,
    found: &mut HashMap<String, Candidate>,
) {
    let Some(current) = path.last().cloned() else {
        return;
    };
    let hops = path.len();

    for next in graph.neighbors(&current) {
        if path.contains(&next) {
            continue;
        }
        let Some(weight) = graph.step_weight(&current, &next, &params.edge_types) else {
            continue;
        };
        if weight <= 0.0 {
            continue;
        }
        let reach = product * weight;

        if !seeds.contains(next.as_str()) {
            let candidate = found
                .entry(next.clone())
                .or_insert_with(|| Candidate::new(&next, hops));
            candidate.score += reach / hops as f64;
            candidate.best_edge_weight = candidate.best_edge_weight.max(weight);
            candidate.distance = candidate.distance.min(hops);
            candidate.path_count += 1;
        }

        if hops < params.max_depth.min(MAX_EXPANSION_DEPTH) {
            path.push(next);
            walk(graph, seeds, params, path, reach, found);
            path.pop();
        }
    }
}

fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.best_edge_weight.total_cmp(&a.best_edge_weight))
        .then_with(|| a.creator_id.cmp(&b.creator_id))
}

/// Jaccard similarity of two tag sets
pub fn jaccard<T: Ord>(a: &BTreeSet<T>, b: &BTreeSet<T>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.union(b).count();
    inter as f64 / union.max(1) as f64
}

/// Coarse follower buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowerBucket {
    Unknown,
    Micro,
    MicroPlus,
    Mid,
    Large,
    Mega,
}

pub fn follower_bucket(followers: Option<u64>) -> FollowerBucket {
    match followers {
        None => FollowerBucket::Unknown,
        Some(f) if f < 5_000 => FollowerBucket::Micro,
        Some(f) if f < 20_000 => FollowerBucket::MicroPlus,
        Some(f) if f < 80_000 => FollowerBucket::Mid,
        Some(f) if f < 250_000 => FollowerBucket::Large,
        Some(_) => FollowerBucket::Mega,
    }
}

/// What similarity needs from a profile, extracted once
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityKey {
    pub handle: String,
    pub tags: BTreeSet<String>,
    pub bucket: FollowerBucket,
}

impl SimilarityKey {
    pub fn of(profile: &CreatorProfile) -> Self {
        Self {
            handle: profile.handle.clone(),
            tags: profile.content_tags(),
            bucket: follower_bucket(profile.follower_count),
        }
    }

    /// Tag Jaccard with a small bonus for a shared follower bucket
    pub fn similarity(&self, other: &SimilarityKey) -> f64 {
        let base = jaccard(&self.tags, &other.tags);
        if base <= 0.0 {
            return 0.0;
        }
        let bonus = if self.bucket == other.bucket {
            SAME_BUCKET_BONUS
        } else {
            0.0
        };
        (base + bonus).min(1.0)
    }
}

/// Tag Jaccard with a small bonus for a shared follower bucket
pub fn tag_similarity(a: &CreatorProfile, b: &CreatorProfile) -> f64 {
    SimilarityKey::of(a).similarity(&SimilarityKey::of(b))
}

/// The `top_k` peers most similar to `base`, best first; ties go to the lower handle
pub fn most_similar<'a>(
    base: &SimilarityKey,
    peers: &'a [SimilarityKey],
    top_k: usize,
) -> Vec<(&'a SimilarityKey, f64)> {
    let mut scored: Vec<(&SimilarityKey, f64)> = peers
        .iter()
        .filter(|p| p.handle != base.handle)
        .map(|p| (p, base.similarity(p)))
        .filter(|(_, s)| *s > 0.0)
        .collect();
    scored.sort_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.handle.cmp(&b.handle)));
    scored.truncate(top_k);
    scored
}

/// Record similarity edges from `base` to already ranked peers
pub fn record_similarity(
    graph: &CreatorGraph,
    base: &SimilarityKey,
    peers: &[(&SimilarityKey, f64)],
) -> usize {
    peers
        .iter()
        .filter_map(|(peer, s)| graph.upsert_edge(&base.handle, &peer.handle, EdgeType::Similarity, *s))
        .count()
}

/// Record similarity edges from `base` to its `top_k` most similar candidates
pub fn observe_similarity(
    graph: &CreatorGraph,
    base: &CreatorProfile,
    candidates: &[CreatorProfile],
    top_k: usize,
) -> usize {
    let base = SimilarityKey::of(base);
    let peers: Vec<SimilarityKey> = candidates.iter().map(SimilarityKey::of).collect();
    record_similarity(graph, &base, &most_similar(&base, &peers, top_k))
}

/// Record a mention edge for every @handle in the creator's recent posts
pub fn observe_mentions(graph: &CreatorGraph, profile: &CreatorProfile) -> usize {
    profile
        .mentions()
        .iter()
        .filter_map(|m| graph.upsert_edge(&profile.handle, m, EdgeType::Mention, 1.0))
        .count()
}

/// Approximate audience overlap from shared tags and shared graph neighbors
pub fn overlap_between(graph: &CreatorGraph, a: &SimilarityKey, b: &SimilarityKey) -> f64 {
    let tag_sim = jaccard(&a.tags, &b.tags);

    let social = [EdgeType::Mention, EdgeType::Collaboration];
    let mut na = graph.neighbors_by_type(&a.handle, &social);
    let mut nb = graph.neighbors_by_type(&b.handle, &social);
    na.remove(&b.handle);
    nb.remove(&a.handle);
    let graph_sim = jaccard(&na, &nb);

    (OVERLAP_TAG_SHARE * tag_sim + OVERLAP_GRAPH_SHARE * graph_sim).min(1.0)
}

pub fn audience_overlap(graph: &CreatorGraph, a: &CreatorProfile, b: &CreatorProfile) -> f64 {
    overlap_between(graph, &SimilarityKey::of(a), &SimilarityKey::of(b))
}

/// Record an overlap edge when the overlap is positive
pub fn record_overlap(graph: &CreatorGraph, a: &SimilarityKey, b: &SimilarityKey) -> Option<f64> {
    let overlap = overlap_between(graph, a, b);
    if overlap <= 0.0 {
        return None;
    }
    graph
        .upsert_edge(&a.handle, &b.handle, EdgeType::Overlap, overlap)
        .map(|e| e.weight)
}

pub fn observe_overlap(graph: &CreatorGraph, a: &CreatorProfile, b: &CreatorProfile) -> Option<f64> {
    record_overlap(graph, &SimilarityKey::of(a), &SimilarityKey::of(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.creator_id.as_str()).collect()
    }

    fn seeds(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_expansion_ranks_by_weight_over_distance() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("seed", "near", EdgeType::Similarity, 0.9);
        graph.upsert_edge("seed", "weak", EdgeType::Similarity, 0.2);
        graph.upsert_edge("near", "far", EdgeType::Mention, 0.8);

        let ranked = expand(&graph, &seeds(&["seed"]), &ExpansionParams::default(), Utc::now());
        assert_eq!(ids(&ranked), vec!["near", "far", "weak"]);

        let far = &ranked[1];
        assert_eq!(far.distance, 2);
        assert!((far.score - 0.9 * 0.8 / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_bound_respected() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("seed", "one", EdgeType::Similarity, 1.0);
        graph.upsert_edge("one", "two", EdgeType::Similarity, 1.0);
        graph.upsert_edge("two", "three", EdgeType::Similarity, 1.0);

        let ranked = expand(&graph, &seeds(&["seed"]), &ExpansionParams::default(), Utc::now());
        assert_eq!(ids(&ranked), vec!["one", "two"]);

        let mut deep = ExpansionParams::default();
        deep.max_depth = 3;
        let ranked = expand(&graph, &seeds(&["seed"]), &deep, Utc::now());
        assert_eq!(ids(&ranked), vec!["one", "two", "three"]);
    }

    #[test]
    fn test_depth_is_capped_for_direct_params() {
        let graph = CreatorGraph::new();
        let chain = ["seed", "c1", "c2", "c3", "c4", "c5", "c6"];
        for pair in chain.windows(2) {
            graph.upsert_edge(pair[0], pair[1], EdgeType::Similarity, 1.0);
        }

        let mut deep = ExpansionParams::default();
        deep.max_depth = 50;
        let ranked = expand(&graph, &seeds(&["seed"]), &deep, Utc::now());
        assert_eq!(ranked.len(), MAX_EXPANSION_DEPTH);
        assert!(ranked.iter().all(|c| c.distance <= MAX_EXPANSION_DEPTH));
    }

    #[test]
    fn test_multiple_paths_accumulate() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("s1", "hub", EdgeType::Similarity, 0.5);
        graph.upsert_edge("s2", "hub", EdgeType::Similarity, 0.5);
        graph.upsert_edge("s1", "solo", EdgeType::Similarity, 0.7);

        let ranked = expand(&graph, &seeds(&["s1", "s2"]), &ExpansionParams::default(), Utc::now());
        assert_eq!(ranked[0].creator_id, "hub");
        assert!((ranked[0].score - 1.0).abs() < 1e-12);
        assert!(ranked.iter().all(|c| c.creator_id != "s1" && c.creator_id != "s2"));
    }

    #[test]
    fn test_ties_break_on_edge_weight_then_id() {
        let graph = CreatorGraph::new();
        // "bee": one direct edge 0.5 -> score 0.5
        graph.upsert_edge("seed", "bee", EdgeType::Similarity, 0.5);
        // "ant": two-hop path 1.0 * 1.0 / 2 -> score 0.5, final hop 1.0
        graph.upsert_edge("seed", "mid", EdgeType::Similarity, 1.0);
        graph.upsert_edge("mid", "ant", EdgeType::Similarity, 1.0);
        // "cat" and "cab": identical direct edges
        graph.upsert_edge("seed", "cat", EdgeType::Similarity, 0.3);
        graph.upsert_edge("seed", "cab", EdgeType::Similarity, 0.3);

        let ranked = expand(&graph, &seeds(&["seed"]), &ExpansionParams::default(), Utc::now());
        assert_eq!(ids(&ranked), vec!["mid", "ant", "bee", "cab", "cat"]);
    }

    #[test]
    fn test_cooldown_excludes_recently_seen() {
        let graph = CreatorGraph::new();
        let now = Utc::now();
        graph.upsert_edge("seed", "fresh", EdgeType::Similarity, 0.9);
        graph.upsert_edge("seed", "stale", EdgeType::Similarity, 0.9);
        graph.upsert_edge("seed", "recent", EdgeType::Similarity, 0.9);
        graph.upsert_node("stale", Some(70), now - Duration::days(10));
        graph.upsert_node("recent", Some(70), now - Duration::hours(2));

        let ranked = expand(&graph, &seeds(&["seed"]), &ExpansionParams::default(), now);
        assert_eq!(ids(&ranked), vec!["fresh", "stale"]);
    }

    #[test]
    fn test_edge_type_filter_and_limit() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("seed", "friend", EdgeType::Mention, 1.0);
        graph.upsert_edge("seed", "twin", EdgeType::Similarity, 0.6);
        graph.upsert_edge("seed", "cousin", EdgeType::Similarity, 0.4);

        let params = ExpansionParams::default()
            .with_edge_types(&[EdgeType::Similarity])
            .with_limit(1);
        let ranked = expand(&graph, &seeds(&["seed"]), &params, Utc::now());
        assert_eq!(ids(&ranked), vec!["twin"]);
    }

    #[test]
    fn test_tag_similarity_with_bucket_bonus() {
        let a = CreatorProfile::new("ana")
            .with_followers(10_000)
            .with_post("#shea #herbal #wellness");
        let b = CreatorProfile::new("tia")
            .with_followers(12_000)
            .with_post("#shea #herbal");
        let c = CreatorProfile::new("zoe")
            .with_followers(60_000)
            .with_post("#shea #herbal");
        let d = CreatorProfile::new("max").with_post("#cars");

        assert!((tag_similarity(&a, &b) - (2.0 / 3.0 + 0.1)).abs() < 1e-12);
        assert!((tag_similarity(&a, &c) - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(tag_similarity(&a, &d), 0.0);
    }

    #[test]
    fn test_observe_similarity_and_mentions() {
        let graph = CreatorGraph::new();
        let base = CreatorProfile::new("ana")
            .with_post("#shea #herbal with @tia and @zoe");
        let others = vec![
            CreatorProfile::new("tia").with_post("#shea"),
            CreatorProfile::new("zoe").with_post("#herbal #shea"),
            CreatorProfile::new("max").with_post("#cars"),
        ];

        assert_eq!(observe_similarity(&graph, &base, &others, 1), 1);
        assert!(graph.edge("ana", "zoe", EdgeType::Similarity).is_some());
        assert!(graph.edge("ana", "tia", EdgeType::Similarity).is_none());

        assert_eq!(observe_mentions(&graph, &base), 2);
        assert_eq!(graph.edge("tia", "ana", EdgeType::Mention).unwrap().weight, 1.0);
    }

    #[test]
    fn test_most_similar_caps_and_orders_peers() {
        let keys: Vec<SimilarityKey> = ["ana", "bea", "cleo", "dora"]
            .iter()
            .map(|h| SimilarityKey::of(&CreatorProfile::new(h).with_post("#shea #selfcare")))
            .collect();

        let peers = most_similar(&keys[2], &keys, 2);
        let handles: Vec<&str> = peers.iter().map(|(k, _)| k.handle.as_str()).collect();
        assert_eq!(handles, vec!["ana", "bea"]);
        assert!(most_similar(&keys[0], &keys, 0).is_empty());
    }

    #[test]
    fn test_audience_overlap_blends_tags_and_neighbors() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("ana", "kim", EdgeType::Mention, 1.0);
        graph.upsert_edge("tia", "kim", EdgeType::Mention, 1.0);
        graph.upsert_edge("tia", "lee", EdgeType::Collaboration, 1.0);

        let a = CreatorProfile::new("ana").with_post("#shea");
        let b = CreatorProfile::new("tia").with_post("#shea");

        // tags identical (1.0), neighbors {kim} vs {kim, lee} (0.5)
        let overlap = observe_overlap(&graph, &a, &b).unwrap();
        assert!((overlap - (0.7 + 0.3 * 0.5)).abs() < 1e-12);
        assert!(graph.edge("ana", "tia", EdgeType::Overlap).is_some());
    }
}
