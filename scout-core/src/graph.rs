//! Creator Graph - creators as nodes, typed weighted relationships as edges
//!
//! Nodes and edges live in indexes keyed by stable creator ids; nothing holds
//! a reference to anything else, so cycles in the relationship structure
//! never become cycles in ownership.
//!
//! Re-observing an edge never duplicates it. The stored weight moves toward
//! the observation by an exponential moving average:
//! `new = α × observed + (1 − α) × old`. Each edge key is updated under its
//! map entry lock, so concurrent observations of the same key are applied
//! one after another while disjoint keys proceed in parallel.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

use crate::{DEFAULT_EMA_ALPHA, MAX_WEIGHT, MIN_WEIGHT};

/// Relationship kinds between creators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Similarity,
    Overlap,
    Mention,
    Collaboration,
}

impl EdgeType {
    pub const ALL: [EdgeType; 4] = [
        EdgeType::Similarity,
        EdgeType::Overlap,
        EdgeType::Mention,
        EdgeType::Collaboration,
    ];
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EdgeType::Similarity => "similarity",
            EdgeType::Overlap => "overlap",
            EdgeType::Mention => "mention",
            EdgeType::Collaboration => "collaboration",
        };
        f.write_str(name)
    }
}

/// Undirected edge identity: `(a, b, t)` and `(b, a, t)` are the same key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    low: String,
    high: String,
    edge_type: EdgeType,
}

impl EdgeKey {
    pub fn new(a: &str, b: &str, edge_type: EdgeType) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low: low.to_string(),
            high: high.to_string(),
            edge_type,
        }
    }

    /// The endpoint opposite `id`, if `id` is an endpoint
    pub fn other(&self, id: &str) -> Option<&str> {
        if self.low == id {
            Some(&self.high)
        } else if self.high == id {
            Some(&self.low)
        } else {
            None
        }
    }
}

/// A creator in the graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorGraphNode {
    pub creator_id: String,
    /// Latest score, denormalized for traversal-time display
    pub score: Option<u8>,
    /// When the creator was last discovered; `None` for nodes known only via edges
    pub last_seen: Option<DateTime<Utc>>,
}

impl CreatorGraphNode {
    fn referenced(creator_id: &str) -> Self {
        Self {
            creator_id: creator_id.to_string(),
            score: None,
            last_seen: None,
        }
    }
}

/// A weighted, typed relationship. Endpoints are stored in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatorEdge {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    /// 0.0 - 1.0
    pub weight: f64,
    /// Number of observations merged into this edge
    pub observations: u32,
    pub last_seen: DateTime<Utc>,
}

impl CreatorEdge {
    pub fn key(&self) -> EdgeKey {
        EdgeKey::new(&self.source_id, &self.target_id, self.edge_type)
    }
}

/// Shared creator graph
#[derive(Debug)]
pub struct CreatorGraph {
    nodes: DashMap<String, CreatorGraphNode>,
    edges: DashMap<EdgeKey, CreatorEdge>,
    /// creator id -> ids of every creator sharing at least one edge with it
    adjacency: DashMap<String, BTreeSet<String>>,
    alpha: RwLock<f64>,
}

impl CreatorGraph {
    /// Create an empty graph with the default smoothing factor
    pub fn new() -> Self {
        Self::with_alpha(DEFAULT_EMA_ALPHA)
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            nodes: DashMap::new(),
            edges: DashMap::new(),
            adjacency: DashMap::new(),
            alpha: RwLock::new(alpha.clamp(f64::EPSILON, 1.0)),
        }
    }

    /// Current smoothing factor
    pub fn alpha(&self) -> f64 {
        *self.alpha.read()
    }

    /// Change the smoothing factor for subsequent upserts
    pub fn set_alpha(&self, alpha: f64) {
        if alpha.is_finite() {
            *self.alpha.write() = alpha.clamp(f64::EPSILON, 1.0);
        }
    }

    /// Insert or refresh a creator. Existing edges are kept.
    pub fn upsert_node(
        &self,
        creator_id: &str,
        score: Option<u8>,
        seen_at: DateTime<Utc>,
    ) -> CreatorGraphNode {
        let mut node = self
            .nodes
            .entry(creator_id.to_string())
            .or_insert_with(|| CreatorGraphNode::referenced(creator_id));
        if score.is_some() {
            node.score = score;
        }
        node.last_seen = Some(seen_at);
        node.clone()
    }

    /// Observe an edge now
    pub fn upsert_edge(
        &self,
        source_id: &str,
        target_id: &str,
        edge_type: EdgeType,
        observed: f64,
    ) -> Option<CreatorEdge> {
        self.upsert_edge_at(source_id, target_id, edge_type, observed, Utc::now())
    }

    /// Observe an edge at a given time.
    ///
    /// Returns the merged edge, or `None` when the observation is ignored
    /// (self-edge or non-finite weight). Conflicting observations are
    /// absorbed by the moving average; this never fails.
    pub fn upsert_edge_at(
        &self,
        source_id: &str,
        target_id: &str,
        edge_type: EdgeType,
        observed: f64,
        seen_at: DateTime<Utc>,
    ) -> Option<CreatorEdge> {
        if source_id == target_id {
            return None;
        }
        if !observed.is_finite() {
            warn!(
                "Dropping non-finite {} observation between {} and {}",
                edge_type, source_id, target_id
            );
            return None;
        }
        let observed = observed.clamp(MIN_WEIGHT, MAX_WEIGHT);
        let alpha = self.alpha();
        let key = EdgeKey::new(source_id, target_id, edge_type);

        // The entry guard is released before adjacency is touched.
        let (edge, created) = match self.edges.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let edge = occupied.get_mut();
                edge.weight = (alpha * observed + (1.0 - alpha) * edge.weight)
                    .clamp(MIN_WEIGHT, MAX_WEIGHT);
                edge.observations = edge.observations.saturating_add(1);
                if seen_at > edge.last_seen {
                    edge.last_seen = seen_at;
                }
                (edge.clone(), false)
            }
            Entry::Vacant(vacant) => {
                let edge = CreatorEdge {
                    source_id: key.low.clone(),
                    target_id: key.high.clone(),
                    edge_type,
                    weight: observed,
                    observations: 1,
                    last_seen: seen_at,
                };
                vacant.insert(edge.clone());
                (edge, true)
            }
        };

        if created {
            self.link(&key.low, &key.high);
            self.link(&key.high, &key.low);
            debug!(
                "New {} edge {} <-> {} ({:.3})",
                edge_type, key.low, key.high, edge.weight
            );
        }

        Some(edge)
    }

    fn link(&self, from: &str, to: &str) {
        self.nodes
            .entry(from.to_string())
            .or_insert_with(|| CreatorGraphNode::referenced(from));
        self.adjacency
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn node(&self, creator_id: &str) -> Option<CreatorGraphNode> {
        self.nodes.get(creator_id).map(|n| n.clone())
    }

    pub fn contains(&self, creator_id: &str) -> bool {
        self.nodes.contains_key(creator_id)
    }

    /// Get an edge in either direction
    pub fn edge(&self, a: &str, b: &str, edge_type: EdgeType) -> Option<CreatorEdge> {
        self.edges
            .get(&EdgeKey::new(a, b, edge_type))
            .map(|e| e.clone())
    }

    /// Neighbors of a creator, sorted
    pub fn neighbors(&self, creator_id: &str) -> Vec<String> {
        self.adjacency
            .get(creator_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Neighbors reachable through one of the given edge types, sorted
    pub fn neighbors_by_type(&self, creator_id: &str, types: &[EdgeType]) -> BTreeSet<String> {
        self.neighbors(creator_id)
            .into_iter()
            .filter(|n| types.iter().any(|t| self.edges.contains_key(&EdgeKey::new(creator_id, n, *t))))
            .collect()
    }

    /// Strongest edge between two creators among the given types
    pub fn step_weight(&self, a: &str, b: &str, types: &[EdgeType]) -> Option<f64> {
        types
            .iter()
            .filter_map(|t| self.edges.get(&EdgeKey::new(a, b, *t)).map(|e| e.weight))
            .reduce(f64::max)
    }

    /// All edges touching a creator, ordered by key
    pub fn edges_of(&self, creator_id: &str) -> Vec<CreatorEdge> {
        let mut edges: Vec<_> = self
            .neighbors(creator_id)
            .iter()
            .flat_map(|n| EdgeType::ALL.map(|t| self.edge(creator_id, n, t)))
            .flatten()
            .collect();
        edges.sort_by_key(CreatorEdge::key);
        edges
    }

    /// Every edge, ordered by key (for export to visualization)
    pub fn all_edges(&self) -> Vec<CreatorEdge> {
        let mut edges: Vec<_> = self.edges.iter().map(|e| e.value().clone()).collect();
        edges.sort_by_key(CreatorEdge::key);
        edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get graph statistics
    pub fn stats(&self) -> GraphStats {
        let mut edges_by_type = BTreeMap::new();
        let mut total_weight = 0.0;
        for edge in self.edges.iter() {
            *edges_by_type.entry(edge.edge_type).or_insert(0) += 1;
            total_weight += edge.weight;
        }
        let edge_count = self.edges.len();

        GraphStats {
            node_count: self.nodes.len(),
            edge_count,
            edges_by_type,
            avg_weight: if edge_count == 0 {
                0.0
            } else {
                total_weight / edge_count as f64
            },
        }
    }

    /// Clear all nodes and edges (for testing)
    pub fn clear(&self) {
        self.edges.clear();
        self.adjacency.clear();
        self.nodes.clear();
    }
}

impl Default for CreatorGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// Graph statistics
#[derive(Debug, Clone, Serialize)]
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub edges_by_type: BTreeMap<EdgeType, usize>,
    pub avg_weight: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_edge_upsert_merges_by_ema() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("ana", "tia", EdgeType::Similarity, 0.8);
        let merged = graph.upsert_edge("ana", "tia", EdgeType::Similarity, 0.2).unwrap();

        assert_eq!(graph.edge_count(), 1);
        assert!((merged.weight - (0.3 * 0.2 + 0.7 * 0.8)).abs() < 1e-12);
        assert_eq!(merged.observations, 2);
    }

    #[test]
    fn test_edge_identity_is_undirected() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("ana", "tia", EdgeType::Mention, 1.0);
        graph.upsert_edge("tia", "ana", EdgeType::Mention, 0.5);

        assert_eq!(graph.edge_count(), 1);
        let edge = graph.edge("tia", "ana", EdgeType::Mention).unwrap();
        assert_eq!(edge.source_id, "ana");
        assert_eq!(edge.target_id, "tia");
        assert!((edge.weight - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_types_are_distinct_edges() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("ana", "tia", EdgeType::Mention, 1.0);
        graph.upsert_edge("ana", "tia", EdgeType::Similarity, 0.4);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(
            graph.step_weight("ana", "tia", &EdgeType::ALL),
            Some(1.0)
        );
        assert_eq!(
            graph.step_weight("ana", "tia", &[EdgeType::Similarity]),
            Some(0.4)
        );
        assert_eq!(graph.neighbors("ana"), vec!["tia".to_string()]);
    }

    #[test]
    fn test_self_edge_and_bad_weight_ignored() {
        let graph = CreatorGraph::new();
        assert!(graph.upsert_edge("ana", "ana", EdgeType::Mention, 1.0).is_none());
        assert!(graph.upsert_edge("ana", "tia", EdgeType::Mention, f64::NAN).is_none());
        assert_eq!(graph.edge_count(), 0);

        let clamped = graph.upsert_edge("ana", "tia", EdgeType::Mention, 4.0).unwrap();
        assert_eq!(clamped.weight, 1.0);
    }

    #[test]
    fn test_node_upsert_keeps_edges() {
        let graph = CreatorGraph::new();
        let t0 = Utc::now();
        graph.upsert_edge("ana", "tia", EdgeType::Similarity, 0.6);

        let referenced = graph.node("tia").unwrap();
        assert_eq!(referenced.last_seen, None);

        graph.upsert_node("tia", Some(71), t0);
        let later = t0 + chrono::Duration::hours(5);
        let node = graph.upsert_node("tia", Some(80), later);

        assert_eq!(node.score, Some(80));
        assert_eq!(node.last_seen, Some(later));
        assert_eq!(graph.edges_of("tia").len(), 1);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_concurrent_upserts_keep_single_edge() {
        let graph = Arc::new(CreatorGraph::with_alpha(0.5));
        std::thread::scope(|scope| {
            for i in 0..8 {
                let graph = graph.clone();
                scope.spawn(move || {
                    for _ in 0..50 {
                        graph.upsert_edge("ana", "tia", EdgeType::Overlap, 0.5);
                        graph.upsert_edge("ana", &format!("peer{}", i), EdgeType::Overlap, 0.5);
                    }
                });
            }
        });

        let edge = graph.edge("ana", "tia", EdgeType::Overlap).unwrap();
        assert_eq!(edge.observations, 400);
        assert!((edge.weight - 0.5).abs() < 1e-12);
        assert_eq!(graph.edge_count(), 9);
        assert_eq!(graph.neighbors("ana").len(), 9);
    }

    #[test]
    fn test_graph_stats() {
        let graph = CreatorGraph::new();
        graph.upsert_edge("a1", "b1", EdgeType::Mention, 1.0);
        graph.upsert_edge("a1", "c1", EdgeType::Similarity, 0.5);

        let stats = graph.stats();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 2);
        assert_eq!(stats.edges_by_type.get(&EdgeType::Mention), Some(&1));
        assert!((stats.avg_weight - 0.75).abs() < 1e-12);
    }
}
