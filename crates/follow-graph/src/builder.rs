//! Graph construction
//!
//! The builder models relationships *within* the follow set only: an entry in
//! the common-followings map contributes an edge when both endpoints are
//! themselves in the follow list.

use crate::{Error, Mid, Result, UserIdentity};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Degree-to-size scaling for rendered nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeParams {
    pub size_multiplier: f64,
    pub max_size: f64,
}

impl Default for SizeParams {
    fn default() -> Self {
        Self {
            size_multiplier: 5.0,
            max_size: 30.0,
        }
    }
}

impl SizeParams {
    /// Create validated size parameters
    pub fn new(size_multiplier: f64, max_size: f64) -> Result<Self> {
        let params = Self {
            size_multiplier,
            max_size,
        };
        params.validate()?;
        Ok(params)
    }

    /// Both values must be finite and strictly positive
    pub fn validate(&self) -> Result<()> {
        if !self.size_multiplier.is_finite() || self.size_multiplier <= 0.0 {
            return Err(Error::InvalidSizeParams(format!(
                "size_multiplier must be positive, got {}",
                self.size_multiplier
            )));
        }
        if !self.max_size.is_finite() || self.max_size <= 0.0 {
            return Err(Error::InvalidSizeParams(format!(
                "max_size must be positive, got {}",
                self.max_size
            )));
        }
        Ok(())
    }

    /// `min(ln(degree + 1) * size_multiplier, max_size)`
    pub fn render_size(&self, degree: usize) -> f64 {
        ((degree as f64 + 1.0).ln() * self.size_multiplier).min(self.max_size)
    }
}

/// Options for a single build
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildParams {
    pub size: SizeParams,
    /// Store every edge as (target, source) instead of (source, target)
    pub swap_link_direction: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: Mid,
    pub label: String,
    pub avatar: Option<String>,
    #[serde(rename = "tier")]
    pub member: bool,
    pub degree: usize,
    pub render_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: Mid,
    pub target: Mid,
    pub bidirectional: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    /// Distinct users in the follow list, before the isolation filter
    pub total_nodes: usize,
    /// Users with at least one incident edge
    pub connected_nodes: usize,
    pub edge_count: usize,
    pub bidirectional_edge_count: usize,
}

/// Output of [`build`], consumed by the renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub stats: GraphStats,
}

impl GraphData {
    pub fn node(&self, id: Mid) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Look up the stored edge for an ordered pair
    pub fn edge(&self, source: Mid, target: Mid) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.source == source && e.target == target)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Build the visualization graph
///
/// Nodes keep the position of their first appearance in `follow_list`; a
/// later record for the same id replaces the earlier one's data. Degree is
/// computed before `swap_link_direction` is applied, so it is the same
/// either way.
pub fn build(
    follow_list: &[UserIdentity],
    common: &HashMap<Mid, Vec<Mid>>,
    params: &BuildParams,
) -> GraphData {
    let mut users: Vec<&UserIdentity> = Vec::with_capacity(follow_list.len());
    let mut index: HashMap<Mid, usize> = HashMap::with_capacity(follow_list.len());

    for user in follow_list {
        match index.get(&user.mid) {
            Some(&i) => users[i] = user,
            None => {
                index.insert(user.mid, users.len());
                users.push(user);
            }
        }
    }

    let mut seen: HashSet<(Mid, Mid)> = HashSet::new();
    let mut pairs: Vec<(Mid, Mid)> = Vec::new();

    for user in &users {
        let Some(targets) = common.get(&user.mid) else {
            continue;
        };
        for &target in targets {
            // Self pairs carry no relationship
            if target == user.mid || !index.contains_key(&target) {
                continue;
            }
            if seen.insert((user.mid, target)) {
                pairs.push((user.mid, target));
            }
        }
    }

    let mut degree: HashMap<Mid, usize> = HashMap::new();
    let mut bidirectional_edge_count = 0;

    let edges: Vec<GraphEdge> = pairs
        .iter()
        .map(|&(a, b)| {
            let bidirectional = seen.contains(&(b, a));
            if bidirectional {
                bidirectional_edge_count += 1;
            }
            *degree.entry(a).or_insert(0) += 1;
            *degree.entry(b).or_insert(0) += 1;

            let (source, target) = if params.swap_link_direction {
                (b, a)
            } else {
                (a, b)
            };
            GraphEdge {
                source,
                target,
                bidirectional,
            }
        })
        .collect();

    let total_nodes = users.len();
    let nodes: Vec<GraphNode> = users
        .into_iter()
        .filter_map(|user| {
            let d = degree.get(&user.mid).copied().unwrap_or(0);
            if d == 0 {
                return None;
            }
            Some(GraphNode {
                id: user.mid,
                label: user.name.clone(),
                avatar: user.avatar.clone(),
                member: user.member,
                degree: d,
                render_size: params.size.render_size(d),
            })
        })
        .collect();

    let stats = GraphStats {
        total_nodes,
        connected_nodes: nodes.len(),
        edge_count: edges.len(),
        bidirectional_edge_count,
    };

    GraphData {
        nodes,
        edges,
        stats,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(mid: u64) -> UserIdentity {
        UserIdentity::new(mid, format!("user-{}", mid))
    }

    fn relations(entries: &[(u64, &[u64])]) -> HashMap<Mid, Vec<Mid>> {
        entries
            .iter()
            .map(|(k, v)| (Mid::new(*k), v.iter().map(|m| Mid::new(*m)).collect()))
            .collect()
    }

    #[test]
    fn test_mutual_detection_scenario() {
        // A=1, B=2, C=3
        let follows = vec![user(1), user(2), user(3)];
        let common = relations(&[(1, &[2]), (2, &[1, 3]), (3, &[])]);

        let graph = build(&follows, &common, &BuildParams::default());

        let ab = graph.edge(Mid::new(1), Mid::new(2)).unwrap();
        assert!(ab.bidirectional);
        let ba = graph.edge(Mid::new(2), Mid::new(1)).unwrap();
        assert!(ba.bidirectional);
        let bc = graph.edge(Mid::new(2), Mid::new(3)).unwrap();
        assert!(!bc.bidirectional);
        assert!(graph.edge(Mid::new(3), Mid::new(2)).is_none());

        assert_eq!(graph.node(Mid::new(3)).unwrap().degree, 1);
        assert_eq!(graph.stats.connected_nodes, 3);
        assert_eq!(graph.stats.total_nodes, 3);
        assert_eq!(graph.stats.edge_count, 3);
        assert_eq!(graph.stats.bidirectional_edge_count, 2);
    }

    #[test]
    fn test_edge_dedup() {
        let follows = vec![user(1), user(2)];
        let common = relations(&[(1, &[2, 2, 2]), (2, &[])]);

        let graph = build(&follows, &common, &BuildParams::default());

        assert_eq!(graph.edges.len(), 1);
        let mut keys = HashSet::new();
        for e in &graph.edges {
            assert!(keys.insert((e.source, e.target)));
        }
    }

    #[test]
    fn test_duplicate_follow_entries_last_write_wins() {
        let follows = vec![
            user(1),
            user(2),
            UserIdentity::new(1u64, "renamed").with_member(true),
        ];
        let common = relations(&[(1, &[2]), (2, &[1])]);

        let graph = build(&follows, &common, &BuildParams::default());

        assert_eq!(graph.stats.total_nodes, 2);
        assert_eq!(graph.nodes[0].id, Mid::new(1));
        assert_eq!(graph.nodes[0].label, "renamed");
        assert!(graph.nodes[0].member);
    }

    #[test]
    fn test_relations_outside_follow_set_are_ignored() {
        let follows = vec![user(1), user(2)];
        let common = relations(&[(1, &[2, 99]), (99, &[1]), (2, &[2])]);

        let graph = build(&follows, &common, &BuildParams::default());

        assert_eq!(graph.edges.len(), 1);
        assert_eq!(graph.edges[0].source, Mid::new(1));
        assert_eq!(graph.edges[0].target, Mid::new(2));
        assert!(!graph.edges[0].bidirectional);
    }

    #[test]
    fn test_bidirectional_symmetry_and_degree_sum() {
        let follows: Vec<_> = (1..=6).map(user).collect();
        let common = relations(&[
            (1, &[2, 3, 4]),
            (2, &[1, 5]),
            (3, &[1]),
            (4, &[]),
            (5, &[2, 1]),
            (6, &[]),
        ]);

        let graph = build(&follows, &common, &BuildParams::default());

        for e in graph.edges.iter().filter(|e| e.bidirectional) {
            let reverse = graph.edge(e.target, e.source).unwrap();
            assert!(reverse.bidirectional);
        }

        let degree_sum: usize = graph.nodes.iter().map(|n| n.degree).sum();
        assert_eq!(degree_sum, 2 * graph.stats.edge_count);
    }

    #[test]
    fn test_isolated_nodes_filtered() {
        let follows = vec![user(1), user(2), user(3)];
        let common = relations(&[(1, &[2])]);

        let graph = build(&follows, &common, &BuildParams::default());

        assert!(graph.node(Mid::new(3)).is_none());
        assert!(graph.nodes.iter().all(|n| n.degree > 0));
        assert_eq!(graph.stats.total_nodes, 3);
        assert_eq!(graph.stats.connected_nodes, 2);
    }

    #[test]
    fn test_swap_direction_keeps_tags_and_degree() {
        let follows = vec![user(1), user(2), user(3)];
        let common = relations(&[(1, &[2]), (2, &[1, 3])]);

        let plain = build(&follows, &common, &BuildParams::default());
        let swapped = build(
            &follows,
            &common,
            &BuildParams {
                swap_link_direction: true,
                ..Default::default()
            },
        );

        let bc = swapped.edge(Mid::new(3), Mid::new(2)).unwrap();
        assert!(!bc.bidirectional);
        assert!(swapped.edge(Mid::new(2), Mid::new(3)).is_none());

        for node in &plain.nodes {
            assert_eq!(swapped.node(node.id).unwrap().degree, node.degree);
        }
        assert_eq!(plain.stats, swapped.stats);
    }

    #[test]
    fn test_render_size_is_capped() {
        let size = SizeParams::new(10.0, 12.0).unwrap();
        assert_eq!(size.render_size(0), 0.0);
        assert!((size.render_size(1) - 2f64.ln() * 10.0).abs() < 1e-9);
        assert_eq!(size.render_size(1000), 12.0);
    }

    #[test]
    fn test_invalid_size_params() {
        assert!(SizeParams::new(0.0, 10.0).is_err());
        assert!(SizeParams::new(1.0, f64::NAN).is_err());
        assert!(SizeParams::new(-2.0, 10.0).is_err());
    }

    #[test]
    fn test_empty_input() {
        let graph = build(&[], &HashMap::new(), &BuildParams::default());
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
        assert_eq!(graph.stats, GraphStats::default());
    }

    #[test]
    fn test_json_field_names() {
        let follows = vec![user(1), user(2)];
        let common = relations(&[(1, &[2])]);
        let graph = build(&follows, &common, &BuildParams::default());

        let json = graph.to_json().unwrap();
        assert!(json.contains("\"renderSize\""));
        assert!(json.contains("\"connectedNodes\""));
        assert!(json.contains("\"tier\""));
    }
}
