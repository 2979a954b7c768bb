use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{Dfs, EdgeRef, IntoEdgeReferences, Reversed};
use serde::Serialize;
use tracing::warn;

use crate::domain::{EntityKind, GraphKind};
use crate::error::DirectoryError;

/// Graph payload: the record id plus its slot in the owning arena.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub id: String,
    pub kind: EntityKind,
    pub slot: usize,
}

/// One keyed, directed view over catalog records.
///
/// Nodes are addressed by record id. Once frozen every mutation fails with
/// [`DirectoryError::GraphFrozen`].
#[derive(Debug, Clone)]
pub struct RelationGraph {
    kind: GraphKind,
    graph: StableDiGraph<GraphNode, ()>,
    index: HashMap<String, NodeIndex>,
    frozen: bool,
}

impl RelationGraph {
    pub fn new(kind: GraphKind) -> Self {
        Self {
            kind,
            graph: StableDiGraph::new(),
            index: HashMap::new(),
            frozen: false,
        }
    }

    pub fn kind(&self) -> GraphKind {
        self.kind
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).and_then(|idx| self.graph.node_weight(*idx))
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(a), Some(b)) => self.graph.contains_edge(*a, *b),
            _ => false,
        }
    }

    pub fn add_node(&mut self, node: GraphNode) -> Result<(), DirectoryError> {
        self.ensure_mutable()?;
        if self.index.contains_key(&node.id) {
            return Err(DirectoryError::DuplicateId {
                graph: self.kind,
                id: node.id,
            });
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.index.insert(id, idx);
        Ok(())
    }

    /// Adds `from -> to` unless it already exists. Returns whether an edge was added.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<bool, DirectoryError> {
        self.ensure_mutable()?;
        let a = self.resolve(from, from, to)?;
        let b = self.resolve(to, from, to)?;
        if self.graph.contains_edge(a, b) {
            return Ok(false);
        }
        self.graph.add_edge(a, b, ());
        Ok(true)
    }

    pub fn add_edge_pair(&mut self, a: &str, b: &str) -> Result<(), DirectoryError> {
        self.add_edge(a, b)?;
        self.add_edge(b, a)?;
        Ok(())
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) -> Result<bool, DirectoryError> {
        self.ensure_mutable()?;
        let edge = match (self.index.get(from), self.index.get(to)) {
            (Some(a), Some(b)) => self.graph.find_edge(*a, *b),
            _ => None,
        };
        Ok(edge.and_then(|e| self.graph.remove_edge(e)).is_some())
    }

    pub fn remove_node(&mut self, id: &str) -> Result<bool, DirectoryError> {
        self.ensure_mutable()?;
        let Some(idx) = self.index.remove(id) else {
            return Ok(false);
        };
        Ok(self.graph.remove_node(idx).is_some())
    }

    /// Inserts the reverse of every edge that lacks one. Returns how many were added.
    pub fn repair_symmetry(&mut self) -> Result<usize, DirectoryError> {
        self.ensure_mutable()?;
        let missing = self
            .graph
            .edge_references()
            .filter(|edge| !self.graph.contains_edge(edge.target(), edge.source()))
            .map(|edge| (edge.source(), edge.target()))
            .collect::<Vec<_>>();
        for (source, target) in &missing {
            warn!(
                graph = %self.kind,
                from = %self.graph[*source].id,
                to = %self.graph[*target].id,
                "edge has no mirror, adding reverse edge"
            );
            self.graph.add_edge(*target, *source, ());
        }
        Ok(missing.len())
    }

    /// Id of some node on a cycle, if the graph has one.
    pub fn find_cycle(&self) -> Option<String> {
        toposort(&self.graph, None)
            .err()
            .map(|cycle| self.graph[cycle.node_id()].id.clone())
    }

    pub fn neighbors(&self, id: &str, direction: Direction) -> Vec<&GraphNode> {
        let Some(idx) = self.index.get(id) else {
            return Vec::new();
        };
        let mut nodes = self
            .graph
            .neighbors_directed(*idx, direction)
            .map(|n| &self.graph[n])
            .collect::<Vec<_>>();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Every node reachable from `id` following edges in `direction`, excluding `id`.
    pub fn reachable(&self, id: &str, direction: Direction) -> Vec<&GraphNode> {
        let Some(start) = self.index.get(id).copied() else {
            return Vec::new();
        };
        let mut found = Vec::new();
        match direction {
            Direction::Outgoing => {
                let mut dfs = Dfs::new(&self.graph, start);
                while let Some(idx) = dfs.next(&self.graph) {
                    found.push(idx);
                }
            }
            Direction::Incoming => {
                let reversed = Reversed(&self.graph);
                let mut dfs = Dfs::new(reversed, start);
                while let Some(idx) = dfs.next(reversed) {
                    found.push(idx);
                }
            }
        }
        found
            .into_iter()
            .filter(|idx| *idx != start)
            .map(|idx| &self.graph[idx])
            .collect()
    }

    /// The subgraph induced by `ids`; ids missing from the graph are skipped.
    pub fn induced<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Subgraph {
        let members = ids
            .into_iter()
            .filter_map(|id| self.index.get(id).copied())
            .collect::<BTreeSet<_>>();
        let mut nodes = members
            .iter()
            .map(|idx| self.graph[*idx].id.clone())
            .collect::<Vec<_>>();
        nodes.sort();
        let mut edges = self
            .graph
            .edge_references()
            .filter(|edge| members.contains(&edge.source()) && members.contains(&edge.target()))
            .map(|edge| {
                (
                    self.graph[edge.source()].id.clone(),
                    self.graph[edge.target()].id.clone(),
                )
            })
            .collect::<Vec<_>>();
        edges.sort();
        Subgraph { nodes, edges }
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.graph.edge_references().map(|edge| {
            (
                self.graph[edge.source()].id.as_str(),
                self.graph[edge.target()].id.as_str(),
            )
        })
    }

    fn resolve(&self, id: &str, from: &str, to: &str) -> Result<NodeIndex, DirectoryError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| DirectoryError::DanglingReference {
                graph: self.kind,
                from: from.to_string(),
                to: to.to_string(),
            })
    }

    fn ensure_mutable(&self) -> Result<(), DirectoryError> {
        if self.frozen {
            return Err(DirectoryError::GraphFrozen { graph: self.kind });
        }
        Ok(())
    }
}

/// Sorted node ids and edges of an induced subgraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
}

impl Subgraph {
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.binary_search_by(|node| node.as_str().cmp(id)).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.to_string(),
            kind: EntityKind::Collections,
            slot: 0,
        }
    }

    fn graph(kind: GraphKind, ids: &[&str]) -> RelationGraph {
        let mut graph = RelationGraph::new(kind);
        for id in ids {
            graph.add_node(node(id)).unwrap();
        }
        graph
    }

    #[test]
    fn duplicate_node_rejected() {
        let mut g = graph(GraphKind::Entity, &["a"]);
        let err = g.add_node(node("a")).unwrap_err();
        assert_matches!(err, DirectoryError::DuplicateId { graph: GraphKind::Entity, .. });
    }

    #[test]
    fn edge_to_unknown_node_is_dangling() {
        let mut g = graph(GraphKind::Network, &["a"]);
        let err = g.add_edge("a", "zz").unwrap_err();
        assert_matches!(err, DirectoryError::DanglingReference { to, .. } if to == "zz");
    }

    #[test]
    fn repair_adds_missing_mirrors() {
        let mut g = graph(GraphKind::Contact, &["a", "b", "c"]);
        g.add_edge_pair("a", "b").unwrap();
        g.add_edge("a", "c").unwrap();
        assert_eq!(g.repair_symmetry().unwrap(), 1);
        assert!(g.has_edge("c", "a"));
        assert_eq!(g.repair_symmetry().unwrap(), 0);
    }

    #[test]
    fn frozen_graph_rejects_mutation() {
        let mut g = graph(GraphKind::Hierarchy, &["a", "b"]);
        g.add_edge("a", "b").unwrap();
        g.freeze();
        assert_matches!(g.add_node(node("c")), Err(DirectoryError::GraphFrozen { .. }));
        assert_matches!(g.add_edge("b", "a"), Err(DirectoryError::GraphFrozen { .. }));
        assert_matches!(g.remove_edge("a", "b"), Err(DirectoryError::GraphFrozen { .. }));
        assert_matches!(g.remove_node("a"), Err(DirectoryError::GraphFrozen { .. }));
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn cycle_detection() {
        let mut g = graph(GraphKind::Hierarchy, &["a", "b", "c"]);
        g.add_edge("a", "b").unwrap();
        g.add_edge("b", "c").unwrap();
        assert_eq!(g.find_cycle(), None);
        g.add_edge("c", "b").unwrap();
        let id = g.find_cycle().unwrap();
        assert!(id == "b" || id == "c");
    }

    #[test]
    fn reachable_excludes_start() {
        let mut g = graph(GraphKind::Hierarchy, &["a", "b", "c", "d"]);
        g.add_edge("a", "b").unwrap();
        g.add_edge("b", "c").unwrap();
        let down = g
            .reachable("a", Direction::Outgoing)
            .into_iter()
            .map(|n| n.id.as_str())
            .collect::<BTreeSet<_>>();
        assert_eq!(down, BTreeSet::from(["b", "c"]));
        let up = g
            .reachable("c", Direction::Incoming)
            .into_iter()
            .map(|n| n.id.as_str())
            .collect::<BTreeSet<_>>();
        assert_eq!(up, BTreeSet::from(["a", "b"]));
        assert!(g.reachable("d", Direction::Outgoing).is_empty());
    }

    #[test]
    fn induced_subgraph_keeps_inner_edges() {
        let mut g = graph(GraphKind::Hierarchy, &["a", "b", "c"]);
        g.add_edge("a", "b").unwrap();
        g.add_edge("b", "c").unwrap();
        let sub = g.induced(["b", "c", "missing"]);
        assert_eq!(sub.nodes, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(sub.edges, vec![("b".to_string(), "c".to_string())]);
        assert!(sub.contains("c"));
        assert!(!sub.contains("a"));
    }
}
