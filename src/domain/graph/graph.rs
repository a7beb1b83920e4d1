use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::api::graph_dto::{GraphDto, GraphNodeDto};
use crate::domain::graph::node::{GraphNode, NodeKey};
use crate::domain::operation::Operation;
use crate::domain::trace::ObservedTiming;
use crate::error::{Error, Result};

/// The dependency DAG of one trace.
///
/// Nodes are stored in ascending `HitIndex` order; a node's position in
/// [`Graph::nodes`] is what the scheduler works with. Every dependency of a
/// node has a strictly smaller `HitIndex`, which makes the graph acyclic by
/// construction.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<GraphNode>,

    /// Positions of each node's prerequisites.
    dependency_positions: Vec<Vec<usize>>,

    /// Positions of each node's direct dependents.
    dependents: Vec<Vec<usize>>,

    /// Positions of nodes without prerequisites.
    sources: Vec<usize>,
}

impl Graph {
    /// Validates the nodes and builds the adjacency lists.
    ///
    /// Fails with [`Error::MalformedTraceError`] when `HitIndex` values are not
    /// strictly ascending, or a dependency is unknown, forward or self-referencing.
    pub fn new(nodes: Vec<GraphNode>) -> Result<Self> {
        let mut positions: HashMap<NodeKey, usize> = HashMap::with_capacity(nodes.len());

        for (position, node) in nodes.iter().enumerate() {
            if let Some(previous) = position.checked_sub(1).map(|p| &nodes[p]) {
                if node.hit_index <= previous.hit_index {
                    let reason = if node == previous {
                        "duplicate node (same HitIndex and operation)".to_string()
                    } else {
                        format!("HitIndex not ascending (previous node has HitIndex {})", previous.hit_index)
                    };
                    return Err(Error::malformed(node.hit_index, node.operation.kind(), node.operation.address(), reason));
                }
            }
            positions.insert(node.key(), position);
        }

        let mut dependency_positions = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];
        let mut sources = Vec::new();

        for (position, node) in nodes.iter().enumerate() {
            for dependency in &node.dependencies {
                if dependency.hit_index >= node.hit_index {
                    return Err(Error::malformed(
                        node.hit_index,
                        node.operation.kind(),
                        node.operation.address(),
                        format!("depends on {} which is not strictly earlier", dependency),
                    ));
                }
                let Some(&dependency_position) = positions.get(dependency) else {
                    return Err(Error::malformed(
                        node.hit_index,
                        node.operation.kind(),
                        node.operation.address(),
                        format!("depends on unknown node {}", dependency),
                    ));
                };
                dependency_positions[position].push(dependency_position);
                dependents[dependency_position].push(position);
            }

            if node.is_root() {
                sources.push(position);
            }
        }

        Ok(Graph { nodes, dependency_positions, dependents, sources })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Looks a node up by `HitIndex` alone.
    pub fn by_hit_index(&self, hit_index: usize) -> Option<&GraphNode> {
        self.nodes.binary_search_by_key(&hit_index, |n| n.hit_index).ok().map(|p| &self.nodes[p])
    }

    pub fn dependency_positions(&self, position: usize) -> &[usize] {
        &self.dependency_positions[position]
    }

    pub fn dependents(&self, position: usize) -> &[usize] {
        &self.dependents[position]
    }

    pub fn sources(&self) -> &[usize] {
        &self.sources
    }

    pub fn edge_count(&self) -> usize {
        self.dependency_positions.iter().map(Vec::len).sum()
    }

    /// Kahn's algorithm over the dependency edges. Always `true` for a validated graph.
    pub fn is_acyclic(&self) -> bool {
        let mut remaining: Vec<usize> = self.dependency_positions.iter().map(Vec::len).collect();
        let mut queue: VecDeque<usize> = self.sources.iter().copied().collect();
        let mut visited = 0;

        while let Some(position) = queue.pop_front() {
            visited += 1;
            for &dependent in &self.dependents[position] {
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    queue.push_back(dependent);
                }
            }
        }

        visited == self.nodes.len()
    }

    /// Longest-path depth of every node (roots are level 0).
    pub fn levels(&self) -> Vec<usize> {
        let mut levels = vec![0; self.nodes.len()];
        // Dependencies always sit at smaller positions, so one forward pass suffices.
        for position in 0..self.nodes.len() {
            levels[position] = self.dependency_positions[position].iter().map(|&d| levels[d] + 1).max().unwrap_or(0);
        }
        levels
    }

    /// Peak natural concurrency of the recorded workload.
    ///
    /// Uses the overlap of the recorded call intervals when every node carries
    /// timing, otherwise the widest dependency level. With `respect_dependencies`
    /// off, every node is its own root and the level width is the node count.
    pub fn observed_peak_concurrency(&self, respect_dependencies: bool) -> usize {
        if self.nodes.is_empty() {
            return 1;
        }

        let timings: Option<Vec<ObservedTiming>> = self.nodes.iter().map(|n| n.observed).collect();
        let peak = match timings {
            Some(timings) => peak_overlap(&timings),
            None if !respect_dependencies => self.nodes.len(),
            None => {
                let mut widths: BTreeMap<usize, usize> = BTreeMap::new();
                for level in self.levels() {
                    *widths.entry(level).or_default() += 1;
                }
                widths.values().copied().max().unwrap_or(1)
            }
        };

        peak.max(1)
    }
}

/// Sweep over interval boundaries; an interval ending at `t` does not overlap one starting at `t`.
fn peak_overlap(timings: &[ObservedTiming]) -> usize {
    let mut events: Vec<(u64, i64)> = Vec::with_capacity(timings.len() * 2);
    for timing in timings {
        let end = timing.end_ms().max(timing.start_ms.saturating_add(1));
        events.push((timing.start_ms, 1));
        events.push((end, -1));
    }
    // Ends sort before starts at the same instant.
    events.sort();

    let mut current: i64 = 0;
    let mut peak: i64 = 0;
    for (_, delta) in events {
        current += delta;
        peak = peak.max(current);
    }
    peak as usize
}

impl From<&Graph> for GraphDto {
    fn from(graph: &Graph) -> Self {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| GraphNodeDto {
                hit_index: node.hit_index,
                kind: node.operation.kind().to_string(),
                address: node.operation.address().to_string(),
                dependencies: node.dependencies.iter().map(|d| d.hit_index).collect(),
                start_ms: node.observed.map(|t| t.start_ms),
                duration_ms: node.observed.map(|t| t.duration_ms),
            })
            .collect();

        GraphDto { nodes }
    }
}

impl TryFrom<GraphDto> for Graph {
    type Error = Error;

    fn try_from(dto: GraphDto) -> Result<Self> {
        let operations: HashMap<usize, Operation> = dto.nodes.iter().map(|n| (n.hit_index, Operation::new(n.kind.clone(), n.address.clone()))).collect();

        let mut nodes = Vec::with_capacity(dto.nodes.len());
        for node_dto in dto.nodes {
            let mut node = GraphNode::new(node_dto.hit_index, Operation::new(node_dto.kind, node_dto.address));
            node.observed = node_dto.start_ms.map(|start_ms| ObservedTiming { start_ms, duration_ms: node_dto.duration_ms.unwrap_or(0) });

            for dependency in node_dto.dependencies {
                let Some(operation) = operations.get(&dependency) else {
                    return Err(Error::malformed(
                        node.hit_index,
                        node.operation.kind(),
                        node.operation.address(),
                        format!("depends on unknown HitIndex {}", dependency),
                    ));
                };
                node.dependencies.insert(NodeKey::new(dependency, operation.clone()));
            }
            nodes.push(node);
        }

        Graph::new(nodes)
    }
}
