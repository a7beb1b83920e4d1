use std::collections::BTreeSet;
use std::fmt;

use crate::domain::operation::Operation;
use crate::domain::trace::ObservedTiming;

/// Value identity of a graph node: its position in the trace plus the operation observed there.
///
/// Dependency sets hold keys rather than references, so an edge can be declared
/// before the target node exists and two identical operations at different
/// positions stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeKey {
    pub hit_index: usize,
    pub operation: Operation,
}

impl NodeKey {
    pub fn new(hit_index: usize, operation: Operation) -> Self {
        NodeKey { hit_index, operation }
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.hit_index, self.operation)
    }
}

/// A recorded occurrence of an [`Operation`] and the nodes that must complete before it may start.
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub hit_index: usize,
    pub operation: Operation,
    pub dependencies: BTreeSet<NodeKey>,
    pub observed: Option<ObservedTiming>,
}

impl GraphNode {
    pub fn new(hit_index: usize, operation: Operation) -> Self {
        GraphNode { hit_index, operation, dependencies: BTreeSet::new(), observed: None }
    }

    pub fn key(&self) -> NodeKey {
        NodeKey::new(self.hit_index, self.operation.clone())
    }

    pub fn is_root(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn depends_on(&self, other: &GraphNode) -> bool {
        self.dependencies.contains(&other.key())
    }
}

// Equality ignores dependencies and timing: a node is its (HitIndex, Operation) pair.
impl PartialEq for GraphNode {
    fn eq(&self, other: &Self) -> bool {
        self.hit_index == other.hit_index && self.operation == other.operation
    }
}

impl Eq for GraphNode {}

impl std::hash::Hash for GraphNode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hit_index.hash(state);
        self.operation.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn nodes_compare_by_value_not_reference() {
        let mut a = GraphNode::new(3, Operation::new("download", "/a/1.0.0.nupkg"));
        let b = GraphNode::new(3, Operation::new("download", "/a/1.0.0.nupkg"));
        a.dependencies.insert(NodeKey::new(1, Operation::new("registration", "/a/index.json")));

        assert_eq!(a, b);

        let set: HashSet<GraphNode> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn same_operation_at_different_positions_is_distinct() {
        let first = GraphNode::new(0, Operation::new("registration", "/a/index.json"));
        let second = GraphNode::new(4, Operation::new("registration", "/a/index.json"));
        assert_ne!(first, second);
        assert_ne!(first.key(), second.key());
    }
}
