use std::collections::{BTreeSet, HashMap, HashSet};

use crate::domain::graph::graph::Graph;
use crate::domain::graph::node::{GraphNode, NodeKey};
use crate::domain::operation::{Operation, OperationCategory, package_id_from_address};
use crate::domain::trace::TraceEntry;
use crate::error::{Error, Result};

/// Most recent occurrence of each prerequisite category seen so far while walking a trace.
///
/// Owned by one [`GraphBuilder`]; separate builds never share it.
#[derive(Debug, Default, Clone)]
pub struct PrerequisiteIndex {
    latest_service_index: Option<NodeKey>,
    latest_by_package: HashMap<(OperationCategory, String), NodeKey>,
}

impl PrerequisiteIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// The prerequisite a node of `category` for `package_id` would depend on right now.
    pub fn prerequisite_for(&self, category: OperationCategory, package_id: Option<&str>) -> Option<NodeKey> {
        let by_package = package_id.and_then(|id| {
            category
                .package_prerequisites()
                .iter()
                .filter_map(|prerequisite| self.latest_by_package.get(&(*prerequisite, id.to_string())))
                .max_by_key(|key| key.hit_index)
                .cloned()
        });

        match by_package {
            Some(key) => Some(key),
            None if category.depends_on_service_index() => self.latest_service_index.clone(),
            None => None,
        }
    }

    pub fn record(&mut self, category: OperationCategory, package_id: Option<String>, key: NodeKey) {
        match (category, package_id) {
            (OperationCategory::ServiceIndex, _) => self.latest_service_index = Some(key),
            (category, Some(id)) => {
                self.latest_by_package.insert((category, id), key);
            }
            (_, None) => {}
        }
    }
}

/// Result of a graph build: the graph plus every recoverable warning raised on the way.
#[derive(Debug)]
pub struct BuiltGraph {
    pub graph: Graph,

    /// Always [`Error::UnknownOperationKindError`] values.
    pub warnings: Vec<Error>,
}

/// Turns an ordered trace into a dependency [`Graph`].
///
/// Explicit `depends_on` links are used as recorded. Entries without them get
/// their prerequisites from the [`PrerequisiteIndex`] heuristic; entries whose
/// kind cannot be classified become roots and produce a warning.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    index: PrerequisiteIndex,
    warnings: Vec<Error>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn build(mut self, trace: &[TraceEntry]) -> Result<BuiltGraph> {
        let mut nodes: Vec<GraphNode> = Vec::with_capacity(trace.len());
        let mut operations_at_current_order: HashSet<&Operation> = HashSet::new();

        for (hit_index, entry) in trace.iter().enumerate() {
            let operation = &entry.operation;

            // Phase 1: ordering and duplicate checks
            if let Some(previous) = hit_index.checked_sub(1).map(|i| &trace[i]) {
                if entry.order < previous.order {
                    return Err(Error::malformed(
                        hit_index,
                        operation.kind(),
                        operation.address(),
                        format!("order {} is smaller than the previous entry's order {}", entry.order, previous.order),
                    ));
                }
                if entry.order != previous.order {
                    operations_at_current_order.clear();
                }
            }
            if !operations_at_current_order.insert(operation) {
                return Err(Error::malformed(
                    hit_index,
                    operation.kind(),
                    operation.address(),
                    format!("duplicate of an earlier entry with the same order {}", entry.order),
                ));
            }

            // Phase 2: dependencies
            let mut node = GraphNode::new(hit_index, operation.clone());
            node.observed = entry.observed;
            let category = operation.category();
            let package_id = match (&entry.package_id, category) {
                (Some(id), _) => Some(id.to_ascii_lowercase()),
                (None, Some(category)) => package_id_from_address(category, operation.address()),
                (None, None) => None,
            };

            match (&entry.depends_on, category) {
                (Some(explicit), _) => {
                    node.dependencies = Self::explicit_dependencies(hit_index, entry, explicit, &nodes)?;
                }
                (None, Some(category)) => {
                    if let Some(prerequisite) = self.index.prerequisite_for(category, package_id.as_deref()) {
                        node.dependencies.insert(prerequisite);
                    } else {
                        log::debug!("No prerequisite found for {}; it becomes a root.", node.key());
                    }
                }
                (None, None) => {
                    let warning = Error::UnknownOperationKindError {
                        index: hit_index,
                        kind: operation.kind().to_string(),
                        address: operation.address().to_string(),
                    };
                    tracing::warn!("{}", warning);
                    self.warnings.push(warning);
                }
            }

            // Phase 3: remember this node as a possible prerequisite
            if let Some(category) = category {
                self.index.record(category, package_id, node.key());
            }

            nodes.push(node);
        }

        let graph = Graph::new(nodes)?;
        log::info!(
            "Built graph with {} nodes, {} edges and {} roots ({} warnings).",
            graph.len(),
            graph.edge_count(),
            graph.sources().len(),
            self.warnings.len()
        );

        Ok(BuiltGraph { graph, warnings: self.warnings })
    }

    fn explicit_dependencies(hit_index: usize, entry: &TraceEntry, explicit: &[usize], nodes: &[GraphNode]) -> Result<BTreeSet<NodeKey>> {
        let mut dependencies = BTreeSet::new();
        for &dependency in explicit {
            // Nodes are pushed in HitIndex order, so earlier entries are addressable by position.
            let Some(target) = nodes.get(dependency).filter(|_| dependency < hit_index) else {
                return Err(Error::malformed(
                    hit_index,
                    entry.operation.kind(),
                    entry.operation.address(),
                    format!("explicit dependency on entry #{} which is not strictly earlier", dependency),
                ));
            };
            dependencies.insert(target.key());
        }
        Ok(dependencies)
    }
}

/// Convenience wrapper for a one-off build with fresh state.
pub fn build_graph(trace: &[TraceEntry]) -> Result<BuiltGraph> {
    GraphBuilder::new().build(trace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    fn keys(graph: &Graph, hit_index: usize) -> Vec<usize> {
        graph.by_hit_index(hit_index).unwrap().dependencies.iter().map(|k| k.hit_index).collect()
    }

    #[test]
    fn explicit_links_are_used_directly() {
        let trace = vec![
            TraceEntry::new(0, "registration", "/a/index.json"),
            TraceEntry::new(1, "download", "/a/1.0.0.nupkg").with_dependencies(vec![0]),
            TraceEntry::new(2, "registration", "/b/index.json"),
        ];

        let built = build_graph(&trace).unwrap();
        let graph = &built.graph;

        assert_eq!(graph.len(), 3);
        assert_eq!(keys(graph, 1), vec![0]);
        assert!(graph.by_hit_index(2).unwrap().is_root());
        assert!(built.warnings.is_empty());
    }

    #[test]
    fn download_depends_on_latest_registration_of_same_package() {
        let trace = vec![
            TraceEntry::new(0, "service-index", "/v3/index.json"),
            TraceEntry::new(1, "registration", "/reg/a/index.json"),
            TraceEntry::new(2, "registration", "/reg/b/index.json"),
            TraceEntry::new(3, "registration", "/reg/a/index.json"),
            TraceEntry::new(4, "download", "/flat/a/1.0.0/a.1.0.0.nupkg"),
            TraceEntry::new(5, "download", "/flat/c/1.0.0/c.1.0.0.nupkg"),
        ];

        let graph = build_graph(&trace).unwrap().graph;

        assert!(graph.by_hit_index(0).unwrap().is_root());
        assert_eq!(keys(&graph, 1), vec![0]);
        assert_eq!(keys(&graph, 2), vec![0]);
        assert_eq!(keys(&graph, 4), vec![3]);
        // No registration for "c": falls back to the service index.
        assert_eq!(keys(&graph, 5), vec![0]);
    }

    #[test]
    fn registration_page_depends_on_registration_index() {
        let trace = vec![
            TraceEntry::new(0, "registration", "/reg/serilog/index.json"),
            TraceEntry::new(1, "registration-page", "/reg/serilog/page/1.0.0/2.0.0.json"),
            TraceEntry::new(2, "download", "/flat/serilog/2.0.0/serilog.2.0.0.nupkg"),
        ];

        let graph = build_graph(&trace).unwrap().graph;
        assert_eq!(keys(&graph, 1), vec![0]);
        assert_eq!(keys(&graph, 2), vec![1]);
    }

    #[test]
    fn explicit_package_id_overrides_address() {
        let trace = vec![
            TraceEntry::new(0, "registration", "/reg/a/index.json"),
            TraceEntry::new(1, "download", "/blobs/12345").with_package_id("A"),
        ];

        let graph = build_graph(&trace).unwrap().graph;
        assert_eq!(keys(&graph, 1), vec![0]);
    }

    #[test]
    fn repeated_operations_stay_distinct() {
        let trace = vec![
            TraceEntry::new(0, "registration", "/a/index.json"),
            TraceEntry::new(1, "registration", "/a/index.json"),
        ];

        let graph = build_graph(&trace).unwrap().graph;
        assert_eq!(graph.len(), 2);
        assert_ne!(graph.nodes()[0], graph.nodes()[1]);
    }

    #[test]
    fn same_order_and_operation_is_rejected() {
        let trace = vec![
            TraceEntry::new(7, "registration", "/a/index.json"),
            TraceEntry::new(7, "registration", "/b/index.json"),
            TraceEntry::new(7, "registration", "/a/index.json"),
        ];

        match build_graph(&trace) {
            Err(Error::MalformedTraceError { index, reason, .. }) => {
                assert_eq!(index, 2);
                assert!(reason.contains("duplicate"));
            }
            other => panic!("expected MalformedTraceError, got {:?}", other.map(|b| b.graph.len())),
        }
    }

    #[test]
    fn decreasing_order_is_rejected() {
        let trace = vec![TraceEntry::new(5, "registration", "/a/index.json"), TraceEntry::new(4, "registration", "/b/index.json")];
        assert!(matches!(build_graph(&trace), Err(Error::MalformedTraceError { index: 1, .. })));
    }

    #[test]
    fn forward_and_self_links_are_rejected() {
        let forward = vec![TraceEntry::new(0, "download", "/a/1.0.0.nupkg").with_dependencies(vec![1]), TraceEntry::new(1, "registration", "/a/index.json")];
        assert!(matches!(build_graph(&forward), Err(Error::MalformedTraceError { index: 0, .. })));

        let self_link = vec![TraceEntry::new(0, "registration", "/a/index.json"), TraceEntry::new(1, "download", "/a/1.0.0.nupkg").with_dependencies(vec![1])];
        assert!(matches!(build_graph(&self_link), Err(Error::MalformedTraceError { index: 1, .. })));
    }

    #[test]
    #[traced_test]
    fn unknown_kind_becomes_root_with_warning() {
        let trace = vec![TraceEntry::new(0, "service-index", "/v3/index.json"), TraceEntry::new(1, "telemetry", "/events")];

        let built = build_graph(&trace).unwrap();

        assert!(built.graph.by_hit_index(1).unwrap().is_root());
        assert_eq!(built.warnings.len(), 1);
        assert!(matches!(&built.warnings[0], Error::UnknownOperationKindError { index: 1, kind, .. } if kind == "telemetry"));
        assert!(logs_contain("Unknown operation kind 'telemetry'"));
    }

    #[test]
    fn unknown_kind_with_explicit_link_is_not_a_warning() {
        let trace = vec![TraceEntry::new(0, "service-index", "/v3/index.json"), TraceEntry::new(1, "telemetry", "/events").with_dependencies(vec![0])];

        let built = build_graph(&trace).unwrap();
        assert!(built.warnings.is_empty());
        assert_eq!(keys(&built.graph, 1), vec![0]);
    }

    #[test]
    fn separate_builders_do_not_share_state() {
        let first = vec![TraceEntry::new(0, "registration", "/a/index.json")];
        let second = vec![TraceEntry::new(0, "download", "/a/1.0.0.nupkg")];

        build_graph(&first).unwrap();
        let graph = build_graph(&second).unwrap().graph;
        assert!(graph.by_hit_index(0).unwrap().is_root());
    }

    #[test]
    fn prerequisite_index_tracks_service_index() {
        let mut index = PrerequisiteIndex::new();
        index.record(OperationCategory::ServiceIndex, None, NodeKey::new(0, Operation::new("service-index", "/v3/index.json")));
        assert!(index.prerequisite_for(OperationCategory::RegistrationIndex, Some("a")).is_some());
        assert!(index.prerequisite_for(OperationCategory::ServiceIndex, None).is_none());
    }
}
