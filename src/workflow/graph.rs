/// Petgraph-based workflow graph analysis
///
/// Builds a directed graph over a workflow definition and answers the structural
/// questions the engine needs before and during a run: which nodes start a run,
/// which nodes follow a given node, and whether the definition is acyclic and
/// referentially sound.

use crate::workflow::types::{Connection, ErrorHandling, Node, NodeType, WorkflowDefinition};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Workflow definition indexed as a petgraph DAG
///
/// Node weights borrow from the definition, so the graph is cheap to build per
/// run. Connections that reference unknown nodes are left out; `validate`
/// reports them.
#[derive(Debug)]
pub struct WorkflowGraph<'a> {
    /// The petgraph DiGraph structure
    graph: DiGraph<&'a Node, &'a Connection>,
    /// Mapping from node ID to graph node index
    node_id_to_index: HashMap<&'a str, NodeIndex>,
}

/// Which outgoing connections to follow after a node completes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Routing {
    /// Follow every outgoing connection
    #[default]
    All,
    /// Follow connections whose source port equals `port`; connections
    /// without a source port are followed only if `include_untagged` is set
    Selected { port: String, include_untagged: bool },
}

impl Routing {
    /// Whether this routing decision follows `connection`
    pub fn follows(&self, connection: &Connection) -> bool {
        match self {
            Routing::All => true,
            Routing::Selected { port, include_untagged } => match &connection.source_port_id {
                Some(source_port) => source_port == port,
                None => *include_untagged,
            },
        }
    }
}

impl<'a> WorkflowGraph<'a> {
    /// Build the graph for a definition
    ///
    /// Duplicate node ids keep their first occurrence.
    pub fn build(definition: &'a WorkflowDefinition) -> Self {
        let mut graph = DiGraph::with_capacity(definition.nodes.len(), definition.connections.len());
        let mut node_id_to_index = HashMap::with_capacity(definition.nodes.len());

        for node in &definition.nodes {
            if node_id_to_index.contains_key(node.id.as_str()) {
                continue;
            }
            let index = graph.add_node(node);
            node_id_to_index.insert(node.id.as_str(), index);
        }

        for connection in &definition.connections {
            let from = node_id_to_index.get(connection.source_node_id.as_str());
            let to = node_id_to_index.get(connection.target_node_id.as_str());
            if let (Some(&from), Some(&to)) = (from, to) {
                graph.add_edge(from, to, connection);
            }
        }

        tracing::debug!(
            "📊 Built workflow graph with {} nodes and {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Self { graph, node_id_to_index }
    }

    /// Node weight for an index produced by this graph
    pub fn node(&self, index: NodeIndex) -> &'a Node {
        self.graph[index]
    }

    /// Graph index for a node id
    pub fn index_of(&self, node_id: &str) -> Option<NodeIndex> {
        self.node_id_to_index.get(node_id).copied()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Nodes without incoming connections, in definition order
    pub fn start_nodes(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&index| {
                self.graph
                    .neighbors_directed(index, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// All downstream nodes of `index`
    pub fn downstream(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.downstream_via(index, &Routing::All)
    }

    /// Downstream nodes reached through connections selected by `routing`,
    /// in connection order
    pub fn downstream_via(&self, index: NodeIndex, routing: &Routing) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, Direction::Outgoing)
            .filter(|edge| routing.follows(edge.weight()))
            .map(|edge| (edge.id(), edge.target()))
            .collect();
        // petgraph walks adjacency lists newest-first
        edges.sort_by_key(|(edge_id, _)| edge_id.index());

        let mut seen = HashSet::new();
        edges
            .into_iter()
            .map(|(_, target)| target)
            .filter(|target| seen.insert(*target))
            .collect()
    }

    /// Find a cycle, returning the node ids along it (first id repeated at the end)
    ///
    /// Depth-first walk from every unvisited node with an explicit stack. Nodes
    /// on the active path are marked `Active`; reaching one again closes a
    /// cycle, which also covers self-loops. Fully explored nodes are `Cleared`
    /// and never walked twice, so the search is linear in nodes plus edges.
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            Active,
            Cleared,
        }

        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];

        for root in self.graph.node_indices() {
            if marks[root.index()] != Mark::Unvisited {
                continue;
            }

            marks[root.index()] = Mark::Active;
            let mut stack: Vec<(NodeIndex, Vec<NodeIndex>)> = vec![(root, self.successors(root))];

            loop {
                let Some((current, pending)) = stack.last_mut() else {
                    break;
                };
                let current = *current;
                let next = pending.pop();

                match next {
                    Some(next) => match marks[next.index()] {
                        Mark::Active => {
                            let start = stack
                                .iter()
                                .position(|(index, _)| *index == next)
                                .unwrap_or(0);
                            let mut cycle: Vec<String> = stack[start..]
                                .iter()
                                .map(|(index, _)| self.graph[*index].id.clone())
                                .collect();
                            cycle.push(self.graph[next].id.clone());
                            return Some(cycle);
                        }
                        Mark::Unvisited => {
                            marks[next.index()] = Mark::Active;
                            stack.push((next, self.successors(next)));
                        }
                        Mark::Cleared => {}
                    },
                    None => {
                        marks[current.index()] = Mark::Cleared;
                        stack.pop();
                    }
                }
            }
        }

        None
    }

    fn successors(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.graph.neighbors_directed(index, Direction::Outgoing).collect()
    }
}

/// Nodes absent from the set of all connection target ids
pub fn find_start_nodes(definition: &WorkflowDefinition) -> Vec<&Node> {
    let targets: HashSet<&str> = definition
        .connections
        .iter()
        .map(|connection| connection.target_node_id.as_str())
        .collect();

    definition
        .nodes
        .iter()
        .filter(|node| !targets.contains(node.id.as_str()))
        .collect()
}

/// Every node targeted by a connection whose source is `node_id`
pub fn find_downstream<'a>(definition: &'a WorkflowDefinition, node_id: &str) -> Vec<&'a Node> {
    definition
        .connections
        .iter()
        .filter(|connection| connection.source_node_id == node_id)
        .filter_map(|connection| definition.node(&connection.target_node_id))
        .collect()
}

/// Outcome of validating a definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// All error messages joined for a run-level error string
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|issue| issue.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A single validation finding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// What kind of defect an issue describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// Missing or duplicated definition parts
    Structure,
    /// Connections pointing at nodes that do not exist
    Reference,
    /// Graph shape problems: no entry point, cycles, dead branches
    Logic,
    /// Settings and variable declarations
    Configuration,
}

/// Validate a definition's structure before any run starts
///
/// Errors make the definition unrunnable; warnings are advisory.
pub fn validate(definition: &WorkflowDefinition) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let issue = |category, message: String, node_id: Option<&str>, connection_id: Option<&str>| {
        ValidationIssue {
            severity: Severity::Error,
            category,
            message,
            node_id: node_id.map(str::to_string),
            connection_id: connection_id.map(str::to_string),
        }
    };
    let warning = |category, message: String, node_id: Option<&str>, connection_id: Option<&str>| {
        ValidationIssue {
            severity: Severity::Warning,
            ..issue(category, message, node_id, connection_id)
        }
    };

    if definition.name.trim().is_empty() {
        errors.push(issue(IssueCategory::Structure, "Workflow name is required".to_string(), None, None));
    }

    if definition.nodes.is_empty() {
        errors.push(issue(
            IssueCategory::Structure,
            "Workflow must contain at least one node".to_string(),
            None,
            None,
        ));
    }

    let mut node_ids = HashSet::new();
    for node in &definition.nodes {
        if !node_ids.insert(node.id.as_str()) {
            errors.push(issue(
                IssueCategory::Structure,
                format!("Duplicate node id '{}'", node.id),
                Some(&node.id),
                None,
            ));
        }
    }

    let mut connection_ids = HashSet::new();
    for connection in &definition.connections {
        if !connection_ids.insert(connection.id.as_str()) {
            warnings.push(warning(
                IssueCategory::Structure,
                format!("Duplicate connection id '{}'", connection.id),
                None,
                Some(&connection.id),
            ));
        }
        for (end, node_id) in [
            ("source", &connection.source_node_id),
            ("target", &connection.target_node_id),
        ] {
            if !node_ids.contains(node_id.as_str()) {
                errors.push(issue(
                    IssueCategory::Reference,
                    format!(
                        "Connection '{}' references non-existent {} node '{}'",
                        connection.id, end, node_id
                    ),
                    Some(node_id),
                    Some(&connection.id),
                ));
            }
        }
    }

    if !definition.nodes.is_empty() && find_start_nodes(definition).is_empty() {
        errors.push(issue(
            IssueCategory::Logic,
            "Workflow has no start node: every node has an incoming connection".to_string(),
            None,
            None,
        ));
    }

    if let Some(cycle) = WorkflowGraph::build(definition).find_cycle() {
        errors.push(issue(
            IssueCategory::Logic,
            format!("Workflow contains a cycle: {}", cycle.join(" -> ")),
            cycle.first().map(String::as_str),
            None,
        ));
    }

    // Advisory checks
    if !definition.enabled {
        warnings.push(warning(
            IssueCategory::Configuration,
            "Workflow is disabled; triggers will not start it".to_string(),
            None,
            None,
        ));
    }

    if definition.nodes.len() > 1 {
        let connected: HashSet<&str> = definition
            .connections
            .iter()
            .flat_map(|c| [c.source_node_id.as_str(), c.target_node_id.as_str()])
            .collect();
        for node in &definition.nodes {
            if !connected.contains(node.id.as_str()) {
                warnings.push(warning(
                    IssueCategory::Logic,
                    format!("Node '{}' is not connected to any other node", node.id),
                    Some(&node.id),
                    None,
                ));
            }
        }
    }

    for node in definition.nodes.iter().filter(|n| n.node_type == NodeType::Branch) {
        let untagged = definition
            .connections
            .iter()
            .filter(|c| c.source_node_id == node.id && c.source_port_id.is_none());
        for connection in untagged {
            warnings.push(warning(
                IssueCategory::Logic,
                format!(
                    "Connection '{}' leaves branch node '{}' without a source port and will never be followed",
                    connection.id, node.id
                ),
                Some(&node.id),
                Some(&connection.id),
            ));
        }
    }

    for variable in &definition.variables {
        if !variable.var_type.accepts(&variable.default_value) {
            warnings.push(warning(
                IssueCategory::Configuration,
                format!(
                    "Default value of variable '{}' does not match its declared type {:?}",
                    variable.name, variable.var_type
                ),
                None,
                None,
            ));
        }
    }

    let settings = &definition.settings;
    if settings.error_handling == ErrorHandling::Retry && settings.retry_policy.max_attempts < 2 {
        warnings.push(warning(
            IssueCategory::Configuration,
            "Error handling is 'retry' but the retry policy allows fewer than 2 attempts".to_string(),
            None,
            None,
        ));
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(nodes: &[&str], edges: &[(&str, &str)]) -> WorkflowDefinition {
        serde_json::from_value(json!({
            "id": "wf-test",
            "name": "Test workflow",
            "nodes": nodes.iter().map(|id| json!({ "id": id, "type": "action" })).collect::<Vec<_>>(),
            "connections": edges
                .iter()
                .enumerate()
                .map(|(i, (from, to))| json!({ "id": format!("c{i}"), "source": from, "target": to }))
                .collect::<Vec<_>>(),
        }))
        .unwrap()
    }

    fn ids(graph: &WorkflowGraph<'_>, indices: Vec<NodeIndex>) -> Vec<String> {
        indices.into_iter().map(|i| graph.node(i).id.clone()).collect()
    }

    #[test]
    fn start_nodes_have_no_incoming_connections() {
        let def = definition(&["a", "b", "c", "d"], &[("a", "b"), ("c", "b"), ("b", "d")]);
        let graph = WorkflowGraph::build(&def);

        assert_eq!(ids(&graph, graph.start_nodes()), vec!["a", "c"]);
        let direct: Vec<_> = find_start_nodes(&def).iter().map(|n| n.id.as_str()).collect();
        assert_eq!(direct, vec!["a", "c"]);
    }

    #[test]
    fn downstream_supports_fan_out_in_connection_order() {
        let def = definition(&["a", "b", "c", "d"], &[("a", "c"), ("a", "b"), ("a", "d")]);
        let graph = WorkflowGraph::build(&def);
        let a = graph.index_of("a").unwrap();

        assert_eq!(ids(&graph, graph.downstream(a)), vec!["c", "b", "d"]);
        let direct: Vec<_> = find_downstream(&def, "a").iter().map(|n| n.id.as_str()).collect();
        assert_eq!(direct, vec!["c", "b", "d"]);
    }

    #[test]
    fn routing_selects_tagged_connections() {
        let mut def = definition(
            &["cond", "yes", "no", "always"],
            &[("cond", "yes"), ("cond", "no"), ("cond", "always")],
        );
        def.connections[0].source_port_id = Some("true".to_string());
        def.connections[1].source_port_id = Some("false".to_string());
        let graph = WorkflowGraph::build(&def);
        let cond = graph.index_of("cond").unwrap();

        let on_true = Routing::Selected { port: "true".to_string(), include_untagged: true };
        let on_false = Routing::Selected { port: "false".to_string(), include_untagged: false };
        assert_eq!(ids(&graph, graph.downstream_via(cond, &on_true)), vec!["yes", "always"]);
        assert_eq!(ids(&graph, graph.downstream_via(cond, &on_false)), vec!["no"]);
    }

    #[test]
    fn detects_three_node_cycle() {
        let def = definition(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let cycle = WorkflowGraph::build(&def).find_cycle().unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 4);

        let result = validate(&def);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.message.contains("cycle")));
    }

    #[test]
    fn detects_self_loop_next_to_a_valid_start() {
        let def = definition(&["start", "a"], &[("start", "a"), ("a", "a")]);
        let cycle = WorkflowGraph::build(&def).find_cycle().unwrap();
        assert_eq!(cycle, vec!["a", "a"]);

        let result = validate(&def);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].category, IssueCategory::Logic);
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let def = definition(
            &["a", "b", "c", "d"],
            &[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")],
        );
        assert!(WorkflowGraph::build(&def).find_cycle().is_none());
        assert!(validate(&def).valid);
    }

    #[test]
    fn rejects_missing_name_and_empty_graph() {
        let mut def = definition(&[], &[]);
        def.name = "  ".to_string();
        let result = validate(&def);

        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.category == IssueCategory::Structure));
        assert!(result.errors.iter().all(|e| e.severity == Severity::Error));
    }

    #[test]
    fn rejects_dangling_connection() {
        let def = definition(&["a"], &[("a", "ghost")]);
        let result = validate(&def);

        assert!(!result.valid);
        let error = &result.errors[0];
        assert_eq!(error.category, IssueCategory::Reference);
        assert_eq!(error.connection_id.as_deref(), Some("c0"));
        assert_eq!(error.node_id.as_deref(), Some("ghost"));
    }

    #[test]
    fn no_start_node_is_a_logic_error() {
        let def = definition(&["a", "b"], &[("a", "b"), ("b", "a")]);
        let result = validate(&def);

        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.category == IssueCategory::Logic && e.message.contains("no start node")));
    }

    #[test]
    fn advisory_findings_are_warnings_only() {
        let mut def = definition(&["a", "b", "lonely"], &[("a", "b")]);
        def.enabled = false;
        def.settings.error_handling = ErrorHandling::Retry;
        def.settings.retry_policy.max_attempts = 1;
        let result = validate(&def);

        assert!(result.valid);
        assert_eq!(result.warnings.len(), 3);
        assert!(result.warnings.iter().any(|w| w.node_id.as_deref() == Some("lonely")));
    }
}
