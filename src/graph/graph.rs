use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;

use crate::config::RelationTypes;
use crate::parsers::{ClassMap, FieldKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    ForeignKey,  // Model -> referenced model (many-to-one)
    OneToOne,    // Model -> referenced model
    ManyToMany,  // Model -> referenced model
    Subclass,    // Model -> base class
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 4] = [
        EdgeKind::ForeignKey,
        EdgeKind::OneToOne,
        EdgeKind::ManyToMany,
        EdgeKind::Subclass,
    ];

    pub fn from_field_kind(kind: FieldKind) -> Option<Self> {
        match kind {
            FieldKind::ForeignKey => Some(EdgeKind::ForeignKey),
            FieldKind::OneToOne => Some(EdgeKind::OneToOne),
            FieldKind::ManyToMany => Some(EdgeKind::ManyToMany),
            FieldKind::Attribute => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::ForeignKey => "foreignkey",
            EdgeKind::OneToOne => "onetoone",
            EdgeKind::ManyToMany => "manytomany",
            EdgeKind::Subclass => "subclass",
        }
    }

    pub fn is_relation(&self) -> bool {
        !matches!(self, EdgeKind::Subclass)
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(source, target)` pair of class names
pub type Edge = (String, String);

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeSets {
    #[serde(rename = "abstract")]
    pub abstract_models: Vec<String>,
    pub concrete: Vec<String>,
}

impl NodeSets {
    pub fn contains(&self, name: &str) -> bool {
        self.abstract_models.iter().chain(&self.concrete).any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.abstract_models.len() + self.concrete.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EdgeSets {
    #[serde(rename = "foreignkey")]
    pub foreign_key: Vec<Edge>,
    #[serde(rename = "onetoone")]
    pub one_to_one: Vec<Edge>,
    #[serde(rename = "manytomany")]
    pub many_to_many: Vec<Edge>,
    pub subclass: Vec<Edge>,
}

impl EdgeSets {
    pub fn get(&self, kind: EdgeKind) -> &[Edge] {
        match kind {
            EdgeKind::ForeignKey => &self.foreign_key,
            EdgeKind::OneToOne => &self.one_to_one,
            EdgeKind::ManyToMany => &self.many_to_many,
            EdgeKind::Subclass => &self.subclass,
        }
    }

    fn get_mut(&mut self, kind: EdgeKind) -> &mut Vec<Edge> {
        match kind {
            EdgeKind::ForeignKey => &mut self.foreign_key,
            EdgeKind::OneToOne => &mut self.one_to_one,
            EdgeKind::ManyToMany => &mut self.many_to_many,
            EdgeKind::Subclass => &mut self.subclass,
        }
    }

    /// Every edge with its kind, relation buckets first then subclass
    pub fn iter(&self) -> impl Iterator<Item = (EdgeKind, &Edge)> {
        EdgeKind::ALL
            .into_iter()
            .flat_map(move |kind| self.get(kind).iter().map(move |edge| (kind, edge)))
    }

    pub fn len(&self) -> usize {
        EdgeKind::ALL.iter().map(|k| self.get(*k).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Class names at either end of any edge
    pub fn endpoints(&self) -> HashSet<&str> {
        self.iter()
            .flat_map(|(_, (source, target))| [source.as_str(), target.as_str()])
            .collect()
    }
}

/// Which parts of the computed node and edge sets end up in the graph.
/// Edge and node sets are computed in full either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphOptions {
    /// Keep only edges touching one of these names. Empty means no pruning.
    pub focus: Vec<String>,
    pub abstract_enabled: bool,
    pub concrete_enabled: bool,
    pub related_field_enabled: bool,
    pub subclass_enabled: bool,
}

impl Default for GraphOptions {
    fn default() -> Self {
        GraphOptions {
            focus: Vec::new(),
            abstract_enabled: true,
            concrete_enabled: true,
            related_field_enabled: true,
            subclass_enabled: true,
        }
    }
}

impl GraphOptions {
    pub fn with_focus<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.focus = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_edge_kind_enabled(&self, kind: EdgeKind) -> bool {
        if kind.is_relation() {
            self.related_field_enabled
        } else {
            self.subclass_enabled
        }
    }
}

/// Directed multigraph of class names. Parallel edges are kept.
#[derive(Debug, Clone, Default)]
pub struct ModelGraph {
    graph: DiGraph<String, EdgeKind>,
    indices: HashMap<String, NodeIndex>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub total_nodes: usize,
    pub total_edges: usize,
    pub edges_by_kind: BTreeMap<String, usize>,
    pub most_connected_nodes: Vec<(String, usize)>,
}

impl ModelGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, or return the existing one with this name
    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&index) = self.indices.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.indices.insert(name.to_string(), index);
        index
    }

    /// Add an edge, adding either endpoint as a node if it isn't one yet
    pub fn add_edge(&mut self, source: &str, target: &str, kind: EdgeKind) -> EdgeIndex {
        let a = self.add_node(source);
        let b = self.add_node(target);
        self.graph.add_edge(a, b, kind)
    }

    pub fn has_node(&self, name: &str) -> bool {
        self.indices.contains_key(name)
    }

    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.edge_count_between(source, target) > 0
    }

    /// Number of parallel edges from `source` to `target`
    pub fn edge_count_between(&self, source: &str, target: &str) -> usize {
        match (self.indices.get(source), self.indices.get(target)) {
            (Some(&a), Some(&b)) => self.graph.edges_connecting(a, b).count(),
            _ => 0,
        }
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node names in insertion order
    pub fn node_names(&self) -> Vec<&str> {
        self.graph.node_weights().map(String::as_str).collect()
    }

    /// All edges as `(source, target, kind)` in insertion order
    pub fn edges(&self) -> Vec<(&str, &str, EdgeKind)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()].as_str(), self.graph[e.target()].as_str(), *e.weight()))
            .collect()
    }

    /// Edges leaving or entering a node
    pub fn edges_for_node(&self, name: &str) -> Vec<(&str, &str, EdgeKind)> {
        self.edges()
            .into_iter()
            .filter(|(source, target, _)| *source == name || *target == name)
            .collect()
    }

    /// Names connected to `name` by an edge in either direction, sorted
    pub fn neighbors(&self, name: &str) -> Vec<&str> {
        let Some(&index) = self.indices.get(name) else {
            return Vec::new();
        };
        let names: BTreeSet<&str> = self
            .graph
            .neighbors_directed(index, Direction::Outgoing)
            .chain(self.graph.neighbors_directed(index, Direction::Incoming))
            .map(|i| self.graph[i].as_str())
            .collect();
        names.into_iter().collect()
    }

    /// Get statistics about the graph
    pub fn get_statistics(&self) -> GraphStatistics {
        let mut edges_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        let mut node_connections: HashMap<&str, usize> = HashMap::new();

        for name in self.graph.node_weights() {
            node_connections.insert(name.as_str(), 0);
        }

        for (source, target, kind) in self.edges() {
            *edges_by_kind.entry(kind.to_string()).or_insert(0) += 1;
            *node_connections.entry(source).or_insert(0) += 1;
            *node_connections.entry(target).or_insert(0) += 1;
        }

        let mut most_connected: Vec<(String, usize)> = node_connections
            .into_iter()
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        most_connected.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        most_connected.truncate(10);

        GraphStatistics {
            total_nodes: self.node_count(),
            total_edges: self.edge_count(),
            edges_by_kind,
            most_connected_nodes: most_connected,
        }
    }
}

/// Everything the renderer needs: the materialised graph plus the full node
/// and edge classification.
#[derive(Debug, Clone)]
pub struct GraphOutput {
    pub graph: ModelGraph,
    pub nodes: NodeSets,
    pub edges: EdgeSets,
}

pub struct GraphBuilder {
    relations: RelationTypes,
}

impl GraphBuilder {
    pub fn new(relations: RelationTypes) -> Self {
        GraphBuilder { relations }
    }

    /// Classify edges and nodes for `models` and assemble the graph.
    ///
    /// With a focus set, only edges whose source or target is a focus name are
    /// kept, and only classes at the end of a kept edge remain in the node
    /// sets. A focus name with no kept edges is dropped as well.
    pub fn build(&self, models: &ClassMap, options: &GraphOptions) -> GraphOutput {
        let focus: HashSet<&str> = options.focus.iter().map(String::as_str).collect();

        let edges = self.classify_edges(models, &focus);
        let mut nodes = Self::classify_nodes(models);

        if !focus.is_empty() {
            let surviving = edges.endpoints();
            nodes.abstract_models.retain(|n| surviving.contains(n.as_str()));
            nodes.concrete.retain(|n| surviving.contains(n.as_str()));
        }

        let graph = Self::materialize(&nodes, &edges, options);
        log::debug!(
            "Built graph with {} nodes and {} edges ({} edges classified)",
            graph.node_count(),
            graph.edge_count(),
            edges.len()
        );

        GraphOutput { graph, nodes, edges }
    }

    fn classify_edges(&self, models: &ClassMap, focus: &HashSet<&str>) -> EdgeSets {
        let mut edges = EdgeSets::default();
        let mut push = |kind: EdgeKind, source: &str, target: &str| {
            if focus.is_empty() || focus.contains(source) || focus.contains(target) {
                edges.get_mut(kind).push((source.to_string(), target.to_string()));
            }
        };

        for model in models.values() {
            for field_kind in [FieldKind::ForeignKey, FieldKind::OneToOne, FieldKind::ManyToMany] {
                let Some(kind) = EdgeKind::from_field_kind(field_kind) else {
                    continue;
                };
                for field in model.relation_fields(field_kind, &self.relations) {
                    match field.target() {
                        Some(target) => push(kind, &model.name, target),
                        None => log::warn!(
                            "{}.{}: {} has no target model, skipping",
                            model.name,
                            field.name,
                            field.field_type
                        ),
                    }
                }
            }

            for dep in &model.class_dependencies {
                push(EdgeKind::Subclass, &model.name, dep);
            }
        }

        edges
    }

    fn classify_nodes(models: &ClassMap) -> NodeSets {
        let (abstract_models, concrete): (Vec<_>, Vec<_>) =
            models.values().partition(|m| m.is_abstract);

        NodeSets {
            abstract_models: abstract_models.into_iter().map(|m| m.name.clone()).collect(),
            concrete: concrete.into_iter().map(|m| m.name.clone()).collect(),
        }
    }

    fn materialize(nodes: &NodeSets, edges: &EdgeSets, options: &GraphOptions) -> ModelGraph {
        let mut graph = ModelGraph::new();

        if options.abstract_enabled {
            for name in &nodes.abstract_models {
                graph.add_node(name);
            }
        }
        if options.concrete_enabled {
            for name in &nodes.concrete {
                graph.add_node(name);
            }
        }

        for (kind, (source, target)) in edges.iter() {
            if options.is_edge_kind_enabled(kind) {
                graph.add_edge(source, target, kind);
            }
        }

        graph
    }
}

/// Build the graph for `models` with the default relation types
pub fn build_graph(models: &ClassMap, options: &GraphOptions) -> GraphOutput {
    GraphBuilder::new(RelationTypes::default()).build(models, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{classify_and_filter, propagate_fields, HopLimit};
    use crate::config::DEFAULT_ROOT_BASE;
    use crate::parsers::parse_classes;

    const MODELS: &str = "class BaseModel(models.Model):
    created_on = models.DateTimeField(auto_now_add=True)

    class Meta:
        abstract = True

class Party(BaseModel):
    name = models.CharField(max_length=64)

class Person(BaseModel):
    party = models.ForeignKey('Party', on_delete=models.CASCADE)
    previous_party = models.ForeignKey('Party', on_delete=models.CASCADE, null=True)
    address = models.OneToOneField('Address', on_delete=models.CASCADE)

class Town(BaseModel):
    name = models.CharField(max_length=64)

class Address(BaseModel):
    towns = models.ManyToManyField('Town')
";

    fn models() -> ClassMap {
        let mut classes = parse_classes(MODELS);
        classify_and_filter(&mut classes, DEFAULT_ROOT_BASE, HopLimit::Bounded(2));
        propagate_fields(&mut classes);
        classes
    }

    #[test]
    fn test_edge_classification() {
        let output = build_graph(&models(), &GraphOptions::default());
        let edges = &output.edges;

        assert_eq!(
            edges.foreign_key,
            vec![
                ("Person".to_string(), "Party".to_string()),
                ("Person".to_string(), "Party".to_string()),
            ]
        );
        assert_eq!(edges.one_to_one, vec![("Person".to_string(), "Address".to_string())]);
        assert_eq!(edges.many_to_many, vec![("Address".to_string(), "Town".to_string())]);
        assert_eq!(edges.subclass.len(), 5);
        assert!(edges.subclass.contains(&("BaseModel".to_string(), "models.Model".to_string())));
    }

    #[test]
    fn test_node_classification() {
        let output = build_graph(&models(), &GraphOptions::default());
        assert_eq!(output.nodes.abstract_models, vec!["BaseModel"]);
        assert_eq!(output.nodes.concrete, vec!["Party", "Person", "Town", "Address"]);
    }

    #[test]
    fn test_graph_contains_all_nodes_and_edges() {
        let output = build_graph(&models(), &GraphOptions::default());

        for name in output.nodes.abstract_models.iter().chain(&output.nodes.concrete) {
            assert!(output.graph.has_node(name));
        }
        for (_, (source, target)) in output.edges.iter() {
            assert!(output.graph.has_edge(source, target));
        }
        // The root base becomes a node through its subclass edge
        assert!(output.graph.has_node("models.Model"));
        // Parallel edges are distinct
        assert_eq!(output.graph.edge_count_between("Person", "Party"), 2);
        assert_eq!(output.graph.edge_count(), output.edges.len());
    }

    #[test]
    fn test_focus_filtering() {
        let options = GraphOptions::default().with_focus(["Party"]);
        let output = build_graph(&models(), &options);

        assert!(output.nodes.contains("Party"));
        assert!(output.nodes.contains("Person"));
        assert!(output.nodes.contains("BaseModel"));
        assert!(!output.nodes.contains("Town"));
        assert!(!output.nodes.contains("Address"));

        assert!(output.graph.has_edge("Person", "Party"));
        assert!(!output.graph.has_node("Town"));
        assert!(output.edges.many_to_many.is_empty());
    }

    #[test]
    fn test_multiple_focus_names_union() {
        let options = GraphOptions::default().with_focus(["Party", "Town"]);
        let output = build_graph(&models(), &options);

        assert!(output.graph.has_edge("Person", "Party"));
        assert!(output.graph.has_edge("Address", "Town"));
        assert!(output.nodes.contains("Town"));
        assert!(output.nodes.contains("Address"));
    }

    #[test]
    fn test_focus_name_without_edges_is_dropped() {
        let mut classes = parse_classes(
            "class Lonely:
    pass

class Island(Unrelated):
    pass

class Solo(models.Model):
    pass
",
        );
        classify_and_filter(&mut classes, DEFAULT_ROOT_BASE, HopLimit::Bounded(2));

        // Solo only has its subclass edge; focusing on a name nothing touches drops everything
        let output = build_graph(&classes, &GraphOptions::default().with_focus(["Nothing"]));
        assert!(output.nodes.is_empty());
        assert!(output.edges.is_empty());
        assert_eq!(output.graph.node_count(), 0);
    }

    #[test]
    fn test_flags_gate_materialization_only() {
        let options = GraphOptions {
            abstract_enabled: false,
            related_field_enabled: false,
            ..GraphOptions::default()
        };
        let output = build_graph(&models(), &options);

        // Still computed
        assert_eq!(output.edges.foreign_key.len(), 2);
        assert_eq!(output.nodes.abstract_models, vec!["BaseModel"]);

        assert!(!output.graph.has_edge("Person", "Party"));
        assert!(output.graph.has_edge("Person", "BaseModel"));
        // Added back as the target of subclass edges
        assert!(output.graph.has_node("BaseModel"));
        assert!(output.graph.edges().iter().all(|(_, _, kind)| *kind == EdgeKind::Subclass));
    }

    #[test]
    fn test_subclass_disabled() {
        let options = GraphOptions {
            subclass_enabled: false,
            abstract_enabled: false,
            ..GraphOptions::default()
        };
        let output = build_graph(&models(), &options);

        assert!(!output.graph.has_node("BaseModel"));
        assert!(!output.graph.has_node("models.Model"));
        assert_eq!(output.graph.edge_count(), 4);
    }

    #[test]
    fn test_neighbors_and_statistics() {
        let output = build_graph(&models(), &GraphOptions::default());
        let graph = &output.graph;

        assert_eq!(graph.neighbors("Address"), vec!["BaseModel", "Person", "Town"]);
        assert!(graph.neighbors("Unknown").is_empty());
        assert_eq!(graph.edges_for_node("Town").len(), 2);

        let stats = graph.get_statistics();
        assert_eq!(stats.total_edges, 9);
        assert_eq!(stats.edges_by_kind["foreignkey"], 2);
        assert_eq!(stats.edges_by_kind["subclass"], 5);
        assert_eq!(stats.most_connected_nodes[0], ("BaseModel".to_string(), 5));
    }
}
