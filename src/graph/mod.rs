pub mod graph;

pub use graph::{
    build_graph, Edge, EdgeKind, EdgeSets, GraphBuilder, GraphOptions, GraphOutput, GraphStatistics,
    ModelGraph, NodeSets,
};
