use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::graph::{EdgeKind, EdgeSets, GraphOutput, GraphStatistics, NodeSets};

const BACKGROUND_COLOR: &str = "#333333";
const LABEL_COLOR: &str = "#eeeeee";
const ABSTRACT_NODE_COLOR: &str = "#555555";
const CONCRETE_NODE_COLOR: &str = "#244461";

fn edge_color(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::ForeignKey => "#4f9bd1",
        EdgeKind::OneToOne => "#9bd14f",
        EdgeKind::ManyToMany => "#d14f9b",
        EdgeKind::Subclass => "#d68bb6",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Dot,
    Json,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dot" | "gv" | "graphviz" => Ok(ReportFormat::Dot),
            "json" => Ok(ReportFormat::Json),
            other => anyhow::bail!("Unsupported output format: {}", other),
        }
    }
}

#[derive(Debug, Serialize)]
struct GraphEdge<'a> {
    source: &'a str,
    target: &'a str,
    kind: EdgeKind,
}

#[derive(Debug, Serialize)]
struct GraphReport<'a> {
    nodes: &'a NodeSets,
    edges: &'a EdgeSets,
    graph: MaterializedGraph<'a>,
    statistics: GraphStatistics,
}

#[derive(Debug, Serialize)]
struct MaterializedGraph<'a> {
    nodes: Vec<&'a str>,
    edges: Vec<GraphEdge<'a>>,
}

/// Renders a built model graph as Graphviz DOT or JSON.
pub struct ReportGenerator {
    format: ReportFormat,
}

impl ReportGenerator {
    pub fn new(format: ReportFormat) -> Self {
        ReportGenerator { format }
    }

    pub fn render(&self, output: &GraphOutput) -> Result<String> {
        match self.format {
            ReportFormat::Dot => Ok(self.generate_dot(output)),
            ReportFormat::Json => self.generate_json(output),
        }
    }

    /// Render and write to `path`
    pub fn write_to_file(&self, output: &GraphOutput, path: &Path) -> Result<()> {
        let rendered = self.render(output)?;
        fs::write(path, rendered)
            .with_context(|| format!("Failed to write graph to {}", path.display()))?;
        log::info!("Saved graph to {}", path.display());
        Ok(())
    }

    /// Only nodes and edges present in the materialised graph are drawn. Node
    /// colour comes from the abstract/concrete classification; names that
    /// are neither (the root base, undeclared relation targets) are drawn as
    /// bare labels.
    pub fn generate_dot(&self, output: &GraphOutput) -> String {
        let abstract_models: HashSet<&str> =
            output.nodes.abstract_models.iter().map(String::as_str).collect();
        let concrete: HashSet<&str> = output.nodes.concrete.iter().map(String::as_str).collect();

        let mut dot = String::new();
        dot.push_str("digraph models {\n");
        dot.push_str(&format!("    bgcolor=\"{}\";\n", BACKGROUND_COLOR));
        dot.push_str(&format!(
            "    node [shape=box, style=\"rounded,filled\", fontsize=8, fontcolor=\"{}\", color=\"{}\"];\n",
            LABEL_COLOR, BACKGROUND_COLOR
        ));
        dot.push_str("    edge [arrowsize=0.6];\n\n");

        for name in output.graph.node_names() {
            let attrs = if abstract_models.contains(name) {
                format!("fillcolor=\"{}\"", ABSTRACT_NODE_COLOR)
            } else if concrete.contains(name) {
                format!("fillcolor=\"{}\"", CONCRETE_NODE_COLOR)
            } else {
                "shape=plaintext, style=\"\"".to_string()
            };
            dot.push_str(&format!("    \"{}\" [{}];\n", escape(name), attrs));
        }

        if output.graph.edge_count() > 0 {
            dot.push('\n');
        }

        for (source, target, kind) in output.graph.edges() {
            let style = if kind == EdgeKind::Subclass { ", style=dashed" } else { "" };
            dot.push_str(&format!(
                "    \"{}\" -> \"{}\" [color=\"{}\", tooltip=\"{}\"{}];\n",
                escape(source),
                escape(target),
                edge_color(kind),
                kind,
                style
            ));
        }

        dot.push_str("}\n");
        dot
    }

    pub fn generate_json(&self, output: &GraphOutput) -> Result<String> {
        let report = GraphReport {
            nodes: &output.nodes,
            edges: &output.edges,
            graph: MaterializedGraph {
                nodes: output.graph.node_names(),
                edges: output
                    .graph
                    .edges()
                    .into_iter()
                    .map(|(source, target, kind)| GraphEdge { source, target, kind })
                    .collect(),
            },
            statistics: output.graph.get_statistics(),
        };

        serde_json::to_string_pretty(&report).context("Failed to serialize graph")
    }
}

fn escape(name: &str) -> String {
    name.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{classify_and_filter, HopLimit};
    use crate::config::DEFAULT_ROOT_BASE;
    use crate::graph::{build_graph, GraphOptions};
    use crate::parsers::parse_classes;

    fn output(options: &GraphOptions) -> GraphOutput {
        let mut classes = parse_classes(
            "class BaseModel(models.Model):
    class Meta:
        abstract = True

class Party(BaseModel):
    name = models.CharField(max_length=64)

class Person(BaseModel):
    party = models.ForeignKey('Party', on_delete=models.CASCADE)
",
        );
        classify_and_filter(&mut classes, DEFAULT_ROOT_BASE, HopLimit::Bounded(2));
        build_graph(&classes, options)
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("dot".parse::<ReportFormat>().unwrap(), ReportFormat::Dot);
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("png".parse::<ReportFormat>().is_err());
    }

    #[test]
    fn test_dot_output() {
        let dot = ReportGenerator::new(ReportFormat::Dot).generate_dot(&output(&GraphOptions::default()));

        assert!(dot.starts_with("digraph models {"));
        assert!(dot.contains("\"BaseModel\" [fillcolor=\"#555555\"];"));
        assert!(dot.contains("\"Party\" [fillcolor=\"#244461\"];"));
        assert!(dot.contains("\"models.Model\" [shape=plaintext"));
        assert!(dot.contains("\"Person\" -> \"Party\" [color=\"#4f9bd1\", tooltip=\"foreignkey\"];"));
        assert!(dot.contains("\"Person\" -> \"BaseModel\" [color=\"#d68bb6\", tooltip=\"subclass\", style=dashed];"));
        assert!(dot.trim_end().ends_with('}'));
    }

    #[test]
    fn test_dot_output_respects_disabled_layers() {
        let options = GraphOptions {
            subclass_enabled: false,
            ..GraphOptions::default()
        };
        let dot = ReportGenerator::new(ReportFormat::Dot).generate_dot(&output(&options));

        assert!(dot.contains("\"Person\" -> \"Party\""));
        assert!(!dot.contains("#d68bb6"));
        assert!(!dot.contains("models.Model"));
    }

    #[test]
    fn test_json_output() {
        let rendered = ReportGenerator::new(ReportFormat::Json)
            .render(&output(&GraphOptions::default()))
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();

        assert_eq!(value["nodes"]["abstract"][0], "BaseModel");
        assert_eq!(value["nodes"]["concrete"].as_array().unwrap().len(), 2);
        assert_eq!(value["edges"]["foreignkey"][0][0], "Person");
        assert_eq!(value["edges"]["foreignkey"][0][1], "Party");
        assert_eq!(value["edges"]["subclass"].as_array().unwrap().len(), 3);
        assert_eq!(value["statistics"]["total_edges"], 4);
        assert_eq!(value["graph"]["edges"][0]["kind"], "ForeignKey");
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a\"b"), "a\\\"b");
        assert_eq!(escape("plain"), "plain");
    }
}
