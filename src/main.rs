use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use djmodgraph::analysis::ModelAnalyzer;
use djmodgraph::config::{Config, PatternLoader};
use djmodgraph::graph::{GraphBuilder, GraphOptions};
use djmodgraph::report::{ReportFormat, ReportGenerator};

/// Draw the dependency graph between the Django models of a project
#[derive(Parser, Debug)]
#[command(name = "djmodgraph", version, about)]
struct Cli {
    /// Base project directory. Models are discovered in every subdirectory
    /// that is not blacklisted.
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Write the rendered graph to this file
    #[arg(long, value_name = "PATH")]
    saveas: Option<PathBuf>,

    /// Hide subclass edges
    #[arg(long)]
    no_subclass: bool,

    /// Hide ForeignKey, OneToOneField and ManyToManyField edges
    #[arg(long)]
    no_fields: bool,

    /// Hide abstract model nodes
    #[arg(long)]
    no_abstract: bool,

    /// Hide concrete model nodes
    #[arg(long)]
    no_concrete: bool,

    /// Only relation fields: hides abstract nodes and subclass edges
    #[arg(long)]
    fields_only: bool,

    /// Only subclass edges
    #[arg(long)]
    subclass_only: bool,

    /// Don't print the rendered graph
    #[arg(long)]
    no_show: bool,

    /// Only show these models and those that share a direct relationship
    /// with them, in either direction
    #[arg(long, num_args = 1.., value_name = "NAME")]
    models: Vec<String>,

    /// Output format: dot or json
    #[arg(long, default_value = "dot")]
    format: String,

    /// Number of classification passes over the discovered classes
    #[arg(long, value_name = "N", conflicts_with = "unbounded")]
    max_hops: Option<usize>,

    /// Repeat classification passes until nothing changes
    #[arg(long)]
    unbounded: bool,

    /// Pattern file (json, yaml or toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

impl Cli {
    fn graph_options(&self) -> GraphOptions {
        let mut options = GraphOptions {
            focus: self.models.clone(),
            abstract_enabled: !self.no_abstract,
            concrete_enabled: !self.no_concrete,
            related_field_enabled: !self.no_fields,
            subclass_enabled: !self.no_subclass,
        };

        if self.fields_only {
            options.abstract_enabled = false;
            options.subclass_enabled = false;
        }
        if self.subclass_only {
            options.related_field_enabled = false;
        }

        options
    }

    fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(path) = &self.config {
            let patterns = PatternLoader::load_from_file(path)?;
            config.ingestion.pattern_config_path = Some(path.display().to_string());
            config.apply_patterns(patterns);
        }
        if let Some(max_hops) = self.max_hops {
            config.analysis.max_hops = max_hops;
            config.analysis.unbounded = false;
        }
        if self.unbounded {
            config.analysis.unbounded = true;
        }
        Ok(())
    }
}

fn log_hidden_layers(options: &GraphOptions) {
    if !options.abstract_enabled {
        info!("Abstract classes hidden");
    }
    if !options.concrete_enabled {
        info!("Concrete classes hidden");
    }
    if !options.related_field_enabled {
        info!("Field relations (ForeignKey, OneToOneField, ManyToManyField) hidden");
    }
    if !options.subclass_enabled {
        info!("Subclass relations hidden");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    cli.apply_to(&mut config)?;

    // Initialize logger
    env_logger::init_from_env(
        env_logger::Env::new().default_filter_or(config.logging.log_level.as_str()),
    );

    let format: ReportFormat = cli.format.parse()?;
    let options = cli.graph_options();
    log_hidden_layers(&options);

    info!("Scanning {}", cli.root.display());
    let analyzer = ModelAnalyzer::new(&config);
    let models = analyzer.analyze_directory(&cli.root)?;

    let builder = GraphBuilder::new(config.analysis.relation_types.clone());
    let output = builder.build(&models, &options);
    info!(
        "Graph has {} nodes and {} edges",
        output.graph.node_count(),
        output.graph.edge_count()
    );

    let generator = ReportGenerator::new(format);
    if let Some(path) = &cli.saveas {
        generator.write_to_file(&output, path)?;
    }
    if !cli.no_show {
        println!("{}", generator.render(&output)?);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use djmodgraph::analysis::HopLimit;

    #[test]
    fn test_fields_only_hides_abstract_and_subclass() {
        let cli = Cli::parse_from(["djmodgraph", "app", "--fields-only"]);
        let options = cli.graph_options();

        assert!(!options.abstract_enabled);
        assert!(!options.subclass_enabled);
        assert!(options.related_field_enabled);
        assert!(options.concrete_enabled);
    }

    #[test]
    fn test_subclass_only_hides_relations() {
        let cli = Cli::parse_from(["djmodgraph", "--subclass-only", "--no-concrete"]);
        let options = cli.graph_options();

        assert_eq!(cli.root, PathBuf::from("."));
        assert!(!options.related_field_enabled);
        assert!(options.subclass_enabled);
        assert!(!options.concrete_enabled);
    }

    #[test]
    fn test_fields_only_with_subclass_only_hides_every_edge_layer() {
        let cli = Cli::parse_from(["djmodgraph", "--fields-only", "--subclass-only"]);
        let options = cli.graph_options();

        assert!(!options.abstract_enabled);
        assert!(!options.subclass_enabled);
        assert!(!options.related_field_enabled);
        assert!(options.concrete_enabled);
    }

    #[test]
    fn test_models_focus() {
        let cli = Cli::parse_from(["djmodgraph", ".", "--models", "Party", "Person"]);
        assert_eq!(cli.graph_options().focus, vec!["Party", "Person"]);
    }

    #[test]
    fn test_hop_overrides() {
        let mut config = Config::default();
        Cli::parse_from(["djmodgraph", "--max-hops", "5"]).apply_to(&mut config).unwrap();
        assert_eq!(config.analysis.hop_limit(), HopLimit::Bounded(5));

        Cli::parse_from(["djmodgraph", "--unbounded"]).apply_to(&mut config).unwrap();
        assert_eq!(config.analysis.hop_limit(), HopLimit::Unbounded);

        assert!(Cli::try_parse_from(["djmodgraph", "--unbounded", "--max-hops", "3"]).is_err());
    }
}
