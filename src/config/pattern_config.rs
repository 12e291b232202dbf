use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::parsers::FieldKind;

/// Overrides for the names the analysis recognises, loaded from a JSON, YAML or
/// TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatternConfig {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub root_base: Option<String>,
    #[serde(default)]
    pub relation_types: RelationTypes,
    /// Appended to the built-in blacklist
    #[serde(default)]
    pub directory_blacklist: Vec<String>,
}

/// Field type strings that denote a relation to another model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationTypes {
    #[serde(default = "default_foreign_key")]
    pub foreign_key: Vec<String>,
    #[serde(default = "default_one_to_one")]
    pub one_to_one: Vec<String>,
    #[serde(default = "default_many_to_many")]
    pub many_to_many: Vec<String>,
}

impl Default for RelationTypes {
    fn default() -> Self {
        RelationTypes {
            foreign_key: default_foreign_key(),
            one_to_one: default_one_to_one(),
            many_to_many: default_many_to_many(),
        }
    }
}

impl RelationTypes {
    /// Exact string match against each relation kind. Anything unrecognised is
    /// a plain attribute.
    pub fn resolve(&self, type_name: &str) -> FieldKind {
        let matches = |names: &[String]| names.iter().any(|n| n == type_name);

        if matches(&self.foreign_key) {
            FieldKind::ForeignKey
        } else if matches(&self.one_to_one) {
            FieldKind::OneToOne
        } else if matches(&self.many_to_many) {
            FieldKind::ManyToMany
        } else {
            FieldKind::Attribute
        }
    }
}

fn default_version() -> String {
    "1".to_string()
}

fn default_foreign_key() -> Vec<String> {
    vec!["models.ForeignKey".to_string()]
}

fn default_one_to_one() -> Vec<String> {
    vec!["models.OneToOneField".to_string()]
}

fn default_many_to_many() -> Vec<String> {
    vec!["models.ManyToManyField".to_string()]
}

pub struct PatternLoader;

impl PatternLoader {
    /// Load patterns from a file, choosing the format from its extension
    pub fn load_from_file(path: &Path) -> Result<PatternConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read pattern file {}", path.display()))?;
        let ext = path.extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        Self::parse(&content, &ext)
            .with_context(|| format!("Failed to parse pattern file {}", path.display()))
    }

    /// Parse pattern file content in the given format (`json`, `yaml`/`yml` or `toml`)
    pub fn parse(content: &str, format: &str) -> Result<PatternConfig> {
        let config: PatternConfig = match format {
            "json" => serde_json::from_str(content)?,
            "yaml" | "yml" => serde_yaml::from_str(content)?,
            "toml" => toml::from_str(content)?,
            other => anyhow::bail!("Unsupported pattern file format: '{}'", other),
        };
        Ok(config)
    }
}
