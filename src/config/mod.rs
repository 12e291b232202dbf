pub mod pattern_config;

pub use pattern_config::{PatternConfig, PatternLoader, RelationTypes};

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::analysis::HopLimit;

pub const DEFAULT_ROOT_BASE: &str = "models.Model";
pub const DEFAULT_MAX_HOPS: usize = 2;

/// Directory names never descended into
pub const DIRECTORY_BLACKLIST: &[&str] = &[
    "__pycache__",
    ".git",
    ".idea",
    "env",
    "venv",
    "migrations",
    "static",
    "templates",
    "tests",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub ingestion: IngestionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Base class name that marks a class as a model
    pub root_base: String,
    pub max_hops: usize,
    /// Propagate model status until nothing changes instead of stopping after `max_hops`
    pub unbounded: bool,
    pub relation_types: RelationTypes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub source_extension: String,
    pub directory_blacklist: Vec<String>,
    pub pattern_config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub log_level: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            root_base: DEFAULT_ROOT_BASE.to_string(),
            max_hops: DEFAULT_MAX_HOPS,
            unbounded: false,
            relation_types: RelationTypes::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn hop_limit(&self) -> HopLimit {
        if self.unbounded {
            HopLimit::Unbounded
        } else {
            HopLimit::Bounded(self.max_hops)
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        IngestionConfig {
            source_extension: "py".to_string(),
            directory_blacklist: DIRECTORY_BLACKLIST.iter().map(|d| d.to_string()).collect(),
            pattern_config_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        // Load .env.local first (local overrides), then .env
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();

        let defaults = Config::default();

        let mut config = Config {
            analysis: AnalysisConfig {
                root_base: env::var("MODEL_ROOT_BASE")
                    .unwrap_or(defaults.analysis.root_base),
                max_hops: env::var("MAX_HOPS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.analysis.max_hops),
                unbounded: env::var("UNBOUNDED_HOPS")
                    .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                    .unwrap_or(false),
                relation_types: defaults.analysis.relation_types,
            },
            ingestion: IngestionConfig {
                source_extension: env::var("SOURCE_EXTENSION")
                    .unwrap_or(defaults.ingestion.source_extension),
                directory_blacklist: defaults.ingestion.directory_blacklist,
                pattern_config_path: env::var("PATTERN_CONFIG_PATH").ok(),
            },
            logging: LoggingConfig {
                log_level: env::var("LOG_LEVEL").unwrap_or(defaults.logging.log_level),
            },
        };

        if let Some(path) = config.ingestion.pattern_config_path.clone() {
            let patterns = PatternLoader::load_from_file(Path::new(&path))?;
            config.apply_patterns(patterns);
        }

        Ok(config)
    }

    /// Layer a pattern file over this configuration
    pub fn apply_patterns(&mut self, patterns: PatternConfig) {
        if let Some(root_base) = patterns.root_base {
            self.analysis.root_base = root_base;
        }
        self.analysis.relation_types = patterns.relation_types;

        for dir in patterns.directory_blacklist {
            if !self.ingestion.directory_blacklist.contains(&dir) {
                self.ingestion.directory_blacklist.push(dir);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.analysis.root_base, "models.Model");
        assert_eq!(config.analysis.hop_limit(), HopLimit::Bounded(2));
        assert_eq!(config.ingestion.source_extension, "py");
        assert!(config.ingestion.directory_blacklist.contains(&"migrations".to_string()));
    }

    #[test]
    fn test_apply_patterns() {
        let mut config = Config::default();
        let patterns = PatternLoader::parse(
            r#"{"root_base": "db.Model", "directory_blacklist": ["fixtures", "tests"]}"#,
            "json",
        )
        .unwrap();

        config.apply_patterns(patterns);

        assert_eq!(config.analysis.root_base, "db.Model");
        let blacklist = &config.ingestion.directory_blacklist;
        assert_eq!(blacklist.len(), DIRECTORY_BLACKLIST.len() + 1);
        assert_eq!(blacklist.last().map(String::as_str), Some("fixtures"));
    }

    #[test]
    fn test_unbounded_hop_limit() {
        let analysis = AnalysisConfig {
            unbounded: true,
            ..AnalysisConfig::default()
        };
        assert_eq!(analysis.hop_limit(), HopLimit::Unbounded);
    }
}
