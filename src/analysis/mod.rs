pub mod classifier;
pub mod mixins;

pub use classifier::{classify_and_filter, ClassificationSummary, HopLimit, ModelClassifier};
pub use mixins::propagate_fields;

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::ingestion::ModelCrawler;
use crate::parsers::{parse_classes, ClassMap};

/// Runs discovery, classification and mixin propagation in order.
pub struct ModelAnalyzer {
    crawler: ModelCrawler,
    classifier: ModelClassifier,
}

impl ModelAnalyzer {
    pub fn new(config: &Config) -> Self {
        ModelAnalyzer {
            crawler: ModelCrawler::new(&config.ingestion),
            classifier: ModelClassifier::new(
                &config.analysis.root_base,
                config.analysis.hop_limit(),
            ),
        }
    }

    /// Find every model declared under `root`, with mixin fields applied
    pub fn analyze_directory(&self, root: &Path) -> Result<ClassMap> {
        let classes = self.crawler.parse_classes_from_directory(root)?;
        Ok(self.finish(classes))
    }

    /// Same as `analyze_directory` for a single in-memory source text
    pub fn analyze_source(&self, text: &str) -> ClassMap {
        self.finish(parse_classes(text))
    }

    fn finish(&self, mut classes: ClassMap) -> ClassMap {
        let summary = self.classifier.classify_and_filter(&mut classes);
        log::info!(
            "Classified {} models ({} classes dropped, {} passes)",
            summary.retained,
            summary.dropped.len(),
            summary.passes
        );

        let copied = propagate_fields(&mut classes);
        log::debug!("Copied {} mixin fields", copied);

        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_source() {
        let analyzer = ModelAnalyzer::new(&Config::default());
        let models = analyzer.analyze_source(
            "class BaseModel(models.Model):
    created_on = models.DateTimeField(auto_now_add=True)

    class Meta:
        abstract = True

class Party(BaseModel):
    name = models.CharField(max_length=64)

class Helper(object):
    pass
",
        );

        assert_eq!(models.len(), 2);
        assert!(models["BaseModel"].is_abstract);
        let party_fields: Vec<&str> = models["Party"].fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(party_fields, vec!["name", "created_on"]);
    }
}
