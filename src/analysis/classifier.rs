use serde::{Deserialize, Serialize};

use crate::parsers::ClassMap;

/// How far model status propagates down inheritance chains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HopLimit {
    /// At most this many passes over the classes
    Bounded(usize),
    /// Repeat passes until no class changes
    Unbounded,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationSummary {
    /// Passes that promoted at least one class
    pub passes: usize,
    pub retained: usize,
    /// Classes removed from the map, in discovery order
    pub dropped: Vec<String>,
    /// Dropped classes that inherit from the root base through declared
    /// classes, but too deeply for the hop limit
    pub depth_limited: Vec<String>,
}

/// Decides which classes are models by inheritance from a root base name.
pub struct ModelClassifier {
    root_base: String,
    hop_limit: HopLimit,
}

impl ModelClassifier {
    pub fn new(root_base: &str, hop_limit: HopLimit) -> Self {
        ModelClassifier {
            root_base: root_base.to_string(),
            hop_limit,
        }
    }

    /// Flag every model class and remove everything else from `classes`.
    ///
    /// Each pass visits classes in map order and promotes a class when one of
    /// its bases is the root base, or a class already flagged as a model. A
    /// class promoted earlier in a pass counts for the classes after it in the
    /// same pass. A flagged class is never unflagged.
    pub fn classify_and_filter(&self, classes: &mut ClassMap) -> ClassificationSummary {
        let mut summary = ClassificationSummary::default();

        let max_passes = match self.hop_limit {
            HopLimit::Bounded(n) => n,
            HopLimit::Unbounded => usize::MAX,
        };

        for _ in 0..max_passes {
            if !self.propagate_once(classes) {
                break;
            }
            summary.passes += 1;
        }

        summary.depth_limited = self.find_depth_limited(classes);
        for name in &summary.depth_limited {
            log::warn!(
                "Class '{}' was not classified as a model: its inheritance chain is deeper than {:?}",
                name,
                self.hop_limit
            );
        }

        summary.dropped = classes
            .values()
            .filter(|c| !c.is_model)
            .map(|c| c.name.clone())
            .collect();
        for name in &summary.dropped {
            log::debug!("Dropping non-model class '{}'", name);
        }

        classes.retain(|_, c| c.is_model);
        summary.retained = classes.len();

        summary
    }

    /// One pass over the map. Returns whether any class was promoted.
    fn propagate_once(&self, classes: &mut ClassMap) -> bool {
        let mut changed = false;

        for index in 0..classes.len() {
            let promote = match classes.get_index(index) {
                Some((_, class)) if !class.is_model => class
                    .class_dependencies
                    .iter()
                    .any(|dep| self.is_model_base(classes, dep)),
                _ => false,
            };

            if promote {
                if let Some((_, class)) = classes.get_index_mut(index) {
                    class.is_model = true;
                    changed = true;
                }
            }
        }

        changed
    }

    fn is_model_base(&self, classes: &ClassMap, dep: &str) -> bool {
        dep == self.root_base || classes.get(dep).map_or(false, |c| c.is_model)
    }

    /// Names of unflagged classes that further passes would promote
    fn find_depth_limited(&self, classes: &ClassMap) -> Vec<String> {
        let mut flags: Vec<bool> = classes.values().map(|c| c.is_model).collect();

        loop {
            let mut changed = false;
            for (index, class) in classes.values().enumerate() {
                if flags[index] {
                    continue;
                }
                let promote = class.class_dependencies.iter().any(|dep| {
                    dep == &self.root_base
                        || classes.get_index_of(dep.as_str()).map_or(false, |i| flags[i])
                });
                if promote {
                    flags[index] = true;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        classes
            .values()
            .zip(flags)
            .filter(|(class, flag)| *flag && !class.is_model)
            .map(|(class, _)| class.name.clone())
            .collect()
    }
}

/// Classify with the given root base and hop limit, removing non-models.
pub fn classify_and_filter(classes: &mut ClassMap, root_base: &str, hop_limit: HopLimit) -> ClassificationSummary {
    ModelClassifier::new(root_base, hop_limit).classify_and_filter(classes)
}
