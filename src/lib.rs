//! Static extraction of Django model dependency graphs.
//!
//! Source files are scanned with regular expressions rather than imported, so
//! the target project never has to be importable. The pipeline runs
//! [`ingestion::ModelCrawler`] to collect classes, [`analysis::ModelClassifier`]
//! to keep only models, [`analysis::propagate_fields`] to pull mixin fields
//! down, then [`graph::GraphBuilder`] and [`report::ReportGenerator`].

pub mod analysis;
pub mod config;
pub mod graph;
pub mod ingestion;
pub mod parsers;
pub mod report;
