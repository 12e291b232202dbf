pub mod generator;

pub use generator::{ReportFormat, ReportGenerator};
