pub mod crawler;

pub use crawler::ModelCrawler;
