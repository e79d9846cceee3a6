pub mod config;
pub mod error;
pub mod source;
pub mod search;
pub mod cache;
pub mod graph;
pub mod reconcile;
pub mod llm;
pub mod discovery;
pub mod harvest;
pub mod report;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{Result, WikiorgError};
pub use discovery::{Discovery, DiscoveryReport, Summary};
pub use graph::{CrawlOptions, Edge, Entity, HierarchyCrawler, HierarchyGraph, PredicatePair};
pub use reconcile::{CandidateUnit, MatchResult, ReconciliationEngine};
