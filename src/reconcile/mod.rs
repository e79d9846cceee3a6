//! Reconciliation of externally extracted units against the crawled hierarchy.
//!
//! Each candidate is classified as linked (an immediate child of the root), orphan
//! (present in Wikidata without the direct parent link) or missing.

mod engine;

pub use engine::ReconciliationEngine;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::graph::Entity;

/// An unverified claim about an organizational unit, as produced by an extractor.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CandidateUnit {
    pub name: String,
    #[serde(default)]
    pub unit_type: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    /// Page supporting the claim.
    #[serde(default)]
    pub reference_url: Option<String>,
}

impl CandidateUnit {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// `city, state` with absent parts skipped.
    pub fn location(&self) -> String {
        [self.city.as_deref(), self.state.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Outcome of classifying one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MatchResult {
    /// Matches an immediate child of the root.
    Linked(Entity),
    /// Matches an entity that lacks the direct parent link.
    Orphan(Entity),
    /// No trustworthy match.
    Missing(CandidateUnit),
}

impl MatchResult {
    pub fn status(&self) -> &'static str {
        match self {
            MatchResult::Linked(_) => "linked",
            MatchResult::Orphan(_) => "orphan",
            MatchResult::Missing(_) => "missing",
        }
    }

    pub fn entity(&self) -> Option<&Entity> {
        match self {
            MatchResult::Linked(e) | MatchResult::Orphan(e) => Some(e),
            MatchResult::Missing(_) => None,
        }
    }
}

/// What a match oracle answered, before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchDecision {
    NoMatch,
    /// Plain match on an offered entity.
    Match(String),
    /// Match on an offered entity that the oracle says lacks the parent link.
    Orphan(String),
}

/// Decides which offered entity, if any, a candidate name refers to.
///
/// Untrusted: answers are re-validated against the offered choices.
#[async_trait]
pub trait MatchOracle: Send + Sync {
    async fn choose(
        &self,
        candidate: &str,
        context_label: &str,
        choices: &[Entity],
    ) -> Result<MatchDecision>;
}

/// Units extracted for one entity, plus any non-fatal warning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub units: Vec<CandidateUnit>,
    /// Reference URL supplied for the whole list.
    pub reference: Option<String>,
    /// Set when the response was malformed and degraded to an empty list.
    pub warning: Option<String>,
}

/// Lists the organizational units of an entity from unstructured sources.
#[async_trait]
pub trait ExtractionOracle: Send + Sync {
    async fn extract(&self, entity_label: &str, reference_url: Option<&str>) -> Result<Extraction>;
}
