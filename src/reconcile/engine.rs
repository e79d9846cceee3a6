//! Candidate classification: choice-set construction, oracle call, structural check.

use std::collections::HashSet;
use std::sync::Arc;

use super::{CandidateUnit, MatchDecision, MatchOracle, MatchResult};
use crate::error::Result;
use crate::graph::Entity;
use crate::search::{resembles, EntitySearch};

/// Classifies candidate units against a root's direct children and descendants.
///
/// The oracle only ever sees a restricted choice set: the root's direct children plus
/// search hits resembling the candidate name. Whatever it answers is checked against
/// that set and against the hierarchy's structure, never taken on trust.
pub struct ReconciliationEngine {
    oracle: Arc<dyn MatchOracle>,
    search: Option<Arc<dyn EntitySearch>>,
}

impl ReconciliationEngine {
    pub fn new(oracle: Arc<dyn MatchOracle>) -> Self {
        Self {
            oracle,
            search: None,
        }
    }

    /// Widen choice sets with search hits.
    pub fn with_search(mut self, search: Arc<dyn EntitySearch>) -> Self {
        self.search = Some(search);
        self
    }

    /// Classify every candidate, in input order.
    pub async fn reconcile(
        &self,
        root: &Entity,
        direct_children: &[Entity],
        descendant_ids: &HashSet<String>,
        candidates: &[CandidateUnit],
    ) -> Result<Vec<MatchResult>> {
        let direct_ids: HashSet<&str> = direct_children
            .iter()
            .map(|e| e.id.as_str())
            .filter(|id| *id != root.id)
            .collect();
        let mut results = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            let name = candidate.name.trim();
            if name.is_empty() {
                log::debug!("Candidate without a name classified as missing");
                results.push(MatchResult::Missing(candidate.clone()));
                continue;
            }

            let choices = self.choice_set(root, name, direct_children).await;
            let decision = self.oracle.choose(name, &root.label, &choices).await?;
            let result = classify(&decision, candidate, &choices, &direct_ids, descendant_ids);

            log::debug!("{} → {} ({:?})", name, result.status(), decision);
            results.push(result);
        }

        log::info!(
            "Reconciled {} candidate(s) for {} ({})",
            results.len(),
            root.label,
            root.id
        );

        Ok(results)
    }

    /// Direct children, then resembling search hits not already offered. The root itself
    /// is never offered, even when it links to itself.
    pub async fn choice_set(&self, root: &Entity, name: &str, direct_children: &[Entity]) -> Vec<Entity> {
        let mut choices: Vec<Entity> = direct_children
            .iter()
            .filter(|e| e.id != root.id)
            .cloned()
            .collect();

        let Some(search) = &self.search else {
            return choices;
        };

        let hits = match search.search(name).await {
            Ok(hits) => hits,
            Err(e) => {
                log::warn!(
                    "Search for '{}' failed, offering direct children only: {}",
                    name,
                    e
                );
                return choices;
            }
        };

        let mut offered: HashSet<String> = choices.iter().map(|e| e.id.clone()).collect();
        offered.insert(root.id.clone());

        for hit in hits {
            if !resembles(&hit.label, name) {
                continue;
            }
            if offered.insert(hit.id.clone()) {
                choices.push(hit);
            }
        }

        choices
    }
}

/// Turn an oracle decision into a result, trusting only what the structure confirms.
fn classify(
    decision: &MatchDecision,
    candidate: &CandidateUnit,
    choices: &[Entity],
    direct_ids: &HashSet<&str>,
    descendant_ids: &HashSet<String>,
) -> MatchResult {
    let offered = |id: &str| choices.iter().find(|e| e.id == id);

    match decision {
        MatchDecision::NoMatch => MatchResult::Missing(candidate.clone()),
        MatchDecision::Orphan(id) => match offered(id) {
            Some(entity) => MatchResult::Orphan(entity.clone()),
            None => {
                log::warn!(
                    "Oracle named {} for '{}', which was not offered; treating as missing",
                    id,
                    candidate.name
                );
                MatchResult::Missing(candidate.clone())
            }
        },
        MatchDecision::Match(id) => match offered(id) {
            None => {
                log::warn!(
                    "Oracle named {} for '{}', which was not offered; treating as missing",
                    id,
                    candidate.name
                );
                MatchResult::Missing(candidate.clone())
            }
            Some(entity) if direct_ids.contains(id.as_str()) => MatchResult::Linked(entity.clone()),
            // Reachable, but not as an immediate child: the missing link is the defect.
            Some(entity) if descendant_ids.contains(id) => MatchResult::Orphan(entity.clone()),
            Some(entity) => {
                log::warn!(
                    "Oracle matched '{}' to {} ({}), which is outside the hierarchy; treating as missing",
                    candidate.name,
                    entity.id,
                    entity.label
                );
                MatchResult::Missing(candidate.clone())
            }
        },
    }
}
