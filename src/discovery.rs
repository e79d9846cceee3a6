//! End-to-end discovery run: crawl, extract, reconcile.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::graph::{Entity, HierarchyCrawler, HierarchyGraph};
use crate::reconcile::{CandidateUnit, ExtractionOracle, MatchResult, ReconciliationEngine};
use crate::report::ReportRow;

/// Unit type reported for candidates the extractor gave no type for.
const DEFAULT_UNIT_TYPE: &str = "faculty";

/// Everything one discovery run produced.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub root: Entity,
    pub graph: HierarchyGraph,
    pub candidates: Vec<CandidateUnit>,
    /// One result per candidate, same order.
    pub results: Vec<MatchResult>,
    /// Non-fatal problems, e.g. an unusable extraction response.
    pub warnings: Vec<String>,
}

/// Per-status counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub linked: usize,
    pub orphan: usize,
    pub missing: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.linked + self.orphan + self.missing
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} linked, {} orphan, {} missing",
            self.linked, self.orphan, self.missing
        )
    }
}

impl DiscoveryReport {
    pub fn rows(&self) -> Vec<ReportRow> {
        self.candidates
            .iter()
            .zip(&self.results)
            .map(|(candidate, result)| {
                let entity = result.entity();
                ReportRow {
                    name: candidate.name.clone(),
                    status: result.status().to_string(),
                    id: entity.map(|e| e.id.clone()),
                    label: entity.map(|e| e.label.clone()),
                    unit_type: candidate
                        .unit_type
                        .clone()
                        .unwrap_or_else(|| DEFAULT_UNIT_TYPE.to_string()),
                    website: candidate.website.clone(),
                    location: candidate.location(),
                    reference_url: candidate.reference_url.clone(),
                    root_id: self.root.id.clone(),
                    root_label: self.root.label.clone(),
                }
            })
            .collect()
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for result in &self.results {
            match result {
                MatchResult::Linked(_) => summary.linked += 1,
                MatchResult::Orphan(_) => summary.orphan += 1,
                MatchResult::Missing(_) => summary.missing += 1,
            }
        }
        summary
    }
}

/// Wires the crawler, the extraction oracle and the reconciliation engine together.
pub struct Discovery {
    crawler: HierarchyCrawler,
    extractor: Arc<dyn ExtractionOracle>,
    engine: ReconciliationEngine,
}

impl Discovery {
    pub fn new(
        crawler: HierarchyCrawler,
        extractor: Arc<dyn ExtractionOracle>,
        engine: ReconciliationEngine,
    ) -> Self {
        Self {
            crawler,
            extractor,
            engine,
        }
    }

    pub fn crawler(&self) -> &HierarchyCrawler {
        &self.crawler
    }

    /// Run discovery for `root_id`. `website` is handed to the extractor as a hint.
    ///
    /// Crawl failures and oracle transport failures are fatal; an unusable extraction
    /// response is recorded as a warning and yields no candidates.
    pub async fn run(&self, root_id: &str, website: Option<&str>) -> Result<DiscoveryReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        log::info!("Discovery run {} for {}", run_id, root_id);

        let graph = self.crawler.crawl(root_id).await?;
        let root = graph.root();
        let direct = graph.direct_children(&root.id);
        let descendants = graph.descendant_ids(&root.id);
        log::info!(
            "{} ({}): {} direct child(ren), {} descendant(s)",
            root.label,
            root.id,
            direct.len(),
            descendants.len()
        );

        let extraction = self.extractor.extract(&root.label, website).await?;
        let mut warnings = Vec::new();
        if let Some(warning) = extraction.warning {
            warnings.push(warning);
        }

        let results = self
            .engine
            .reconcile(&root, &direct, &descendants, &extraction.units)
            .await?;

        let report = DiscoveryReport {
            run_id,
            started_at,
            root,
            graph,
            candidates: extraction.units,
            results,
            warnings,
        };
        log::info!("Discovery run {} finished: {}", run_id, report.summary());

        Ok(report)
    }
}
