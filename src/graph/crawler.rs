//! BFS crawl of an organizational subtree over bidirectional predicate pairs.

use futures_util::future::try_join_all;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{is_entity_id, Edge, Entity, HierarchyGraph, Pacer, PredicatePair};
use crate::config::Config;
use crate::error::{Result, WikiorgError};
use crate::source::{binding_value, entity_id_from_uri, Binding, GraphPattern, GraphQueryClient};

/// Crawl behaviour: relation set, label language, retry and pacing.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub pairs: Vec<PredicatePair>,
    pub language: String,
    /// Attempts per query, first one included.
    pub max_attempts: u32,
    pub retry_delay: Duration,
    /// Gap between successive outbound queries.
    pub pause: Duration,
    pub concurrent_pairs: bool,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl CrawlOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pairs: config.crawl.predicate_pairs.clone(),
            language: config.wikiorg.language.clone(),
            max_attempts: config.crawl.max_attempts,
            retry_delay: config.crawl.retry_delay(),
            pause: config.crawl.pause(),
            concurrent_pairs: config.crawl.concurrent_pairs,
        }
    }

    /// No pause and no retry delay.
    pub fn without_delays(mut self) -> Self {
        self.pause = Duration::ZERO;
        self.retry_delay = Duration::ZERO;
        self
    }
}

/// Discovers the subtree below a root entity.
///
/// Each visited node gets one query per predicate pair; every returned row becomes a
/// parent→child edge. A node is queued only the first time it is seen, so cycles and
/// multiple parents never cause a second visit.
pub struct HierarchyCrawler {
    client: Arc<dyn GraphQueryClient>,
    options: CrawlOptions,
    pacer: Arc<Pacer>,
    abort: Arc<AtomicBool>,
}

impl HierarchyCrawler {
    pub fn new(client: Arc<dyn GraphQueryClient>, options: CrawlOptions) -> Self {
        let pacer = Arc::new(Pacer::new(options.pause));
        Self {
            client,
            options,
            pacer,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a pacer with other users of the same remote source.
    pub fn with_pacer(mut self, pacer: Arc<Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn options(&self) -> &CrawlOptions {
        &self.options
    }

    /// Setting the returned flag stops the crawl before its next BFS step.
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abort)
    }

    /// Label of `id` in the configured language.
    pub async fn fetch_label(&self, id: &str) -> Result<String> {
        let pattern = GraphPattern::EntityLabel {
            id: id.to_string(),
            language: self.options.language.clone(),
        };
        let rows = self.query_with_retry(&pattern).await?;
        rows.iter()
            .find_map(|row| binding_value(row, "label"))
            .map(str::to_string)
            .ok_or_else(|| WikiorgError::MissingRoot(id.to_string()))
    }

    /// Crawl everything reachable from `root_id`.
    pub async fn crawl(&self, root_id: &str) -> Result<HierarchyGraph> {
        if !is_entity_id(root_id) {
            return Err(WikiorgError::InvalidEntityId(root_id.to_string()));
        }

        let root_label = self.fetch_label(root_id).await?;
        log::info!("Crawling hierarchy of {} ({})", root_label, root_id);

        let mut graph = HierarchyGraph::new(Entity::new(root_id, root_label));
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        visited.insert(root_id.to_string());
        queue.push_back(root_id.to_string());

        let mut expanded = 0usize;

        while let Some(parent) = queue.pop_front() {
            if self.abort.load(Ordering::SeqCst) {
                log::warn!("Crawl of {} aborted after {} node(s)", root_id, expanded);
                return Err(WikiorgError::Aborted);
            }

            let sweep = self.sweep(&parent).await?;
            let mut discovered = 0usize;

            for (pair, rows) in self.options.pairs.iter().zip(sweep) {
                for row in &rows {
                    let Some((edge, child_label)) = edge_from_row(&parent, pair, row) else {
                        log::warn!("Skipping row without ?child for {}: {:?}", parent, row);
                        continue;
                    };
                    if visited.insert(edge.child.clone()) {
                        queue.push_back(edge.child.clone());
                        discovered += 1;
                    }
                    graph.add_edge(edge, &child_label);
                }
            }

            expanded += 1;
            log::debug!(
                "Expanded {} ({} new, {} queued)",
                parent,
                discovered,
                queue.len()
            );
        }

        log::info!(
            "Crawl of {} finished: {} entities, {} edges",
            root_id,
            graph.node_count(),
            graph.edges().len()
        );

        Ok(graph)
    }

    /// One query per predicate pair, results in pair order.
    async fn sweep(&self, parent: &str) -> Result<Vec<Vec<Binding>>> {
        let patterns: Vec<GraphPattern> = self
            .options
            .pairs
            .iter()
            .map(|pair| GraphPattern::Relations {
                parent: parent.to_string(),
                pair: pair.clone(),
                language: self.options.language.clone(),
            })
            .collect();

        if self.options.concurrent_pairs {
            return try_join_all(patterns.iter().map(|p| self.query_with_retry(p))).await;
        }

        let mut out = Vec::with_capacity(patterns.len());
        for pattern in &patterns {
            out.push(self.query_with_retry(pattern).await?);
        }
        Ok(out)
    }

    /// Run one query, retrying transient failures up to `max_attempts` in total.
    async fn query_with_retry(&self, pattern: &GraphPattern) -> Result<Vec<Binding>> {
        let max_attempts = self.options.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            self.pacer.wait().await;

            match self.client.query(pattern).await {
                Ok(rows) => return Ok(rows),
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    log::warn!(
                        "Retry {}/{} for {} after error: {}",
                        attempt,
                        max_attempts - 1,
                        pattern.describe(),
                        e
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(e) if e.is_transient() => {
                    return Err(WikiorgError::RetriesExhausted {
                        attempts: attempt,
                        context: pattern.describe(),
                        last_error: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Normalize one result row to a parent→child edge plus the child's label.
fn edge_from_row(parent: &str, pair: &PredicatePair, row: &Binding) -> Option<(Edge, String)> {
    let child = entity_id_from_uri(binding_value(row, "child")?).to_string();
    let child_label = binding_value(row, "childLabel")
        .map(str::to_string)
        .unwrap_or_else(|| child.clone());
    let relation = binding_value(row, "propLabel")
        .or_else(|| binding_value(row, "prop").map(entity_id_from_uri))
        .map(str::to_string)
        .unwrap_or_else(|| pair.describe());
    let child_type = binding_value(row, "childTypeLabel").map(str::to_string);

    Some((
        Edge {
            parent: parent.to_string(),
            child,
            relation,
            child_type,
        },
        child_label,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeGraph;

    fn options() -> CrawlOptions {
        CrawlOptions::default().without_delays()
    }

    /// Q1 ─P527→ Q2 ─P527→ Q3, Q4 ─P361→ Q1, Q5 ─P749→ Q4 (subsidiary link),
    /// Q3 ─P361→ Q4 (second parent), Q3 ─P527→ Q1 (cycle back to root).
    fn university() -> FakeGraph {
        FakeGraph::new()
            .entity("Q1", "Example University")
            .entity("Q2", "Engineering")
            .entity("Q3", "Robotics Lab")
            .entity("Q4", "School of Medicine")
            .entity("Q5", "Teaching Hospital")
            .triple("Q1", "P527", "Q2")
            .triple("Q2", "P527", "Q3")
            .triple("Q4", "P361", "Q1")
            .triple("Q5", "P749", "Q4")
            .triple("Q3", "P361", "Q4")
            .triple("Q3", "P527", "Q1")
            .typed("Q2", "faculty")
    }

    #[tokio::test]
    async fn test_crawl_discovers_all_descendants() {
        let fake = Arc::new(university());
        let crawler = HierarchyCrawler::new(fake.clone(), options());
        let graph = crawler.crawl("Q1").await.unwrap();

        assert_eq!(graph.root_id(), "Q1");
        assert_eq!(graph.label("Q1"), Some("Example University"));

        let direct: Vec<_> = graph.direct_children("Q1").into_iter().map(|e| e.id).collect();
        assert_eq!(direct, vec!["Q2", "Q4"]);

        let desc = graph.descendant_ids("Q1");
        for id in ["Q2", "Q3", "Q4", "Q5"] {
            assert!(desc.contains(id), "missing descendant {}", id);
        }
    }

    #[tokio::test]
    async fn test_up_predicate_normalized_to_parent_child() {
        let fake = Arc::new(university());
        let crawler = HierarchyCrawler::new(fake, options());
        let graph = crawler.crawl("Q1").await.unwrap();

        // Q4 P361 Q1 and Q5 P749 Q4 point upwards; edges point down.
        assert!(graph.edges().iter().any(|e| e.parent == "Q1" && e.child == "Q4"));
        assert!(graph.edges().iter().any(|e| e.parent == "Q4" && e.child == "Q5"));
        assert!(!graph.edges().iter().any(|e| e.parent == "Q4" && e.child == "Q1"));
        assert_eq!(graph.relation("Q1", "Q4"), Some("part of"));
        assert_eq!(graph.relation("Q1", "Q2"), Some("has part(s)"));
        assert_eq!(graph.child_type("Q2"), Some("faculty"));
    }

    #[tokio::test]
    async fn test_each_node_expanded_once() {
        let fake = Arc::new(university());
        let crawler = HierarchyCrawler::new(fake.clone(), options());
        let graph = crawler.crawl("Q1").await.unwrap();

        let pairs = crawler.options().pairs.len();
        for id in ["Q1", "Q2", "Q3", "Q4", "Q5"] {
            assert_eq!(fake.relation_queries_for(id), pairs, "{} expanded more than once", id);
        }
        assert_eq!(fake.relation_query_count(), graph.node_count() * pairs);
        assert_eq!(fake.label_query_count(), 1);
    }

    #[tokio::test]
    async fn test_multiple_parents_and_cycles_recorded_not_revisited() {
        let fake = Arc::new(university());
        let crawler = HierarchyCrawler::new(fake, options());
        let graph = crawler.crawl("Q1").await.unwrap();

        // Q3 has two parents; both edges are kept.
        assert!(graph.edges().iter().any(|e| e.parent == "Q2" && e.child == "Q3"));
        assert!(graph.edges().iter().any(|e| e.parent == "Q4" && e.child == "Q3"));
        // The cycle edge back to the root is kept, the root label untouched.
        assert!(graph.edges().iter().any(|e| e.parent == "Q3" && e.child == "Q1"));
        assert_eq!(graph.label("Q1"), Some("Example University"));
        assert_eq!(graph.node_count(), 5);
    }

    #[tokio::test]
    async fn test_label_map_complete() {
        let fake = Arc::new(university());
        let crawler = HierarchyCrawler::new(fake, options());
        let graph = crawler.crawl("Q1").await.unwrap();

        for edge in graph.edges() {
            assert!(graph.label(&edge.parent).is_some(), "no label for {}", edge.parent);
            assert!(graph.label(&edge.child).is_some(), "no label for {}", edge.child);
        }
    }

    #[tokio::test]
    async fn test_root_without_edges() {
        let fake = Arc::new(FakeGraph::new().entity("Q7", "Lonely College"));
        let crawler = HierarchyCrawler::new(fake, options());
        let graph = crawler.crawl("Q7").await.unwrap();

        assert!(graph.edges().is_empty());
        assert_eq!(graph.label("Q7"), Some("Lonely College"));
        assert!(graph.children_of("Q7").is_empty());
        assert!(graph.descendant_ids("Q7").is_empty());
    }

    #[tokio::test]
    async fn test_self_loop_does_not_requeue() {
        let fake = Arc::new(
            FakeGraph::new()
                .entity("Q1", "Uni")
                .triple("Q1", "P527", "Q1"),
        );
        let crawler = HierarchyCrawler::new(fake.clone(), options());
        let graph = crawler.crawl("Q1").await.unwrap();

        assert_eq!(graph.edges().len(), 1);
        assert_eq!(graph.edges()[0].child, "Q1");
        assert_eq!(graph.label("Q1"), Some("Uni"));
        assert_eq!(fake.relation_queries_for("Q1"), crawler.options().pairs.len());
    }

    #[tokio::test]
    async fn test_recrawl_is_idempotent() {
        let fake = Arc::new(university());
        let crawler = HierarchyCrawler::new(fake, options());
        let first = crawler.crawl("Q1").await.unwrap();
        let second = crawler.crawl("Q1").await.unwrap();
        assert_eq!(first.edge_set(), second.edge_set());
        assert_eq!(first.labels(), second.labels());
    }

    #[tokio::test]
    async fn test_concurrent_pairs_same_result() {
        let sequential = HierarchyCrawler::new(Arc::new(university()), options())
            .crawl("Q1")
            .await
            .unwrap();

        let mut concurrent_opts = options();
        concurrent_opts.concurrent_pairs = true;
        let concurrent = HierarchyCrawler::new(Arc::new(university()), concurrent_opts)
            .crawl("Q1")
            .await
            .unwrap();

        assert_eq!(sequential.edges(), concurrent.edges());
        assert_eq!(sequential.labels(), concurrent.labels());
    }

    #[tokio::test]
    async fn test_missing_root_is_fatal_before_crawl() {
        let fake = Arc::new(FakeGraph::new().triple("Q1", "P527", "Q2"));
        let crawler = HierarchyCrawler::new(fake.clone(), options());
        let err = crawler.crawl("Q1").await.unwrap_err();

        assert!(matches!(err, WikiorgError::MissingRoot(ref id) if id == "Q1"));
        assert_eq!(fake.relation_query_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_root_id_rejected_without_queries() {
        let fake = Arc::new(university());
        let crawler = HierarchyCrawler::new(fake.clone(), options());
        let err = crawler.crawl("not-an-id").await.unwrap_err();

        assert!(matches!(err, WikiorgError::InvalidEntityId(_)));
        assert_eq!(fake.call_count(), 0);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_after_exact_bound() {
        let fake = Arc::new(university().always_failing());
        let mut opts = options();
        opts.max_attempts = 3;
        let crawler = HierarchyCrawler::new(fake.clone(), opts);
        let err = crawler.crawl("Q1").await.unwrap_err();

        match err {
            WikiorgError::RetriesExhausted { attempts, context, .. } => {
                assert_eq!(attempts, 3);
                assert!(context.contains("Q1"));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(fake.call_count(), 3);
    }

    #[tokio::test]
    async fn test_relation_query_exhaustion_is_fatal() {
        let fake = Arc::new(university().failing_relations());
        let mut opts = options();
        opts.max_attempts = 4;
        let crawler = HierarchyCrawler::new(fake.clone(), opts);
        let err = crawler.crawl("Q1").await.unwrap_err();

        assert!(matches!(err, WikiorgError::RetriesExhausted { attempts: 4, .. }));
        assert_eq!(fake.label_query_count(), 1);
        assert_eq!(fake.relation_query_count(), 4);
    }

    #[tokio::test]
    async fn test_transient_failures_recovered() {
        let fake = Arc::new(university().failing_first(2));
        let crawler = HierarchyCrawler::new(fake.clone(), options());
        let graph = crawler.crawl("Q1").await.unwrap();

        assert_eq!(graph.node_count(), 5);
        // Two failed attempts on the label query, then a normal crawl.
        assert_eq!(fake.label_query_count(), 3);
    }

    #[tokio::test]
    async fn test_abort_stops_before_next_step() {
        let fake = Arc::new(university());
        let crawler = HierarchyCrawler::new(fake.clone(), options());
        crawler.abort_handle().store(true, Ordering::SeqCst);

        let err = crawler.crawl("Q1").await.unwrap_err();
        assert!(matches!(err, WikiorgError::Aborted));
        assert_eq!(fake.relation_query_count(), 0);
    }

    #[tokio::test]
    async fn test_shared_pacer_bounds_aggregate_rate() {
        let pacer = Arc::new(Pacer::new(Duration::from_millis(10)));
        let a = Arc::new(FakeGraph::new().entity("Q7", "Lonely College"));
        let b = Arc::new(FakeGraph::new().entity("Q8", "Other College"));
        let first = HierarchyCrawler::new(a.clone(), options()).with_pacer(pacer.clone());
        let second = HierarchyCrawler::new(b.clone(), options()).with_pacer(pacer.clone());

        let start = tokio::time::Instant::now();
        let (ra, rb) = tokio::join!(first.crawl("Q7"), second.crawl("Q8"));
        ra.unwrap();
        rb.unwrap();

        let queries = (a.call_count() + b.call_count()) as u32;
        assert_eq!(queries, 8);
        assert!(start.elapsed() >= pacer.interval() * (queries - 1));
    }

    #[test]
    fn test_edge_from_row_fallbacks() {
        use crate::source::BindingValue;

        let pair = PredicatePair::new("P527", "P361");
        let mut row = Binding::new();
        row.insert(
            "child".to_string(),
            BindingValue::uri("http://www.wikidata.org/entity/Q9"),
        );
        let (edge, label) = edge_from_row("Q1", &pair, &row).unwrap();
        assert_eq!(edge.child, "Q9");
        assert_eq!(label, "Q9");
        assert_eq!(edge.relation, "P527/P361");
        assert_eq!(edge.child_type, None);

        row.insert(
            "prop".to_string(),
            BindingValue::uri("http://www.wikidata.org/entity/P361"),
        );
        let (edge, _) = edge_from_row("Q1", &pair, &row).unwrap();
        assert_eq!(edge.relation, "P361");

        assert!(edge_from_row("Q1", &pair, &Binding::new()).is_none());
    }
}
