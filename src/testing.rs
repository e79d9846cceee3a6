//! Deterministic in-memory collaborators for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{Result, WikiorgError};
use crate::graph::Entity;
use crate::reconcile::{CandidateUnit, Extraction, ExtractionOracle, MatchDecision, MatchOracle};
use crate::search::EntitySearch;
use crate::source::{Binding, BindingValue, GraphPattern, GraphQueryClient};

const ENTITY_PREFIX: &str = "http://www.wikidata.org/entity/";

fn entity_uri(id: &str) -> BindingValue {
    BindingValue::uri(format!("{}{}", ENTITY_PREFIX, id))
}

fn property_label(prop: &str) -> &str {
    match prop {
        "P527" => "has part(s)",
        "P361" => "part of",
        "P355" => "subsidiary",
        "P749" => "parent organization",
        "P199" => "business division",
        other => other,
    }
}

/// In-memory Wikidata: labels plus (subject, property, object) triples.
#[derive(Default)]
pub struct FakeGraph {
    labels: HashMap<String, String>,
    triples: Vec<(String, String, String)>,
    types: HashMap<String, String>,
    websites: HashMap<String, String>,
    calls: Mutex<Vec<GraphPattern>>,
    failures_left: Mutex<u32>,
    fail_all: bool,
    fail_relations: bool,
}

impl FakeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(mut self, id: &str, label: &str) -> Self {
        self.labels.insert(id.to_string(), label.to_string());
        self
    }

    pub fn triple(mut self, subject: &str, property: &str, object: &str) -> Self {
        self.triples
            .push((subject.to_string(), property.to_string(), object.to_string()));
        self
    }

    pub fn typed(mut self, id: &str, type_label: &str) -> Self {
        self.types.insert(id.to_string(), type_label.to_string());
        self
    }

    pub fn website(mut self, id: &str, url: &str) -> Self {
        self.websites.insert(id.to_string(), url.to_string());
        self
    }

    /// The next `n` queries fail transiently.
    pub fn failing_first(self, n: u32) -> Self {
        *self.failures_left.lock().unwrap() = n;
        self
    }

    /// Every query fails transiently.
    pub fn always_failing(mut self) -> Self {
        self.fail_all = true;
        self
    }

    /// Relation queries fail transiently; label queries succeed.
    pub fn failing_relations(mut self) -> Self {
        self.fail_relations = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn label_query_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| matches!(p, GraphPattern::EntityLabel { .. }))
            .count()
    }

    pub fn relation_query_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| matches!(p, GraphPattern::Relations { .. }))
            .count()
    }

    pub fn relation_queries_for(&self, id: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|p| matches!(p, GraphPattern::Relations { parent, .. } if parent == id))
            .count()
    }

    fn label_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.labels.get(id).map(String::as_str).unwrap_or(id)
    }

    fn relation_row(&self, child: &str, prop: &str) -> Binding {
        let mut row = Binding::new();
        row.insert("child".to_string(), entity_uri(child));
        row.insert(
            "childLabel".to_string(),
            BindingValue::literal(self.label_of(child)),
        );
        row.insert("prop".to_string(), entity_uri(prop));
        row.insert(
            "propLabel".to_string(),
            BindingValue::literal(property_label(prop)),
        );
        if let Some(t) = self.types.get(child) {
            row.insert("childTypeLabel".to_string(), BindingValue::literal(t.clone()));
        }
        row
    }

    fn answer(&self, pattern: &GraphPattern) -> Vec<Binding> {
        match pattern {
            GraphPattern::EntityLabel { id, .. } => self
                .labels
                .get(id)
                .map(|label| {
                    let mut row = Binding::new();
                    row.insert("label".to_string(), BindingValue::literal(label.clone()));
                    vec![row]
                })
                .unwrap_or_default(),
            GraphPattern::Relations { parent, pair, .. } => {
                let mut rows: Vec<Binding> = Vec::new();
                for (s, p, o) in &self.triples {
                    let row = if s == parent && *p == pair.down {
                        self.relation_row(o, p)
                    } else if o == parent && *p == pair.up {
                        self.relation_row(s, p)
                    } else {
                        continue;
                    };
                    // SELECT DISTINCT
                    if !rows.contains(&row) {
                        rows.push(row);
                    }
                }
                rows
            }
            GraphPattern::InstancesInCountry { class, country, .. } => {
                let mut rows = Vec::new();
                for (s, p, o) in &self.triples {
                    if p != "P31" || o != class {
                        continue;
                    }
                    let in_country = self
                        .triples
                        .iter()
                        .any(|(s2, p2, o2)| s2 == s && p2 == "P17" && o2 == country);
                    if !in_country {
                        continue;
                    }
                    let mut row = Binding::new();
                    row.insert("item".to_string(), entity_uri(s));
                    row.insert("itemLabel".to_string(), BindingValue::literal(self.label_of(s)));
                    if let Some(url) = self.websites.get(s) {
                        row.insert("website".to_string(), BindingValue::uri(url.clone()));
                    }
                    rows.push(row);
                }
                rows
            }
        }
    }
}

#[async_trait]
impl GraphQueryClient for FakeGraph {
    async fn query(&self, pattern: &GraphPattern) -> Result<Vec<Binding>> {
        self.calls.lock().unwrap().push(pattern.clone());

        let scheduled_failure = {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                true
            } else {
                false
            }
        };
        let relation = matches!(pattern, GraphPattern::Relations { .. });
        if self.fail_all || scheduled_failure || (self.fail_relations && relation) {
            return Err(WikiorgError::Transient("HTTP 503 Service Unavailable".to_string()));
        }

        Ok(self.answer(pattern))
    }
}

/// Search returning fixed hits per query text; unknown text returns nothing.
#[derive(Default)]
pub struct FakeSearch {
    hits: HashMap<String, Vec<Entity>>,
    failing: bool,
    calls: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hits(mut self, text: &str, entities: &[(&str, &str)]) -> Self {
        self.hits.insert(
            text.to_string(),
            entities.iter().map(|(id, label)| Entity::new(*id, *label)).collect(),
        );
        self
    }

    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl EntitySearch for FakeSearch {
    async fn search(&self, text: &str) -> Result<Vec<Entity>> {
        self.calls.lock().unwrap().push(text.to_string());
        if self.failing {
            return Err(WikiorgError::Transient("search unavailable".to_string()));
        }
        Ok(self.hits.get(text).cloned().unwrap_or_default())
    }
}

/// Match oracle with scripted answers per candidate name; unscripted names get `NoMatch`.
#[derive(Default)]
pub struct FakeMatcher {
    answers: HashMap<String, MatchDecision>,
    offered: Mutex<Vec<(String, Vec<Entity>)>>,
}

impl FakeMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(mut self, candidate: &str, decision: MatchDecision) -> Self {
        self.answers.insert(candidate.to_string(), decision);
        self
    }

    /// Choice sets offered so far, per candidate, in call order.
    pub fn offered(&self) -> Vec<(String, Vec<Entity>)> {
        self.offered.lock().unwrap().clone()
    }
}

#[async_trait]
impl MatchOracle for FakeMatcher {
    async fn choose(
        &self,
        candidate: &str,
        _context_label: &str,
        choices: &[Entity],
    ) -> Result<MatchDecision> {
        self.offered
            .lock()
            .unwrap()
            .push((candidate.to_string(), choices.to_vec()));
        Ok(self
            .answers
            .get(candidate)
            .cloned()
            .unwrap_or(MatchDecision::NoMatch))
    }
}

/// Extraction oracle returning a fixed candidate list.
pub struct FakeExtractor {
    extraction: Extraction,
}

impl FakeExtractor {
    pub fn with_names(names: &[&str]) -> Self {
        Self {
            extraction: Extraction {
                units: names.iter().map(|n| CandidateUnit::named(*n)).collect(),
                reference: None,
                warning: None,
            },
        }
    }

    pub fn malformed(warning: &str) -> Self {
        Self {
            extraction: Extraction {
                units: Vec::new(),
                reference: None,
                warning: Some(warning.to_string()),
            },
        }
    }
}

#[async_trait]
impl ExtractionOracle for FakeExtractor {
    async fn extract(&self, _entity_label: &str, _reference_url: Option<&str>) -> Result<Extraction> {
        Ok(self.extraction.clone())
    }
}
