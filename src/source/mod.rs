//! Remote graph source: query patterns, result bindings and the client boundary.

mod sparql;

pub use sparql::{parse_results, SparqlClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::graph::PredicatePair;

/// One bound variable in a result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingValue {
    pub value: String,
    /// `uri`, `literal`, `bnode`, ...
    #[serde(rename = "type")]
    pub kind: String,
}

impl BindingValue {
    pub fn uri(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: "uri".to_string(),
        }
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: "literal".to_string(),
        }
    }
}

/// A result row: variable name → bound value. Unbound variables are absent.
pub type Binding = HashMap<String, BindingValue>;

/// Value of `var` in a row, if bound.
pub fn binding_value<'a>(binding: &'a Binding, var: &str) -> Option<&'a str> {
    binding.get(var).map(|v| v.value.as_str())
}

/// Trailing path segment of an entity URI (`http://www.wikidata.org/entity/Q42` → `Q42`).
pub fn entity_id_from_uri(uri: &str) -> &str {
    uri.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(uri)
}

/// The graph patterns this crate asks of the remote source.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphPattern {
    /// Label of one entity in one language. Binds `?label`.
    EntityLabel { id: String, language: String },
    /// Children of `parent` through either direction of one predicate pair.
    /// Binds `?child ?childLabel ?prop ?propLabel` and optionally `?childTypeLabel`.
    Relations {
        parent: String,
        pair: PredicatePair,
        language: String,
    },
    /// Instances (transitively) of `class` located in `country`.
    /// Binds `?item ?itemLabel` and optionally `?website`.
    InstancesInCountry {
        class: String,
        country: String,
        language: String,
    },
}

impl GraphPattern {
    /// Render as a SPARQL query against the Wikidata prefixes.
    pub fn to_sparql(&self) -> String {
        match self {
            GraphPattern::EntityLabel { id, language } => format!(
                "SELECT ?label WHERE {{ wd:{id} rdfs:label ?label . FILTER(LANG(?label) = \"{language}\") }}"
            ),
            GraphPattern::Relations {
                parent,
                pair,
                language,
            } => format!(
                r#"SELECT DISTINCT ?child ?childLabel ?prop ?propLabel ?childTypeLabel WHERE {{
  VALUES ?parent {{ wd:{parent} }}
  {{ ?parent wdt:{down} ?child . BIND(wd:{down} AS ?prop) }}
  UNION
  {{ ?child wdt:{up} ?parent . BIND(wd:{up} AS ?prop) }}
  OPTIONAL {{ ?child wdt:P31 ?childType . }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{language}". }}
}}"#,
                down = pair.down,
                up = pair.up,
            ),
            GraphPattern::InstancesInCountry {
                class,
                country,
                language,
            } => format!(
                r#"SELECT DISTINCT ?item ?itemLabel ?website WHERE {{
  ?item wdt:P31/wdt:P279* wd:{class} ;
        wdt:P17 wd:{country} .
  OPTIONAL {{ ?item wdt:P856 ?website }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{language}". }}
}}
ORDER BY ?itemLabel"#
            ),
        }
    }

    /// Short description for logs and error context.
    pub fn describe(&self) -> String {
        match self {
            GraphPattern::EntityLabel { id, .. } => format!("label of {}", id),
            GraphPattern::Relations { parent, pair, .. } => {
                format!("children of {} via {}", parent, pair.describe())
            }
            GraphPattern::InstancesInCountry { class, country, .. } => {
                format!("instances of {} in {}", class, country)
            }
        }
    }
}

/// Executes graph patterns against a remote source.
///
/// An empty result is `Ok(vec![])`. Timeouts, non-2xx statuses and malformed bodies
/// are reported as [`WikiorgError::Transient`](crate::WikiorgError::Transient).
#[async_trait]
pub trait GraphQueryClient: Send + Sync {
    async fn query(&self, pattern: &GraphPattern) -> Result<Vec<Binding>>;
}
