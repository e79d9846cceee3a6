//! Unit extraction through an LLM with a strict JSON schema.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::client::{ChatClient, ChatMessage};
use crate::error::Result;
use crate::reconcile::{CandidateUnit, Extraction, ExtractionOracle};

const EXTRACT_PROMPT: &str = "You are an education data analyst. You receive the name of a university \
and, optionally, its website. Return a JSON object whose `units` key is an array of the university's \
top-level academic or administrative units (schools, colleges, faculties, divisions, campuses). \
Each unit has: name, unit_type, city, state, website; use null for unknown values. \
Do not list departments or research centers. Also return `reference`: a URL where someone can \
verify that these units exist.";

fn units_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "units": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name":      {"type": "string"},
                        "unit_type": {"type": ["string", "null"]},
                        "city":      {"type": ["string", "null"]},
                        "state":     {"type": ["string", "null"]},
                        "website":   {"type": ["string", "null"]}
                    },
                    "required": ["name", "unit_type", "city", "state", "website"],
                    "additionalProperties": false
                }
            },
            "reference": {"type": "string"}
        },
        "required": ["units", "reference"],
        "additionalProperties": false
    })
}

/// Non-empty string field, with literal "null" treated as absent.
fn text_field(obj: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("null"))
        .map(str::to_string)
}

/// Normalize one `units` entry. Bare strings become named units; objects need a
/// `name` (or `unit`) field.
fn normalize_unit(item: &Value, reference: Option<&str>) -> Option<CandidateUnit> {
    let mut unit = match item {
        Value::String(name) if !name.trim().is_empty() => CandidateUnit::named(name.trim()),
        Value::Object(obj) => {
            let name = text_field(obj, "name").or_else(|| text_field(obj, "unit"))?;
            CandidateUnit {
                name,
                unit_type: text_field(obj, "unit_type"),
                city: text_field(obj, "city"),
                state: text_field(obj, "state"),
                website: text_field(obj, "website"),
                reference_url: text_field(obj, "reference"),
            }
        }
        _ => return None,
    };
    if unit.reference_url.is_none() {
        unit.reference_url = reference.map(str::to_string);
    }
    Some(unit)
}

/// Turn a raw extraction response into candidates.
///
/// Anything unparseable degrades to an empty list with a warning.
pub fn parse_extraction(content: &str) -> Extraction {
    let value: Value = match serde_json::from_str(content.trim()) {
        Ok(v) => v,
        Err(e) => {
            return Extraction {
                warning: Some(format!("Extraction response is not valid JSON: {}", e)),
                ..Default::default()
            }
        }
    };

    let reference = value
        .get("reference")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(obj) => match obj.get("units") {
            Some(Value::Array(items)) => items,
            _ => {
                return Extraction {
                    reference,
                    warning: Some("Extraction response did not contain a `units` list".to_string()),
                    ..Default::default()
                }
            }
        },
        _ => {
            return Extraction {
                warning: Some("Extraction response is neither an object nor a list".to_string()),
                ..Default::default()
            }
        }
    };

    let units: Vec<CandidateUnit> = items
        .iter()
        .filter_map(|item| normalize_unit(item, reference.as_deref()))
        .collect();

    if units.len() < items.len() {
        log::debug!(
            "Dropped {} extraction entr(ies) without a name",
            items.len() - units.len()
        );
    }

    Extraction {
        units,
        reference,
        warning: None,
    }
}

/// Extraction oracle backed by a chat model
pub struct LlmExtractor {
    client: ChatClient,
    max_tokens: u32,
    schema: Value,
}

impl LlmExtractor {
    pub fn new(client: ChatClient, max_tokens: u32) -> Self {
        Self {
            client,
            max_tokens,
            schema: json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "university_units",
                    "strict": true,
                    "schema": units_schema()
                }
            }),
        }
    }
}

#[async_trait]
impl ExtractionOracle for LlmExtractor {
    async fn extract(&self, entity_label: &str, reference_url: Option<&str>) -> Result<Extraction> {
        let subject = match reference_url {
            Some(url) => format!("{} -- {}", entity_label, url),
            None => entity_label.to_string(),
        };
        let messages = [ChatMessage::system(EXTRACT_PROMPT), ChatMessage::user(subject)];

        let content = self
            .client
            .complete(&messages, Some(self.max_tokens), Some(&self.schema))
            .await?;

        let extraction = parse_extraction(&content);
        match &extraction.warning {
            Some(warning) => log::warn!("{} (model {})", warning, self.client.model()),
            None => log::info!(
                "Extracted {} unit(s) for {}",
                extraction.units.len(),
                entity_label
            ),
        }
        Ok(extraction)
    }
}
