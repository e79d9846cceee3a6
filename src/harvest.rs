//! Country-wide university listing.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;
use crate::source::{binding_value, entity_id_from_uri, GraphPattern, GraphQueryClient};

/// `university` (Q3918); subclasses are included by the query.
pub const UNIVERSITY_CLASS: &str = "Q3918";
/// United States of America.
pub const DEFAULT_COUNTRY: &str = "Q30";

/// One harvested university.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct University {
    pub id: String,
    pub label: String,
    /// Official website (P856), when recorded.
    pub website: Option<String>,
}

/// List every university located in `country`, sorted by label.
///
/// An item with several websites is listed once, with the first one returned.
pub async fn harvest_universities(
    client: &dyn GraphQueryClient,
    country: &str,
    language: &str,
) -> Result<Vec<University>> {
    let pattern = GraphPattern::InstancesInCountry {
        class: UNIVERSITY_CLASS.to_string(),
        country: country.to_string(),
        language: language.to_string(),
    };
    log::info!("Querying {}", pattern.describe());

    let rows = client.query(&pattern).await?;

    let mut seen = HashSet::new();
    let mut universities = Vec::new();
    for row in &rows {
        let Some(uri) = binding_value(row, "item") else {
            continue;
        };
        let id = entity_id_from_uri(uri).to_string();
        if !seen.insert(id.clone()) {
            continue;
        }
        let label = binding_value(row, "itemLabel").unwrap_or(id.as_str()).to_string();
        let website = binding_value(row, "website").map(str::to_string);
        universities.push(University { id, label, website });
    }

    universities.sort_by(|a, b| a.label.cmp(&b.label).then_with(|| a.id.cmp(&b.id)));
    log::info!("Harvested {} universities in {}", universities.len(), country);

    Ok(universities)
}
