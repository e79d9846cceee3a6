//! Free-text entity search: the best-effort lookup that feeds reconciliation choice sets.

pub mod wikidata;

pub use wikidata::{parse_search_response, WikidataSearch};

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::Entity;

/// Fuzzy entity search. No uniqueness or relevance guarantee.
#[async_trait]
pub trait EntitySearch: Send + Sync {
    async fn search(&self, text: &str) -> Result<Vec<Entity>>;
}

/// Lowercased alphanumeric tokens, minus connecting words.
fn tokens(text: &str) -> Vec<String> {
    const STOPWORDS: [&str; 6] = ["of", "the", "and", "for", "at", "in"];
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
        .collect()
}

/// Tokens that name a kind of unit rather than a particular one.
const GENERIC: [&str; 8] = [
    "school",
    "college",
    "faculty",
    "department",
    "division",
    "institute",
    "university",
    "campus",
];

fn significant(tokens: &[String]) -> Vec<&String> {
    let kept: Vec<&String> = tokens
        .iter()
        .filter(|t| !GENERIC.contains(&t.as_str()))
        .collect();
    if kept.is_empty() {
        tokens.iter().collect()
    } else {
        kept
    }
}

/// Whether `label` textually resembles `name`.
///
/// True when one normalized form contains the other, or when at least half of the
/// shorter side's significant tokens appear in the other.
pub fn resembles(label: &str, name: &str) -> bool {
    let a = tokens(label);
    let b = tokens(name);
    if a.is_empty() || b.is_empty() {
        return false;
    }

    let a_joined = format!(" {} ", a.join(" "));
    let b_joined = format!(" {} ", b.join(" "));
    if a_joined.contains(&b_joined) || b_joined.contains(&a_joined) {
        return true;
    }

    let a = significant(&a);
    let b = significant(&b);
    let (short, long) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };
    let shared = short.iter().filter(|t| long.contains(t)).count();
    shared > 0 && shared * 2 >= short.len()
}
