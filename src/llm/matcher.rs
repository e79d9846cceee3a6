use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;

use super::client::{ChatClient, ChatMessage};
use crate::error::Result;
use crate::graph::Entity;
use crate::reconcile::{MatchDecision, MatchOracle};

fn answer_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^\W*(ORPHAN\s*:\s*)?(Q\d+)\b").expect("answer pattern is valid")
    })
}

/// Interpret a free-text match answer.
///
/// Accepts `Q123`, `ORPHAN:Q123` and `NONE` (any case, surrounding noise tolerated);
/// anything else is treated as no match.
pub fn parse_match_answer(answer: &str) -> MatchDecision {
    let answer = answer.trim();
    if let Some(caps) = answer_pattern().captures(answer) {
        let id = caps[2].to_ascii_uppercase();
        return if caps.get(1).is_some() {
            MatchDecision::Orphan(id)
        } else {
            MatchDecision::Match(id)
        };
    }
    if !answer.to_ascii_uppercase().starts_with("NONE") {
        log::debug!("Unrecognized match answer: {:?}", answer);
    }
    MatchDecision::NoMatch
}

/// Numbered `[n] ID - label` listing shown to the model
fn render_choices(choices: &[Entity]) -> String {
    choices
        .iter()
        .enumerate()
        .map(|(i, e)| format!("[{}] {} - {}", i + 1, e.id, e.label))
        .collect::<Vec<_>>()
        .join("\n")
}

fn build_prompt(candidate: &str, context_label: &str, choices: &[Entity]) -> String {
    format!(
        "Decide whether the unit \"{candidate}\" of {context} is one of the \
Wikidata entities listed below.

{choices}

Answer with exactly one token:
- the QID of the matching entity, if it is a direct part of {context};
- ORPHAN:<QID> if it matches but Wikidata lacks the link to {context};
- NONE if nothing matches.",
        candidate = candidate,
        context = context_label,
        choices = render_choices(choices),
    )
}

/// Match oracle backed by a chat model
pub struct LlmMatcher {
    client: ChatClient,
}

impl LlmMatcher {
    pub fn new(client: ChatClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MatchOracle for LlmMatcher {
    async fn choose(
        &self,
        candidate: &str,
        context_label: &str,
        choices: &[Entity],
    ) -> Result<MatchDecision> {
        if choices.is_empty() {
            return Ok(MatchDecision::NoMatch);
        }

        let messages = [ChatMessage::user(build_prompt(candidate, context_label, choices))];
        let answer = self.client.complete(&messages, Some(16), None).await?;
        let decision = parse_match_answer(&answer);
        log::debug!("Match '{}' -> {:?}", candidate, decision);
        Ok(decision)
    }
}
