//! Chat-model backed extraction and match oracles.

pub mod client;
pub mod extract;
pub mod matcher;

pub use client::{ChatClient, ChatMessage};
pub use extract::{parse_extraction, LlmExtractor};
pub use matcher::{parse_match_answer, LlmMatcher};
