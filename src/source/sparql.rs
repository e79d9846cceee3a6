use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::{Binding, GraphPattern, GraphQueryClient};
use crate::config::Config;
use crate::error::{Result, WikiorgError};

/// SPARQL JSON results document (only the parts we read)
#[derive(Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Deserialize)]
struct SparqlResults {
    bindings: Vec<Binding>,
}

/// Parse a `application/sparql-results+json` body into result rows.
///
/// A body that does not have the `results.bindings` shape is a transient failure,
/// not an empty answer: WDQS returns HTML or truncated JSON when it times out.
pub fn parse_results(body: &str) -> Result<Vec<Binding>> {
    serde_json::from_str::<SparqlResponse>(body)
        .map(|r| r.results.bindings)
        .map_err(|e| WikiorgError::Transient(format!("Malformed SPARQL response: {}", e)))
}

/// HTTP client for a SPARQL endpoint (Wikidata Query Service by default)
///
/// One attempt per call; retry and pacing belong to the caller.
pub struct SparqlClient {
    client: Client,
    endpoint: Url,
}

impl SparqlClient {
    /// Create a new SPARQL client
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Endpoint URL, e.g. `https://query.wikidata.org/sparql`
    /// * `user_agent` - Sent with every request (required by WDQS policy)
    /// * `timeout` - Per-request timeout
    pub fn new(endpoint: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| WikiorgError::Config(format!("Invalid SPARQL endpoint '{}': {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| WikiorgError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.wikiorg.sparql_endpoint,
            &config.wikiorg.user_agent,
            config.crawl.request_timeout(),
        )
    }

    /// Run a raw SPARQL query and return its bindings
    pub async fn execute(&self, sparql: &str) -> Result<Vec<Binding>> {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", sparql)
            .append_pair("format", "json");

        let response = self
            .client
            .get(url)
            .header("Accept", "application/sparql-results+json")
            .send()
            .await
            .map_err(|e| WikiorgError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            let snippet: String = body.chars().take(200).collect();
            return Err(WikiorgError::Transient(format!(
                "SPARQL endpoint error {}: {}",
                status, snippet
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WikiorgError::Transient(format!("Failed to read response: {}", e)))?;

        parse_results(&body)
    }
}

#[async_trait]
impl GraphQueryClient for SparqlClient {
    async fn query(&self, pattern: &GraphPattern) -> Result<Vec<Binding>> {
        let start = std::time::Instant::now();
        let rows = self.execute(&pattern.to_sparql()).await?;
        log::debug!(
            "SPARQL {} returned {} row(s) in {:?}",
            pattern.describe(),
            rows.len(),
            start.elapsed()
        );
        Ok(rows)
    }
}
