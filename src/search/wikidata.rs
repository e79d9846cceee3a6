use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use super::EntitySearch;
use crate::cache::SearchCache;
use crate::config::Config;
use crate::error::{Result, WikiorgError};
use crate::graph::Entity;

/// `wbsearchentities` response (only the parts we read)
#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    search: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    id: String,
    #[serde(default)]
    label: Option<String>,
}

/// Parse a `wbsearchentities` body. Hits without a label are labelled by their ID.
pub fn parse_search_response(body: &str) -> Result<Vec<Entity>> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| WikiorgError::Transient(format!("Malformed search response: {}", e)))?;
    Ok(response
        .search
        .into_iter()
        .map(|hit| {
            let label = hit.label.unwrap_or_else(|| hit.id.clone());
            Entity::new(hit.id, label)
        })
        .collect())
}

/// Wikidata entity search client (`action=wbsearchentities`)
///
/// Optionally caches results per query text.
pub struct WikidataSearch {
    client: Client,
    endpoint: Url,
    language: String,
    limit: usize,
    cache: Option<Arc<SearchCache>>,
}

impl WikidataSearch {
    /// Create a new search client
    ///
    /// # Arguments
    ///
    /// * `endpoint` - MediaWiki API URL, e.g. `https://www.wikidata.org/w/api.php`
    /// * `user_agent` - Sent with every request
    /// * `language` - Search and label language
    /// * `limit` - Maximum hits per query (API maximum is 50)
    pub fn new(
        endpoint: &str,
        user_agent: &str,
        language: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| WikiorgError::Config(format!("Invalid search endpoint '{}': {}", endpoint, e)))?;

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| WikiorgError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint,
            language: language.to_string(),
            limit: limit.clamp(1, 50),
            cache: None,
        })
    }

    /// Build from configuration, with a cache when `search.cache_capacity > 0`
    pub fn from_config(config: &Config) -> Result<Self> {
        let search = Self::new(
            &config.wikiorg.search_endpoint,
            &config.wikiorg.user_agent,
            &config.wikiorg.language,
            config.search.limit,
            config.crawl.request_timeout(),
        )?;
        if config.search.cache_capacity > 0 {
            Ok(search.with_cache(Arc::new(SearchCache::new(config.search.cache_capacity))))
        } else {
            Ok(search)
        }
    }

    pub fn with_cache(mut self, cache: Arc<SearchCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    fn request_url(&self, text: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("action", "wbsearchentities")
            .append_pair("format", "json")
            .append_pair("type", "item")
            .append_pair("language", &self.language)
            .append_pair("uselang", &self.language)
            .append_pair("limit", &self.limit.to_string())
            .append_pair("search", text);
        url
    }

    async fn fetch(&self, text: &str) -> Result<Vec<Entity>> {
        let response = self
            .client
            .get(self.request_url(text))
            .send()
            .await
            .map_err(|e| WikiorgError::Transient(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WikiorgError::Transient(format!(
                "Search API error {}",
                status
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| WikiorgError::Transient(format!("Failed to read response: {}", e)))?;

        parse_search_response(&body)
    }
}

#[async_trait]
impl EntitySearch for WikidataSearch {
    async fn search(&self, text: &str) -> Result<Vec<Entity>> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(text) {
                log::debug!("Search cache hit for: {}", text);
                return Ok(cached);
            }
        }

        let hits = self.fetch(text).await?;
        log::debug!("Search '{}' returned {} hit(s)", text, hits.len());

        if let Some(cache) = &self.cache {
            cache.put(text.to_string(), hits.clone());
        }

        Ok(hits)
    }
}
