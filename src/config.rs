use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::graph::PredicatePair;

/// Main configuration structure
///
/// Every section has defaults, so an empty file (or no `[crawl]` table) is valid.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub wikiorg: WikiorgConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Remote source configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WikiorgConfig {
    pub sparql_endpoint: String,
    pub search_endpoint: String,
    /// Sent on every request; WDQS rejects anonymous clients.
    pub user_agent: String,
    /// Label language for every query.
    pub language: String,
    pub log_level: String,
}

impl Default for WikiorgConfig {
    fn default() -> Self {
        Self {
            sparql_endpoint: "https://query.wikidata.org/sparql".to_string(),
            search_endpoint: "https://www.wikidata.org/w/api.php".to_string(),
            user_agent: "wikiorg/0.1 (https://github.com/peye-labs/wikiorg)".to_string(),
            language: "en".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Hierarchy crawl configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Minimum gap between successive outbound queries. 0 disables pacing.
    pub pause_ms: u64,
    /// Attempts per query, including the first one.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Issue the predicate-pair queries of one node concurrently.
    pub concurrent_pairs: bool,
    pub predicate_pairs: Vec<PredicatePair>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            pause_ms: 300,
            max_attempts: 3,
            retry_delay_ms: 2000,
            request_timeout_secs: 60,
            concurrent_pairs: false,
            predicate_pairs: PredicatePair::defaults(),
        }
    }
}

impl CrawlConfig {
    pub fn pause(&self) -> Duration {
        Duration::from_millis(self.pause_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// LLM (extraction and match oracle) configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub temperature: f32,
    pub extract_max_tokens: u32,
    pub max_retries: usize,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4.1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            extract_max_tokens: 4096,
            max_retries: 3,
            request_timeout_secs: 120,
        }
    }
}

/// Entity search configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub limit: usize,
    /// 0 disables the search result cache.
    pub cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            cache_capacity: 256,
        }
    }
}

/// Report output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
        }
    }
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in WIKIORG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    ///
    /// A missing ./config.toml falls back to defaults; an explicit WIKIORG_CONFIG
    /// path must exist.
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        match std::env::var("WIKIORG_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => {
                let path = PathBuf::from("config.toml");
                if path.exists() {
                    Self::from_file(&path)
                } else {
                    log::debug!("No config.toml found, using defaults");
                    let config = Config::default();
                    config.validate()?;
                    Ok(config)
                }
            }
        }
    }

    /// Read and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&config_str)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.wikiorg.user_agent.trim().is_empty() {
            anyhow::bail!("wikiorg.user_agent must not be empty");
        }

        if self.crawl.max_attempts == 0 {
            anyhow::bail!("crawl.max_attempts must be at least 1");
        }

        if self.crawl.predicate_pairs.is_empty() {
            anyhow::bail!("crawl.predicate_pairs must list at least one pair");
        }

        for pair in &self.crawl.predicate_pairs {
            pair.validate()
                .map_err(|e| anyhow::anyhow!("crawl.predicate_pairs: {}", e))?;
        }

        if self.search.limit == 0 || self.search.limit > 50 {
            anyhow::bail!("search.limit must be between 1 and 50");
        }

        if self.llm.model.trim().is_empty() {
            anyhow::bail!("llm.model must not be empty");
        }

        Ok(())
    }

    /// Replace `llm.model` (e.g. from the command line) and re-validate
    pub fn override_model(&mut self, model: String) -> Result<()> {
        self.llm.model = model;
        self.validate()
    }

    /// Read the LLM API key named by `llm.api_key_env`
    pub fn llm_api_key(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                self.llm.api_key_env
            )
        })
    }

    /// Get the report output directory
    pub fn output_dir(&self) -> &Path {
        &self.output.dir
    }
}
