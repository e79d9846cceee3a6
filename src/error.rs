use thiserror::Error;

/// Main error type for wikiorg
#[derive(Error, Debug)]
pub enum WikiorgError {
    /// A single remote call failed (timeout, non-2xx status, malformed body).
    /// Retried by the crawler, never surfaced from a finished crawl.
    #[error("Transient source error: {0}")]
    Transient(String),

    /// Retry bound exhausted for one query; the crawl cannot continue
    #[error("Giving up on {context} after {attempts} attempt(s): {last_error}")]
    RetriesExhausted {
        attempts: u32,
        context: String,
        last_error: String,
    },

    /// Root entity has no resolvable label
    #[error("Root entity not found: no label for {0}")]
    MissingRoot(String),

    /// Entity ID is not of the form Q<digits>
    #[error("Invalid entity ID: {0}")]
    InvalidEntityId(String),

    /// LLM transport errors (after the client's own retries)
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Crawl aborted by the caller
    #[error("Crawl aborted")]
    Aborted,

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writer errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl WikiorgError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, WikiorgError::Transient(_))
    }
}

/// Convenient Result type using WikiorgError
pub type Result<T> = std::result::Result<T, WikiorgError>;
