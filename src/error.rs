use thiserror::Error;

/// Main error type for the detector
#[derive(Error, Debug)]
pub enum EdgelineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Market data errors
    #[error("Market data unavailable: {0}")]
    MarketDataUnavailable(String),

    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    #[error("Quote unavailable for token: {token_id}")]
    QuoteUnavailable { token_id: String },

    #[error("Stale data: {0}")]
    StaleData(String),

    // Secrets / upstream credentials
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // Pass control
    #[error("Pass deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for EdgelineError
pub type Result<T> = std::result::Result<T, EdgelineError>;
