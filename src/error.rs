use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolsigError {
    #[error("Navigation timed out after {limit:?}: {url}")]
    NavigationTimeout { url: String, limit: Duration },

    #[error("Login could not be confirmed: {0}")]
    AuthenticationUncertain(String),

    #[error("Extraction produced no usable content: {0}")]
    ExtractionEmpty(String),

    #[error("Extraction failed: {0}")]
    ExtractionError(String),

    #[error("Search results did not appear within {0:?}")]
    ResultsTimeout(Duration),

    #[error("Upstream returned an invalid response ({code}): {message}")]
    UpstreamInvalidResponse { code: String, message: String },

    #[error("All {attempts} query strategies failed for indicator {indicator}")]
    UpstreamExhausted { indicator: String, attempts: usize },

    #[error("{service} credentials not configured. Run 'polsig config set {key} VALUE' to configure.")]
    NoApiKey { service: &'static str, key: &'static str },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    ApiError {
        code: String,
        message: String,
        hint: Option<String>,
    },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Timeout: operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Rate limit exceeded. Please try again later.")]
    RateLimit,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("{0}")]
    Other(String),
}

impl PolsigError {
    /// Create an API error with an optional hint
    pub fn api_error(
        code: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self::ApiError {
            code: code.into(),
            message: message.into(),
            hint,
        }
    }

    /// Shorthand for a degraded upstream payload
    pub fn invalid_response(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UpstreamInvalidResponse {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Get user-friendly hint for the error
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NoApiKey { key, .. } => {
                Some(format!("Run: polsig config set {} YOUR_VALUE", key))
            }
            Self::ApiError { hint, .. } => hint.clone(),
            Self::Network(_) => Some("Check your internet connection and try again.".to_string()),
            Self::RateLimit => {
                Some("You've made too many requests. Please wait a moment.".to_string())
            }
            Self::NavigationTimeout { .. } => {
                Some("The portal is slow or unreachable. Try again later.".to_string())
            }
            Self::Browser(_) => Some(
                "Make sure Chrome/Chromium is installed, or set POLSIG_CHROMIUM_PATH.".to_string(),
            ),
            Self::UpstreamInvalidResponse { .. } => {
                Some("The service returned a degraded response. Try again later.".to_string())
            }
            _ => None,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_)
                | Self::Timeout(_)
                | Self::ServerError(_)
                | Self::RateLimit
                | Self::NavigationTimeout { .. }
                | Self::UpstreamInvalidResponse { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, PolsigError>;
