use thiserror::Error;

/// Error taxonomy for the scraping core
#[derive(Error, Debug, Clone)]
pub enum ScrapeError {
    // Session errors
    #[error("Browser session could not be established: {message}")]
    SessionBootstrap { message: String },

    #[error("Session fetch failed for {url}: {message}")]
    SessionFetch { url: String, message: String },

    // Response errors
    #[error("Unexpected response shape from {endpoint}: {detail}")]
    ResponseShape { endpoint: String, detail: String },

    // Plain fetch errors
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    // Export errors
    #[error("Export failed: {message}")]
    Export { message: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    // Job errors
    #[error("Invalid state: {state}")]
    InvalidState { state: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ScrapeError {
    /// Create a session bootstrap error
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::SessionBootstrap { message: message.into() }
    }

    /// Create a session fetch error
    pub fn session_fetch(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SessionFetch { url: url.into(), message: message.into() }
    }

    /// Create a response shape error
    pub fn shape(endpoint: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ResponseShape { endpoint: endpoint.into(), detail: detail.into() }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout { operation: operation.into() }
    }

    /// Create an export error
    pub fn export(message: impl Into<String>) -> Self {
        Self::Export { message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Whether the job can continue after this error.
    ///
    /// Fetch and shape errors only end the current pagination loop or post;
    /// bootstrap and export errors fail the whole job.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::SessionFetch { .. }
            | Self::ResponseShape { .. }
            | Self::Network { .. }
            | Self::Timeout { .. } => true,

            Self::SessionBootstrap { .. }
            | Self::Export { .. }
            | Self::Configuration { .. }
            | Self::InvalidState { .. }
            | Self::Internal { .. } => false,
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::SessionBootstrap { .. } | Self::SessionFetch { .. } => "session",
            Self::ResponseShape { .. } => "response",
            Self::Network { .. } | Self::Timeout { .. } => "network",
            Self::Export { .. } => "export",
            Self::Configuration { .. } => "configuration",
            Self::InvalidState { .. } | Self::Internal { .. } => "internal",
        }
    }
}

/// Result type alias for the scraping core
pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;

impl From<std::io::Error> for ScrapeError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal { message: err.to_string() }
    }
}

impl From<reqwest::Error> for ScrapeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { operation: err.to_string() }
        } else {
            Self::Network { message: err.to_string() }
        }
    }
}
