use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArgusError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Upstream source degraded: {0}")]
    Degraded(String),

    #[error("Rate limit exceeded for {0}")]
    RateLimited(String),

    #[error("Upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Schema validation failed: {0}")]
    Schema(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

impl ArgusError {
    /// Transient errors are eligible for retry; permanent ones surface
    /// immediately as degraded results.
    pub fn is_transient(&self) -> bool {
        match self {
            ArgusError::Timeout(_) | ArgusError::RateLimited(_) => true,
            ArgusError::Upstream { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ArgusError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArgusError>;
