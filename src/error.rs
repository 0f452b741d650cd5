use thiserror::Error;

/// Main error type for the harness.
///
/// Only failures that abort a dialogue run live here. Malformed calls and
/// rejected bookings are fed back to the agent as text instead, see
/// [`crate::schemas::ValidationError`] and [`crate::functions::BookingRejection`].
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("HTTP {status} error: {message}")]
    Http { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to decode {document} at {path}: {message}")]
    Decode {
        document: String,
        path: String,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Service \"{service}\" does not declare function \"{function}\"")]
    UnknownFunction { service: String, function: String },

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Rate limit exceeded: retry after {retry_after}s")]
    RateLimit { retry_after: u64 },

    #[error("Retries exhausted after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: usize, last_error: String },
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AgentError>;

impl AgentError {
    /// Whether the error is a transient provider failure worth retrying
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Http { status, .. } => *status == 429 || *status >= 500,
            AgentError::Transport(_) => true,
            AgentError::Timeout(_) => true,
            AgentError::RateLimit { .. } => true,
            _ => false,
        }
    }

    /// Get the error code for structured responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AgentError::Config(_) => "CONFIG_ERROR",
            AgentError::Provider(_) => "PROVIDER_ERROR",
            AgentError::Http { .. } => "HTTP_ERROR",
            AgentError::Transport(_) => "TRANSPORT_ERROR",
            AgentError::Serialization(_) => "SERIALIZATION_ERROR",
            AgentError::Decode { .. } => "DECODE_ERROR",
            AgentError::Storage(_) => "STORAGE_ERROR",
            AgentError::Io(_) => "IO_ERROR",
            AgentError::UnknownService(_) => "UNKNOWN_SERVICE",
            AgentError::UnknownFunction { .. } => "UNKNOWN_FUNCTION",
            AgentError::Timeout(_) => "TIMEOUT_ERROR",
            AgentError::RateLimit { .. } => "RATE_LIMIT_ERROR",
            AgentError::RetriesExhausted { .. } => "RETRIES_EXHAUSTED",
        }
    }

    /// Convert to a structured error payload, used when a batch layer records
    /// a failed dialogue run
    pub fn to_error_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
                "transient": self.is_transient()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AgentError::Http {
            status: 429,
            message: "slow down".to_string()
        }
        .is_transient());
        assert!(AgentError::Http {
            status: 503,
            message: "unavailable".to_string()
        }
        .is_transient());
        assert!(!AgentError::Http {
            status: 400,
            message: "bad request".to_string()
        }
        .is_transient());
        assert!(AgentError::Timeout("request".to_string()).is_transient());
        assert!(!AgentError::Config("missing key".to_string()).is_transient());
        assert!(!AgentError::UnknownService("Buses_9".to_string()).is_transient());
    }

    #[test]
    fn test_error_payload() {
        let error = AgentError::UnknownService("Hotels_9".to_string());
        let payload = error.to_error_payload();
        assert_eq!(payload["error"]["code"], "UNKNOWN_SERVICE");
        assert_eq!(payload["error"]["transient"], false);
        assert!(payload["error"]["message"]
            .as_str()
            .unwrap()
            .contains("Hotels_9"));
    }
}
