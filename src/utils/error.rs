use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Classification request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Classification service answered with status {status}")]
    Status { status: u16 },

    #[error("Classification response is not valid JSON: {0}")]
    Decode(serde_json::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid position {latitude}, {longitude}")]
    InvalidPosition { latitude: f64, longitude: f64 },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfig { field: String },

    #[error("Line {line}: {message}")]
    Command { line: usize, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Service,
    Input,
    Configuration,
    System,
}

impl ClientError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ClientError::Transport(_) => ErrorCategory::Network,
            ClientError::Status { .. } | ClientError::Decode(_) => ErrorCategory::Service,
            ClientError::InvalidPosition { .. } | ClientError::Command { .. } => {
                ErrorCategory::Input
            }
            ClientError::ConfigValidation { .. }
            | ClientError::InvalidConfigValue { .. }
            | ClientError::MissingConfig { .. } => ErrorCategory::Configuration,
            ClientError::IoError(_) | ClientError::SerializationError(_) => ErrorCategory::System,
        }
    }

    /// Short text meant for the indicator area rather than the log.
    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => "Classifier unreachable".to_string(),
            ErrorCategory::Service => "Classifier returned an unusable answer".to_string(),
            _ => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check that the classifier server is running and reachable",
            ErrorCategory::Service => "Check the classifier server log for bad requests",
            ErrorCategory::Input => "Check the command syntax and coordinates",
            ErrorCategory::Configuration => "Check the command line flags and the TOML file",
            ErrorCategory::System => "Check file paths and permissions",
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
