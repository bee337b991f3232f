use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    ApiStatusError { status: u16, body: String },

    #[error("WebSocket error: {0}")]
    WebSocketError(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("URL error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Unknown stream channel: {key}")]
    UnknownChannel { key: String },

    #[error("Stream session '{channel}' is already active")]
    SessionAlreadyActive { channel: String },

    #[error("Stream session '{channel}' is not streaming")]
    SessionNotStreaming { channel: String },

    #[error("Transport error: {message}")]
    TransportError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Input,
    Session,
    Data,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ConsoleError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ConsoleError::ApiError(_)
            | ConsoleError::ApiStatusError { .. }
            | ConsoleError::WebSocketError(_)
            | ConsoleError::TransportError { .. } => ErrorCategory::Network,
            ConsoleError::UrlError(_)
            | ConsoleError::ConfigError { .. }
            | ConsoleError::ConfigValidationError { .. }
            | ConsoleError::InvalidConfigValueError { .. }
            | ConsoleError::MissingConfigError { .. }
            | ConsoleError::UnknownChannel { .. } => ErrorCategory::Configuration,
            ConsoleError::ValidationError { .. } => ErrorCategory::Input,
            ConsoleError::SessionAlreadyActive { .. } | ConsoleError::SessionNotStreaming { .. } => {
                ErrorCategory::Session
            }
            ConsoleError::SerializationError(_) => ErrorCategory::Data,
            ConsoleError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Session => ErrorSeverity::Low,
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 給操作員看的訊息
    pub fn user_friendly_message(&self) -> String {
        match self {
            ConsoleError::ValidationError { message } => message.clone(),
            ConsoleError::ApiStatusError { status, .. } => {
                format!("The research backend rejected the request (HTTP {})", status)
            }
            ConsoleError::ApiError(_) => "Could not reach the research backend".to_string(),
            ConsoleError::WebSocketError(_) | ConsoleError::TransportError { .. } => {
                "The live stream connection failed".to_string()
            }
            ConsoleError::UnknownChannel { key } => format!("No stream channel named '{}'", key),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check that the backend is running and the base URLs are correct",
            ErrorCategory::Configuration => "Review the command-line options or the TOML configuration file",
            ErrorCategory::Input => "Pick a start and end date at least one month apart",
            ErrorCategory::Session => "Stop the current stream before starting a new one",
            ErrorCategory::Data => "The backend returned an unexpected payload; check the backend version",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

pub type Result<T> = std::result::Result<T, ConsoleError>;
