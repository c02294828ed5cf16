use thiserror::Error;

#[derive(Error, Debug)]
pub enum PhototypeError {
    #[error("HTTP request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("External tool not found: {tool}")]
    ToolNotFound { tool: String },

    #[error("Extraction failed: {message}")]
    ExtractionError { message: String },

    #[error("{service} responded with HTTP {status}")]
    UpstreamError { service: String, status: u16 },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Storage,
    Configuration,
    Tooling,
    Processing,
    Validation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PhototypeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ApiError(_) | Self::UpstreamError { .. } => ErrorCategory::Network,
            Self::IoError(_) => ErrorCategory::Storage,
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
            Self::ToolNotFound { .. } => ErrorCategory::Tooling,
            Self::SerializationError(_)
            | Self::ImageError(_)
            | Self::ExtractionError { .. }
            | Self::ProcessingError { .. } => ErrorCategory::Processing,
            Self::ValidationError { .. } => ErrorCategory::Validation,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 上游服務可能只是暫時不可用
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Validation => ErrorSeverity::Low,
            ErrorCategory::Processing | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Storage | ErrorCategory::Tooling => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::ApiError(_) | Self::UpstreamError { .. } => {
                "Check that the downstream service is running and reachable"
            }
            Self::IoError(_) => "Check file permissions and available disk space",
            Self::ToolNotFound { .. } => {
                "Install poppler-utils and tesseract-ocr, or set poppler_path in the config"
            }
            Self::ConfigError { .. }
            | Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Review phototype.toml and the command line flags",
            Self::ExtractionError { .. } => "Make sure the uploaded file is a valid, unencrypted PDF",
            Self::SerializationError(_) | Self::ImageError(_) | Self::ProcessingError { .. } => {
                "Retry with a different document or enable --verbose for details"
            }
            Self::ValidationError { .. } => "Correct the request and try again",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::ToolNotFound { tool } => format!("Required tool '{}' is not installed", tool),
            Self::UpstreamError { service, .. } => format!("The {} service is unavailable", service),
            Self::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid setting '{}': {}", field, reason)
            }
            Self::MissingConfigError { field } => format!("Missing setting '{}'", field),
            Self::ValidationError { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PhototypeError>;
