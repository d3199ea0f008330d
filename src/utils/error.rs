use thiserror::Error;

#[derive(Error, Debug)]
pub enum FactorError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Source '{source_name}' failed: {message}")]
    SourceError {
        source_name: String,
        message: String,
    },

    #[error("HTTP {status} from {url}: {body}")]
    HttpStatusError {
        url: String,
        status: u16,
        body: String,
    },

    #[error("LLM error: {message}")]
    LlmError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    DataSource,
    Llm,
    Processing,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl FactorError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FactorError::ApiError(_) | FactorError::HttpStatusError { .. } => {
                ErrorCategory::Network
            }
            FactorError::TomlError(_)
            | FactorError::ConfigError { .. }
            | FactorError::MissingConfigError { .. }
            | FactorError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            FactorError::SourceError { .. } => ErrorCategory::DataSource,
            FactorError::LlmError { .. } => ErrorCategory::Llm,
            FactorError::ZipError(_) | FactorError::IoError(_) => ErrorCategory::Storage,
            FactorError::CsvError(_)
            | FactorError::SerializationError(_)
            | FactorError::ProcessingError { .. }
            | FactorError::ValidationError { .. } => ErrorCategory::Processing,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network | ErrorCategory::DataSource | ErrorCategory::Llm => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Processing => ErrorSeverity::High,
            ErrorCategory::Configuration | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            FactorError::HttpStatusError { status, .. } => *status == 429 || *status >= 500,
            _ => self.severity() == ErrorSeverity::Medium,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => "Check network connectivity and the API endpoint, then retry",
            ErrorCategory::Configuration => {
                "Review the TOML config (APP_CONFIG / APP_ENV) and required environment variables"
            }
            ErrorCategory::DataSource => "Verify the data source API key and base_url",
            ErrorCategory::Llm => "Verify DEEPSEEK_API_KEY and the model name, then retry",
            ErrorCategory::Processing => "Inspect the input events and agent output with --verbose",
            ErrorCategory::Storage => "Make sure the output directory exists and is writable",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach a remote service: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::DataSource => format!("Data source problem: {}", self),
            ErrorCategory::Llm => format!("Language model call failed: {}", self),
            ErrorCategory::Processing => format!("Could not build factors: {}", self),
            ErrorCategory::Storage => format!("Could not write output: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, FactorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_errors_are_critical() {
        let err = FactorError::MissingConfigError {
            field: "data_sources.coindesk.base_url".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_http_status_retryable() {
        let server_err = FactorError::HttpStatusError {
            url: "https://example.com".to_string(),
            status: 503,
            body: String::new(),
        };
        let client_err = FactorError::HttpStatusError {
            url: "https://example.com".to_string(),
            status: 404,
            body: String::new(),
        };
        assert!(server_err.is_retryable());
        assert!(!client_err.is_retryable());
        assert_eq!(server_err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_user_friendly_message_mentions_cause() {
        let err = FactorError::LlmError {
            message: "empty choices".to_string(),
        };
        assert!(err.user_friendly_message().contains("empty choices"));
    }
}
