use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocatorError {
    #[error("Coordinate out of range: {field} = {value} ({reason})")]
    OutOfRange {
        field: String,
        value: f64,
        reason: String,
    },

    #[error("Degenerate polygon: {reason}")]
    DegeneratePolygon { reason: String },

    #[error("Malformed boundary file at line {line}: invalid token '{token}'")]
    MalformedPolygon { line: usize, token: String },

    #[error("Covering needs at least {required} top-level cells but max_cells is {max_cells}")]
    CoverageLimit { required: usize, max_cells: usize },

    #[error("Not found: {query}")]
    NotFound { query: String },

    #[error("Malformed response from {source_name}: {message}")]
    MalformedResponse {
        source_name: String,
        message: String,
    },

    #[error("Task failed: {reason}")]
    TaskFailure { reason: String },

    #[error("All {total} tasks failed, first failure: {first_reason}")]
    AllTasksFailed { total: usize, first_reason: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for '{field}': '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Input,
    Geometry,
    Network,
    Collaborator,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LocatorError {
    pub fn malformed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        LocatorError::MalformedResponse {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn out_of_range(field: &str, value: f64, reason: impl Into<String>) -> Self {
        LocatorError::OutOfRange {
            field: field.to_string(),
            value,
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LocatorError::OutOfRange { .. }
            | LocatorError::MalformedPolygon { .. }
            | LocatorError::NotFound { .. } => ErrorCategory::Input,
            LocatorError::DegeneratePolygon { .. } | LocatorError::CoverageLimit { .. } => {
                ErrorCategory::Geometry
            }
            LocatorError::ApiError(_)
            | LocatorError::TaskFailure { .. }
            | LocatorError::AllTasksFailed { .. } => ErrorCategory::Network,
            LocatorError::MalformedResponse { .. } | LocatorError::SerializationError(_) => {
                ErrorCategory::Collaborator
            }
            LocatorError::ConfigError { .. }
            | LocatorError::InvalidConfigValueError { .. }
            | LocatorError::MissingConfigError { .. }
            | LocatorError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            LocatorError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input | ErrorCategory::Geometry => ErrorSeverity::High,
            ErrorCategory::Network | ErrorCategory::Collaborator => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LocatorError::OutOfRange { .. } => {
                "Use a latitude between -80 and 84 and a longitude between -180 and 180"
            }
            LocatorError::DegeneratePolygon { .. } => {
                "Provide a ring with at least 3 points that fits inside one hemisphere"
            }
            LocatorError::MalformedPolygon { .. } => {
                "Fix the coordinate line or disable strict boundary parsing"
            }
            LocatorError::CoverageLimit { .. } => "Raise max_cells or split the polygon",
            LocatorError::NotFound { .. } => "Check the address spelling or query by coordinates",
            LocatorError::MalformedResponse { .. } => {
                "Verify the collaborator endpoint URL and its API version"
            }
            LocatorError::TaskFailure { .. } | LocatorError::AllTasksFailed { .. } => {
                "Check network connectivity to the storage API and retry"
            }
            LocatorError::ApiError(_) => "Check network connectivity and endpoint availability",
            LocatorError::IoError(_) => "Check file paths and permissions",
            LocatorError::SerializationError(_) => "Inspect the payload for invalid JSON",
            LocatorError::ConfigError { .. }
            | LocatorError::InvalidConfigValueError { .. }
            | LocatorError::MissingConfigError { .. }
            | LocatorError::ConfigValidationError { .. } => {
                "Review the configuration file and command line flags"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Input => format!("Invalid input: {}", self),
            ErrorCategory::Geometry => format!("Cannot process the region: {}", self),
            ErrorCategory::Network => format!("Network problem: {}", self),
            ErrorCategory::Collaborator => format!("Unexpected service response: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, LocatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_errors_are_high_severity() {
        let err = LocatorError::DegeneratePolygon {
            reason: "2 points".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Geometry);
        assert_eq!(err.severity(), ErrorSeverity::High);
    }

    #[test]
    fn test_config_errors_are_critical() {
        let err = LocatorError::InvalidConfigValueError {
            field: "fanout.concurrency_limit".to_string(),
            value: "0".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::Critical);
        assert!(err.user_friendly_message().starts_with("Configuration problem"));
    }

    #[test]
    fn test_out_of_range_message() {
        let err = LocatorError::out_of_range("latitude", 85.0, "above 84");
        assert_eq!(
            err.to_string(),
            "Coordinate out of range: latitude = 85 (above 84)"
        );
    }
}
