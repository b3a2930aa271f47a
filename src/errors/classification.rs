use super::types::ListingError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl ListingError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Attempt-level failures, retried inside the executor
            ListingError::Validation { .. } => ErrorClassification {
                error_type: "ValidationError",
                retryable: true,
            },
            ListingError::Timeout { .. } => ErrorClassification {
                error_type: "TimeoutError",
                retryable: true,
            },
            ListingError::Agent { .. } => ErrorClassification {
                error_type: "AgentError",
                retryable: true,
            },
            ListingError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },

            // Fatal to construction or to the whole run
            ListingError::Config(_) => ErrorClassification {
                error_type: "ConfigurationError",
                retryable: false,
            },
            ListingError::InvalidInput(_) => ErrorClassification {
                error_type: "InvalidInputError",
                retryable: false,
            },
            ListingError::PipelineTimeout { .. } => ErrorClassification {
                error_type: "PipelineTimeoutError",
                retryable: false,
            },
            ListingError::ShutDown => ErrorClassification {
                error_type: "ShutDownError",
                retryable: false,
            },

            ListingError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            ListingError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: true,
            },
            ListingError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
            ListingError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: true,
            },
        }
    }
}
