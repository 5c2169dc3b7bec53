//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

pub type DelverResult<T> = Result<T, DelverError>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: std::collections::HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: std::collections::HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the Delver system
///
/// The taxonomy mirrors how errors propagate through the research tree:
/// `Validation` and `Config` are fatal before any work starts, `Planning`,
/// `Provider` and `Timeout` are recovered at the branch that raised them,
/// and `Generation` is fatal only during final synthesis.
#[derive(Error, Debug)]
pub enum DelverError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Query planning failed: {message}")]
    Planning {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Search provider error: {message}")]
    Provider {
        message: String,
        provider: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Operation timeout: {operation}")]
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },

    #[error("Generation error: {message}")]
    Generation {
        message: String,
        provider: Option<String>,
        model: Option<String>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl DelverError {
    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            DelverError::Validation { context, .. } => Some(context),
            DelverError::Config { context, .. } => Some(context),
            DelverError::Planning { context, .. } => Some(context),
            DelverError::Provider { context, .. } => Some(context),
            DelverError::Timeout { context, .. } => Some(context),
            DelverError::Generation { context, .. } => Some(context),
            DelverError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Check if the error is confined to a single research branch
    ///
    /// Branch-local errors are logged and converted into an empty
    /// contribution; they never abort the overall research invocation.
    pub fn is_branch_local(&self) -> bool {
        matches!(
            self,
            DelverError::Planning { .. }
                | DelverError::Provider { .. }
                | DelverError::Timeout { .. }
        )
    }

    /// Check if error is recoverable by retrying
    pub fn is_recoverable(&self) -> bool {
        match self {
            DelverError::Provider { .. } => true,
            DelverError::Timeout { .. } => true,
            DelverError::Validation { .. } => false,
            DelverError::Config { .. } => false,
            _ => false,
        }
    }

    /// Get retry delay in milliseconds for recoverable errors
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            DelverError::Provider { .. } => Some(1000),
            DelverError::Timeout { .. } => Some(2000),
            _ => None,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            DelverError::Internal { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal error occurred"
                );
            }
            DelverError::Config { .. } | DelverError::Validation { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Configuration or validation error"
                );
            }
            DelverError::Provider { .. }
            | DelverError::Timeout { .. }
            | DelverError::Planning { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Branch-local error (the rest of the research tree proceeds)"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::error::DelverError::Validation {
            message: $msg.to_string(),
            field: Some($field.to_string()),
            context: $crate::error::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
    ($msg:expr, $component:expr) => {
        $crate::error::DelverError::Validation {
            message: $msg.to_string(),
            field: None,
            context: $crate::error::ErrorContext::new($component)
                .with_suggestion("Check the request parameters"),
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::error::DelverError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::error::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Remove the config file to fall back to defaults"),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_local_errors_are_classified() {
        let timeout = DelverError::Timeout {
            operation: "search".to_string(),
            duration_ms: 10,
            context: ErrorContext::new("test"),
        };
        assert!(timeout.is_branch_local());
        assert!(timeout.is_recoverable());

        let provider = DelverError::Provider {
            message: "unreachable".to_string(),
            provider: None,
            source: None,
            context: ErrorContext::new("test"),
        };
        assert!(provider.is_branch_local());

        let validation = crate::validation_error!("bad value", "field", "test");
        assert!(!validation.is_branch_local());
        assert!(!validation.is_recoverable());

        let internal = DelverError::Internal {
            message: "broken".to_string(),
            source: None,
            context: ErrorContext::new("test"),
        };
        assert!(!internal.is_branch_local());
    }
}
