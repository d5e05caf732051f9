//! Error types for parameter resolution.

use thiserror::Error;

/// Result type alias using ParameterError.
pub type ParameterResult<T> = Result<T, ParameterError>;

/// Validation failures raised while resolving source parameters.
///
/// Both variants carry the offending input so the rendered message names it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParameterError {
    #[error("Invalid cycle format '{input}': {reason}")]
    InvalidCycleFormat { input: String, reason: String },

    #[error("Invalid max_lead_time '{value}': {reason}")]
    InvalidMaxLeadTime { value: String, reason: String },
}

impl ParameterError {
    pub fn invalid_cycle(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCycleFormat {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_max_lead_time(value: impl ToString, reason: impl Into<String>) -> Self {
        Self::InvalidMaxLeadTime {
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_value() {
        let err = ParameterError::invalid_cycle("2024-13-01", "month out of range");
        assert_eq!(
            err.to_string(),
            "Invalid cycle format '2024-13-01': month out of range"
        );

        let err = ParameterError::invalid_max_lead_time(-1, "must be positive");
        assert!(err.to_string().starts_with("Invalid max_lead_time '-1'"));
    }
}
