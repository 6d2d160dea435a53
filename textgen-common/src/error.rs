//! Shared error traits for consistent error handling across crates

use std::fmt::Debug;

/// Category of error for consistent handling and routing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// User input or configuration error - can be fixed by user
    User,
    /// System resource or environmental error - may be temporary
    System,
    /// Internal logic error - indicates a bug
    Internal,
    /// Network or external service error - may be retriable
    External,
}

/// Trait for all errors in the textgen ecosystem
///
/// This trait provides a consistent interface for error handling
/// and allows for better error categorization and user experience.
pub trait TextgenError: std::error::Error + Send + Sync + Debug {
    /// Get the error category for proper handling
    fn category(&self) -> ErrorCategory;

    /// Get a unique error code for this error type
    fn error_code(&self) -> &'static str;

    /// Check if this is a user-correctable error
    fn is_user_error(&self) -> bool {
        matches!(self.category(), ErrorCategory::User)
    }

    /// Check if this error is potentially retriable
    fn is_retriable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::System | ErrorCategory::External
        )
    }

    /// Get a user-friendly error message with actionable advice
    fn user_friendly_message(&self) -> String {
        format!("{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug)]
    enum TestError {
        #[error("bad knob value")]
        BadKnob,
        #[error("device busy")]
        DeviceBusy,
        #[error("impossible state")]
        ImpossibleState,
    }

    impl TextgenError for TestError {
        fn category(&self) -> ErrorCategory {
            match self {
                TestError::BadKnob => ErrorCategory::User,
                TestError::DeviceBusy => ErrorCategory::External,
                TestError::ImpossibleState => ErrorCategory::Internal,
            }
        }

        fn error_code(&self) -> &'static str {
            match self {
                TestError::BadKnob => "TEST_BAD_KNOB",
                TestError::DeviceBusy => "TEST_DEVICE_BUSY",
                TestError::ImpossibleState => "TEST_IMPOSSIBLE_STATE",
            }
        }
    }

    #[test]
    fn test_category_drives_user_error_flag() {
        assert!(TestError::BadKnob.is_user_error());
        assert!(!TestError::DeviceBusy.is_user_error());
        assert!(!TestError::ImpossibleState.is_user_error());
    }

    #[test]
    fn test_category_drives_retriable_flag() {
        assert!(!TestError::BadKnob.is_retriable());
        assert!(TestError::DeviceBusy.is_retriable());
        assert!(!TestError::ImpossibleState.is_retriable());
    }

    #[test]
    fn test_user_friendly_message_defaults_to_display() {
        assert_eq!(
            TestError::BadKnob.user_friendly_message(),
            "bad knob value"
        );
    }
}
