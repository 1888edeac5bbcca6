//! # Rotator Error Types
//!
//! Only the producer's blocking acquire can fail. Publishing, reading and
//! advancing have no error conditions.

use thiserror::Error;

/// Errors raised by [`Producer::acquire`](crate::Producer::acquire).
///
/// Both variants leave the producer exactly as it was before the call, so
/// the caller may retry with a fresh [`Context`](crate::Context).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RotatorError {
    /// The context's cancel handle fired before a slot was reclaimed.
    #[error("acquire cancelled before a buffer was reclaimed")]
    Cancelled,

    /// The context's deadline passed before a slot was reclaimed.
    #[error("deadline exceeded before a buffer was reclaimed")]
    DeadlineExceeded,
}

impl RotatorError {
    /// Returns whether a later retry can still succeed.
    ///
    /// Always true: a failed acquire has no side effects.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(self) -> bool {
        match self {
            Self::Cancelled | Self::DeadlineExceeded => true,
        }
    }
}

/// Result type for rotator operations.
pub type RotatorResult<T> = Result<T, RotatorError>;

/// Errors produced while loading a [`RotatorConfig`](crate::RotatorConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The document is not valid TOML or has mistyped fields.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field parsed but holds an unusable value.
    #[error("invalid configuration value for `{field}`: {reason}")]
    InvalidValue {
        /// Offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            RotatorError::Cancelled.to_string(),
            "acquire cancelled before a buffer was reclaimed"
        );
        assert_eq!(
            RotatorError::DeadlineExceeded.to_string(),
            "deadline exceeded before a buffer was reclaimed"
        );
    }

    #[test]
    fn test_errors_are_recoverable() {
        assert!(RotatorError::Cancelled.is_recoverable());
        assert!(RotatorError::DeadlineExceeded.is_recoverable());
    }
}
