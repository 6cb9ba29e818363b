//! Unified error type for the co-location toolkit
//!
//! [`ColoError`] carries the two caller-facing failure classes of the
//! pipeline: configuration mistakes (bad sizing, unknown option keys,
//! unrecognized topology tags) and data-contract violations (gaps or
//! out-of-range values in the hourly inputs). Solver degradation and
//! undefined financial metrics are *not* errors; they are recorded on the
//! results themselves.
//!
//! # Example
//!
//! ```ignore
//! use colo_core::{ColoError, ColoResult};
//!
//! fn check_duration(hours: f64) -> ColoResult<()> {
//!     if hours <= 0.0 {
//!         return Err(ColoError::Configuration(format!("duration must be > 0, got {hours}")));
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all co-location operations.
#[derive(Error, Debug)]
pub enum ColoError {
    /// Caller supplied invalid or unrecognized parameters
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Time-series input malformed or incomplete
    #[error("Data error: {0}")]
    Data(String),

    /// Solver could not be set up (not raised for infeasibility)
    #[error("Solver error: {0}")]
    Solver(String),

    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Convenience type alias for Results using ColoError.
pub type ColoResult<T> = Result<T, ColoError>;

impl ColoError {
    /// Short machine-readable category, used in result tables.
    pub fn kind(&self) -> &'static str {
        match self {
            ColoError::Configuration(_) => "configuration",
            ColoError::Data(_) => "data",
            ColoError::Solver(_) => "solver",
            ColoError::Io(_) => "io",
            ColoError::Parse(_) => "parse",
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ColoError::Configuration(msg.into())
    }
}

impl From<serde_json::Error> for ColoError {
    fn from(err: serde_json::Error) -> Self {
        ColoError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ColoError::Configuration("duration must be > 0".into());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("duration must be > 0"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ColoError = io_err.into();
        assert!(matches!(err, ColoError::Io(_)));
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ColoResult<()> {
            Err(ColoError::Data("gap at hour 12".into()))
        }

        fn outer() -> ColoResult<()> {
            inner()?;
            Ok(())
        }

        let err = outer().unwrap_err();
        assert_eq!(err.kind(), "data");
    }
}
