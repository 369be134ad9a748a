//! # Error Types
//!
//! Domain-specific error types for botica-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  botica-core errors (this file)                                        │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── ValidationError  - Lookup/config validation failures              │
//! │                                                                         │
//! │  botica-db errors (separate crate)                                     │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  botica-pipeline errors (separate crate)                               │
//! │  └── PipelineError    - Fetch/persistence orchestration failures       │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → PipelineError → RunStats/log      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (dates, table names, etc.)
//! 3. Errors are enum variants, never String
//! 4. Malformed upstream documents are NOT errors: the canonicalizer skips
//!    them and callers count the skips. Errors here are caller mistakes.

use chrono::NaiveDate;
use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent caller mistakes (inverted date ranges, invalid
/// lookup tables), never upstream data quality problems.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A fetch or metrics window where start is after end.
    ///
    /// ## When This Occurs
    /// - Sync trigger called with swapped dates
    /// - Metrics filter built from user input without validation
    #[error("Invalid date range: {start} is after {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Lookup-table and classifier-configuration validation errors.
///
/// Raised when injected configuration cannot be used as-is, before any
/// documents are processed.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Invalid format (e.g., blank keyword, blank code key).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InvalidDateRange {
            start: NaiveDate::from_ymd_opt(2024, 5, 10).unwrap(),
            end: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid date range: 2024-05-10 is after 2024-05-01"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "wallet_brands".to_string(),
        };
        assert_eq!(err.to_string(), "wallet_brands is required");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::InvalidFormat {
            field: "code_map".to_string(),
            reason: "blank key".to_string(),
        };
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
