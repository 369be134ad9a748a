//! # Pipeline Error Types
//!
//! Error types for fetch and sync-run operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Pipeline Error Categories                          │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │     Fetch       │  │     Persistence         │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Fetch          │  │  Persistence            │ │
//! │  │  ConfigLoad     │  │  HttpClientBuild│  │  (fatal to the run,     │ │
//! │  │  ConfigSave     │  │  (skip + log,   │  │   atomic per category)  │ │
//! │  └─────────────────┘  │   never fatal)  │  └─────────────────────────┘ │
//! │                       └─────────────────┘                              │
//! │                                                                         │
//! │  One failed fetch unit is recorded in the run statistics and skipped.  │
//! │  A failed save flips the run result to success=false; categories       │
//! │  already committed stay committed.                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use botica_core::{CoreError, DocCategory};
use botica_db::DbError;
use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline error type covering configuration, fetch and persistence
/// failures.
///
/// ## Design Principles
/// - Fetch errors carry the `(day, node, category)` unit they belong to,
///   so run statistics can report exactly what was skipped
/// - Errors are categorized for different handling strategies
/// - All errors are `Send + Sync` for async compatibility
#[derive(Debug, Error)]
pub enum PipelineError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid pipeline configuration.
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Fetch Errors
    // =========================================================================
    /// One `(day, node, category)` fetch unit failed.
    #[error("Fetch failed for {category} on {day} at node {node}: {message}")]
    Fetch {
        day: NaiveDate,
        node: String,
        category: DocCategory,
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    HttpClientBuild(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// A core invariant was violated by the caller (e.g. reversed dates).
    #[error("Domain error: {0}")]
    Core(#[from] CoreError),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// A bulk save failed. Fatal to the run result; the failing category's
    /// transaction rolled back, earlier categories stay committed.
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DbError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal pipeline error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for PipelineError {
    fn from(err: toml::de::Error) -> Self {
        PipelineError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for PipelineError {
    fn from(err: toml::ser::Error) -> Self {
        PipelineError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl PipelineError {
    /// Returns true if the failed operation is worth repeating on a later
    /// run.
    ///
    /// ## Retryable Errors
    /// - Fetch unit failures (network, timeout, malformed envelope)
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Domain errors (caller mistakes)
    ///
    /// Fetch units are retried zero times within a run; the unit is logged,
    /// skipped and surfaced in the run statistics so a later run can cover
    /// the gap.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Fetch { .. })
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidConfig(_)
                | PipelineError::ConfigLoadFailed(_)
                | PipelineError::ConfigSaveFailed(_)
        )
    }
}
