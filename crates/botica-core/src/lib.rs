//! # botica-core: Pure Business Logic for Botica Analytics
//!
//! This crate is the **heart** of the pipeline. It contains all business
//! logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Botica Analytics Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Upstream POS API (per branch node)              │   │
//! │  │      /documents/invoices • /documents/expenses • /insurance     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ JSON per (day, node, category)         │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │              botica-pipeline (Fetch & Orchestration)            │   │
//! │  │    enumerate days ──► fetch nodes ──► canonicalize ──► persist  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ botica-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  payment  │  │ canonical │  │  rollup   │  │   │
//! │  │   │  Invoice  │  │ two-pass  │  │ dedup +   │  │ metrics + │  │   │
//! │  │   │  SaleLine │  │ classify  │  │ identity  │  │ restock   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    botica-db (Database Layer)                   │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Canonical entities (Invoice, SaleLine, ExpenseRecord, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`raw`] - Lenient adapters for upstream JSON with per-node field drift
//! - [`payment`] - Two-pass payment classification into instrument buckets
//! - [`canonical`] - Identity derivation, dedup, line reconciliation
//! - [`lookup`] - Injected alias / supplier-kind / product-master tables
//! - [`period`] - Day enumeration and period keys
//! - [`rollup`] - Reconciliation metrics over a branch/date filter
//! - [`analytics`] - Basket co-occurrence and ABC/Pareto ranking
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Skip, don't throw**: A malformed upstream document is dropped and
//!    counted, never an error - one bad record must not cost a day of data
//!
//! ## Example Usage
//!
//! ```rust
//! use botica_core::money::Money;
//!
//! // Upstream totals arrive as floats; this is the only place they enter
//! let gross = Money::from_major_f64(123.45);
//! assert_eq!(gross.cents(), 12_345);
//!
//! // Everything after that is integer arithmetic
//! let remainder = gross - Money::from_cents(45);
//! assert_eq!(remainder.to_string(), "$123.00");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod analytics;
pub mod canonical;
pub mod error;
pub mod lookup;
pub mod money;
pub mod payment;
pub mod period;
pub mod raw;
pub mod rollup;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use botica_core::Invoice` instead of
// `use botica_core::types::Invoice`

pub use analytics::{abc_ranking, AbcClass, AbcDimension, AbcEntry, BasketMatrix, RelatedProduct};
pub use canonical::{CanonicalBatch, Canonicalizer, InvoiceBundle};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use payment::{classify, Classification, ClassificationOutcome, ClassifierConfig};
pub use raw::{DocCategory, RawDocument};
pub use rollup::{
    compute_metrics, coverage_by_institution, InstitutionCoverage, MetricsFilter, PeriodMetrics,
    RestockRow,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Credit exposure over gross revenue (%) above which a period is flagged
/// for manual audit.
///
/// ## Why a constant?
/// Credits are never netted against gross, so the only guard against a
/// refund-fraud pattern is this ratio. 5% was picked with the accountant
/// against historical months; periods above it get a human look.
pub const CREDIT_ALERT_THRESHOLD_PCT: f64 = 5.0;

/// Allowed gap between a document's classified payment sum and its header
/// total, in cents per line item.
///
/// ## Why per line?
/// Upstream rounds each line to the cent before summing, so a legitimate
/// N-line document can drift up to N cents from its header total. Anything
/// beyond that is flagged as a discrepancy, never "corrected".
pub const DISCREPANCY_TOLERANCE_PER_LINE_CENTS: i64 = 1;

/// Modeled delay between selling stock and replacing it, in days.
///
/// ## Business Reason
/// Both branches order from the wholesaler in the evening and receive the
/// goods next morning, so day N's sales pair with day N+1's purchases in
/// the restock-alignment series.
pub const RESTOCK_LAG_DAYS: i64 = 1;
