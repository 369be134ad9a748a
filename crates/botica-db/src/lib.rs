//! # botica-db: Database Layer for Botica Analytics
//!
//! This crate provides durable storage for the canonical transaction set.
//! It uses SQLite for local storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Botica Analytics Data Flow                          │
//! │                                                                         │
//! │  Sync run (botica-pipeline)          Dashboard queries                 │
//! │       │                                    │                            │
//! │       ▼                                    ▼                            │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     botica-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ (invoice.rs)  │    │  (embedded)  │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ SqlitePool    │    │ InvoiceRepo   │    │ 001_initial  │  │   │
//! │  │   │ Connection    │◄───│ ExpenseRepo   │    │ _schema.sql  │  │   │
//! │  │   │ Management    │    │ InsuranceRepo │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │        canonical rows, keyed by deterministic ids               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (invoice, expense, etc.)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use botica_db::{Database, DbConfig};
//!
//! // Create database with default config
//! let db = Database::new(DbConfig::new("path/to/botica.db")).await?;
//!
//! // Bulk-upsert a canonical batch, one transaction per category
//! db.invoices().upsert_bulk(&batch.invoices).await?;
//! db.sale_lines().upsert_bulk(&batch.sale_lines).await?;
//!
//! // Filtered reads for the rollup layer
//! let rows = db.invoices().list_in_range(from, to).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::expense::ExpenseRepository;
pub use repository::insurance::InsuranceRepository;
pub use repository::invoice::InvoiceRepository;
pub use repository::payroll::PayrollRepository;
pub use repository::sale_line::SaleLineRepository;
