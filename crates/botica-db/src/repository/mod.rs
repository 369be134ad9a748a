//! # Repository Module
//!
//! Database repository implementations for the canonical store.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Sync run / Analytics service                                          │
//! │       │                                                                 │
//! │       │  db.invoices().upsert_bulk(&batch.invoices)                    │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  InvoiceRepository                                                     │
//! │  ├── upsert_bulk(&self, invoices)    one transaction per call          │
//! │  ├── list_in_range(&self, from, to)                                    │
//! │  └── get_by_id(&self, id)                                              │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Upsert semantics: a record sharing a canonical id fully replaces      │
//! │  the stored one - no partial-field patching.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`invoice::InvoiceRepository`] - Canonical invoices
//! - [`sale_line::SaleLineRepository`] - Line items, replaced per owning invoice
//! - [`expense::ExpenseRepository`] - Provider expenses and services
//! - [`insurance::InsuranceRepository`] - Explicit and projected receipts
//! - [`payroll::PayrollRepository`] - Salary payments

pub mod expense;
pub mod insurance;
pub mod invoice;
pub mod payroll;
pub mod sale_line;
