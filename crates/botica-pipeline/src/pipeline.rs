//! # Sync Pipeline
//!
//! The sync trigger surface: one call fetches a date window, canonicalizes
//! it and persists the result.
//!
//! ## Run Phases
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       One Sync Run                                      │
//! │                                                                         │
//! │  run_sync(start, end)                                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┐   all days finish    ┌──────────────────────────┐    │
//! │  │ Fetch window │ ────────────────────►│ Canonicalize whole batch │    │
//! │  │ (day by day) │   before any write   │ (classify, dedup, ids)   │    │
//! │  └──────────────┘                      └────────────┬─────────────┘    │
//! │                                                     ▼                  │
//! │                              ┌──────────────────────────────────────┐  │
//! │                              │ Persist per category, in order:      │  │
//! │                              │ invoices → sales → expenses → insur. │  │
//! │                              │ First failure stops the rest;        │  │
//! │                              │ committed categories stay committed. │  │
//! │                              └──────────────────────────────────────┘  │
//! │                                                     │                  │
//! │                                                     ▼                  │
//! │                                                 RunStats               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Persistence starts only after every fetch day has completed, so a later
//! day's documents can never be half-overwritten by an earlier day still
//! in flight. Deterministic ids make the whole run re-entrant: running the
//! same window twice overwrites instead of duplicating.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

use crate::client::DocumentSource;
use crate::error::{PipelineError, PipelineResult};
use crate::fetcher::{CancelFlag, FailedFetch, MultiNodeFetcher};
use botica_core::types::{ExpenseRecord, InsuranceReceipt, Invoice, SaleLine};
use botica_core::{CanonicalBatch, Canonicalizer};

// =============================================================================
// Persistence Gateway Seam
// =============================================================================

/// Bulk upsert into a durable, key-indexed store. Every save replaces any
/// existing record sharing the same canonical id; there is no
/// partial-field patching.
///
/// Each call is all-or-nothing: on error, none of the slice's records may
/// be visible in the store.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    async fn save_invoices(&self, invoices: &[Invoice]) -> PipelineResult<()>;
    async fn save_sales(&self, lines: &[SaleLine]) -> PipelineResult<()>;
    async fn save_expenses(&self, expenses: &[ExpenseRecord]) -> PipelineResult<()>;
    async fn save_insurance(&self, receipts: &[InsuranceReceipt]) -> PipelineResult<()>;
}

/// Lets the pipeline and the query service share one gateway.
#[async_trait]
impl<G: PersistenceGateway> PersistenceGateway for std::sync::Arc<G> {
    async fn save_invoices(&self, invoices: &[Invoice]) -> PipelineResult<()> {
        self.as_ref().save_invoices(invoices).await
    }

    async fn save_sales(&self, lines: &[SaleLine]) -> PipelineResult<()> {
        self.as_ref().save_sales(lines).await
    }

    async fn save_expenses(&self, expenses: &[ExpenseRecord]) -> PipelineResult<()> {
        self.as_ref().save_expenses(expenses).await
    }

    async fn save_insurance(&self, receipts: &[InsuranceReceipt]) -> PipelineResult<()> {
        self.as_ref().save_insurance(receipts).await
    }
}

// =============================================================================
// In-Memory Gateway
// =============================================================================

/// Key-indexed in-memory store with the same replace-by-id semantics as
/// the durable one. Backs tests and one-off analysis runs that do not
/// want a database file.
///
/// Sale lines are keyed by their owning invoice: saving an invoice's lines
/// replaces that invoice's previous lines in full.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    invoices: Mutex<BTreeMap<String, Invoice>>,
    sale_lines: Mutex<BTreeMap<String, Vec<SaleLine>>>,
    expenses: Mutex<BTreeMap<String, ExpenseRecord>>,
    insurance: Mutex<BTreeMap<String, InsuranceReceipt>>,
}

/// Maps a poisoned lock to an internal error instead of panicking.
fn lock_err<T>(_: T) -> PipelineError {
    PipelineError::Internal("memory gateway lock poisoned".to_string())
}

impl MemoryGateway {
    pub fn new() -> Self {
        MemoryGateway::default()
    }

    /// All stored invoices, ordered by id.
    pub fn invoices(&self) -> PipelineResult<Vec<Invoice>> {
        let map = self.invoices.lock().map_err(lock_err)?;
        Ok(map.values().cloned().collect())
    }

    /// All stored sale lines, grouped by invoice id order.
    pub fn sale_lines(&self) -> PipelineResult<Vec<SaleLine>> {
        let map = self.sale_lines.lock().map_err(lock_err)?;
        Ok(map.values().flatten().cloned().collect())
    }

    /// All stored expenses, ordered by id.
    pub fn expenses(&self) -> PipelineResult<Vec<ExpenseRecord>> {
        let map = self.expenses.lock().map_err(lock_err)?;
        Ok(map.values().cloned().collect())
    }

    /// All stored insurance receipts, ordered by id.
    pub fn insurance(&self) -> PipelineResult<Vec<InsuranceReceipt>> {
        let map = self.insurance.lock().map_err(lock_err)?;
        Ok(map.values().cloned().collect())
    }
}

#[async_trait]
impl PersistenceGateway for MemoryGateway {
    async fn save_invoices(&self, invoices: &[Invoice]) -> PipelineResult<()> {
        let mut map = self.invoices.lock().map_err(lock_err)?;
        for invoice in invoices {
            map.insert(invoice.id.clone(), invoice.clone());
        }
        Ok(())
    }

    async fn save_sales(&self, lines: &[SaleLine]) -> PipelineResult<()> {
        let mut grouped: BTreeMap<String, Vec<SaleLine>> = BTreeMap::new();
        for line in lines {
            grouped
                .entry(line.invoice_id.clone())
                .or_default()
                .push(line.clone());
        }
        let mut map = self.sale_lines.lock().map_err(lock_err)?;
        for (invoice_id, fresh) in grouped {
            map.insert(invoice_id, fresh);
        }
        Ok(())
    }

    async fn save_expenses(&self, expenses: &[ExpenseRecord]) -> PipelineResult<()> {
        let mut map = self.expenses.lock().map_err(lock_err)?;
        for expense in expenses {
            map.insert(expense.id.clone(), expense.clone());
        }
        Ok(())
    }

    async fn save_insurance(&self, receipts: &[InsuranceReceipt]) -> PipelineResult<()> {
        let mut map = self.insurance.lock().map_err(lock_err)?;
        for receipt in receipts {
            map.insert(receipt.id.clone(), receipt.clone());
        }
        Ok(())
    }
}

// =============================================================================
// Run Statistics
// =============================================================================

/// What a sync run did. Returned whether the run fully succeeded or not:
/// a caller can always tell "no data in range" (zero counts, zero
/// failures) apart from "every fetch failed" (`units_attempted` > 0 and
/// all of them in `failed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    /// Correlation id for log lines of this run.
    pub run_id: String,
    pub invoice_count: usize,
    pub sale_line_count: usize,
    pub expense_count: usize,
    pub insurance_count: usize,
    /// Documents dropped as unusable or noise.
    pub skipped_documents: usize,
    pub days_processed: usize,
    pub units_attempted: usize,
    /// Fetch units that failed and were skipped.
    pub failed: Vec<FailedFetch>,
    /// True when every category save committed.
    pub persisted: bool,
    /// Overall success: persisted, and not every fetch unit failed.
    pub success: bool,
}

impl RunStats {
    /// True when fetching produced nothing because every unit failed.
    pub fn all_fetches_failed(&self) -> bool {
        self.units_attempted > 0 && self.failed.len() == self.units_attempted
    }
}

// =============================================================================
// Sync Pipeline
// =============================================================================

/// Orchestrates enumerate → fetch → canonicalize → persist for one window.
pub struct SyncPipeline<S, G> {
    fetcher: MultiNodeFetcher<S>,
    canonicalizer: Canonicalizer,
    gateway: G,
}

impl<S: DocumentSource, G: PersistenceGateway> SyncPipeline<S, G> {
    pub fn new(fetcher: MultiNodeFetcher<S>, canonicalizer: Canonicalizer, gateway: G) -> Self {
        SyncPipeline {
            fetcher,
            canonicalizer,
            gateway,
        }
    }

    /// Handle used to stop the run between fetch days.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.fetcher.cancel_flag()
    }

    /// Runs one full sync over `[start, end]` inclusive.
    ///
    /// Returns `Err` only for caller mistakes (reversed window). Fetch and
    /// persistence failures are reported through the returned [`RunStats`].
    pub async fn run_sync(&self, start: NaiveDate, end: NaiveDate) -> PipelineResult<RunStats> {
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, %start, %end, "Sync run started");

        let outcome = self.fetcher.fetch_window(start, end).await?;
        let batch = self.canonicalizer.build_batch(&outcome.documents);

        info!(
            run_id = %run_id,
            invoices = batch.invoices.len(),
            sale_lines = batch.sale_lines.len(),
            expenses = batch.expenses.len(),
            insurance = batch.insurance.len(),
            skipped = batch.skipped,
            "Canonicalized fetch window"
        );

        let persisted = self.persist(&run_id, &batch).await;
        let all_failed =
            outcome.units_attempted > 0 && outcome.failed.len() == outcome.units_attempted;

        let stats = RunStats {
            run_id,
            invoice_count: batch.invoices.len(),
            sale_line_count: batch.sale_lines.len(),
            expense_count: batch.expenses.len(),
            insurance_count: batch.insurance.len(),
            skipped_documents: batch.skipped,
            days_processed: outcome.days_processed,
            units_attempted: outcome.units_attempted,
            failed: outcome.failed,
            persisted,
            success: persisted && !all_failed,
        };

        if stats.success {
            info!(
                run_id = %stats.run_id,
                invoices = stats.invoice_count,
                failed_units = stats.failed.len(),
                "Sync run finished"
            );
        } else {
            error!(
                run_id = %stats.run_id,
                persisted = stats.persisted,
                failed_units = stats.failed.len(),
                units_attempted = stats.units_attempted,
                "Sync run failed"
            );
        }
        Ok(stats)
    }

    /// Saves the batch category by category, invoices first so sale lines
    /// never reference a missing document. The first failing save stops
    /// the rest; categories already committed stay committed.
    async fn persist(&self, run_id: &str, batch: &CanonicalBatch) -> bool {
        if let Err(err) = self.try_persist(batch).await {
            error!(run_id = %run_id, error = %err, "Save failed, aborting persistence");
            return false;
        }
        true
    }

    async fn try_persist(&self, batch: &CanonicalBatch) -> PipelineResult<()> {
        self.gateway.save_invoices(&batch.invoices).await?;
        self.gateway.save_sales(&batch.sale_lines).await?;
        self.gateway.save_expenses(&batch.expenses).await?;
        self.gateway.save_insurance(&batch.insurance).await?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
