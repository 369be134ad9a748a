//! # Reconciliation & Rollup Engine
//!
//! Aggregate metrics over the canonical transaction set, parameterized by a
//! branch/date filter. Everything here is recomputed from scratch on every
//! call: derived numbers are never mutated incrementally, so a rollup can
//! never drift from the rows it was computed over.
//!
//! ## Revenue Policy
//! Credit notes and negative amounts are NEVER netted against gross
//! revenue. They accumulate into a separate `credit_exposure_cents` so a
//! spike in credits stays visible for audit instead of silently shrinking
//! the month. Internal transfers are excluded from every total.
//!
//! ```text
//!                     ┌──────────────────────────────┐
//!   Invoice ──────────►  kind == InternalTransfer?   ──► excluded
//!                     └──────────────┬───────────────┘
//!                                    ▼
//!                     ┌──────────────────────────────┐
//!                     │ CreditNote, or net < 0       ──► credit_exposure
//!                     └──────────────┬───────────────┘
//!                                    ▼
//!                     ┌──────────────────────────────┐
//!                     │ Sale, net ≥ 0                ──► gross_revenue
//!                     └──────────────────────────────┘      + payment_totals
//! ```

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CoreResult;
use crate::period::enumerate_days;
use crate::types::{
    DocumentKind, ExpenseKind, ExpenseRecord, ExpenseStatus, InsuranceReceipt, Invoice,
    PaymentBreakdown, PayrollEntry, ReceiptOrigin,
};
use crate::{CREDIT_ALERT_THRESHOLD_PCT, RESTOCK_LAG_DAYS};

// =============================================================================
// Filter
// =============================================================================

/// Branch/date scope for one rollup call. Dates are inclusive on both
/// ends; the branch filter is a case-insensitive substring match.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct MetricsFilter {
    /// Substring matched against the branch name, case-insensitive.
    /// `None` covers every branch.
    pub branch_contains: Option<String>,

    /// First day of the range (inclusive).
    #[ts(as = "String")]
    pub start: NaiveDate,

    /// Last day of the range (inclusive).
    #[ts(as = "String")]
    pub end: NaiveDate,
}

impl MetricsFilter {
    /// Full-range filter over every branch.
    pub fn range(start: NaiveDate, end: NaiveDate) -> Self {
        MetricsFilter {
            branch_contains: None,
            start,
            end,
        }
    }

    /// Restricts the filter to branches containing `needle`.
    pub fn with_branch(mut self, needle: impl Into<String>) -> Self {
        self.branch_contains = Some(needle.into());
        self
    }

    fn matches_branch(&self, branch: &str) -> bool {
        match &self.branch_contains {
            None => true,
            Some(needle) => branch.to_lowercase().contains(&needle.to_lowercase()),
        }
    }

    fn contains_day(&self, day: NaiveDate) -> bool {
        day >= self.start && day <= self.end
    }

    /// Whether an invoice falls inside this scope.
    pub fn matches_invoice(&self, invoice: &Invoice) -> bool {
        self.matches_branch(&invoice.branch) && self.contains_day(invoice.issued_on())
    }

    /// Whether an expense falls inside this scope.
    pub fn matches_expense(&self, expense: &ExpenseRecord) -> bool {
        self.matches_branch(&expense.branch) && self.contains_day(expense.issued_on())
    }

    /// Whether a payroll entry falls inside this scope.
    pub fn matches_payroll(&self, entry: &PayrollEntry) -> bool {
        self.matches_branch(&entry.branch) && self.contains_day(entry.paid_on())
    }

    /// Whether an insurance receipt falls inside this scope.
    pub fn matches_receipt(&self, receipt: &InsuranceReceipt) -> bool {
        self.matches_branch(&receipt.branch) && self.contains_day(receipt.issued_on())
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// One day of the sales vs. next-day-restock comparison. `purchases_cents`
/// holds the FOLLOWING day's supplier purchases: stock sold on day N is
/// replenished on day N+1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RestockRow {
    #[ts(as = "String")]
    pub day: NaiveDate,
    pub sales_cents: i64,
    pub purchases_cents: i64,
}

/// The full rollup for one filter scope.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PeriodMetrics {
    #[ts(as = "String")]
    pub start: NaiveDate,
    #[ts(as = "String")]
    pub end: NaiveDate,
    pub branch_contains: Option<String>,

    /// Σ net over sales with non-negative net.
    pub gross_revenue_cents: i64,

    /// Σ |net| over credit notes and negative documents. Kept apart from
    /// gross, never subtracted.
    pub credit_exposure_cents: i64,

    /// Paid expenses plus payroll in range.
    pub real_outflow_cents: i64,

    /// Expenses still owed.
    pub pending_outflow_cents: i64,

    /// `(gross − real_outflow) / gross`, 0.0 on an empty period.
    pub cash_flow_margin: f64,

    /// `credit_exposure / gross × 100`, 0.0 when gross is 0.
    pub credit_ratio_pct: f64,

    /// Period needs manual audit: ratio above threshold, or credits
    /// against a zero-gross period.
    pub credit_alert: bool,

    /// Instrument totals summed from the stored per-invoice breakdowns.
    pub payment_totals: PaymentBreakdown,

    /// Day-indexed sales vs. next-day purchases, one row per day in range.
    pub restock_alignment: Vec<RestockRow>,

    /// Gross-contributing invoices in scope.
    pub invoice_count: usize,

    /// Invoices flagged at canonicalization time for a payment/total
    /// mismatch.
    pub discrepancy_count: usize,
}

/// Coverage totals for one institution, explicit and projected receipts
/// combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstitutionCoverage {
    pub institution: String,
    pub coverage_cents: i64,
    pub copay_cents: i64,
    pub receipt_count: usize,
    /// How many of the receipts were projected from invoices rather than
    /// reported explicitly.
    pub projected_count: usize,
}

// =============================================================================
// Rollup
// =============================================================================

/// Computes the full period rollup over canonical rows.
///
/// Pure and allocation-light: one pass over each input slice plus one
/// day-map pass for the restock series.
pub fn compute_metrics(
    invoices: &[Invoice],
    expenses: &[ExpenseRecord],
    payroll: &[PayrollEntry],
    filter: &MetricsFilter,
) -> CoreResult<PeriodMetrics> {
    let days = enumerate_days(filter.start, filter.end)?;

    let mut gross: i64 = 0;
    let mut exposure: i64 = 0;
    let mut payment_totals = PaymentBreakdown::default();
    let mut invoice_count = 0usize;
    let mut discrepancy_count = 0usize;
    let mut sales_by_day: HashMap<NaiveDate, i64> = HashMap::new();

    for invoice in invoices.iter().filter(|i| filter.matches_invoice(i)) {
        if invoice.kind == DocumentKind::InternalTransfer {
            continue;
        }
        if invoice.has_discrepancy {
            discrepancy_count += 1;
        }
        if invoice.kind == DocumentKind::CreditNote || invoice.net_cents < 0 {
            exposure += invoice.net_cents.abs();
            continue;
        }
        if invoice.kind != DocumentKind::Sale {
            // Debit notes: neither revenue nor exposure
            continue;
        }
        gross += invoice.net_cents;
        invoice_count += 1;
        payment_totals.merge(&invoice.breakdown());
        *sales_by_day.entry(invoice.issued_on()).or_default() += invoice.net_cents;
    }

    let mut real_outflow: i64 = 0;
    let mut pending_outflow: i64 = 0;
    for expense in expenses.iter().filter(|e| filter.matches_expense(e)) {
        match expense.status {
            ExpenseStatus::Paid => real_outflow += expense.amount_cents,
            ExpenseStatus::Pending => pending_outflow += expense.amount_cents,
            ExpenseStatus::Ignored | ExpenseStatus::Unknown => {}
        }
    }
    for entry in payroll.iter().filter(|p| filter.matches_payroll(p)) {
        real_outflow += entry.amount_cents;
    }

    // Purchases grouped one day past the range so the final row pairs
    let purchases_by_day = restock_purchases_by_day(expenses, filter);
    let restock_alignment = days
        .iter()
        .map(|&day| RestockRow {
            day,
            sales_cents: sales_by_day.get(&day).copied().unwrap_or(0),
            purchases_cents: purchases_by_day
                .get(&(day + Duration::days(RESTOCK_LAG_DAYS)))
                .copied()
                .unwrap_or(0),
        })
        .collect();

    let cash_flow_margin = if gross == 0 {
        0.0
    } else {
        (gross - real_outflow) as f64 / gross as f64
    };
    let credit_ratio_pct = if gross == 0 {
        0.0
    } else {
        exposure as f64 / gross as f64 * 100.0
    };
    let credit_alert = if gross == 0 {
        exposure > 0
    } else {
        credit_ratio_pct > CREDIT_ALERT_THRESHOLD_PCT
    };

    Ok(PeriodMetrics {
        start: filter.start,
        end: filter.end,
        branch_contains: filter.branch_contains.clone(),
        gross_revenue_cents: gross,
        credit_exposure_cents: exposure,
        real_outflow_cents: real_outflow,
        pending_outflow_cents: pending_outflow,
        cash_flow_margin,
        credit_ratio_pct,
        credit_alert,
        payment_totals,
        restock_alignment,
        invoice_count,
        discrepancy_count,
    })
}

/// Supplier purchases per calendar day, covering `[start, end + 1]`.
/// Restocking means merchandise: operating services are not purchases,
/// and ignored expenses are upstream noise.
fn restock_purchases_by_day(
    expenses: &[ExpenseRecord],
    filter: &MetricsFilter,
) -> HashMap<NaiveDate, i64> {
    let horizon = filter.end + Duration::days(RESTOCK_LAG_DAYS);
    let mut by_day: HashMap<NaiveDate, i64> = HashMap::new();
    for expense in expenses {
        if expense.kind != ExpenseKind::SupplierExpense {
            continue;
        }
        if expense.status == ExpenseStatus::Ignored {
            continue;
        }
        let day = expense.issued_on();
        if day < filter.start || day > horizon {
            continue;
        }
        if !filter.matches_branch(&expense.branch) {
            continue;
        }
        *by_day.entry(day).or_default() += expense.amount_cents;
    }
    by_day
}

/// Coverage totals per institution over explicit and projected receipts,
/// sorted by coverage descending with a name tie-break.
pub fn coverage_by_institution(
    receipts: &[InsuranceReceipt],
    filter: &MetricsFilter,
) -> Vec<InstitutionCoverage> {
    let mut by_institution: BTreeMap<String, InstitutionCoverage> = BTreeMap::new();
    for receipt in receipts.iter().filter(|r| filter.matches_receipt(r)) {
        let entry = by_institution
            .entry(receipt.institution.clone())
            .or_insert_with(|| InstitutionCoverage {
                institution: receipt.institution.clone(),
                coverage_cents: 0,
                copay_cents: 0,
                receipt_count: 0,
                projected_count: 0,
            });
        entry.coverage_cents += receipt.coverage_cents;
        entry.copay_cents += receipt.copay_cents;
        entry.receipt_count += 1;
        if receipt.origin == ReceiptOrigin::ProjectedFromInvoice {
            entry.projected_count += 1;
        }
    }

    let mut out: Vec<InstitutionCoverage> = by_institution.into_values().collect();
    out.sort_by(|a, b| {
        b.coverage_cents
            .cmp(&a.coverage_cents)
            .then_with(|| a.institution.cmp(&b.institution))
    });
    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn invoice(id: &str, kind: DocumentKind, d: u32, net_cents: i64, branch: &str) -> Invoice {
        let issued_at = Utc.with_ymd_and_hms(2024, 5, d, 12, 0, 0).unwrap();
        Invoice {
            id: id.to_string(),
            document_number: id.to_uppercase(),
            kind,
            issued_at,
            period_key: "2024-05".to_string(),
            branch: branch.to_string(),
            seller: String::new(),
            client: String::new(),
            entity: "Individual".to_string(),
            gross_cents: net_cents,
            net_cents,
            cash_cents: net_cents.max(0),
            card_cents: 0,
            wallet_cents: 0,
            insurance_cents: 0,
            account_cents: 0,
            payment_label: "Cash".to_string(),
            line_total_cents: net_cents,
            has_discrepancy: false,
        }
    }

    fn expense(
        d: u32,
        amount_cents: i64,
        status: ExpenseStatus,
        kind: ExpenseKind,
    ) -> ExpenseRecord {
        let issued_at = Utc.with_ymd_and_hms(2024, 5, d, 12, 0, 0).unwrap();
        ExpenseRecord {
            id: format!("exp:centro:202405{d:02}:x:{amount_cents}"),
            supplier: "Droguería del Sud".to_string(),
            amount_cents,
            issued_at,
            due_at: None,
            branch: "Centro".to_string(),
            status,
            kind,
        }
    }

    fn receipt(institution: &str, cov: i64, copay: i64, origin: ReceiptOrigin) -> InsuranceReceipt {
        InsuranceReceipt {
            id: format!("ins:{institution}:{cov}"),
            institution: institution.to_string(),
            coverage_cents: cov,
            copay_cents: copay,
            affiliate: None,
            issued_at: Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap(),
            branch: "Centro".to_string(),
            origin,
        }
    }

    fn full_may() -> MetricsFilter {
        MetricsFilter::range(day(1), day(31))
    }

    #[test]
    fn test_credit_notes_accumulate_exposure_without_netting() {
        let invoices = vec![
            invoice("sale:A-1", DocumentKind::Sale, 10, 100_000, "Centro"),
            invoice("credit:A-2", DocumentKind::CreditNote, 10, -20_000, "Centro"),
            invoice("sale:A-3", DocumentKind::Sale, 11, -5_000, "Centro"),
        ];

        let metrics = compute_metrics(&invoices, &[], &[], &full_may()).unwrap();
        assert_eq!(metrics.gross_revenue_cents, 100_000);
        assert_eq!(metrics.credit_exposure_cents, 25_000);
    }

    #[test]
    fn test_internal_transfers_touch_nothing() {
        let invoices = vec![
            invoice("sale:A-1", DocumentKind::Sale, 10, 50_000, "Centro"),
            invoice("transfer:T-1", DocumentKind::InternalTransfer, 10, 80_000, "Centro"),
            invoice("transfer:T-2", DocumentKind::InternalTransfer, 10, -30_000, "Centro"),
        ];

        let metrics = compute_metrics(&invoices, &[], &[], &full_may()).unwrap();
        assert_eq!(metrics.gross_revenue_cents, 50_000);
        assert_eq!(metrics.credit_exposure_cents, 0);
        assert_eq!(metrics.payment_totals.total().cents(), 50_000);
        assert_eq!(metrics.invoice_count, 1);
    }

    #[test]
    fn test_outflow_split_by_status_and_payroll() {
        let expenses = vec![
            expense(10, 30_000, ExpenseStatus::Paid, ExpenseKind::SupplierExpense),
            expense(10, 7_000, ExpenseStatus::Paid, ExpenseKind::OperatingService),
            expense(11, 12_000, ExpenseStatus::Pending, ExpenseKind::SupplierExpense),
            expense(11, 4_000, ExpenseStatus::Ignored, ExpenseKind::SupplierExpense),
        ];
        let payroll = vec![PayrollEntry {
            id: "p1".to_string(),
            employee: "Laura".to_string(),
            amount_cents: 90_000,
            paid_at: Utc.with_ymd_and_hms(2024, 5, 28, 12, 0, 0).unwrap(),
            branch: "Centro".to_string(),
        }];

        let metrics = compute_metrics(&[], &expenses, &payroll, &full_may()).unwrap();
        assert_eq!(metrics.real_outflow_cents, 127_000);
        assert_eq!(metrics.pending_outflow_cents, 12_000);
    }

    #[test]
    fn test_margin_and_ratio_on_empty_period_are_zero() {
        let metrics = compute_metrics(&[], &[], &[], &full_may()).unwrap();
        assert_eq!(metrics.cash_flow_margin, 0.0);
        assert_eq!(metrics.credit_ratio_pct, 0.0);
        assert!(!metrics.credit_alert);
    }

    #[test]
    fn test_credit_alert_above_threshold() {
        let invoices = vec![
            invoice("sale:A-1", DocumentKind::Sale, 10, 100_000, "Centro"),
            invoice("credit:C-1", DocumentKind::CreditNote, 10, -6_000, "Centro"),
        ];

        let metrics = compute_metrics(&invoices, &[], &[], &full_may()).unwrap();
        assert!((metrics.credit_ratio_pct - 6.0).abs() < 1e-9);
        assert!(metrics.credit_alert);
    }

    #[test]
    fn test_credit_against_zero_gross_still_alerts() {
        let invoices = vec![invoice(
            "credit:C-1",
            DocumentKind::CreditNote,
            10,
            -6_000,
            "Centro",
        )];

        let metrics = compute_metrics(&invoices, &[], &[], &full_may()).unwrap();
        assert_eq!(metrics.credit_ratio_pct, 0.0);
        assert!(metrics.credit_alert);
    }

    #[test]
    fn test_restock_pairs_sales_with_next_day_purchases() {
        // Sales $100 on D, purchases $80 on D+1 and $20 on D+2
        let invoices = vec![invoice("sale:A-1", DocumentKind::Sale, 10, 10_000, "Centro")];
        let expenses = vec![
            expense(11, 8_000, ExpenseStatus::Paid, ExpenseKind::SupplierExpense),
            expense(12, 2_000, ExpenseStatus::Pending, ExpenseKind::SupplierExpense),
        ];

        let filter = MetricsFilter::range(day(10), day(11));
        let metrics = compute_metrics(&invoices, &expenses, &[], &filter).unwrap();

        assert_eq!(metrics.restock_alignment.len(), 2);
        let row_d = &metrics.restock_alignment[0];
        assert_eq!(row_d.day, day(10));
        assert_eq!(row_d.sales_cents, 10_000);
        assert_eq!(row_d.purchases_cents, 8_000);

        // Final row pairs with a purchase one day past the range
        let row_d1 = &metrics.restock_alignment[1];
        assert_eq!(row_d1.sales_cents, 0);
        assert_eq!(row_d1.purchases_cents, 2_000);
    }

    #[test]
    fn test_restock_ignores_services_and_ignored_expenses() {
        let invoices = vec![invoice("sale:A-1", DocumentKind::Sale, 10, 10_000, "Centro")];
        let expenses = vec![
            expense(11, 8_000, ExpenseStatus::Paid, ExpenseKind::OperatingService),
            expense(11, 3_000, ExpenseStatus::Ignored, ExpenseKind::SupplierExpense),
            expense(11, 5_000, ExpenseStatus::Pending, ExpenseKind::SupplierExpense),
        ];

        let filter = MetricsFilter::range(day(10), day(10));
        let metrics = compute_metrics(&invoices, &expenses, &[], &filter).unwrap();
        assert_eq!(metrics.restock_alignment[0].purchases_cents, 5_000);
    }

    #[test]
    fn test_branch_filter_is_case_insensitive_substring() {
        let invoices = vec![
            invoice("sale:A-1", DocumentKind::Sale, 10, 10_000, "Sucursal Centro"),
            invoice("sale:A-2", DocumentKind::Sale, 10, 20_000, "Sucursal Norte"),
        ];

        let filter = full_may().with_branch("centro");
        let metrics = compute_metrics(&invoices, &[], &[], &filter).unwrap();
        assert_eq!(metrics.gross_revenue_cents, 10_000);
    }

    #[test]
    fn test_date_bounds_are_inclusive() {
        let invoices = vec![
            invoice("sale:A-1", DocumentKind::Sale, 9, 1_000, "Centro"),
            invoice("sale:A-2", DocumentKind::Sale, 10, 2_000, "Centro"),
            invoice("sale:A-3", DocumentKind::Sale, 12, 4_000, "Centro"),
            invoice("sale:A-4", DocumentKind::Sale, 13, 8_000, "Centro"),
        ];

        let filter = MetricsFilter::range(day(10), day(12));
        let metrics = compute_metrics(&invoices, &[], &[], &filter).unwrap();
        assert_eq!(metrics.gross_revenue_cents, 6_000);
    }

    #[test]
    fn test_discrepancies_are_counted() {
        let mut flagged = invoice("sale:A-1", DocumentKind::Sale, 10, 10_000, "Centro");
        flagged.has_discrepancy = true;
        let invoices = vec![
            flagged,
            invoice("sale:A-2", DocumentKind::Sale, 10, 5_000, "Centro"),
        ];

        let metrics = compute_metrics(&invoices, &[], &[], &full_may()).unwrap();
        assert_eq!(metrics.discrepancy_count, 1);
    }

    #[test]
    fn test_coverage_groups_and_sorts_by_institution() {
        let receipts = vec![
            receipt("OSDE", 30_000, 5_000, ReceiptOrigin::ExplicitReceipt),
            receipt("OSDE", 10_000, 0, ReceiptOrigin::ProjectedFromInvoice),
            receipt("PAMI", 45_000, 0, ReceiptOrigin::ExplicitReceipt),
        ];

        let coverage = coverage_by_institution(&receipts, &full_may());
        assert_eq!(coverage.len(), 2);
        assert_eq!(coverage[0].institution, "PAMI");
        assert_eq!(coverage[1].institution, "OSDE");
        assert_eq!(coverage[1].coverage_cents, 40_000);
        assert_eq!(coverage[1].receipt_count, 2);
        assert_eq!(coverage[1].projected_count, 1);
    }
}
