//! Dashboard queries and SQLite persistence.
//!
//! Two adapters live here, both thin wrappers over [`botica_db`]:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  SyncPipeline ──► SqliteGateway ──► upsert_bulk per table   │
//! │                                                             │
//! │  Dashboard ─────► AnalyticsService                          │
//! │                     │  load rows for the filter window      │
//! │                     ▼                                       │
//! │                   botica_core rollup / analytics (pure)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The service loads rows and hands them to the pure functions in
//! `botica_core`; every business rule stays there. Its only piece of
//! logic is choosing the load window, which is wider than the filter
//! for expenses (see [`AnalyticsService::period_metrics`]).

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use async_trait::async_trait;

use botica_core::analytics::{abc_ranking, AbcDimension, AbcEntry, BasketMatrix, RelatedProduct};
use botica_core::period::day_bounds;
use botica_core::rollup::{
    compute_metrics, coverage_by_institution, InstitutionCoverage, MetricsFilter, PeriodMetrics,
};
use botica_core::types::{
    DocumentKind, ExpenseRecord, InsuranceReceipt, Invoice, SaleLine,
};
use botica_core::{Canonicalizer, RESTOCK_LAG_DAYS};
use botica_db::Database;

use crate::error::PipelineResult;
use crate::pipeline::PersistenceGateway;

// =============================================================================
// SQLite Gateway
// =============================================================================

/// [`PersistenceGateway`] backed by the SQLite repositories.
///
/// Each save is one transaction inside the repository. Sale lines are
/// replaced per owning invoice rather than upserted, because their ids
/// are surrogate and change between runs.
#[derive(Clone)]
pub struct SqliteGateway {
    db: Database,
}

impl SqliteGateway {
    pub fn new(db: Database) -> Self {
        SqliteGateway { db }
    }
}

#[async_trait]
impl PersistenceGateway for SqliteGateway {
    async fn save_invoices(&self, invoices: &[Invoice]) -> PipelineResult<()> {
        self.db.invoices().upsert_bulk(invoices).await?;
        Ok(())
    }

    async fn save_sales(&self, lines: &[SaleLine]) -> PipelineResult<()> {
        self.db.sale_lines().upsert_bulk(lines).await?;
        Ok(())
    }

    async fn save_expenses(&self, expenses: &[ExpenseRecord]) -> PipelineResult<()> {
        self.db.expenses().upsert_bulk(expenses).await?;
        Ok(())
    }

    async fn save_insurance(&self, receipts: &[InsuranceReceipt]) -> PipelineResult<()> {
        self.db.insurance().upsert_bulk(receipts).await?;
        Ok(())
    }
}

// =============================================================================
// Analytics Service
// =============================================================================

/// Read side of the store: loads canonical rows for a filter window and
/// delegates to the pure rollup and analytics functions.
#[derive(Clone)]
pub struct AnalyticsService {
    db: Database,
}

impl AnalyticsService {
    pub fn new(db: Database) -> Self {
        AnalyticsService { db }
    }

    /// The full period rollup for one filter.
    ///
    /// Expenses load one day past `filter.end`: the restock series pairs
    /// each sale day with the purchases of the following day, and that
    /// final pairing needs rows the filter itself would exclude.
    pub async fn period_metrics(&self, filter: &MetricsFilter) -> PipelineResult<PeriodMetrics> {
        let (from, to) = base_window(filter);
        let (purchases_from, purchases_to) = purchase_window(filter);

        let invoices = self.db.invoices().list_in_range(from, to).await?;
        let expenses = self
            .db
            .expenses()
            .list_in_range(purchases_from, purchases_to)
            .await?;
        let payroll = self.db.payroll().list_in_range(from, to).await?;
        debug!(
            invoices = invoices.len(),
            expenses = expenses.len(),
            payroll = payroll.len(),
            start = %filter.start,
            end = %filter.end,
            "Loaded rows for period rollup"
        );

        Ok(compute_metrics(&invoices, &expenses, &payroll, filter)?)
    }

    /// ABC revenue ranking over the lines of in-scope sale documents.
    /// Credit notes and transfers never contribute lines.
    pub async fn abc_ranking(
        &self,
        dimension: AbcDimension,
        filter: &MetricsFilter,
    ) -> PipelineResult<Vec<AbcEntry>> {
        let (from, to) = base_window(filter);
        let sales = self
            .db
            .invoices()
            .list_by_kind_in_range(DocumentKind::Sale, from, to)
            .await?;
        let ids: Vec<String> = sales
            .iter()
            .filter(|invoice| filter.matches_invoice(invoice))
            .map(|invoice| invoice.id.clone())
            .collect();
        let lines = self.db.sale_lines().list_for_invoices(&ids).await?;

        Ok(abc_ranking(&lines, dimension))
    }

    /// The `k` products most often bought together with `product`.
    pub async fn related_products(
        &self,
        product: &str,
        k: usize,
        filter: &MetricsFilter,
    ) -> PipelineResult<Vec<RelatedProduct>> {
        let (from, to) = base_window(filter);
        let invoices: Vec<Invoice> = self
            .db
            .invoices()
            .list_in_range(from, to)
            .await?
            .into_iter()
            .filter(|invoice| filter.matches_invoice(invoice))
            .collect();
        let ids: Vec<String> = invoices.iter().map(|invoice| invoice.id.clone()).collect();
        let lines = self.db.sale_lines().list_for_invoices(&ids).await?;

        Ok(BasketMatrix::build(&invoices, &lines).related_products(product, k))
    }

    /// Coverage totals per institution, explicit and projected receipts
    /// together.
    pub async fn coverage_by_institution(
        &self,
        filter: &MetricsFilter,
    ) -> PipelineResult<Vec<InstitutionCoverage>> {
        let (from, to) = base_window(filter);
        let receipts = self.db.insurance().list_in_range(from, to).await?;

        Ok(coverage_by_institution(&receipts, filter))
    }

    /// Re-derives category and manufacturer for every stored line from
    /// the given product master, writing back only the lines that
    /// changed. Amount columns are never touched. Returns the number of
    /// repaired lines.
    pub async fn repair_catalog(&self, canonicalizer: &Canonicalizer) -> PipelineResult<usize> {
        let repo = self.db.sale_lines();
        let mut lines = repo.list_all().await?;
        let before: Vec<(Option<String>, Option<String>)> = lines
            .iter()
            .map(|line| (line.category.clone(), line.manufacturer.clone()))
            .collect();

        let changed = canonicalizer.repair_lines(&mut lines);
        if changed == 0 {
            debug!(total = lines.len(), "Catalog repair found nothing to fix");
            return Ok(0);
        }

        for (line, (old_category, old_manufacturer)) in lines.iter().zip(&before) {
            if line.category == *old_category && line.manufacturer == *old_manufacturer {
                continue;
            }
            repo.update_catalog_fields(
                &line.id,
                line.category.as_deref(),
                line.manufacturer.as_deref(),
            )
            .await?;
        }
        info!(
            repaired = changed,
            total = lines.len(),
            "Catalog repair complete"
        );

        Ok(changed)
    }
}

// =============================================================================
// Load Windows
// =============================================================================

/// `[start 00:00, end+1 00:00)` as UTC instants, matching the half-open
/// repository range queries.
fn base_window(filter: &MetricsFilter) -> (DateTime<Utc>, DateTime<Utc>) {
    let (from, _) = day_bounds(filter.start);
    let (_, to) = day_bounds(filter.end);
    (from, to)
}

/// The expense window: the base window stretched by the restock lag.
fn purchase_window(filter: &MetricsFilter) -> (DateTime<Utc>, DateTime<Utc>) {
    let horizon = filter
        .end
        .checked_add_signed(Duration::days(RESTOCK_LAG_DAYS))
        .unwrap_or(filter.end);
    let (from, _) = day_bounds(filter.start);
    let (_, to) = day_bounds(horizon);
    (from, to)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use botica_core::lookup::{ProductInfo, ProductMaster, SellerAliasMap, SupplierKindMap};
    use botica_core::payment::ClassifierConfig;
    use botica_core::types::{ExpenseKind, ExpenseStatus, PayrollEntry, ReceiptOrigin};
    use botica_db::{Database, DbConfig};

    use super::*;

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.expect("test db")
    }

    fn sample_invoice(id: &str, day: u32, net: i64, kind: DocumentKind) -> Invoice {
        let issued_at = Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap();
        Invoice {
            id: id.to_string(),
            document_number: id.to_uppercase(),
            kind,
            issued_at,
            period_key: "2024-05".to_string(),
            branch: "Farmacia Centro".to_string(),
            seller: "Marta".to_string(),
            client: "Consumidor Final".to_string(),
            entity: "Individual".to_string(),
            gross_cents: net.abs(),
            net_cents: net,
            cash_cents: net.max(0),
            card_cents: 0,
            wallet_cents: 0,
            insurance_cents: 0,
            account_cents: 0,
            payment_label: "Cash".to_string(),
            line_total_cents: net.max(0),
            has_discrepancy: false,
        }
    }

    fn sample_expense(day: u32, cents: i64, kind: ExpenseKind, status: ExpenseStatus) -> ExpenseRecord {
        let issued_at = Utc.with_ymd_and_hms(2024, 5, day, 9, 0, 0).unwrap();
        ExpenseRecord {
            id: format!("exp:centro:202405{day:02}:prov:{cents}"),
            supplier: "Droguería del Sud".to_string(),
            amount_cents: cents,
            issued_at,
            due_at: None,
            branch: "Farmacia Centro".to_string(),
            status,
            kind,
        }
    }

    fn sample_payroll(day: u32, cents: i64) -> PayrollEntry {
        PayrollEntry {
            id: format!("pay-{day}-{cents}"),
            employee: "Lucía".to_string(),
            amount_cents: cents,
            paid_at: Utc.with_ymd_and_hms(2024, 5, day, 10, 0, 0).unwrap(),
            branch: "Farmacia Centro".to_string(),
        }
    }

    fn sample_line(id: &str, invoice_id: &str, product: &str, total: i64) -> SaleLine {
        SaleLine {
            id: id.to_string(),
            invoice_id: invoice_id.to_string(),
            product_name: product.to_string(),
            barcode: None,
            quantity: 1.0,
            unit_price_cents: total,
            line_total_cents: total,
            category: None,
            manufacturer: None,
            unit_cost_cents: None,
        }
    }

    fn sample_receipt(id: &str, institution: &str, coverage: i64) -> InsuranceReceipt {
        InsuranceReceipt {
            id: id.to_string(),
            institution: institution.to_string(),
            coverage_cents: coverage,
            copay_cents: 500,
            affiliate: None,
            issued_at: Utc.with_ymd_and_hms(2024, 5, 10, 16, 0, 0).unwrap(),
            branch: "Farmacia Norte".to_string(),
            origin: ReceiptOrigin::ExplicitReceipt,
        }
    }

    fn filter(start_day: u32, end_day: u32) -> MetricsFilter {
        MetricsFilter::range(
            NaiveDate::from_ymd_opt(2024, 5, start_day).unwrap(),
            NaiveDate::from_ymd_opt(2024, 5, end_day).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_period_metrics_end_to_end() {
        let db = test_db().await;
        db.invoices()
            .upsert_bulk(&[
                sample_invoice("sale:a-1", 10, 10_000, DocumentKind::Sale),
                sample_invoice("credit:c-1", 10, 2_000, DocumentKind::CreditNote),
            ])
            .await
            .unwrap();
        db.expenses()
            .upsert_bulk(&[sample_expense(
                10,
                3_000,
                ExpenseKind::SupplierExpense,
                ExpenseStatus::Paid,
            )])
            .await
            .unwrap();
        db.payroll()
            .upsert_bulk(&[sample_payroll(10, 1_000)])
            .await
            .unwrap();

        let service = AnalyticsService::new(db);
        let metrics = service.period_metrics(&filter(10, 11)).await.unwrap();

        assert_eq!(metrics.gross_revenue_cents, 10_000);
        assert_eq!(metrics.credit_exposure_cents, 2_000);
        assert_eq!(metrics.real_outflow_cents, 4_000);
        assert_eq!(metrics.pending_outflow_cents, 0);
        assert_eq!(metrics.invoice_count, 1);
        // 2000 / 10000 = 20%, far above the alert threshold.
        assert!(metrics.credit_alert);
    }

    #[tokio::test]
    async fn test_expense_window_reaches_restock_lag_day() {
        let db = test_db().await;
        db.invoices()
            .upsert_bulk(&[sample_invoice("sale:a-1", 10, 5_000, DocumentKind::Sale)])
            .await
            .unwrap();
        // Next-day purchase, outside the filter range itself.
        db.expenses()
            .upsert_bulk(&[sample_expense(
                11,
                4_000,
                ExpenseKind::SupplierExpense,
                ExpenseStatus::Paid,
            )])
            .await
            .unwrap();

        let service = AnalyticsService::new(db);
        let metrics = service.period_metrics(&filter(10, 10)).await.unwrap();

        assert_eq!(metrics.restock_alignment.len(), 1);
        let row = &metrics.restock_alignment[0];
        assert_eq!(row.sales_cents, 5_000);
        assert_eq!(row.purchases_cents, 4_000);
        // The day-11 expense pairs into restock but stays out of outflow.
        assert_eq!(metrics.real_outflow_cents, 0);
    }

    #[tokio::test]
    async fn test_abc_ranking_skips_credit_note_lines() {
        let db = test_db().await;
        db.invoices()
            .upsert_bulk(&[
                sample_invoice("sale:a-1", 10, 8_000, DocumentKind::Sale),
                sample_invoice("credit:c-1", 10, 3_000, DocumentKind::CreditNote),
            ])
            .await
            .unwrap();
        db.sale_lines()
            .upsert_bulk(&[
                sample_line("l1", "sale:a-1", "Ibuprofeno 600mg", 8_000),
                sample_line("l2", "credit:c-1", "Devolución Crema", 3_000),
            ])
            .await
            .unwrap();

        let service = AnalyticsService::new(db);
        let ranking = service
            .abc_ranking(AbcDimension::Product, &filter(10, 10))
            .await
            .unwrap();

        assert_eq!(ranking.len(), 1);
        assert_eq!(ranking[0].name, "Ibuprofeno 600mg");
        assert_eq!(ranking[0].revenue_cents, 8_000);
    }

    #[tokio::test]
    async fn test_related_products_from_stored_baskets() {
        let db = test_db().await;
        db.invoices()
            .upsert_bulk(&[
                sample_invoice("sale:a-1", 10, 5_000, DocumentKind::Sale),
                sample_invoice("sale:a-2", 10, 5_000, DocumentKind::Sale),
            ])
            .await
            .unwrap();
        db.sale_lines()
            .upsert_bulk(&[
                sample_line("l1", "sale:a-1", "Ibuprofeno 600mg", 2_000),
                sample_line("l2", "sale:a-1", "Protector Gástrico", 3_000),
                sample_line("l3", "sale:a-2", "Ibuprofeno 600mg", 2_000),
                sample_line("l4", "sale:a-2", "Protector Gástrico", 3_000),
            ])
            .await
            .unwrap();

        let service = AnalyticsService::new(db);
        let related = service
            .related_products("Ibuprofeno 600mg", 5, &filter(10, 10))
            .await
            .unwrap();

        assert_eq!(related.len(), 1);
        assert_eq!(related[0].product, "Protector Gástrico");
        assert_eq!(related[0].count, 2);
    }

    #[tokio::test]
    async fn test_coverage_rolls_up_stored_receipts() {
        let db = test_db().await;
        db.insurance()
            .upsert_bulk(&[
                sample_receipt("ins:r1", "OSDE", 4_500),
                sample_receipt("ins:r2", "OSDE", 1_500),
                sample_receipt("ins:r3", "PAMI", 2_000),
            ])
            .await
            .unwrap();

        let service = AnalyticsService::new(db);
        let coverage = service
            .coverage_by_institution(&filter(10, 10))
            .await
            .unwrap();

        assert_eq!(coverage.len(), 2);
        assert_eq!(coverage[0].institution, "OSDE");
        assert_eq!(coverage[0].coverage_cents, 6_000);
        assert_eq!(coverage[0].receipt_count, 2);
        assert_eq!(coverage[1].institution, "PAMI");
    }

    #[tokio::test]
    async fn test_repair_catalog_updates_only_catalog_fields() {
        let db = test_db().await;
        db.invoices()
            .upsert_bulk(&[sample_invoice("sale:a-1", 10, 2_000, DocumentKind::Sale)])
            .await
            .unwrap();
        db.sale_lines()
            .upsert_bulk(&[sample_line("l1", "sale:a-1", "Ibuprofeno 600mg", 2_000)])
            .await
            .unwrap();

        let mut master = ProductMaster::default();
        master.insert(
            None,
            ProductInfo {
                name: "Ibuprofeno 600mg".to_string(),
                category: Some("Analgésicos".to_string()),
                manufacturer: Some("Bayer".to_string()),
                unit_cost_cents: None,
            },
        );
        let canonicalizer = Canonicalizer::new(
            ClassifierConfig::default(),
            SellerAliasMap::default(),
            SupplierKindMap::default(),
            master,
        )
        .unwrap();

        let service = AnalyticsService::new(db.clone());
        let repaired = service.repair_catalog(&canonicalizer).await.unwrap();
        assert_eq!(repaired, 1);

        let lines = db.sale_lines().list_all().await.unwrap();
        assert_eq!(lines[0].category.as_deref(), Some("Analgésicos"));
        assert_eq!(lines[0].manufacturer.as_deref(), Some("Bayer"));
        assert_eq!(lines[0].line_total_cents, 2_000);
        assert_eq!(lines[0].quantity, 1.0);

        // Second pass finds nothing left to fix.
        let repaired_again = service.repair_catalog(&canonicalizer).await.unwrap();
        assert_eq!(repaired_again, 0);
    }

    #[tokio::test]
    async fn test_gateway_upserts_replace_by_id() {
        let db = test_db().await;
        let gateway = SqliteGateway::new(db.clone());

        let first = sample_invoice("sale:a-1", 10, 5_000, DocumentKind::Sale);
        let mut second = first.clone();
        second.net_cents = 7_500;

        gateway.save_invoices(&[first]).await.unwrap();
        gateway.save_invoices(&[second]).await.unwrap();

        assert_eq!(db.invoices().count().await.unwrap(), 1);
        let stored = db.invoices().get_by_id("sale:a-1").await.unwrap().unwrap();
        assert_eq!(stored.net_cents, 7_500);
    }

    #[tokio::test]
    async fn test_gateway_replaces_invoice_lines_wholesale() {
        let db = test_db().await;
        let gateway = SqliteGateway::new(db.clone());

        gateway
            .save_sales(&[
                sample_line("l1", "sale:a-1", "Producto Viejo", 1_000),
                sample_line("l2", "sale:a-1", "Otro Viejo", 2_000),
            ])
            .await
            .unwrap();
        gateway
            .save_sales(&[sample_line("l3", "sale:a-1", "Aspirina 500mg", 1_500)])
            .await
            .unwrap();

        let lines = db
            .sale_lines()
            .list_for_invoices(&["sale:a-1".to_string()])
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].product_name, "Aspirina 500mg");
    }
}
