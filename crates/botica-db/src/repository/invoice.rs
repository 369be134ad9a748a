//! # Invoice Repository
//!
//! Database operations for canonical invoices.
//!
//! ## Upsert Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 upsert_bulk([inv_a, inv_b, ...])                        │
//! │                                                                         │
//! │  BEGIN TRANSACTION                                                     │
//! │     │                                                                   │
//! │     ├── INSERT inv_a  ── id exists? ──► UPDATE every column            │
//! │     ├── INSERT inv_b  ── id new?    ──► plain insert                   │
//! │     └── ...                                                             │
//! │     │                                                                   │
//! │  COMMIT  (any failure rolls back the whole category)                   │
//! │                                                                         │
//! │  The id is derived from the document number, so a re-pulled day        │
//! │  replaces its rows instead of duplicating them.                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use botica_core::{DocumentKind, Invoice};

use crate::error::DbResult;

const INVOICE_COLUMNS: &str = r#"
    id, document_number, kind, issued_at, period_key, branch,
    seller, client, entity, gross_cents, net_cents,
    cash_cents, card_cents, wallet_cents, insurance_cents, account_cents,
    payment_label, line_total_cents, has_discrepancy
"#;

/// Repository for invoice database operations.
#[derive(Debug, Clone)]
pub struct InvoiceRepository {
    pool: SqlitePool,
}

impl InvoiceRepository {
    /// Creates a new InvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InvoiceRepository { pool }
    }

    /// Replaces-or-inserts a batch of invoices in one transaction.
    ///
    /// Returns the number of rows written. An empty batch is a no-op
    /// that still succeeds.
    pub async fn upsert_bulk(&self, invoices: &[Invoice]) -> DbResult<u64> {
        if invoices.is_empty() {
            return Ok(0);
        }
        debug!(count = invoices.len(), "Upserting invoices");

        let mut tx = self.pool.begin().await?;
        for invoice in invoices {
            sqlx::query(
                r#"
                INSERT INTO invoices (
                    id, document_number, kind, issued_at, period_key, branch,
                    seller, client, entity, gross_cents, net_cents,
                    cash_cents, card_cents, wallet_cents, insurance_cents, account_cents,
                    payment_label, line_total_cents, has_discrepancy
                ) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6,
                    ?7, ?8, ?9, ?10, ?11,
                    ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19
                )
                ON CONFLICT (id) DO UPDATE SET
                    document_number  = excluded.document_number,
                    kind             = excluded.kind,
                    issued_at        = excluded.issued_at,
                    period_key       = excluded.period_key,
                    branch           = excluded.branch,
                    seller           = excluded.seller,
                    client           = excluded.client,
                    entity           = excluded.entity,
                    gross_cents      = excluded.gross_cents,
                    net_cents        = excluded.net_cents,
                    cash_cents       = excluded.cash_cents,
                    card_cents       = excluded.card_cents,
                    wallet_cents     = excluded.wallet_cents,
                    insurance_cents  = excluded.insurance_cents,
                    account_cents    = excluded.account_cents,
                    payment_label    = excluded.payment_label,
                    line_total_cents = excluded.line_total_cents,
                    has_discrepancy  = excluded.has_discrepancy
                "#,
            )
            .bind(&invoice.id)
            .bind(&invoice.document_number)
            .bind(invoice.kind)
            .bind(invoice.issued_at)
            .bind(&invoice.period_key)
            .bind(&invoice.branch)
            .bind(&invoice.seller)
            .bind(&invoice.client)
            .bind(&invoice.entity)
            .bind(invoice.gross_cents)
            .bind(invoice.net_cents)
            .bind(invoice.cash_cents)
            .bind(invoice.card_cents)
            .bind(invoice.wallet_cents)
            .bind(invoice.insurance_cents)
            .bind(invoice.account_cents)
            .bind(&invoice.payment_label)
            .bind(invoice.line_total_cents)
            .bind(invoice.has_discrepancy)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(invoices.len() as u64)
    }

    /// Gets an invoice by canonical id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(invoice)
    }

    /// Lists invoices issued inside `[from, to)`, oldest first.
    pub async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE issued_at >= ?1 AND issued_at < ?2
            ORDER BY issued_at, id
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Lists invoices of one kind inside `[from, to)`.
    pub async fn list_by_kind_in_range(
        &self,
        kind: DocumentKind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<Invoice>> {
        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE kind = ?1 AND issued_at >= ?2 AND issued_at < ?3
            ORDER BY issued_at, id
            "#
        ))
        .bind(kind)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Total stored invoices.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use chrono::TimeZone;

    fn sample(id: &str, day: u32, gross: i64) -> Invoice {
        let issued_at = Utc.with_ymd_and_hms(2024, 5, day, 12, 0, 0).unwrap();
        Invoice {
            id: id.to_string(),
            document_number: id.split(':').last().unwrap_or(id).to_uppercase(),
            kind: DocumentKind::Sale,
            issued_at,
            period_key: "2024-05".to_string(),
            branch: "Centro".to_string(),
            seller: "Marta".to_string(),
            client: "Consumidor Final".to_string(),
            entity: "Individual".to_string(),
            gross_cents: gross,
            net_cents: gross,
            cash_cents: gross,
            card_cents: 0,
            wallet_cents: 0,
            insurance_cents: 0,
            account_cents: 0,
            payment_label: "Cash".to_string(),
            line_total_cents: gross,
            has_discrepancy: false,
        }
    }

    async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_upsert_then_get() {
        let db = test_db().await;
        let repo = db.invoices();

        repo.upsert_bulk(&[sample("sale:A-1", 10, 5_000)]).await.unwrap();

        let stored = repo.get_by_id("sale:A-1").await.unwrap().unwrap();
        assert_eq!(stored.gross_cents, 5_000);
        assert_eq!(stored.kind, DocumentKind::Sale);
        assert_eq!(stored.payment_label, "Cash");
    }

    #[tokio::test]
    async fn test_reupsert_replaces_instead_of_duplicating() {
        let db = test_db().await;
        let repo = db.invoices();

        repo.upsert_bulk(&[sample("sale:A-1", 10, 5_000)]).await.unwrap();
        repo.upsert_bulk(&[sample("sale:A-1", 10, 7_500)]).await.unwrap();

        assert_eq!(repo.count().await.unwrap(), 1);
        let stored = repo.get_by_id("sale:A-1").await.unwrap().unwrap();
        assert_eq!(stored.gross_cents, 7_500);
    }

    #[tokio::test]
    async fn test_range_query_is_half_open() {
        let db = test_db().await;
        let repo = db.invoices();

        repo.upsert_bulk(&[
            sample("sale:A-1", 9, 1_000),
            sample("sale:A-2", 10, 2_000),
            sample("sale:A-3", 11, 4_000),
        ])
        .await
        .unwrap();

        let from = Utc.with_ymd_and_hms(2024, 5, 10, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 5, 11, 0, 0, 0).unwrap();
        let rows = repo.list_in_range(from, to).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "sale:A-2");
    }

    #[tokio::test]
    async fn test_list_by_kind() {
        let db = test_db().await;
        let repo = db.invoices();

        let mut credit = sample("credit:C-1", 10, -2_000);
        credit.kind = DocumentKind::CreditNote;
        repo.upsert_bulk(&[sample("sale:A-1", 10, 1_000), credit])
            .await
            .unwrap();

        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let credits = repo
            .list_by_kind_in_range(DocumentKind::CreditNote, from, to)
            .await
            .unwrap();

        assert_eq!(credits.len(), 1);
        assert_eq!(credits[0].id, "credit:C-1");
    }

    #[tokio::test]
    async fn test_empty_batch_is_a_noop() {
        let db = test_db().await;
        assert_eq!(db.invoices().upsert_bulk(&[]).await.unwrap(), 0);
    }
}
