//! # Sale Line Repository
//!
//! Database operations for invoice line items.
//!
//! ## Replace-Per-Invoice Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              upsert_bulk(lines of invoices A and B)                     │
//! │                                                                         │
//! │  BEGIN TRANSACTION                                                     │
//! │     │                                                                   │
//! │     ├── DELETE FROM sale_lines WHERE invoice_id = 'A'                  │
//! │     ├── DELETE FROM sale_lines WHERE invoice_id = 'B'                  │
//! │     ├── INSERT the new lines                                           │
//! │     │                                                                   │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  Line ids are fresh UUIDs on every run, so replacement is keyed by     │
//! │  the OWNING INVOICE, not by line id. An invoice present in the batch   │
//! │  loses all stored lines before its new ones land.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use sqlx::SqlitePool;
use tracing::debug;

use botica_core::SaleLine;

use crate::error::DbResult;

const LINE_COLUMNS: &str = r#"
    id, invoice_id, product_name, barcode, quantity,
    unit_price_cents, line_total_cents, category, manufacturer, unit_cost_cents
"#;

/// SQLite caps bound variables per statement; chunk IN-clauses well below it.
const IN_CHUNK: usize = 500;

/// Repository for sale line database operations.
#[derive(Debug, Clone)]
pub struct SaleLineRepository {
    pool: SqlitePool,
}

impl SaleLineRepository {
    /// Creates a new SaleLineRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleLineRepository { pool }
    }

    /// Replaces the lines of every invoice present in the batch, in one
    /// transaction. Returns the number of lines written.
    pub async fn upsert_bulk(&self, lines: &[SaleLine]) -> DbResult<u64> {
        if lines.is_empty() {
            return Ok(0);
        }
        let owners: BTreeSet<&str> = lines.iter().map(|l| l.invoice_id.as_str()).collect();
        debug!(
            count = lines.len(),
            invoices = owners.len(),
            "Replacing sale lines"
        );

        let mut tx = self.pool.begin().await?;
        for invoice_id in &owners {
            sqlx::query("DELETE FROM sale_lines WHERE invoice_id = ?1")
                .bind(invoice_id)
                .execute(&mut *tx)
                .await?;
        }
        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO sale_lines (
                    id, invoice_id, product_name, barcode, quantity,
                    unit_price_cents, line_total_cents, category, manufacturer, unit_cost_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&line.id)
            .bind(&line.invoice_id)
            .bind(&line.product_name)
            .bind(&line.barcode)
            .bind(line.quantity)
            .bind(line.unit_price_cents)
            .bind(line.line_total_cents)
            .bind(&line.category)
            .bind(&line.manufacturer)
            .bind(line.unit_cost_cents)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(lines.len() as u64)
    }

    /// Lists the lines of the given invoices, chunked to respect SQLite's
    /// bound-variable limit. Order follows insertion within each invoice.
    pub async fn list_for_invoices(&self, invoice_ids: &[String]) -> DbResult<Vec<SaleLine>> {
        let mut out = Vec::new();
        for chunk in invoice_ids.chunks(IN_CHUNK) {
            let placeholders = (1..=chunk.len())
                .map(|i| format!("?{i}"))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {LINE_COLUMNS} FROM sale_lines WHERE invoice_id IN ({placeholders}) ORDER BY rowid"
            );

            let mut query = sqlx::query_as::<_, SaleLine>(&sql);
            for id in chunk {
                query = query.bind(id);
            }
            out.extend(query.fetch_all(&self.pool).await?);
        }
        Ok(out)
    }

    /// Lists every stored line (catalog repair walks the whole table).
    pub async fn list_all(&self) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(&format!(
            "SELECT {LINE_COLUMNS} FROM sale_lines ORDER BY rowid"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    /// Updates the catalog-derived fields of one line. Amounts are never
    /// touched by repair.
    pub async fn update_catalog_fields(
        &self,
        id: &str,
        category: Option<&str>,
        manufacturer: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query("UPDATE sale_lines SET category = ?2, manufacturer = ?3 WHERE id = ?1")
            .bind(id)
            .bind(category)
            .bind(manufacturer)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Total stored lines.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sale_lines")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
