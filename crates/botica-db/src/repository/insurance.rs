//! # Insurance Receipt Repository
//!
//! Database operations for insurance coverage receipts, explicit and
//! projected. A projected receipt's id embeds its source invoice id, so
//! re-running a sync replaces the projection instead of stacking a new
//! one next to it.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use botica_core::InsuranceReceipt;

use crate::error::DbResult;

const RECEIPT_COLUMNS: &str = r#"
    id, institution, coverage_cents, copay_cents, affiliate, issued_at, branch, origin
"#;

/// Repository for insurance receipt database operations.
#[derive(Debug, Clone)]
pub struct InsuranceRepository {
    pool: SqlitePool,
}

impl InsuranceRepository {
    /// Creates a new InsuranceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InsuranceRepository { pool }
    }

    /// Replaces-or-inserts a batch of receipts in one transaction.
    pub async fn upsert_bulk(&self, receipts: &[InsuranceReceipt]) -> DbResult<u64> {
        if receipts.is_empty() {
            return Ok(0);
        }
        debug!(count = receipts.len(), "Upserting insurance receipts");

        let mut tx = self.pool.begin().await?;
        for receipt in receipts {
            sqlx::query(
                r#"
                INSERT INTO insurance_receipts (
                    id, institution, coverage_cents, copay_cents,
                    affiliate, issued_at, branch, origin
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (id) DO UPDATE SET
                    institution    = excluded.institution,
                    coverage_cents = excluded.coverage_cents,
                    copay_cents    = excluded.copay_cents,
                    affiliate      = excluded.affiliate,
                    issued_at      = excluded.issued_at,
                    branch         = excluded.branch,
                    origin         = excluded.origin
                "#,
            )
            .bind(&receipt.id)
            .bind(&receipt.institution)
            .bind(receipt.coverage_cents)
            .bind(receipt.copay_cents)
            .bind(&receipt.affiliate)
            .bind(receipt.issued_at)
            .bind(&receipt.branch)
            .bind(receipt.origin)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(receipts.len() as u64)
    }

    /// Lists receipts issued inside `[from, to)`, oldest first.
    pub async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<InsuranceReceipt>> {
        let receipts = sqlx::query_as::<_, InsuranceReceipt>(&format!(
            r#"
            SELECT {RECEIPT_COLUMNS}
            FROM insurance_receipts
            WHERE issued_at >= ?1 AND issued_at < ?2
            ORDER BY issued_at, id
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(receipts)
    }

    /// Total stored receipts.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM insurance_receipts")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
