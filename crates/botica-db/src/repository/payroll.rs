//! # Payroll Repository
//!
//! Database operations for salary payments. These rows come from the
//! payroll screens, never from the sync pipeline; the rollup engine reads
//! them as part of real outflow.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use botica_core::PayrollEntry;

use crate::error::DbResult;

/// Repository for payroll database operations.
#[derive(Debug, Clone)]
pub struct PayrollRepository {
    pool: SqlitePool,
}

impl PayrollRepository {
    /// Creates a new PayrollRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PayrollRepository { pool }
    }

    /// Replaces-or-inserts a batch of payroll entries in one transaction.
    pub async fn upsert_bulk(&self, entries: &[PayrollEntry]) -> DbResult<u64> {
        if entries.is_empty() {
            return Ok(0);
        }
        debug!(count = entries.len(), "Upserting payroll entries");

        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO payroll_entries (id, employee, amount_cents, paid_at, branch)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT (id) DO UPDATE SET
                    employee     = excluded.employee,
                    amount_cents = excluded.amount_cents,
                    paid_at      = excluded.paid_at,
                    branch       = excluded.branch
                "#,
            )
            .bind(&entry.id)
            .bind(&entry.employee)
            .bind(entry.amount_cents)
            .bind(entry.paid_at)
            .bind(&entry.branch)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(entries.len() as u64)
    }

    /// Lists entries paid inside `[from, to)`, oldest first.
    pub async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<PayrollEntry>> {
        let entries = sqlx::query_as::<_, PayrollEntry>(
            r#"
            SELECT id, employee, amount_cents, paid_at, branch
            FROM payroll_entries
            WHERE paid_at >= ?1 AND paid_at < ?2
            ORDER BY paid_at, id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
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
    use uuid::Uuid;

    #[tokio::test]
    async fn test_upsert_and_range_query() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.payroll();

        let entry = PayrollEntry {
            id: Uuid::new_v4().to_string(),
            employee: "Laura".to_string(),
            amount_cents: 90_000,
            paid_at: Utc.with_ymd_and_hms(2024, 5, 28, 12, 0, 0).unwrap(),
            branch: "Centro".to_string(),
        };
        repo.upsert_bulk(&[entry]).await.unwrap();

        let from = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let stored = repo.list_in_range(from, to).await.unwrap();

        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].employee, "Laura");
        assert_eq!(stored[0].amount_cents, 90_000);
    }
}
