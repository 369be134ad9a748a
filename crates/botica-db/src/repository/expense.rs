//! # Expense Repository
//!
//! Database operations for provider expenses and operating services.
//! Upserts are keyed by the derived expense id, so identical upstream
//! tuples collapse and a re-pulled day replaces its rows.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use botica_core::ExpenseRecord;

use crate::error::DbResult;

const EXPENSE_COLUMNS: &str = r#"
    id, supplier, amount_cents, issued_at, due_at, branch, status, kind
"#;

/// Repository for expense database operations.
#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    /// Creates a new ExpenseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    /// Replaces-or-inserts a batch of expenses in one transaction.
    pub async fn upsert_bulk(&self, expenses: &[ExpenseRecord]) -> DbResult<u64> {
        if expenses.is_empty() {
            return Ok(0);
        }
        debug!(count = expenses.len(), "Upserting expenses");

        let mut tx = self.pool.begin().await?;
        for expense in expenses {
            sqlx::query(
                r#"
                INSERT INTO expenses (
                    id, supplier, amount_cents, issued_at, due_at, branch, status, kind
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT (id) DO UPDATE SET
                    supplier     = excluded.supplier,
                    amount_cents = excluded.amount_cents,
                    issued_at    = excluded.issued_at,
                    due_at       = excluded.due_at,
                    branch       = excluded.branch,
                    status       = excluded.status,
                    kind         = excluded.kind
                "#,
            )
            .bind(&expense.id)
            .bind(&expense.supplier)
            .bind(expense.amount_cents)
            .bind(expense.issued_at)
            .bind(expense.due_at)
            .bind(&expense.branch)
            .bind(expense.status)
            .bind(expense.kind)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        Ok(expenses.len() as u64)
    }

    /// Lists expenses issued inside `[from, to)`, oldest first.
    pub async fn list_in_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DbResult<Vec<ExpenseRecord>> {
        let expenses = sqlx::query_as::<_, ExpenseRecord>(&format!(
            r#"
            SELECT {EXPENSE_COLUMNS}
            FROM expenses
            WHERE issued_at >= ?1 AND issued_at < ?2
            ORDER BY issued_at, id
            "#
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(expenses)
    }

    /// Total stored expenses.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM expenses")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
