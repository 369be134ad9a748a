//! # Multi-Node Fetcher
//!
//! Walks a date window day by day and fans out one fetch per
//! `(node, category)` pair within each day.
//!
//! ## Fetch Schedule
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     One Day of Fetching (2 nodes)                       │
//! │                                                                         │
//! │   day D ──┬── node 1 / invoices  ──┐                                   │
//! │           ├── node 1 / expenses  ──┤                                   │
//! │           ├── node 1 / insurance ──┤  join_all                         │
//! │           ├── node 2 / invoices  ──┼──────────► merge + tag by node    │
//! │           ├── node 2 / expenses  ──┤            record failures        │
//! │           └── node 2 / insurance ──┘                                   │
//! │                                                                         │
//! │   sleep(inter_day_delay)          upstream throttles bursts            │
//! │                                                                         │
//! │   day D+1 ─ ...                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! In-flight requests are bounded to 3 × node-count by construction: the
//! next day's units are not built until the current day's `join_all`
//! resolves. A failed unit is logged and recorded, never fatal; a
//! multi-week backfill must survive one bad day.

use chrono::NaiveDate;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::client::DocumentSource;
use crate::config::NodeConfig;
use crate::error::PipelineResult;
use botica_core::period::enumerate_days;
use botica_core::{DocCategory, RawDocument};

// =============================================================================
// Cancellation
// =============================================================================

/// Cooperative stop signal, checked between days. The day in flight when
/// the flag flips is allowed to finish, so its documents are complete.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        CancelFlag::default()
    }

    /// Requests the run to stop after the current day.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once a stop was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Outcome Types
// =============================================================================

/// One `(day, node, category)` unit that failed and was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedFetch {
    pub day: NaiveDate,
    pub node: String,
    pub category: DocCategory,
    pub error: String,
}

/// Everything a window fetch produced.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// All fetched documents, tagged with node and branch.
    pub documents: Vec<RawDocument>,
    /// Units that failed and were skipped.
    pub failed: Vec<FailedFetch>,
    /// Days actually fetched (shorter than the window when cancelled).
    pub days_processed: usize,
    /// Fetch units attempted: 3 × node-count per processed day.
    pub units_attempted: usize,
}

// =============================================================================
// Fetcher
// =============================================================================

/// Fetches a date window from a [`DocumentSource`] across all configured
/// store nodes.
pub struct MultiNodeFetcher<S> {
    source: S,
    nodes: Vec<NodeConfig>,
    inter_day_delay: Duration,
    cancel: CancelFlag,
}

impl<S: DocumentSource> MultiNodeFetcher<S> {
    pub fn new(source: S, nodes: Vec<NodeConfig>, inter_day_delay: Duration) -> Self {
        MultiNodeFetcher {
            source,
            nodes,
            inter_day_delay,
            cancel: CancelFlag::new(),
        }
    }

    /// Handle used to stop the run between days.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Fetches every day in `[start, end]` inclusive.
    ///
    /// Only a reversed window is an error. Failed units are recorded in
    /// the outcome and the enumeration continues.
    pub async fn fetch_window(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PipelineResult<FetchOutcome> {
        let days = enumerate_days(start, end)?;
        let total_days = days.len();
        let mut outcome = FetchOutcome::default();

        for (index, day) in days.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(day = %day, "Fetch cancelled, stopping before this day");
                break;
            }

            self.fetch_day(*day, &mut outcome).await;
            outcome.days_processed += 1;

            // The pause sits between days, not after the last one.
            if index + 1 < total_days && !self.inter_day_delay.is_zero() {
                tokio::time::sleep(self.inter_day_delay).await;
            }
        }

        info!(
            days = outcome.days_processed,
            documents = outcome.documents.len(),
            failed_units = outcome.failed.len(),
            "Fetch window complete"
        );
        Ok(outcome)
    }

    /// Fans out the day's `(node, category)` units, waits for all of them,
    /// then merges results. Merging after the join keeps accumulation
    /// single-threaded; no accumulator lock is needed.
    async fn fetch_day(&self, day: NaiveDate, outcome: &mut FetchOutcome) {
        let mut units = Vec::with_capacity(self.nodes.len() * DocCategory::ALL.len());
        for node in &self.nodes {
            for category in DocCategory::ALL {
                units.push(async move {
                    let result = self.source.fetch_documents(category, day, &node.code).await;
                    (node, category, result)
                });
            }
        }
        outcome.units_attempted += units.len();

        for (node, category, result) in join_all(units).await {
            match result {
                Ok(items) => {
                    for payload in items {
                        outcome.documents.push(RawDocument {
                            category,
                            node: node.code.clone(),
                            branch: node.branch.clone(),
                            payload,
                        });
                    }
                }
                Err(err) => {
                    warn!(
                        day = %day,
                        node = %node.code,
                        category = %category,
                        error = %err,
                        "Fetch unit failed, skipping"
                    );
                    outcome.failed.push(FailedFetch {
                        day,
                        node: node.code.clone(),
                        category,
                        error: err.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    /// Returns one invoice-shaped document per (invoices, node, day) unit;
    /// empty lists for the other categories. Optionally fails one
    /// (node, category) pair on every day.
    struct StubSource {
        fail: Option<(String, DocCategory)>,
    }

    #[async_trait]
    impl DocumentSource for StubSource {
        async fn fetch_documents(
            &self,
            category: DocCategory,
            day: NaiveDate,
            node: &str,
        ) -> PipelineResult<Vec<Value>> {
            if let Some((fail_node, fail_category)) = &self.fail {
                if fail_node == node && *fail_category == category {
                    return Err(PipelineError::Fetch {
                        day,
                        node: node.to_string(),
                        category,
                        message: "connection refused".to_string(),
                    });
                }
            }
            match category {
                DocCategory::Invoices => Ok(vec![json!({
                    "number": format!("0001-{}-{}", node, day),
                    "docType": "FACTURA B",
                    "date": day.format("%Y-%m-%d").to_string(),
                    "total": 100.0
                })]),
                _ => Ok(vec![]),
            }
        }
    }

    fn two_nodes() -> Vec<NodeConfig> {
        vec![
            NodeConfig {
                code: "1".to_string(),
                branch: "Farmacia Centro".to_string(),
            },
            NodeConfig {
                code: "2".to_string(),
                branch: "Farmacia Norte".to_string(),
            },
        ]
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_window_tags_documents_with_node_and_branch() {
        let fetcher = MultiNodeFetcher::new(StubSource { fail: None }, two_nodes(), Duration::ZERO);

        let outcome = fetcher.fetch_window(day(10), day(11)).await.unwrap();

        // 1 invoice doc per node per day
        assert_eq!(outcome.documents.len(), 4);
        assert_eq!(outcome.days_processed, 2);
        assert_eq!(outcome.units_attempted, 12); // 2 nodes × 3 categories × 2 days
        assert!(outcome.failed.is_empty());

        let norte: Vec<_> = outcome
            .documents
            .iter()
            .filter(|d| d.node == "2")
            .collect();
        assert_eq!(norte.len(), 2);
        assert!(norte.iter().all(|d| d.branch == "Farmacia Norte"));
    }

    #[tokio::test]
    async fn test_one_failing_unit_does_not_abort_the_run() {
        let fetcher = MultiNodeFetcher::new(
            StubSource {
                fail: Some(("2".to_string(), DocCategory::Invoices)),
            },
            two_nodes(),
            Duration::ZERO,
        );

        let outcome = fetcher.fetch_window(day(10), day(11)).await.unwrap();

        // Node 1 invoices still arrive for both days
        assert_eq!(outcome.documents.len(), 2);
        assert!(outcome.documents.iter().all(|d| d.node == "1"));

        // The failing unit is recorded once per day
        assert_eq!(outcome.failed.len(), 2);
        assert_eq!(outcome.failed[0].node, "2");
        assert_eq!(outcome.failed[0].category, DocCategory::Invoices);
        assert!(outcome.failed[0].error.contains("connection refused"));
        assert_eq!(outcome.days_processed, 2);
    }

    #[tokio::test]
    async fn test_reversed_window_is_an_error() {
        let fetcher = MultiNodeFetcher::new(StubSource { fail: None }, two_nodes(), Duration::ZERO);
        assert!(fetcher.fetch_window(day(11), day(10)).await.is_err());
    }

    #[tokio::test]
    async fn test_cancelled_run_stops_before_the_next_day() {
        let fetcher = MultiNodeFetcher::new(StubSource { fail: None }, two_nodes(), Duration::ZERO);
        fetcher.cancel_flag().cancel();

        let outcome = fetcher.fetch_window(day(10), day(12)).await.unwrap();
        assert_eq!(outcome.days_processed, 0);
        assert!(outcome.documents.is_empty());
        assert_eq!(outcome.units_attempted, 0);
    }
}
