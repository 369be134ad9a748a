//! # botica-pipeline: Fetch & Reconciliation Pipeline
//!
//! Pulls raw POS documents from both branch nodes, canonicalizes them
//! with `botica-core` and persists the result through `botica-db`. One
//! run covers a calendar-day window and is safe to repeat: every
//! canonical row carries a deterministic id, so re-syncing a window
//! replaces rows instead of duplicating them.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        SyncPipeline                              │
//! │                                                                  │
//! │   MultiNodeFetcher ──► Canonicalizer ──► PersistenceGateway      │
//! │        │                (botica-core)        │                   │
//! │        ▼                                     ▼                   │
//! │   HttpPosClient                         SqliteGateway            │
//! │   (per node × category × day)           (botica-db)              │
//! └──────────────────────────────────────────────────────────────────┘
//!
//!        AnalyticsService: filter window ──► rows ──► pure rollups
//! ```
//!
//! ## Module Organization
//!
//! - [`client`] - HTTP document source and response envelope handling
//! - [`config`] - TOML + environment configuration for runs
//! - [`error`] - Pipeline error type shared by fetch and persistence
//! - [`fetcher`] - Day-by-day fan-out over nodes and categories
//! - [`pipeline`] - The sync run itself and the persistence trait
//! - [`service`] - Dashboard queries and the SQLite gateway
//!
//! ## Usage
//!
//! ```rust,ignore
//! use botica_pipeline::{HttpPosClient, MultiNodeFetcher, PipelineConfig, SqliteGateway, SyncPipeline};
//! use botica_db::{Database, DbConfig};
//!
//! let config = PipelineConfig::load_or_default(None)?;
//! let db = Database::new(DbConfig::new(&config.database.path)).await?;
//!
//! let client = HttpPosClient::new(&config.api)?;
//! let fetcher = MultiNodeFetcher::new(client, config.nodes.clone(), config.inter_day_delay());
//! let pipeline = SyncPipeline::new(fetcher, config.canonicalizer()?, SqliteGateway::new(db));
//!
//! let stats = pipeline.run_sync(start, end).await?;
//! tracing::info!(invoices = stats.invoice_count, "Sync finished");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod client;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use client::{DocumentSource, HttpPosClient};
pub use config::{
    ApiConfig, DatabaseSettings, LookupSettings, NodeConfig, PipelineConfig, SyncSettings,
};
pub use error::{PipelineError, PipelineResult};
pub use fetcher::{CancelFlag, FailedFetch, FetchOutcome, MultiNodeFetcher};
pub use pipeline::{MemoryGateway, PersistenceGateway, RunStats, SyncPipeline};
pub use service::{AnalyticsService, SqliteGateway};
