//! Storage layer for the brain engine
//!
//! Two tiers:
//! - `fast`: single JSON record of the live state, rewritten atomically
//! - `sqlite`: append-only archive of past generations and their decisions

pub mod fast;
pub mod sqlite;

use crate::error::Result;
use crate::types::{ArchiveReceipt, ArchiveStatistics, ArchivedDecision, BrainState};
use async_trait::async_trait;

pub use fast::{JsonStateStore, LoadOutcome};
pub use sqlite::SqliteArchive;

/// Archival backend trait defining all required operations
#[async_trait]
pub trait ArchiveBackend: Send + Sync {
    /// Create tables if missing (safe to call repeatedly)
    async fn init_schema(&self) -> Result<()>;

    /// Write one generation row plus one row per decision in a single
    /// transaction. An already-archived generation keeps its snapshot and
    /// only gains the new decisions.
    async fn archive_generation(&self, state: &BrainState) -> Result<ArchiveReceipt>;

    /// Read-only snapshot of an archived generation (empty decision history)
    async fn load_generation(&self, generation: u64) -> Result<Option<BrainState>>;

    /// Decisions archived against a generation, oldest first
    async fn decisions_for_generation(&self, generation: u64) -> Result<Vec<ArchivedDecision>>;

    /// Aggregates over all archived generations
    async fn statistics(&self) -> Result<ArchiveStatistics>;

    /// Total number of archived decisions
    async fn total_decisions(&self) -> Result<u64>;
}
