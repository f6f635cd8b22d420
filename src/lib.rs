//! Neurogen - Self-Evolving Brain State Engine
//!
//! Owns the evolving configuration of a decision agent ("the brain") and its
//! durable representation:
//! - A kill gate that keeps, puts on probation, or kills and reborns the
//!   brain based on each generation's performance
//! - Bounded learning of patterns and renormalized scoring weights
//! - A fast single-record JSON store for the live generation
//! - An append-only SQLite archive of past generations and their decisions
//! - A background auto-save task running alongside foreground evolution
//!
//! # Architecture
//!
//! - **Types**: `BrainState`, decisions, learning input, statistics
//! - **Evolution**: pure kill-gate, learning and mutation rules
//! - **Storage**: fast store and archival backend
//! - **Manager**: the live state, locking and persistence policy
//!
//! # Example
//!
//! ```ignore
//! use neurogen_core::{BrainConfig, BrainManager, LearningData};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> neurogen_core::Result<()> {
//!     let manager = Arc::new(BrainManager::open(BrainConfig::default()).await?);
//!     manager.start_auto_save().await;
//!
//!     manager.record_decision("ABCD", "BUY", 0.82).await;
//!     let report = manager.evolve(0.64, &LearningData::default()).await;
//!     println!("generation {} is {}", report.generation, report.status);
//!
//!     manager.shutdown().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod evolution;
pub mod manager;
pub mod scheduler;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use config::{BrainConfig, ConfigError};
pub use error::{BrainError, Result};
pub use evolution::{KillGate, Transition, Verdict};
pub use manager::{BrainManager, EvolveReport, HotSwitchReport};
pub use scheduler::{FlushJob, FlushScheduler, SchedulerError};
pub use storage::{ArchiveBackend, JsonStateStore, LoadOutcome, SqliteArchive};
pub use types::{
    ArchiveReceipt, ArchiveStatistics, ArchivedDecision, BrainState, BrainStatistics,
    DecisionRecord, KillGateStatus, LearnedPatterns, LearningData, StatusSnapshot,
};
