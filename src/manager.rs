//! Brain manager: the live state, its evolution, and its persistence.
//!
//! # Locking
//!
//! The live `BrainState` sits behind one async mutex. Evolution holds it for
//! a whole state transition; persistence holds it only long enough to clone
//! a snapshot, then writes with the lock released.
//!
//! Two further gates order the writers:
//! - `save_gate`: fast-store writes happen in snapshot order, so an older
//!   snapshot never replaces a newer one. The guard moves into the blocking
//!   write, so the gate stays held until the file is renamed even when the
//!   awaiting future is dropped.
//! - `archive_gate`: one archive at a time, so the decisions being archived
//!   are the same ones later removed from the live state
//!
//! Decisions leave the live state only after the archive transaction commits.

use crate::config::BrainConfig;
use crate::error::{BrainError, Result};
use crate::evolution::{apply_learning, rebirth, KillGate, Transition};
use crate::scheduler::{FlushJob, FlushScheduler};
use crate::storage::{ArchiveBackend, JsonStateStore, LoadOutcome, SqliteArchive};
use crate::types::{
    ArchiveReceipt, ArchivedDecision, BrainState, BrainStatistics, DecisionRecord,
    KillGateStatus, LearningData, StatusSnapshot,
};
use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Outcome of one `evolve` call
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvolveReport {
    pub generation: u64,
    pub status: KillGateStatus,
    pub transition: Transition,
    /// False when the adjusted scoring weights could not be renormalized
    pub weights_normalized: bool,
    /// A generation row was written to the archive during this call
    pub archived: bool,
    /// The fast store reflects this call
    pub persisted: bool,
}

/// Outcome of a hot switch
#[derive(Debug, Clone, PartialEq)]
pub struct HotSwitchReport {
    pub receipt: ArchiveReceipt,
    pub backup_path: Option<PathBuf>,
}

struct LiveBrain {
    state: BrainState,
    rng: Box<dyn RngCore + Send>,
}

/// Owner of the live brain
pub struct BrainManager {
    config: BrainConfig,
    gate: KillGate,
    live: Mutex<LiveBrain>,
    fast_store: JsonStateStore,
    archive: Arc<dyn ArchiveBackend>,
    save_gate: Arc<Mutex<()>>,
    archive_gate: Mutex<()>,
    scheduler: FlushScheduler,
    load_outcome: LoadOutcome,
}

impl BrainManager {
    /// Open both stores from `config`, loading or creating the live state
    pub async fn open(config: BrainConfig) -> Result<Self> {
        let archive = Arc::new(SqliteArchive::new(&config.archive_path, config.pool_size)?);
        Self::with_backends(config, archive, Box::new(StdRng::from_entropy())).await
    }

    /// Open with an explicit archive backend and mutation random source
    pub async fn with_backends(
        config: BrainConfig,
        archive: Arc<dyn ArchiveBackend>,
        rng: Box<dyn RngCore + Send>,
    ) -> Result<Self> {
        config.validate()?;

        let fast_store = JsonStateStore::new(&config.fast_store_path);
        let (state, load_outcome) = fast_store.load_or_default();
        if !matches!(load_outcome, LoadOutcome::Restored { .. }) {
            if let Err(e) = fast_store.save(&state) {
                warn!("Failed to write initial brain record: {}", e);
            }
        }

        if let Err(e) = archive.init_schema().await {
            warn!("Archive unavailable, will retry on first archive: {}", e);
        }

        let manager = Self {
            gate: KillGate::new(config.performance_threshold, config.zombie_grace_period),
            scheduler: FlushScheduler::new(config.auto_save_interval, config.stop_timeout),
            live: Mutex::new(LiveBrain { state, rng }),
            fast_store,
            archive,
            save_gate: Arc::new(Mutex::new(())),
            archive_gate: Mutex::new(()),
            load_outcome,
            config,
        };

        info!(
            "Brain ready at generation {} ({:?})",
            manager.generation().await,
            manager.load_outcome
        );
        Ok(manager)
    }

    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    /// How the live state was obtained when the manager opened
    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    pub async fn generation(&self) -> u64 {
        self.live.lock().await.state.generation
    }

    /// Clone of the full live state
    pub async fn snapshot(&self) -> BrainState {
        self.live.lock().await.state.clone()
    }

    pub async fn current_status(&self) -> StatusSnapshot {
        self.live.lock().await.state.status()
    }

    /// Number of decisions not yet archived
    pub async fn pending_decisions(&self) -> usize {
        self.live.lock().await.state.decision_history.len()
    }

    /// Append a decision with a pending outcome
    pub async fn record_decision(&self, symbol: &str, action: &str, confidence: f64) {
        let confidence = if confidence.is_finite() {
            confidence
        } else {
            warn!("Decision {} {} has confidence {}, recording 0.0", action, symbol, confidence);
            0.0
        };
        let decision = DecisionRecord::pending(symbol, action, confidence);
        let mut live = self.live.lock().await;
        debug!(
            "Recording decision {} {} ({:.2}) in generation {}",
            decision.action, decision.symbol, decision.confidence, live.state.generation
        );
        live.state.decision_history.push(decision);
    }

    /// Advance one generation.
    ///
    /// Never fails: persistence problems are logged and reported through
    /// the `archived`/`persisted` flags. A non-finite score fails the gate
    /// and is recorded as 0.0.
    pub async fn evolve(&self, performance_score: f64, learning_data: &LearningData) -> EvolveReport {
        let (performance_score, gate_score) = if performance_score.is_finite() {
            (performance_score, performance_score)
        } else {
            warn!("Performance score {} is not finite, recording 0.0", performance_score);
            (0.0, f64::NAN)
        };

        let archive_guard = self.archive_gate.lock().await;

        let (generation, verdict, dying, weights_normalized) = {
            let mut live = self.live.lock().await;
            let LiveBrain { state, rng } = &mut *live;

            let generation = state.generation + 1;
            let verdict = self
                .gate
                .assess(state.kill_gate_status, state.zombie_counter, gate_score);

            let mut dying = None;
            if verdict.is_rebirth() {
                let mut dead = state.clone();
                dead.generation = generation;
                dead.timestamp = Utc::now();
                dead.performance_score = performance_score;
                dead.kill_gate_status = KillGateStatus::Killed;
                dead.zombie_counter = dead.zombie_counter.saturating_add(1);

                let mut reborn = rebirth(&dead, generation, rng.as_mut());
                // carried until the dying generation's archive commits
                reborn.decision_history = dead.decision_history.clone();
                info!(
                    "Brain killed after {} zombie generations, reborn as generation {}",
                    dead.zombie_counter, generation
                );
                *state = reborn;
                dying = Some(dead);
            }

            state.generation = generation;
            state.timestamp = Utc::now();
            state.performance_score = performance_score;
            state.kill_gate_status = verdict.status;
            state.zombie_counter = verdict.zombie_counter;

            let weights_normalized = apply_learning(state, learning_data);

            match verdict.transition {
                Transition::Degraded => warn!(
                    "Brain marked as zombie (performance: {:.3})",
                    performance_score
                ),
                Transition::Lingering { zombie_generations } => warn!(
                    "Brain still zombie ({}/{})",
                    zombie_generations,
                    self.gate.grace_period()
                ),
                Transition::Resurrected => info!(
                    "Brain resurrected (performance: {:.3})",
                    performance_score
                ),
                Transition::Survived | Transition::Reborn => {}
            }

            (generation, verdict, dying, weights_normalized)
        };

        let mut archived = false;
        if let Some(dead) = dying {
            archived = self.archive_locked(&archive_guard, Some(dead)).await.is_ok();
        }

        let mut persisted = match self.save().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to save brain generation {}: {}", generation, e);
                false
            }
        };

        if !verdict.is_rebirth() && self.rotate_if_due(&archive_guard, generation).await {
            archived = true;
            persisted = self.save().await.is_ok();
        }

        EvolveReport {
            generation,
            status: verdict.status,
            transition: verdict.transition,
            weights_normalized,
            archived,
            persisted,
        }
    }

    /// Archive the live state when `generation` lands on the rotation interval
    async fn rotate_if_due(&self, guard: &MutexGuard<'_, ()>, generation: u64) -> bool {
        if generation % self.config.max_json_generations != 0 {
            return false;
        }
        info!("Rotating brain to archive (generation {})", generation);
        self.archive_locked(guard, None).await.is_ok()
    }

    /// Write the live state to the fast store
    pub async fn save(&self) -> Result<()> {
        let writer = Arc::clone(&self.save_gate).lock_owned().await;
        self.write_snapshot(writer).await
    }

    /// Snapshot and write while `writer` holds the save gate
    async fn write_snapshot(&self, writer: OwnedMutexGuard<()>) -> Result<()> {
        let snapshot = self.snapshot().await;
        let store = self.fast_store.clone();
        tokio::task::spawn_blocking(move || {
            let _writer = writer;
            store.save(&snapshot)
        })
        .await
        .map_err(|e| BrainError::Other(format!("Fast store write task failed: {}", e)))?
    }

    /// Archive the live generation now and persist the trimmed state
    pub async fn archive(&self) -> Result<ArchiveReceipt> {
        let guard = self.archive_gate.lock().await;
        let receipt = self.archive_locked(&guard, None).await?;
        drop(guard);

        if let Err(e) = self.save().await {
            warn!("Archived generation {} but failed to save: {}", receipt.generation, e);
        }
        Ok(receipt)
    }

    /// Archive `dying`, or the current live state when `None`, then drop the
    /// archived decisions from the live history.
    async fn archive_locked(
        &self,
        _guard: &MutexGuard<'_, ()>,
        dying: Option<BrainState>,
    ) -> Result<ArchiveReceipt> {
        let snapshot = match dying {
            Some(state) => state,
            None => self.snapshot().await,
        };

        match self.archive.archive_generation(&snapshot).await {
            Ok(receipt) => {
                let mut live = self.live.lock().await;
                let history = &mut live.state.decision_history;
                let archived = receipt.decisions_archived.min(history.len());
                history.drain(..archived);
                info!(
                    "Archived generation {} ({} decisions)",
                    receipt.generation, receipt.decisions_archived
                );
                Ok(receipt)
            }
            Err(e) => {
                warn!(
                    "Failed to archive generation {}, {} decisions stay live: {}",
                    snapshot.generation,
                    snapshot.decision_history.len(),
                    e
                );
                Err(e)
            }
        }
    }

    /// Force an archive of the live generation, back up the fast store as it
    /// stood before the switch, then write the trimmed state.
    pub async fn hot_switch(&self) -> Result<HotSwitchReport> {
        info!("Hot-switching brain to archive");

        let guard = self.archive_gate.lock().await;
        let receipt = self.archive_locked(&guard, None).await?;
        // no write may land between the archive and the backup
        let writer = Arc::clone(&self.save_gate).lock_owned().await;
        drop(guard);

        let store = self.fast_store.clone();
        let (writer, backup) = tokio::task::spawn_blocking(move || (writer, store.backup()))
            .await
            .map_err(|e| BrainError::Other(format!("Backup task failed: {}", e)))?;

        // the archived decisions must leave the record even if the backup failed
        if let Err(e) = self.write_snapshot(writer).await {
            warn!("Hot switch archived generation {} but save failed: {}", receipt.generation, e);
        }

        Ok(HotSwitchReport {
            receipt,
            backup_path: backup?,
        })
    }

    /// Read-only snapshot of an archived generation
    pub async fn load_generation(&self, generation: u64) -> Result<Option<BrainState>> {
        self.archive.load_generation(generation).await
    }

    pub async fn decisions_for_generation(&self, generation: u64) -> Result<Vec<ArchivedDecision>> {
        self.archive.decisions_for_generation(generation).await
    }

    /// Total decisions in the archive
    pub async fn archived_decisions(&self) -> Result<u64> {
        self.archive.total_decisions().await
    }

    /// Archive aggregates merged with the live state
    pub async fn statistics(&self) -> Result<BrainStatistics> {
        let archive = self.archive.statistics().await?;
        let live = self.live.lock().await;
        Ok(BrainStatistics::merge(&live.state, archive))
    }

    /// Start periodic fast-store flushes (no-op if already running)
    pub async fn start_auto_save(self: &Arc<Self>) -> bool {
        let job: Arc<dyn FlushJob> = self.clone();
        self.scheduler.start(job).await
    }

    /// Stop periodic flushes, waiting at most the configured stop timeout
    pub async fn stop_auto_save(&self) -> Result<()> {
        self.scheduler.stop().await?;
        Ok(())
    }

    pub fn auto_save_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Stop periodic flushes and write the final state
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down brain manager");
        if let Err(e) = self.stop_auto_save().await {
            warn!("Auto-save did not stop cleanly: {}", e);
        }
        self.save().await
    }
}

#[async_trait]
impl FlushJob for BrainManager {
    fn name(&self) -> &str {
        "brain_auto_save"
    }

    async fn flush(&self) -> Result<()> {
        self.save().await?;
        debug!("Auto-saved brain (generation {})", self.generation().await);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ArchiveStatistics, BrainState};
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;

    /// Archive that fails until told otherwise, delegating to SQLite after
    struct FlakyArchive {
        inner: SqliteArchive,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ArchiveBackend for FlakyArchive {
        async fn init_schema(&self) -> Result<()> {
            self.inner.init_schema().await
        }

        async fn archive_generation(&self, state: &BrainState) -> Result<ArchiveReceipt> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(BrainError::Database("database is locked".to_string()));
            }
            self.inner.archive_generation(state).await
        }

        async fn load_generation(&self, generation: u64) -> Result<Option<BrainState>> {
            self.inner.load_generation(generation).await
        }

        async fn decisions_for_generation(&self, generation: u64) -> Result<Vec<ArchivedDecision>> {
            self.inner.decisions_for_generation(generation).await
        }

        async fn statistics(&self) -> Result<ArchiveStatistics> {
            self.inner.statistics().await
        }

        async fn total_decisions(&self) -> Result<u64> {
            self.inner.total_decisions().await
        }
    }

    fn test_config(dir: &TempDir) -> BrainConfig {
        BrainConfig::in_dir(dir.path())
    }

    async fn open_seeded(dir: &TempDir, config: BrainConfig) -> BrainManager {
        let archive = Arc::new(SqliteArchive::new(dir.path().join("brain_history.db"), 2).unwrap());
        BrainManager::with_backends(config, archive, Box::new(StdRng::seed_from_u64(11)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_generation_zero() {
        let dir = TempDir::new().unwrap();
        let manager = BrainManager::open(test_config(&dir)).await.unwrap();

        assert_eq!(manager.generation().await, 0);
        assert_eq!(manager.load_outcome(), &LoadOutcome::Fresh);
        assert!(manager.config().fast_store_path.exists());
    }

    #[tokio::test]
    async fn test_evolve_increments_generation() {
        let dir = TempDir::new().unwrap();
        let manager = open_seeded(&dir, test_config(&dir)).await;

        for expected in 1..=3 {
            let report = manager.evolve(0.8, &LearningData::default()).await;
            assert_eq!(report.generation, expected);
            assert_eq!(report.transition, Transition::Survived);
            assert!(report.persisted);
        }
    }

    #[tokio::test]
    async fn test_rebirth_archives_dying_state() {
        let dir = TempDir::new().unwrap();
        let manager = open_seeded(&dir, test_config(&dir)).await;

        manager.record_decision("ABCD", "BUY", 0.9).await;
        manager.record_decision("EFGH", "PASS", 0.4).await;

        let mut last = None;
        for _ in 0..5 {
            last = Some(manager.evolve(0.1, &LearningData::default()).await);
        }
        let report = last.unwrap();

        assert_eq!(report.generation, 5);
        assert_eq!(report.transition, Transition::Reborn);
        assert_eq!(report.status, KillGateStatus::Alive);
        assert!(report.archived);

        let dead = manager.load_generation(5).await.unwrap().unwrap();
        assert_eq!(dead.kill_gate_status, KillGateStatus::Killed);
        assert_eq!(manager.decisions_for_generation(5).await.unwrap().len(), 2);
        assert_eq!(manager.pending_decisions().await, 0);

        let live = manager.snapshot().await;
        assert_eq!(live.generation, 5);
        assert_eq!(live.zombie_counter, 0);
    }

    #[tokio::test]
    async fn test_rebirth_mutation_uses_injected_rng() {
        let dir = TempDir::new().unwrap();
        let manager = open_seeded(&dir, test_config(&dir)).await;
        let seed = manager.snapshot().await.discovery_weights;

        for _ in 0..5 {
            manager.evolve(0.0, &LearningData::default()).await;
        }

        let expected =
            crate::evolution::mutate_discovery_weights(&seed, &mut StdRng::seed_from_u64(11));
        assert_eq!(manager.snapshot().await.discovery_weights, expected);
    }

    #[tokio::test]
    async fn test_failed_archive_keeps_decisions_live() {
        let dir = TempDir::new().unwrap();
        let archive = Arc::new(FlakyArchive {
            inner: SqliteArchive::new(dir.path().join("brain_history.db"), 2).unwrap(),
            failing: AtomicBool::new(true),
        });
        let manager = BrainManager::with_backends(
            test_config(&dir),
            archive.clone(),
            Box::new(StdRng::seed_from_u64(1)),
        )
        .await
        .unwrap();

        for i in 0..3 {
            manager.record_decision(&format!("S{}", i), "BUY", 0.7).await;
        }
        assert!(manager.archive().await.is_err());
        assert_eq!(manager.pending_decisions().await, 3);

        archive.failing.store(false, Ordering::SeqCst);
        let receipt = manager.archive().await.unwrap();
        assert_eq!(receipt.decisions_archived, 3);
        assert_eq!(manager.pending_decisions().await, 0);
        assert_eq!(manager.archived_decisions().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_evolve_survives_archive_failure() {
        let dir = TempDir::new().unwrap();
        let archive = Arc::new(FlakyArchive {
            inner: SqliteArchive::new(dir.path().join("brain_history.db"), 2).unwrap(),
            failing: AtomicBool::new(true),
        });
        let mut config = test_config(&dir);
        config.zombie_grace_period = 2;
        let manager =
            BrainManager::with_backends(config, archive, Box::new(StdRng::seed_from_u64(2)))
                .await
                .unwrap();

        manager.record_decision("ABCD", "BUY", 0.9).await;
        manager.evolve(0.0, &LearningData::default()).await;
        let report = manager.evolve(0.0, &LearningData::default()).await;

        assert_eq!(report.transition, Transition::Reborn);
        assert!(!report.archived);
        assert!(report.persisted);
        assert_eq!(manager.pending_decisions().await, 1);
    }

    #[tokio::test]
    async fn test_weight_adjustment_through_evolve() {
        let dir = TempDir::new().unwrap();
        let manager = open_seeded(&dir, test_config(&dir)).await;

        let data = LearningData {
            weight_adjustments: Some(BTreeMap::from([("momentum".to_string(), 0.5)])),
            ..Default::default()
        };
        let report = manager.evolve(0.9, &data).await;

        assert!(report.weights_normalized);
        let status = manager.current_status().await;
        let sum: f64 = status.scoring_weights.values().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(status.scoring_weights["momentum"] > 0.25);
    }

    #[tokio::test]
    async fn test_hot_switch_backs_up_record_before_trimming() {
        let dir = TempDir::new().unwrap();
        let manager = open_seeded(&dir, test_config(&dir)).await;

        manager.evolve(0.7, &LearningData::default()).await;
        manager.record_decision("ABCD", "BUY", 0.9).await;
        manager.save().await.unwrap();

        let report = manager.hot_switch().await.unwrap();
        assert_eq!(report.receipt.generation, 1);
        assert_eq!(report.receipt.decisions_archived, 1);

        // The backup is the record as it stood when the switch began
        let backup = report.backup_path.unwrap();
        let backed_up = JsonStateStore::new(&backup).load().unwrap().unwrap();
        assert_eq!(backed_up.generation, 1);
        assert_eq!(backed_up.decision_history.len(), 1);

        let current = JsonStateStore::new(&manager.config().fast_store_path)
            .load()
            .unwrap()
            .unwrap();
        assert!(current.decision_history.is_empty());
    }

    #[tokio::test]
    async fn test_nan_score_survives_restart() {
        let dir = TempDir::new().unwrap();
        {
            let manager = open_seeded(&dir, test_config(&dir)).await;
            for _ in 0..3 {
                manager.evolve(0.9, &LearningData::default()).await;
            }
            let report = manager.evolve(f64::NAN, &LearningData::default()).await;
            assert_eq!(report.transition, Transition::Degraded);
            assert!(report.persisted);
            manager.shutdown().await.unwrap();
        }

        let manager = open_seeded(&dir, test_config(&dir)).await;
        assert_eq!(
            manager.load_outcome(),
            &LoadOutcome::Restored { generation: 4 }
        );
        let state = manager.snapshot().await;
        assert_eq!(state.performance_score, 0.0);
        assert_eq!(state.kill_gate_status, KillGateStatus::Zombie);
    }

    #[tokio::test]
    async fn test_non_finite_score_kill_is_archived() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.zombie_grace_period = 1;
        let manager = open_seeded(&dir, config).await;

        manager.record_decision("ABCD", "BUY", f64::INFINITY).await;
        let report = manager.evolve(f64::NAN, &LearningData::default()).await;
        assert_eq!(report.transition, Transition::Reborn);
        assert!(report.archived);

        let killed = manager.load_generation(1).await.unwrap().unwrap();
        assert_eq!(killed.kill_gate_status, KillGateStatus::Killed);
        assert_eq!(killed.performance_score, 0.0);

        let decisions = manager.decisions_for_generation(1).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].record.confidence, 0.0);

        // +inf never passes the gate either
        let report = manager.evolve(f64::INFINITY, &LearningData::default()).await;
        assert_eq!(report.transition, Transition::Reborn);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_dropped_save_does_not_overwrite_newer_state() {
        let dir = TempDir::new().unwrap();
        let manager = Arc::new(open_seeded(&dir, test_config(&dir)).await);
        let store = JsonStateStore::new(&manager.config().fast_store_path);

        for round in 1..=20u64 {
            let pending = {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.save().await })
            };
            pending.abort();

            let report = manager.evolve(0.9, &LearningData::default()).await;
            assert!(report.persisted);
            assert_eq!(store.load().unwrap().unwrap().generation, round);
        }

        manager.save().await.unwrap();
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_statistics_merge_live_state() {
        let dir = TempDir::new().unwrap();
        let manager = open_seeded(&dir, test_config(&dir)).await;

        manager.evolve(0.3, &LearningData::default()).await;
        manager.archive().await.unwrap();
        manager.evolve(0.9, &LearningData::default()).await;

        let stats = manager.statistics().await.unwrap();
        assert_eq!(stats.current_generation, 2);
        assert_eq!(stats.total_archived, 1);
        assert_eq!(stats.current_status, KillGateStatus::Alive);
        assert_eq!(stats.current_performance, 0.9);
        assert_eq!(stats.avg_performance, 0.3);
        assert_eq!(stats.status_distribution.get("zombie"), Some(&1));
    }

    #[tokio::test]
    async fn test_auto_save_flushes_live_state() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.auto_save_interval = std::time::Duration::from_millis(10);
        let manager = Arc::new(open_seeded(&dir, config).await);

        assert!(manager.start_auto_save().await);
        manager.record_decision("ABCD", "BUY", 0.9).await;
        tokio::time::sleep(std::time::Duration::from_millis(80)).await;

        let on_disk = JsonStateStore::new(&manager.config().fast_store_path)
            .load()
            .unwrap()
            .unwrap();
        assert_eq!(on_disk.decision_history.len(), 1);

        manager.stop_auto_save().await.unwrap();
        assert!(!manager.auto_save_running());
    }

    #[tokio::test]
    async fn test_reopen_restores_probation() {
        let dir = TempDir::new().unwrap();
        {
            let manager = open_seeded(&dir, test_config(&dir)).await;
            manager.evolve(0.1, &LearningData::default()).await;
            manager.evolve(0.1, &LearningData::default()).await;
            manager.shutdown().await.unwrap();
        }

        let manager = open_seeded(&dir, test_config(&dir)).await;
        assert_eq!(
            manager.load_outcome(),
            &LoadOutcome::Restored { generation: 2 }
        );
        let state = manager.snapshot().await;
        assert_eq!(state.kill_gate_status, KillGateStatus::Zombie);
        assert_eq!(state.zombie_counter, 2);
    }
}
