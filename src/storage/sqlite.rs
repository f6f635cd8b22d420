//! SQLite archival store
//!
//! Past generations and their decisions, written through a pooled rusqlite
//! connection (deadpool-sqlite). Each archive call is one transaction.

use crate::error::{BrainError, Result};
use crate::storage::ArchiveBackend;
use crate::types::{
    ArchiveReceipt, ArchiveStatistics, ArchivedDecision, BrainState, DecisionRecord,
    KillGateStatus, LearnedPatterns, SCHEMA_VERSION,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_sqlite::{Config, Object, Pool, PoolConfig, Runtime};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS generations (
    generation INTEGER PRIMARY KEY,
    schema_version INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    performance_score REAL NOT NULL,
    kill_gate_status TEXT NOT NULL CHECK(kill_gate_status IN ('alive', 'zombie', 'killed')),
    discovery_weights TEXT NOT NULL,
    scoring_weights TEXT NOT NULL,
    threshold_values TEXT NOT NULL,
    learned_patterns TEXT NOT NULL,
    decision_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS decisions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    generation INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    symbol TEXT NOT NULL,
    action TEXT NOT NULL,
    confidence REAL NOT NULL,
    outcome TEXT NOT NULL DEFAULT 'pending',
    FOREIGN KEY (generation) REFERENCES generations (generation)
);

CREATE INDEX IF NOT EXISTS idx_decisions_generation ON decisions (generation);
"#;

/// Archival store backed by a SQLite file
pub struct SqliteArchive {
    pool: Pool,
    path: PathBuf,
    schema_ready: AtomicBool,
}

impl SqliteArchive {
    /// Create an archive at `db_path` with a pool of `pool_size` connections.
    ///
    /// No connection is opened until first use.
    pub fn new<P: AsRef<Path>>(db_path: P, pool_size: usize) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        info!(
            "Creating archive pool at: {} (pool_size: {})",
            path.display(),
            pool_size
        );

        let mut config = Config::new(path.clone());
        config.pool = Some(PoolConfig::new(pool_size));
        let pool = config
            .create_pool(Runtime::Tokio1)
            .map_err(|e| BrainError::Pool(format!("Failed to create connection pool: {}", e)))?;

        Ok(Self {
            pool,
            path,
            schema_ready: AtomicBool::new(false),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn conn(&self) -> Result<Object> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        self.pool
            .get()
            .await
            .map_err(|e| BrainError::Pool(format!("Failed to get connection from pool: {}", e)))
    }

    /// Connection with the schema guaranteed to exist
    async fn ready_conn(&self) -> Result<Object> {
        if !self.schema_ready.load(Ordering::Acquire) {
            self.init_schema().await?;
        }
        self.conn().await
    }

    async fn interact<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.ready_conn().await?;
        conn.interact(move |conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            f(conn)
        })
        .await
        .map_err(|e| BrainError::Pool(format!("Pool interaction failed: {}", e)))?
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| BrainError::Database(format!("Invalid timestamp {:?}: {}", raw, e)))
}

fn parse_status(raw: &str) -> Result<KillGateStatus> {
    raw.parse().map_err(BrainError::Database)
}

fn insert_generation(conn: &Connection, state: &BrainState) -> Result<bool> {
    let inserted = conn.execute(
        r#"
        INSERT INTO generations (
            generation, schema_version, timestamp, performance_score, kill_gate_status,
            discovery_weights, scoring_weights, threshold_values, learned_patterns,
            decision_count
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(generation) DO NOTHING
        "#,
        params![
            state.generation as i64,
            SCHEMA_VERSION,
            state.timestamp.to_rfc3339(),
            state.performance_score,
            state.kill_gate_status.as_str(),
            serde_json::to_string(&state.discovery_weights)?,
            serde_json::to_string(&state.scoring_weights)?,
            serde_json::to_string(&state.threshold_values)?,
            serde_json::to_string(&state.learned_patterns)?,
            state.decision_history.len() as i64,
        ],
    )?;
    Ok(inserted == 1)
}

fn insert_decision(conn: &Connection, generation: u64, decision: &DecisionRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO decisions (generation, timestamp, symbol, action, confidence, outcome)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![
            generation as i64,
            decision.timestamp.to_rfc3339(),
            decision.symbol,
            decision.action,
            decision.confidence,
            decision.outcome,
        ],
    )?;
    Ok(())
}

#[async_trait]
impl ArchiveBackend for SqliteArchive {
    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn().await?;
        conn.interact(|conn| conn.execute_batch(SCHEMA))
            .await
            .map_err(|e| BrainError::Pool(format!("Pool interaction failed: {}", e)))??;

        self.schema_ready.store(true, Ordering::Release);
        debug!("Archive schema ready at {}", self.path.display());
        Ok(())
    }

    async fn archive_generation(&self, state: &BrainState) -> Result<ArchiveReceipt> {
        if let Some(field) = state.non_finite_field() {
            return Err(BrainError::NonFinite(field));
        }

        let snapshot = state.clone();
        let generation = snapshot.generation;
        let count = snapshot.decision_history.len();

        let receipt = self
            .interact(move |conn| {
                let tx = conn.transaction()?;

                let new_generation = insert_generation(&tx, &snapshot)?;
                for decision in &snapshot.decision_history {
                    insert_decision(&tx, generation, decision)?;
                }
                if !new_generation {
                    tx.execute(
                        "UPDATE generations SET decision_count = decision_count + ?1 WHERE generation = ?2",
                        params![count as i64, generation as i64],
                    )?;
                }

                tx.commit()?;
                Ok(ArchiveReceipt {
                    generation,
                    decisions_archived: count,
                    new_generation,
                })
            })
            .await?;

        debug!(
            "Archived generation {} with {} decisions (new row: {})",
            generation, count, receipt.new_generation
        );
        Ok(receipt)
    }

    async fn load_generation(&self, generation: u64) -> Result<Option<BrainState>> {
        debug!("Loading archived generation {}", generation);

        self.interact(move |conn| {
            let row = conn
                .query_row(
                    r#"
                    SELECT schema_version, timestamp, performance_score, kill_gate_status,
                           discovery_weights, scoring_weights, threshold_values, learned_patterns
                    FROM generations WHERE generation = ?1
                    "#,
                    params![generation as i64],
                    |row| {
                        Ok((
                            row.get::<_, u32>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, f64>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, String>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, String>(7)?,
                        ))
                    },
                )
                .optional()?;

            let Some((version, timestamp, score, status, discovery, scoring, thresholds, patterns)) =
                row
            else {
                return Ok(None);
            };

            if version > SCHEMA_VERSION {
                return Err(BrainError::UnsupportedSchema {
                    found: version,
                    supported: SCHEMA_VERSION,
                });
            }

            Ok(Some(BrainState {
                generation,
                timestamp: parse_timestamp(&timestamp)?,
                performance_score: score,
                discovery_weights: serde_json::from_str::<BTreeMap<String, f64>>(&discovery)?,
                scoring_weights: serde_json::from_str::<BTreeMap<String, f64>>(&scoring)?,
                threshold_values: serde_json::from_str::<BTreeMap<String, f64>>(&thresholds)?,
                learned_patterns: serde_json::from_str::<LearnedPatterns>(&patterns)?,
                decision_history: Vec::new(),
                kill_gate_status: parse_status(&status)?,
                zombie_counter: 0,
            }))
        })
        .await
    }

    async fn decisions_for_generation(&self, generation: u64) -> Result<Vec<ArchivedDecision>> {
        self.interact(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, timestamp, symbol, action, confidence, outcome
                FROM decisions WHERE generation = ?1 ORDER BY id
                "#,
            )?;

            let rows = stmt
                .query_map(params![generation as i64], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(id, timestamp, symbol, action, confidence, outcome)| {
                    Ok(ArchivedDecision {
                        id,
                        generation,
                        record: DecisionRecord {
                            timestamp: parse_timestamp(&timestamp)?,
                            symbol,
                            action,
                            confidence,
                            outcome,
                        },
                    })
                })
                .collect()
        })
        .await
    }

    async fn statistics(&self) -> Result<ArchiveStatistics> {
        self.interact(|conn| {
            let (total, avg, max, min) = conn.query_row(
                r#"
                SELECT COUNT(*), AVG(performance_score), MAX(performance_score), MIN(performance_score)
                FROM generations
                "#,
                [],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, Option<f64>>(1)?,
                        row.get::<_, Option<f64>>(2)?,
                        row.get::<_, Option<f64>>(3)?,
                    ))
                },
            )?;

            let mut stmt = conn.prepare(
                "SELECT kill_gate_status, COUNT(*) FROM generations GROUP BY kill_gate_status",
            )?;
            let status_distribution = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
                })?
                .collect::<rusqlite::Result<HashMap<_, _>>>()?;

            Ok(ArchiveStatistics {
                total_archived: total as u64,
                avg_performance: avg.unwrap_or(0.0),
                max_performance: max.unwrap_or(0.0),
                min_performance: min.unwrap_or(0.0),
                status_distribution,
            })
        })
        .await
    }

    async fn total_decisions(&self) -> Result<u64> {
        self.interact(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}
