//! Fast store: the live brain as one JSON record
//!
//! The file is always fully rewritten. Writes go to a sibling temp file that
//! is renamed over the record, so a crash leaves either the old or the new
//! record, never a truncated one. Callers serialize writers.

use crate::error::{BrainError, Result};
use crate::types::{BrainState, SCHEMA_VERSION};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How the live state was obtained at startup
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// No record existed
    Fresh,
    /// Record loaded
    Restored { generation: u64 },
    /// Record unreadable; a fresh state replaced it
    Recovered {
        reason: String,
        preserved_at: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct FastStoreRecordRef<'a> {
    schema_version: u32,
    state: &'a BrainState,
}

#[derive(Deserialize)]
struct FastStoreRecord {
    schema_version: u32,
    state: BrainState,
}

/// Single-record JSON store
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Overwrite the record with `state`
    pub fn save(&self, state: &BrainState) -> Result<()> {
        if let Some(field) = state.non_finite_field() {
            return Err(BrainError::NonFinite(field));
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    BrainError::Io(std::io::Error::new(
                        e.kind(),
                        format!("Failed to create fast store directory: {}", e),
                    ))
                })?;
            }
        }

        let tmp = with_suffix(&self.path, ".tmp");
        {
            let file = File::create(&tmp).map_err(|e| {
                BrainError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create temp file {:?}: {}", tmp, e),
                ))
            })?;
            let mut writer = BufWriter::new(file);

            let record = FastStoreRecordRef {
                schema_version: SCHEMA_VERSION,
                state,
            };
            serde_json::to_writer_pretty(&mut writer, &record)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }

        fs::rename(&tmp, &self.path).map_err(|e| {
            BrainError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to replace fast store {:?}: {}", self.path, e),
            ))
        })?;

        debug!(
            "Saved brain generation {} to {:?}",
            state.generation, self.path
        );
        Ok(())
    }

    /// Read the record; `None` if the file does not exist
    pub fn load(&self) -> Result<Option<BrainState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)?;
        let record: FastStoreRecord = serde_json::from_reader(BufReader::new(file))?;

        if record.schema_version > SCHEMA_VERSION {
            return Err(BrainError::UnsupportedSchema {
                found: record.schema_version,
                supported: SCHEMA_VERSION,
            });
        }

        Ok(Some(record.state))
    }

    /// Load the record, falling back to a fresh generation-0 brain.
    ///
    /// An unreadable record is copied aside to `<file>.corrupt` before the
    /// caller overwrites it.
    pub fn load_or_default(&self) -> (BrainState, LoadOutcome) {
        match self.load() {
            Ok(Some(state)) => {
                info!(
                    "Loaded brain generation {} ({})",
                    state.generation, state.kill_gate_status
                );
                let generation = state.generation;
                (state, LoadOutcome::Restored { generation })
            }
            Ok(None) => {
                info!("No brain record at {:?}, creating generation 0", self.path);
                (BrainState::new(0), LoadOutcome::Fresh)
            }
            Err(e) => {
                warn!(
                    "Brain record {:?} unreadable ({}), creating generation 0",
                    self.path, e
                );
                let preserved_at = self.preserve_corrupt();
                (
                    BrainState::new(0),
                    LoadOutcome::Recovered {
                        reason: e.to_string(),
                        preserved_at,
                    },
                )
            }
        }
    }

    fn preserve_corrupt(&self) -> Option<PathBuf> {
        let target = with_suffix(&self.path, ".corrupt");
        match fs::copy(&self.path, &target) {
            Ok(_) => Some(target),
            Err(e) => {
                warn!("Could not preserve unreadable brain record: {}", e);
                None
            }
        }
    }

    /// Copy the current record to a timestamped backup next to it
    pub fn backup(&self) -> Result<Option<PathBuf>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let stamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let target = with_suffix(&self.path, &format!(".backup.{}", stamp));
        fs::copy(&self.path, &target)?;

        info!("Fast store backed up to {:?}", target);
        Ok(Some(target))
    }
}
