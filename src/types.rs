//! Core data types for the brain engine
//!
//! `BrainState` is the single live snapshot evolved by the kill gate. It is a
//! plain value: the manager owns the only mutable instance, and every store
//! receives clones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Version tag written with every fast-store record and archived row
pub const SCHEMA_VERSION: u32 = 1;

/// Maximum entries kept in each learned-pattern list
pub const MAX_PATTERN_ENTRIES: usize = 10;

/// Outcome recorded for a decision until reconciliation amends it
pub const PENDING_OUTCOME: &str = "pending";

/// Kill-gate lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum KillGateStatus {
    /// Performing at or above the threshold
    #[default]
    Alive,
    /// On probation after falling below the threshold
    Zombie,
    /// Terminated; only ever seen on archived rows
    Killed,
}

impl KillGateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KillGateStatus::Alive => "alive",
            KillGateStatus::Zombie => "zombie",
            KillGateStatus::Killed => "killed",
        }
    }
}

impl fmt::Display for KillGateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KillGateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "alive" => Ok(KillGateStatus::Alive),
            "zombie" => Ok(KillGateStatus::Zombie),
            "killed" => Ok(KillGateStatus::Killed),
            other => Err(format!("unknown kill-gate status: {}", other)),
        }
    }
}

/// One recorded decision
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub action: String,
    pub confidence: f64,
    pub outcome: String,
}

impl DecisionRecord {
    /// New decision with a pending outcome, stamped now
    pub fn pending(symbol: impl Into<String>, action: impl Into<String>, confidence: f64) -> Self {
        Self {
            timestamp: Utc::now(),
            symbol: symbol.into(),
            action: action.into(),
            confidence,
            outcome: PENDING_OUTCOME.to_string(),
        }
    }
}

/// Decision row read back from the archive
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArchivedDecision {
    pub id: i64,
    pub generation: u64,
    #[serde(flatten)]
    pub record: DecisionRecord,
}

/// Bounded pattern lists accumulated by learning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LearnedPatterns {
    #[serde(default)]
    pub successful_sectors: Vec<String>,
    #[serde(default)]
    pub successful_patterns: Vec<String>,
    #[serde(default)]
    pub failed_symbols: Vec<String>,
    #[serde(default)]
    pub optimal_entry_times: Vec<String>,
}

/// Append `items` and keep only the most recent `MAX_PATTERN_ENTRIES`
pub fn push_bounded(list: &mut Vec<String>, items: &[String]) {
    list.extend(items.iter().cloned());
    if list.len() > MAX_PATTERN_ENTRIES {
        let excess = list.len() - MAX_PATTERN_ENTRIES;
        list.drain(..excess);
    }
}

/// The live brain snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrainState {
    pub generation: u64,
    pub timestamp: DateTime<Utc>,
    pub performance_score: f64,
    pub discovery_weights: BTreeMap<String, f64>,
    pub scoring_weights: BTreeMap<String, f64>,
    pub threshold_values: BTreeMap<String, f64>,
    pub learned_patterns: LearnedPatterns,
    pub decision_history: Vec<DecisionRecord>,
    pub kill_gate_status: KillGateStatus,
    /// Consecutive failing generations while on probation
    #[serde(default)]
    pub zombie_counter: u32,
}

fn weights(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries
        .iter()
        .map(|(name, value)| (name.to_string(), *value))
        .collect()
}

/// Default multipliers per discovery source
pub fn default_discovery_weights() -> BTreeMap<String, f64> {
    weights(&[
        ("indices", 1.0),
        ("etfs", 1.0),
        ("news", 1.2),
        ("sectors", 1.0),
        ("trending", 1.3),
        ("websites", 1.1),
        ("micro_cap_screeners", 1.5),
        ("penny_stock_sources", 1.4),
    ])
}

/// Default scoring factors (sum to 1.0)
pub fn default_scoring_weights() -> BTreeMap<String, f64> {
    weights(&[
        ("momentum", 0.25),
        ("catalyst", 0.20),
        ("volume", 0.15),
        ("sentiment", 0.15),
        ("micro_cap_risk", 0.15),
        ("technical_pattern", 0.10),
    ])
}

/// Default decision thresholds
pub fn default_threshold_values() -> BTreeMap<String, f64> {
    weights(&[
        ("min_confidence", 0.7),
        ("min_volume_ratio", 2.0),
        ("min_momentum_score", 0.6),
        ("max_micro_cap", 300_000_000.0), // $300M
        ("min_liquidity", 50_000.0),
    ])
}

impl BrainState {
    /// Fresh brain with default parameters at `generation`
    pub fn new(generation: u64) -> Self {
        Self {
            generation,
            timestamp: Utc::now(),
            performance_score: 0.0,
            discovery_weights: default_discovery_weights(),
            scoring_weights: default_scoring_weights(),
            threshold_values: default_threshold_values(),
            learned_patterns: LearnedPatterns::default(),
            decision_history: Vec::new(),
            kill_gate_status: KillGateStatus::Alive,
            zombie_counter: 0,
        }
    }

    /// Sum of all scoring weights
    pub fn scoring_weight_sum(&self) -> f64 {
        self.scoring_weights.values().sum()
    }

    /// Name of the first field holding NaN or infinity, if any.
    ///
    /// JSON and SQLite both turn such values into null, which the stores
    /// cannot read back.
    pub fn non_finite_field(&self) -> Option<String> {
        if !self.performance_score.is_finite() {
            return Some("performance_score".to_string());
        }

        let maps = [
            ("discovery_weights", &self.discovery_weights),
            ("scoring_weights", &self.scoring_weights),
            ("threshold_values", &self.threshold_values),
        ];
        for (name, map) in maps {
            if let Some((key, _)) = map.iter().find(|(_, value)| !value.is_finite()) {
                return Some(format!("{}.{}", name, key));
            }
        }

        self.decision_history
            .iter()
            .position(|decision| !decision.confidence.is_finite())
            .map(|index| format!("decision_history[{}].confidence", index))
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot {
            generation: self.generation,
            kill_gate_status: self.kill_gate_status,
            performance_score: self.performance_score,
            scoring_weights: self.scoring_weights.clone(),
            threshold_values: self.threshold_values.clone(),
            discovery_weights: self.discovery_weights.clone(),
        }
    }
}

impl Default for BrainState {
    fn default() -> Self {
        Self::new(0)
    }
}

/// Learning input supplied with each evolution step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LearningData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_sectors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_symbols: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optimal_entry_times: Option<Vec<String>>,
    /// Factor name to fractional delta (0.1 = +10%)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_adjustments: Option<BTreeMap<String, f64>>,
}

impl LearningData {
    /// Parse loosely typed input, skipping fields of the wrong shape
    pub fn from_value(value: &serde_json::Value) -> Self {
        let Some(object) = value.as_object() else {
            debug!("Learning data is not an object, ignoring");
            return Self::default();
        };

        let strings = |key: &str| -> Option<Vec<String>> {
            let field = object.get(key)?;
            match serde_json::from_value::<Vec<String>>(field.clone()) {
                Ok(list) => Some(list),
                Err(e) => {
                    debug!("Skipping learning field {}: {}", key, e);
                    None
                }
            }
        };

        let weight_adjustments = object.get("weight_adjustments").and_then(|field| {
            match serde_json::from_value::<BTreeMap<String, f64>>(field.clone()) {
                Ok(map) => Some(map),
                Err(e) => {
                    debug!("Skipping learning field weight_adjustments: {}", e);
                    None
                }
            }
        });

        Self {
            successful_sectors: strings("successful_sectors"),
            successful_patterns: strings("successful_patterns"),
            failed_symbols: strings("failed_symbols"),
            optimal_entry_times: strings("optimal_entry_times"),
            weight_adjustments,
        }
    }
}

/// Externally visible view of the live state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusSnapshot {
    pub generation: u64,
    pub kill_gate_status: KillGateStatus,
    pub performance_score: f64,
    pub scoring_weights: BTreeMap<String, f64>,
    pub threshold_values: BTreeMap<String, f64>,
    pub discovery_weights: BTreeMap<String, f64>,
}

/// Aggregates computed over the archival store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ArchiveStatistics {
    pub total_archived: u64,
    pub avg_performance: f64,
    pub max_performance: f64,
    pub min_performance: f64,
    pub status_distribution: HashMap<String, u64>,
}

/// Archive aggregates merged with the live state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrainStatistics {
    pub current_generation: u64,
    pub total_archived: u64,
    pub current_status: KillGateStatus,
    pub current_performance: f64,
    pub avg_performance: f64,
    pub max_performance: f64,
    pub min_performance: f64,
    pub status_distribution: HashMap<String, u64>,
}

impl BrainStatistics {
    pub fn merge(state: &BrainState, archive: ArchiveStatistics) -> Self {
        Self {
            current_generation: state.generation,
            total_archived: archive.total_archived,
            current_status: state.kill_gate_status,
            current_performance: state.performance_score,
            avg_performance: archive.avg_performance,
            max_performance: archive.max_performance,
            min_performance: archive.min_performance,
            status_distribution: archive.status_distribution,
        }
    }
}

/// Result of writing one generation into the archive
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveReceipt {
    pub generation: u64,
    pub decisions_archived: usize,
    /// False when the generation row already existed and only decisions were added
    pub new_generation: bool,
}
