// Kill Gate
//
// Threshold rule deciding whether a generation survives, goes on probation,
// or is terminated. Pure: the manager applies the verdict to the live state.

use crate::types::KillGateStatus;
use serde::{Deserialize, Serialize};

/// What happened to the brain on one evolution step
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transition {
    /// Alive and still at or above threshold
    Survived,
    /// Fell below threshold while alive
    Degraded,
    /// Still below threshold while on probation
    Lingering { zombie_generations: u32 },
    /// Recovered from probation
    Resurrected,
    /// Grace period exhausted; replaced by a mutated successor
    Reborn,
}

/// Status and counter after one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub status: KillGateStatus,
    pub zombie_counter: u32,
    pub transition: Transition,
}

impl Verdict {
    pub fn is_rebirth(&self) -> bool {
        self.transition == Transition::Reborn
    }
}

/// Threshold rule with hysteresis
#[derive(Debug, Clone, Copy)]
pub struct KillGate {
    threshold: f64,
    grace_period: u32,
}

impl KillGate {
    pub fn new(threshold: f64, grace_period: u32) -> Self {
        Self {
            threshold,
            grace_period: grace_period.max(1),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn grace_period(&self) -> u32 {
        self.grace_period
    }

    /// Decide the next status for `score`.
    ///
    /// A `Reborn` verdict carries the status and counter of the successor
    /// (`alive`, 0); the caller archives the dying state as `killed`.
    pub fn assess(&self, status: KillGateStatus, zombie_counter: u32, score: f64) -> Verdict {
        // NaN never passes the gate
        let passing = score >= self.threshold;

        if passing {
            let transition = match status {
                KillGateStatus::Alive => Transition::Survived,
                KillGateStatus::Zombie | KillGateStatus::Killed => Transition::Resurrected,
            };
            return Verdict {
                status: KillGateStatus::Alive,
                zombie_counter: 0,
                transition,
            };
        }

        let counter = match status {
            KillGateStatus::Zombie => zombie_counter.saturating_add(1),
            KillGateStatus::Alive | KillGateStatus::Killed => 1,
        };

        if counter >= self.grace_period {
            return Verdict {
                status: KillGateStatus::Alive,
                zombie_counter: 0,
                transition: Transition::Reborn,
            };
        }

        let transition = if status == KillGateStatus::Zombie {
            Transition::Lingering {
                zombie_generations: counter,
            }
        } else {
            Transition::Degraded
        };

        Verdict {
            status: KillGateStatus::Zombie,
            zombie_counter: counter,
            transition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> KillGate {
        KillGate::new(0.5, 5)
    }

    #[test]
    fn test_alive_survives_at_threshold() {
        let verdict = gate().assess(KillGateStatus::Alive, 0, 0.5);
        assert_eq!(verdict.status, KillGateStatus::Alive);
        assert_eq!(verdict.zombie_counter, 0);
        assert_eq!(verdict.transition, Transition::Survived);
    }

    #[test]
    fn test_alive_degrades_below_threshold() {
        let verdict = gate().assess(KillGateStatus::Alive, 0, 0.49);
        assert_eq!(verdict.status, KillGateStatus::Zombie);
        assert_eq!(verdict.zombie_counter, 1);
        assert_eq!(verdict.transition, Transition::Degraded);
    }

    #[test]
    fn test_zombie_lingers_until_grace_period() {
        let gate = gate();
        let mut status = KillGateStatus::Alive;
        let mut counter = 0;

        for call in 1..5 {
            let verdict = gate.assess(status, counter, 0.1);
            assert_eq!(verdict.status, KillGateStatus::Zombie, "call {}", call);
            assert_eq!(verdict.zombie_counter, call);
            status = verdict.status;
            counter = verdict.zombie_counter;
        }

        let verdict = gate.assess(status, counter, 0.1);
        assert!(verdict.is_rebirth());
        assert_eq!(verdict.status, KillGateStatus::Alive);
        assert_eq!(verdict.zombie_counter, 0);
    }

    #[test]
    fn test_zombie_resurrects() {
        let verdict = gate().assess(KillGateStatus::Zombie, 4, 0.9);
        assert_eq!(verdict.status, KillGateStatus::Alive);
        assert_eq!(verdict.zombie_counter, 0);
        assert_eq!(verdict.transition, Transition::Resurrected);
    }

    #[test]
    fn test_grace_period_of_one_kills_immediately() {
        let verdict = KillGate::new(0.5, 1).assess(KillGateStatus::Alive, 0, 0.0);
        assert!(verdict.is_rebirth());
    }

    #[test]
    fn test_nan_score_fails_gate() {
        let verdict = gate().assess(KillGateStatus::Alive, 0, f64::NAN);
        assert_eq!(verdict.status, KillGateStatus::Zombie);
    }

    #[test]
    fn test_lingering_reports_count() {
        let verdict = gate().assess(KillGateStatus::Zombie, 2, 0.0);
        assert_eq!(
            verdict.transition,
            Transition::Lingering {
                zombie_generations: 3
            }
        );
    }
}
