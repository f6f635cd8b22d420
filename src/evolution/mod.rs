// Evolution Module - Kill-gate state machine and learning
//
// Components:
// - kill_gate: survival / probation / termination verdicts
// - learning: pattern lists and scoring-weight adjustment
// - mutation: successor construction after a kill

pub mod kill_gate;
pub mod learning;
pub mod mutation;

pub use kill_gate::{KillGate, Transition, Verdict};
pub use learning::{apply_learning, normalize_weights, WEIGHT_SUM_EPSILON};
pub use mutation::{mutate_discovery_weights, rebirth};
