//! Session driver and the suspicion-update machinery it runs.
//!
//! - `update`: update rules, noise schedules and the noise-free trajectory helper.
//! - `history`: suspicion trajectory plus the per-configuration comparison sets.
//! - `record`: per-trial trace rows consumed by writers and plots.
//! - `responder`: the seam through which a human (or a replay) supplies ratings.
//! - `session`: the `Game` state machine.

pub mod history;
pub mod record;
pub mod responder;
pub mod session;
pub mod update;

pub use history::SuspicionHistory;
pub use record::TrialRecord;
pub use responder::{Prompt, Responder, Response, ScriptedResponder, SilentResponder};
pub use session::{DEFAULT_SEED, Game, GamePhase, PlayMode, SessionConfig};
pub use update::{NoiseSchedule, NoiseState, UpdateRule, simulate_trajectory, suspicion};
