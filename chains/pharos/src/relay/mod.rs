//! The relay engine: per-wallet step cursors driven round-robin, in shuffled
//! order, by the cycle scheduler.

pub mod pacing;
pub mod scheduler;
pub mod wallet_task;

pub use scheduler::{CycleReport, CycleScheduler, SchedulerSettings};
pub use wallet_task::{StepReport, TaskSequence, WalletTask};
