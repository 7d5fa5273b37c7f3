//! Background Tasks Module
//!
//! Periodic reclamation of expired cache entries.
//!
//! # Tasks
//! - Reaper: one dedicated thread per time-aware cache, owned by the cache
//! - Sweep task: optional tokio task for caches running inside a runtime

mod reaper;
mod sweep;

pub use reaper::{Reaper, ReaperState};
pub use sweep::spawn_sweep_task;
