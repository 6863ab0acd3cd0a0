//! Offline sync domain models and engine helpers.

mod offline_sync_model;
mod payload_model;
mod sync_engine;
mod sync_scheduler;

pub use offline_sync_model::*;
pub use payload_model::*;
pub use sync_engine::*;
pub use sync_scheduler::*;
