//! Background Tasks Module
//!
//! Contains background tasks that run alongside a cache.
//!
//! # Tasks
//! - `sweep` - periodic expiry sweep producing EXPIRED events

mod sweep;

pub use sweep::spawn_sweep_task;
