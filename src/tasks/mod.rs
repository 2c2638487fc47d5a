//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a node is up.
//!
//! # Tasks
//! - Expiry sweep: purges expired local tier entries in every named cache

mod sweep;

pub use sweep::spawn_sweep_task;
