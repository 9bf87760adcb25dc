//! Scheduled task management for channel-catalog-server.
//!
//! This module provides:
//! - [`UpdateScheduler`]: Periodic channel catalog update scheduler

pub mod update_scheduler;

pub use update_scheduler::{UpdateScheduler, UpdateSchedulerConfig};
