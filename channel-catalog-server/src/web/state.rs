//! Web server shared state.

use std::sync::Arc;

use crate::database::DatabaseHandle;
use crate::scheduler::UpdateScheduler;

/// State shared by all API handlers.
pub struct WebState {
    pub database: DatabaseHandle,
    /// Absent when running without a scheduler (update endpoint answers 503).
    pub scheduler: Option<Arc<UpdateScheduler>>,
}

impl WebState {
    pub fn new(database: DatabaseHandle, scheduler: Option<Arc<UpdateScheduler>>) -> Self {
        Self { database, scheduler }
    }
}
