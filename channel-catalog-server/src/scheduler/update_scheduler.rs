//! Periodic channel catalog update scheduler.
//!
//! # How It Works
//!
//! 1. The scheduler runs as a background task
//! 2. Every `update_interval_secs` it runs a catalog update pass
//! 3. The commentary status pass runs after every update pass, if configured,
//!    even when the update itself failed
//!
//! The first tick fires immediately, so the catalog is refreshed at startup.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use channel_catalog::ChannelType;
use log::{debug, error, info, warn};
use tokio::sync::Mutex;
use tokio::time::{interval, MissedTickBehavior};

use crate::catalog::{ChannelUpdater, UpdateError};
use crate::database::{ChannelRecord, ReconcileResult};
use crate::jikkyo::{update_jikkyo_status, StatusProvider};

/// Update scheduler configuration.
#[derive(Debug, Clone)]
pub struct UpdateSchedulerConfig {
    /// Interval between update passes (seconds).
    pub update_interval_secs: u64,
}

impl Default for UpdateSchedulerConfig {
    fn default() -> Self {
        Self {
            update_interval_secs: 3600, // Hourly
        }
    }
}

/// Update scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerState {
    /// Scheduler is running.
    Running,
    /// Scheduler is stopped.
    Stopped,
}

/// Clears the in-progress flag even if the pass future is dropped.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Periodic channel catalog update scheduler.
pub struct UpdateScheduler {
    updater: Arc<ChannelUpdater>,
    status_provider: Option<Arc<dyn StatusProvider>>,
    config: UpdateSchedulerConfig,
    state: Arc<Mutex<SchedulerState>>,
    /// Set while a pass is in progress.
    in_progress: AtomicBool,
}

impl UpdateScheduler {
    /// Create a new update scheduler.
    pub fn new(
        updater: Arc<ChannelUpdater>,
        status_provider: Option<Arc<dyn StatusProvider>>,
        config: UpdateSchedulerConfig,
    ) -> Self {
        Self {
            updater,
            status_provider,
            config,
            state: Arc::new(Mutex::new(SchedulerState::Running)),
            in_progress: AtomicBool::new(false),
        }
    }

    /// Start the scheduler background task.
    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        info!(
            "UpdateScheduler: Starting with update interval {} seconds",
            self.config.update_interval_secs
        );

        let mut update_interval = interval(Duration::from_secs(self.config.update_interval_secs.max(1)));
        update_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            update_interval.tick().await;

            if *self.state.lock().await == SchedulerState::Stopped {
                info!("UpdateScheduler: Stopped");
                break;
            }

            if let Err(e) = self.trigger_update().await {
                error!("UpdateScheduler: Update failed: {}", e);
            }
        }
    }

    /// Stop the scheduler. Takes effect on the next tick.
    pub async fn stop(&self) {
        *self.state.lock().await = SchedulerState::Stopped;
        info!("UpdateScheduler: Stop requested");
    }

    pub fn is_updating(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Run an update pass now, followed by the status pass.
    ///
    /// Returns `Ok(None)` without doing anything if a pass is already running.
    /// An update failure is returned only after the status pass has run.
    pub async fn trigger_update(&self) -> Result<Option<ReconcileResult>, UpdateError> {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            debug!("UpdateScheduler: Update already in progress");
            return Ok(None);
        }
        let _guard = PassGuard(&self.in_progress);

        let result = self.updater.update_channels().await;
        if result.is_ok() {
            self.log_catalog_summary().await;
        }

        if let Some(provider) = &self.status_provider {
            if let Err(e) = update_jikkyo_status(self.updater.database(), provider.as_ref()).await {
                warn!("UpdateScheduler: Jikkyo status update failed: {}", e);
            }
        }

        result.map(Some)
    }

    async fn log_catalog_summary(&self) {
        let channels = self.updater.database().lock().await.get_watchable_channels();
        let channels = match channels {
            Ok(channels) => channels,
            Err(e) => {
                warn!("UpdateScheduler: Failed to read catalog: {}", e);
                return;
            }
        };

        for (channel_type, count) in count_by_type(&channels).into_values() {
            info!("UpdateScheduler:   {}: {} channels", channel_type.display_name(), count);
        }
    }
}

fn count_by_type(channels: &[ChannelRecord]) -> BTreeMap<usize, (ChannelType, usize)> {
    let mut counts: BTreeMap<usize, (ChannelType, usize)> = BTreeMap::new();
    for channel in channels {
        counts
            .entry(channel.channel_type.listing_rank())
            .or_insert((channel.channel_type, 0))
            .1 += 1;
    }
    counts
}
