//! Channel catalog update pass.
//!
//! One pass fetches the backend service list, resolves channel numbers and
//! writes the result into the catalog inside a single transaction. The fetch
//! happens before the transaction is opened, so a backend failure never
//! touches stored data.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use channel_catalog::numbering::resolve_services;
use channel_catalog::{NumberingTables, RemoconFallback};
use log::{debug, info, warn};
use thiserror::Error;

use crate::database::{
    ChannelRecord, ChannelRepository, ChannelStore, DatabaseError, DatabaseHandle, ReconcileResult,
    SaveOutcome,
};
use crate::source::{BackendKind, ServiceSource, SourceError, SourceSnapshot};

/// Update pass error types.
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Failed to fetch services: {0}")]
    Source(#[from] SourceError),

    #[error("Failed to update catalog: {0}")]
    Database(#[from] DatabaseError),
}

/// What to do when a channel's display ID is already taken in this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    /// Log and keep going without that channel.
    Skip,
    /// Fail the pass; the transaction rolls back.
    Abort,
}

impl CollisionPolicy {
    pub fn for_backend(kind: BackendKind) -> Self {
        match kind {
            BackendKind::Mirakurun => CollisionPolicy::Abort,
            BackendKind::Edcb => CollisionPolicy::Skip,
        }
    }
}

/// Apply one fetched snapshot to the catalog behind `repo`.
///
/// Callers provide the transaction boundary; on `Err` nothing written here
/// may be committed.
pub fn reconcile<R: ChannelRepository>(
    repo: &R,
    kind: BackendKind,
    snapshot: SourceSnapshot,
    tables: &NumberingTables,
) -> Result<ReconcileResult, DatabaseError> {
    let existing = repo.watchable_channels()?;
    let previous_remocon_ids: HashMap<String, i32> = existing
        .iter()
        .map(|c| (c.id.clone(), c.remocon_id))
        .collect();
    let stored: HashMap<&str, &ChannelRecord> = existing.iter().map(|c| (c.id.as_str(), c)).collect();

    let SourceSnapshot {
        services,
        epg_services,
    } = snapshot;
    let fallback = match kind {
        BackendKind::Mirakurun => RemoconFallback::Placeholder,
        BackendKind::Edcb => RemoconFallback::Epg {
            epg_services: &epg_services,
            previous: &previous_remocon_ids,
        },
    };

    let resolution = resolve_services(services, &fallback, tables);
    for (service, rejection) in &resolution.rejected {
        debug!(
            "Excluded {} ({}): {:?}",
            service.channel_id(),
            service.name,
            rejection
        );
    }

    let mut result = ReconcileResult::default();
    let resolved_ids: HashSet<&str> = resolution.channels.iter().map(|c| c.id.as_str()).collect();

    // Stale rows go first so their display IDs are free for this pass.
    for channel in &existing {
        if !resolved_ids.contains(channel.id.as_str()) {
            debug!("Removing {} ({})", channel.display_channel_id, channel.name);
            repo.delete_channel(&channel.id)?;
            result.deleted += 1;
        }
    }

    repo.release_display_ids()?;

    // Channels already in the catalog claim their display IDs before newcomers.
    let (mut ordered, newcomers): (Vec<_>, Vec<_>) = resolution
        .channels
        .into_iter()
        .partition(|c| stored.contains_key(c.id.as_str()));
    ordered.extend(newcomers);

    let policy = CollisionPolicy::for_backend(kind);
    for channel in ordered {
        let record = ChannelRecord::from_resolved(channel, None);
        match repo.save_channel(&record) {
            Ok(SaveOutcome::Inserted) => result.inserted += 1,
            Ok(SaveOutcome::Updated) => result.updated += 1,
            Err(DatabaseError::Conflict(reason)) if policy == CollisionPolicy::Skip => {
                warn!(
                    "Skipping {} ({}): display channel ID {} already taken ({})",
                    record.id, record.name, record.display_channel_id, reason
                );
                result.skipped += 1;
                if let Some(previous) = stored.get(record.id.as_str()) {
                    restore_channel(repo, previous, &mut result)?;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Ok(result)
}

/// Put a skipped channel back the way it was stored before this pass.
///
/// Its display ID was released at the start of the pass; if another channel
/// has taken it since, the row is dropped instead.
fn restore_channel<R: ChannelRepository>(
    repo: &R,
    previous: &ChannelRecord,
    result: &mut ReconcileResult,
) -> Result<(), DatabaseError> {
    match repo.save_channel(previous) {
        Ok(_) => Ok(()),
        Err(DatabaseError::Conflict(reason)) => {
            warn!(
                "Removing {} ({}): previous display channel ID {} is taken too ({})",
                previous.id, previous.name, previous.display_channel_id, reason
            );
            repo.delete_channel(&previous.id)?;
            result.deleted += 1;
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// Runs update passes for one backend against one catalog.
pub struct ChannelUpdater {
    database: DatabaseHandle,
    source: Arc<dyn ServiceSource>,
    tables: NumberingTables,
}

impl ChannelUpdater {
    pub fn new(database: DatabaseHandle, source: Arc<dyn ServiceSource>, tables: NumberingTables) -> Self {
        Self {
            database,
            source,
            tables,
        }
    }

    pub fn database(&self) -> &DatabaseHandle {
        &self.database
    }

    /// Fetch, resolve and reconcile in one go.
    pub async fn update_channels(&self) -> Result<ReconcileResult, UpdateError> {
        let kind = self.source.kind();
        let started = Instant::now();
        info!("Updating channels from {}...", kind);

        let snapshot = self.source.fetch().await?;

        let result = {
            let mut db = self.database.lock().await;
            let tx = db.transaction().map_err(DatabaseError::from)?;
            let result = reconcile(&ChannelStore::new(&tx), kind, snapshot, &self.tables)?;
            tx.commit().map_err(DatabaseError::from)?;
            result
        };

        info!(
            "Channels update complete. ({:.3} sec) inserted={} updated={} deleted={} skipped={}",
            started.elapsed().as_secs_f64(),
            result.inserted,
            result.updated,
            result.deleted,
            result.skipped
        );
        Ok(result)
    }
}
