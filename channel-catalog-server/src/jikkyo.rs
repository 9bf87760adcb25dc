//! Live commentary (実況) status pass.
//!
//! Runs independently of the catalog update and writes each channel's
//! commentary intensity on its own, so one failing lookup does not hold back
//! the others.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;

use crate::database::{self, DatabaseHandle};

/// Value providers report when a commentary channel exists but has not been measured.
pub const UNKNOWN_FORCE: i32 = -1;

/// Status provider error types.
#[derive(Error, Debug)]
pub enum StatusError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Status provider returned status {0}")]
    Status(u16),
}

/// Commentary status of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct JikkyoStatus {
    /// Comments per minute
    pub force: i32,
}

#[async_trait]
pub trait StatusProvider: Send + Sync {
    /// Refresh provider-side state before a round of lookups.
    async fn refresh(&self) -> Result<(), StatusError> {
        Ok(())
    }

    /// `None` when the channel has no commentary room at all.
    async fn get_status(&self, network_id: u16, service_id: u16) -> Result<Option<JikkyoStatus>, StatusError>;
}

/// Looks statuses up at `GET {base_url}/{network_id}/{service_id}`.
pub struct HttpStatusProvider {
    client: Client,
    base_url: String,
}

impl HttpStatusProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StatusError> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl StatusProvider for HttpStatusProvider {
    async fn get_status(&self, network_id: u16, service_id: u16) -> Result<Option<JikkyoStatus>, StatusError> {
        let url = format!("{}/{}/{}", self.base_url, network_id, service_id);
        let response = self.client.get(&url).send().await?;

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<JikkyoStatus>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            other => Err(StatusError::Status(other.as_u16())),
        }
    }
}

/// Outcome counts of one status pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub updated: usize,
    pub unavailable: usize,
    pub failed: usize,
}

/// Query the provider for every watchable channel and store known values.
///
/// Only a failure to read the channel list is returned; per-channel
/// problems are logged and counted.
pub async fn update_jikkyo_status(
    database: &DatabaseHandle,
    provider: &dyn StatusProvider,
) -> database::Result<StatusSummary> {
    if let Err(e) = provider.refresh().await {
        warn!("[Jikkyo] Status refresh failed: {}", e);
    }

    let channels = database.lock().await.get_watchable_channels()?;
    let mut summary = StatusSummary::default();

    for channel in channels {
        let status = match provider.get_status(channel.network_id, channel.service_id).await {
            Ok(status) => status,
            Err(e) => {
                warn!("[Jikkyo] {}: {}", channel.display_channel_id, e);
                summary.failed += 1;
                continue;
            }
        };

        match status {
            Some(JikkyoStatus { force }) if force != UNKNOWN_FORCE => {
                let written = database.lock().await.update_jikkyo_force(&channel.id, force);
                match written {
                    Ok(true) => summary.updated += 1,
                    // Removed by an update pass in the meantime
                    Ok(false) => summary.unavailable += 1,
                    Err(e) => {
                        warn!("[Jikkyo] Failed to store {}: {}", channel.display_channel_id, e);
                        summary.failed += 1;
                    }
                }
            }
            _ => summary.unavailable += 1,
        }
    }

    debug!("[Jikkyo] {:?}", summary);
    info!("Jikkyo status updated for {} channels", summary.updated);
    Ok(summary)
}
