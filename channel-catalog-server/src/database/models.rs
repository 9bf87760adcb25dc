//! Database model definitions.

use channel_catalog::{ChannelType, ResolvedChannel};
use serde::Serialize;

/// Channel record from database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelRecord {
    // Identity
    pub id: String,
    pub display_channel_id: String,
    pub network_id: u16,
    pub service_id: u16,
    pub transport_stream_id: Option<u16>,
    // Numbering
    pub remocon_id: i32,
    pub channel_number: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub name: String,
    // Written only by the status pass
    pub jikkyo_force: Option<i32>,
    // Flags
    pub is_subchannel: bool,
    pub is_radiochannel: bool,
    pub is_watchable: bool,
}

impl ChannelRecord {
    /// Build the row to persist for a freshly resolved channel.
    pub fn from_resolved(resolved: ResolvedChannel, jikkyo_force: Option<i32>) -> Self {
        Self {
            id: resolved.id,
            display_channel_id: resolved.display_channel_id,
            network_id: resolved.network_id,
            service_id: resolved.service_id,
            transport_stream_id: resolved.transport_stream_id,
            remocon_id: resolved.remocon_id,
            channel_number: resolved.channel_number,
            channel_type: resolved.channel_type,
            name: resolved.name,
            jikkyo_force,
            is_subchannel: resolved.is_subchannel,
            is_radiochannel: resolved.is_radiochannel,
            is_watchable: true,
        }
    }
}

/// Program record from database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramRecord {
    pub id: String,
    pub channel_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Unix seconds
    pub start_time: i64,
    /// Unix seconds
    pub end_time: i64,
    pub duration: i64,
}

/// Result of reconciling a resolved service list into the catalog.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileResult {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Rows dropped because their display channel ID was already taken.
    pub skipped: usize,
}

impl ReconcileResult {
    pub fn total_changes(&self) -> usize {
        self.inserted + self.updated + self.deleted
    }
}
