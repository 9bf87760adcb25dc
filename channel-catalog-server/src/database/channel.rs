//! Channel catalog operations.

use super::{ChannelRecord, Database, DatabaseError, Result};
use channel_catalog::ChannelType;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

/// Whether [`ChannelRepository::save_channel`] created or overwrote a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
}

/// The catalog operations a reconciliation pass needs.
pub trait ChannelRepository {
    /// All rows with `is_watchable = 1`.
    fn watchable_channels(&self) -> Result<Vec<ChannelRecord>>;

    /// Move every display channel ID out of the way for the duration of a
    /// pass, so rows can trade display IDs without tripping the unique index.
    fn release_display_ids(&self) -> Result<()>;

    /// Insert or overwrite by `id`. `jikkyo_force` is written only on insert.
    ///
    /// A display channel ID already held by another row yields
    /// [`DatabaseError::Conflict`].
    fn save_channel(&self, record: &ChannelRecord) -> Result<SaveOutcome>;

    fn delete_channel(&self, id: &str) -> Result<()>;
}

/// [`ChannelRepository`] over a borrowed connection.
///
/// Built from a [`rusqlite::Transaction`] during reconciliation so every
/// call lands in the same transaction.
pub struct ChannelStore<'c> {
    conn: &'c Connection,
}

impl<'c> ChannelStore<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

impl ChannelRepository for ChannelStore<'_> {
    fn watchable_channels(&self) -> Result<Vec<ChannelRecord>> {
        query_watchable(self.conn)
    }

    fn release_display_ids(&self) -> Result<()> {
        // Real display IDs never start with '~'.
        self.conn.execute(
            "UPDATE channels SET display_channel_id = '~' || id WHERE is_watchable = 1",
            [],
        )?;
        Ok(())
    }

    fn save_channel(&self, record: &ChannelRecord) -> Result<SaveOutcome> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM channels WHERE id = ?1)",
            [&record.id],
            |row| row.get(0),
        )?;

        self.conn
            .execute(
                "INSERT INTO channels (
                    id, display_channel_id, network_id, service_id, transport_stream_id,
                    remocon_id, channel_number, type, name, jikkyo_force,
                    is_subchannel, is_radiochannel, is_watchable
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(id) DO UPDATE SET
                    display_channel_id = excluded.display_channel_id,
                    network_id = excluded.network_id,
                    service_id = excluded.service_id,
                    transport_stream_id = excluded.transport_stream_id,
                    remocon_id = excluded.remocon_id,
                    channel_number = excluded.channel_number,
                    type = excluded.type,
                    name = excluded.name,
                    is_subchannel = excluded.is_subchannel,
                    is_radiochannel = excluded.is_radiochannel,
                    is_watchable = excluded.is_watchable,
                    updated_at = strftime('%s', 'now')",
                params![
                    record.id,
                    record.display_channel_id,
                    record.network_id as i64,
                    record.service_id as i64,
                    record.transport_stream_id.map(|v| v as i64),
                    record.remocon_id,
                    record.channel_number,
                    record.channel_type.as_str(),
                    record.name,
                    record.jikkyo_force,
                    record.is_subchannel,
                    record.is_radiochannel,
                    record.is_watchable,
                ],
            )
            .map_err(DatabaseError::from_write)?;

        Ok(if exists {
            SaveOutcome::Updated
        } else {
            SaveOutcome::Inserted
        })
    }

    fn delete_channel(&self, id: &str) -> Result<()> {
        self.conn.execute("DELETE FROM channels WHERE id = ?1", [id])?;
        Ok(())
    }
}

fn query_watchable(conn: &Connection) -> Result<Vec<ChannelRecord>> {
    let mut stmt = conn.prepare(
        "SELECT * FROM channels WHERE is_watchable = 1 ORDER BY network_id, service_id",
    )?;

    let records = stmt
        .query_map([], row_to_channel_record)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(records)
}

fn row_to_channel_record(row: &rusqlite::Row) -> rusqlite::Result<ChannelRecord> {
    let channel_type: String = row.get("type")?;
    let channel_type = channel_type.parse::<ChannelType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.into())
    })?;

    Ok(ChannelRecord {
        id: row.get("id")?,
        display_channel_id: row.get("display_channel_id")?,
        network_id: row.get::<_, i64>("network_id")? as u16,
        service_id: row.get::<_, i64>("service_id")? as u16,
        transport_stream_id: row
            .get::<_, Option<i64>>("transport_stream_id")?
            .map(|v| v as u16),
        remocon_id: row.get("remocon_id")?,
        channel_number: row.get("channel_number")?,
        channel_type,
        name: row.get("name")?,
        jikkyo_force: row.get("jikkyo_force")?,
        is_subchannel: row.get("is_subchannel")?,
        is_radiochannel: row.get("is_radiochannel")?,
        is_watchable: row.get("is_watchable")?,
    })
}

impl Database {
    /// Repository view over the connection, outside any explicit transaction.
    pub fn channels(&self) -> ChannelStore<'_> {
        ChannelStore::new(&self.conn)
    }

    /// Get all watchable channels.
    pub fn get_watchable_channels(&self) -> Result<Vec<ChannelRecord>> {
        query_watchable(&self.conn)
    }

    /// Get a watchable channel by its display channel ID (e.g. `gr011`).
    pub fn get_channel_by_display_id(&self, display_channel_id: &str) -> Result<Option<ChannelRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT * FROM channels WHERE display_channel_id = ?1 AND is_watchable = 1",
                [display_channel_id],
                row_to_channel_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Persist a measured live-commentary intensity.
    ///
    /// Returns false when the channel was removed in the meantime.
    pub fn update_jikkyo_force(&self, id: &str, force: i32) -> Result<bool> {
        let changed = self.conn.execute(
            "UPDATE channels SET jikkyo_force = ?2 WHERE id = ?1",
            params![id, force],
        )?;
        Ok(changed > 0)
    }
}
