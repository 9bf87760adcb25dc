//! Database schema definitions.

/// SQL schema for the channel catalog.
pub const SCHEMA_SQL: &str = r#"
-- Channel catalog table
CREATE TABLE IF NOT EXISTS channels (
    -- Stable identity: NID<network_id>-SID<service_id:03>
    id TEXT PRIMARY KEY NOT NULL,
    -- <type lowercase><channel_number>, e.g. gr011, bs101
    display_channel_id TEXT UNIQUE NOT NULL,
    network_id INTEGER NOT NULL,         -- Network ID (original_network_id)
    service_id INTEGER NOT NULL,         -- Service ID
    transport_stream_id INTEGER,         -- Transport Stream ID (EDCB only)
    remocon_id INTEGER NOT NULL,         -- Remote control key (-1 = unknown)
    channel_number TEXT NOT NULL,        -- e.g. 011, 011-1, 101
    type TEXT NOT NULL,                  -- GR / BS / CS / CATV / SKY / STARDIGIO
    name TEXT NOT NULL,                  -- Normalized service name
    jikkyo_force INTEGER,                -- Live commentary intensity (NULL = not measured)
    is_subchannel INTEGER NOT NULL DEFAULT 0,
    is_radiochannel INTEGER NOT NULL DEFAULT 0,
    is_watchable INTEGER NOT NULL DEFAULT 1,
    -- Metadata
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

CREATE INDEX IF NOT EXISTS idx_channels_watchable ON channels(is_watchable);

-- Program table (written by the EPG importer, read here)
CREATE TABLE IF NOT EXISTS programs (
    id TEXT PRIMARY KEY NOT NULL,        -- NID<nid>-SID<sid>-EID<eid>
    channel_id TEXT NOT NULL,            -- channels.id
    title TEXT NOT NULL,
    description TEXT,
    start_time INTEGER NOT NULL,         -- Unix seconds
    end_time INTEGER NOT NULL,           -- Unix seconds
    duration INTEGER NOT NULL            -- Seconds
);

CREATE INDEX IF NOT EXISTS idx_programs_channel_start ON programs(channel_id, start_time);
"#;
