//! Program schedule lookups.

use super::{Database, ProgramRecord, Result};
use rusqlite::{params, OptionalExtension};

impl Database {
    /// Get the program on air at `now` and the next one to start.
    ///
    /// `now` is in unix seconds. A program whose end time equals its
    /// successor's start time may be returned as both present and following
    /// at the boundary instant.
    pub fn get_current_and_next_program(
        &self,
        channel_id: &str,
        now: i64,
    ) -> Result<(Option<ProgramRecord>, Option<ProgramRecord>)> {
        let present = self
            .conn
            .query_row(
                "SELECT * FROM programs
                 WHERE channel_id = ?1 AND start_time <= ?2 AND end_time >= ?2
                 ORDER BY start_time DESC LIMIT 1",
                params![channel_id, now],
                row_to_program_record,
            )
            .optional()?;

        let following = self
            .conn
            .query_row(
                "SELECT * FROM programs
                 WHERE channel_id = ?1 AND start_time >= ?2
                 ORDER BY start_time ASC LIMIT 1",
                params![channel_id, now],
                row_to_program_record,
            )
            .optional()?;

        Ok((present, following))
    }

    /// Insert or replace a program row. The server itself only reads schedules.
    #[cfg(test)]
    pub fn upsert_program(&self, program: &ProgramRecord) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO programs (id, channel_id, title, description, start_time, end_time, duration)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                program.id,
                program.channel_id,
                program.title,
                program.description,
                program.start_time,
                program.end_time,
                program.duration,
            ],
        )?;
        Ok(())
    }
}

fn row_to_program_record(row: &rusqlite::Row) -> rusqlite::Result<ProgramRecord> {
    Ok(ProgramRecord {
        id: row.get("id")?,
        channel_id: row.get("channel_id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        start_time: row.get("start_time")?,
        end_time: row.get("end_time")?,
        duration: row.get("duration")?,
    })
}
