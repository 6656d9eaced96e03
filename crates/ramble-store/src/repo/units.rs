use rusqlite::params;

use ramble_core::{ConversationUnit, DiscourseFunction, Id, Source, Speaker};

use crate::error::Result;
use crate::json;
use crate::store::Store;

impl Store {
    pub fn create_unit(&self, unit: &ConversationUnit) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}conversation_units
                 (id, session_id, timestamp, raw_text, sanitized_text, source, speaker,
                  discourse_function, preceding_context_summary, created_at, processed)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ),
            params![
                unit.id.as_str(),
                unit.session_id.as_str(),
                unit.timestamp,
                unit.raw_text,
                unit.sanitized_text,
                json::enum_to_str(&unit.source)?,
                json::enum_to_str(&unit.speaker)?,
                json::enum_to_str(&unit.discourse_function)?,
                unit.preceding_context_summary,
                unit.created_at,
                unit.processed,
            ],
        )?;
        self.notify_changed("conversation_units");
        Ok(())
    }

    pub fn mark_unit_processed(&self, id: &Id) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("UPDATE {p}conversation_units SET processed = 1 WHERE id = ?1"),
            params![id.as_str()],
        )?;
        self.notify_changed("conversation_units");
        Ok(())
    }

    pub fn get_unit(&self, id: &Id) -> Result<Option<ConversationUnit>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, session_id, timestamp, raw_text, sanitized_text, source, speaker,
                    discourse_function, preceding_context_summary, created_at, processed
             FROM {p}conversation_units WHERE id = ?1"
        ))?;
        let mut rows = stmt.query(params![id.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_unit(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_unprocessed_units(&self, limit: usize) -> Result<Vec<ConversationUnit>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, session_id, timestamp, raw_text, sanitized_text, source, speaker,
                    discourse_function, preceding_context_summary, created_at, processed
             FROM {p}conversation_units WHERE processed = 0 ORDER BY timestamp ASC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![limit as i64], row_to_unit)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_units_by_session(&self, session_id: &Id, limit: usize) -> Result<Vec<ConversationUnit>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, session_id, timestamp, raw_text, sanitized_text, source, speaker,
                    discourse_function, preceding_context_summary, created_at, processed
             FROM {p}conversation_units WHERE session_id = ?1 ORDER BY timestamp DESC LIMIT ?2"
        ))?;
        let rows = stmt.query_map(params![session_id.as_str(), limit as i64], row_to_unit)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        out.reverse();
        Ok(out)
    }
}

fn row_to_unit(row: &rusqlite::Row) -> rusqlite::Result<ConversationUnit> {
    let id: String = row.get(0)?;
    let session_id: String = row.get(1)?;
    let source_raw: String = row.get(5)?;
    let speaker_raw: String = row.get(6)?;
    let discourse_raw: String = row.get(7)?;

    let source: Source = json::enum_from_str(&source_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?;
    let speaker: Speaker = json::enum_from_str(&speaker_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e)))?;
    let discourse_function: DiscourseFunction = json::enum_from_str(&discourse_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(ConversationUnit {
        id: Id::from_str(&id),
        session_id: Id::from_str(&session_id),
        timestamp: row.get(2)?,
        raw_text: row.get(3)?,
        sanitized_text: row.get(4)?,
        source,
        speaker,
        discourse_function,
        preceding_context_summary: row.get(8)?,
        created_at: row.get(9)?,
        processed: row.get(10)?,
    })
}
