use rusqlite::params;

use ramble_core::{Id, Millis, Session};

use crate::error::Result;
use crate::store::Store;

impl Store {
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}sessions (id, started_at, ended_at, unit_count, summary, mood_trajectory)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            ),
            params![
                session.id.as_str(),
                session.started_at,
                session.ended_at,
                session.unit_count,
                session.summary,
                session.mood_trajectory,
            ],
        )?;
        self.notify_changed("sessions");
        Ok(())
    }

    pub fn end_session(&self, id: &Id, ended_at: Millis, summary: Option<String>) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("UPDATE {p}sessions SET ended_at = ?1, summary = ?2 WHERE id = ?3"),
            params![ended_at, summary, id.as_str()],
        )?;
        self.notify_changed("sessions");
        Ok(())
    }

    pub fn increment_session_unit_count(&self, id: &Id) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("UPDATE {p}sessions SET unit_count = unit_count + 1 WHERE id = ?1"),
            params![id.as_str()],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &Id) -> Result<Option<Session>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, started_at, ended_at, unit_count, summary, mood_trajectory
             FROM {p}sessions WHERE id = ?1"
        ))?;
        let mut rows = stmt.query(params![id.as_str()])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row_to_session(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_active_session(&self) -> Result<Option<Session>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, started_at, ended_at, unit_count, summary, mood_trajectory
             FROM {p}sessions WHERE ended_at IS NULL ORDER BY started_at DESC LIMIT 1"
        ))?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row_to_session(row)?))
        } else {
            Ok(None)
        }
    }

    pub fn get_recent_sessions(&self, n: usize) -> Result<Vec<Session>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, started_at, ended_at, unit_count, summary, mood_trajectory
             FROM {p}sessions ORDER BY started_at DESC LIMIT ?1"
        ))?;
        let rows = stmt.query_map(params![n as i64], row_to_session)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    let id: String = row.get(0)?;
    let mood_raw: Option<String> = row.get(5)?;
    Ok(Session {
        id: Id::from_str(&id),
        started_at: row.get(1)?,
        ended_at: row.get(2)?,
        unit_count: row.get(3)?,
        summary: row.get(4)?,
        mood_trajectory: mood_raw,
    })
}
