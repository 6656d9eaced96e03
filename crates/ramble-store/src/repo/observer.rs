use rusqlite::params;

use ramble_core::{
    Contradiction, ExtractionProgramRecord, Id, ObserverOutput, ObserverProgramRecord, Pattern,
    SynthesisCache, Value,
};

use crate::error::Result;
use crate::json;
use crate::store::Store;

impl Store {
    pub fn create_observer_output(&self, output: &ObserverOutput) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}observer_outputs
                 (id, observer_name, kind, content, source_claim_ids, created_at, stale)
                 VALUES (?1,?2,?3,?4,?5,?6,?7)"
            ),
            params![
                output.id.as_str(),
                output.observer_name,
                output.kind,
                output.content,
                json::encode(&output.source_claim_ids)?,
                output.created_at,
                output.stale,
            ],
        )?;
        self.notify_changed("observer_outputs");
        Ok(())
    }

    pub fn get_observer_outputs(&self, include_stale: bool) -> Result<Vec<ObserverOutput>> {
        let p = self.prefix();
        let conn = self.conn();
        let sql = if include_stale {
            format!("SELECT id, observer_name, kind, content, source_claim_ids, created_at, stale FROM {p}observer_outputs ORDER BY created_at DESC")
        } else {
            format!("SELECT id, observer_name, kind, content, source_claim_ids, created_at, stale FROM {p}observer_outputs WHERE stale = 0 ORDER BY created_at DESC")
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], |row| {
            let ids_raw: String = row.get(4)?;
            Ok(ObserverOutput {
                id: Id::from_str(&row.get::<_, String>(0)?),
                observer_name: row.get(1)?,
                kind: row.get(2)?,
                content: row.get(3)?,
                source_claim_ids: json::decode(&ids_raw).unwrap_or_default(),
                created_at: row.get(5)?,
                stale: row.get(6)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn mark_observer_outputs_stale_by_claim(&self, claim_id: &Id) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "UPDATE {p}observer_outputs SET stale = 1 WHERE source_claim_ids LIKE ?1"
            ),
            params![format!("%{}%", claim_id.as_str())],
        )?;
        Ok(())
    }

    pub fn create_contradiction(&self, c: &Contradiction) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}contradictions (id, claim_a_id, claim_b_id, explanation, created_at, stale)
                 VALUES (?1,?2,?3,?4,?5,?6)"
            ),
            params![
                c.id.as_str(),
                c.claim_a_id.as_str(),
                c.claim_b_id.as_str(),
                c.explanation,
                c.created_at,
                c.stale,
            ],
        )?;
        self.notify_changed("contradictions");
        Ok(())
    }

    pub fn get_contradictions(&self) -> Result<Vec<Contradiction>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, claim_a_id, claim_b_id, explanation, created_at, stale FROM {p}contradictions WHERE stale = 0"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(Contradiction {
                id: Id::from_str(&row.get::<_, String>(0)?),
                claim_a_id: Id::from_str(&row.get::<_, String>(1)?),
                claim_b_id: Id::from_str(&row.get::<_, String>(2)?),
                explanation: row.get(3)?,
                created_at: row.get(4)?,
                stale: row.get(5)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn create_pattern(&self, pattern: &Pattern) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}patterns (id, description, source_claim_ids, created_at, stale)
                 VALUES (?1,?2,?3,?4,?5)"
            ),
            params![
                pattern.id.as_str(),
                pattern.description,
                json::encode(&pattern.source_claim_ids)?,
                pattern.created_at,
                pattern.stale,
            ],
        )?;
        self.notify_changed("patterns");
        Ok(())
    }

    pub fn get_patterns(&self) -> Result<Vec<Pattern>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, description, source_claim_ids, created_at, stale FROM {p}patterns WHERE stale = 0"
        ))?;
        let rows = stmt.query_map([], |row| {
            let ids_raw: String = row.get(2)?;
            Ok(Pattern {
                id: Id::from_str(&row.get::<_, String>(0)?),
                description: row.get(1)?,
                source_claim_ids: json::decode(&ids_raw).unwrap_or_default(),
                created_at: row.get(3)?,
                stale: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn create_value(&self, value: &Value) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}observed_values (id, statement, source_claim_ids, created_at, stale)
                 VALUES (?1,?2,?3,?4,?5)"
            ),
            params![
                value.id.as_str(),
                value.statement,
                json::encode(&value.source_claim_ids)?,
                value.created_at,
                value.stale,
            ],
        )?;
        self.notify_changed("observed_values");
        Ok(())
    }

    pub fn get_values(&self) -> Result<Vec<Value>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, statement, source_claim_ids, created_at, stale FROM {p}observed_values WHERE stale = 0"
        ))?;
        let rows = stmt.query_map([], |row| {
            let ids_raw: String = row.get(2)?;
            Ok(Value {
                id: Id::from_str(&row.get::<_, String>(0)?),
                statement: row.get(1)?,
                source_claim_ids: json::decode(&ids_raw).unwrap_or_default(),
                created_at: row.get(3)?,
                stale: row.get(4)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_synthesis_cache(&self, synthesis_type: &str, cache_key: &str) -> Result<Option<SynthesisCache>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, synthesis_type, cache_key, content, source_claims, created_at, stale, ttl_seconds
             FROM {p}synthesis_cache WHERE synthesis_type = ?1 AND cache_key = ?2"
        ))?;
        let mut rows = stmt.query(params![synthesis_type, cache_key])?;
        match rows.next()? {
            Some(row) => {
                let ids_raw: String = row.get(4)?;
                Ok(Some(SynthesisCache {
                    id: Id::from_str(&row.get::<_, String>(0)?),
                    synthesis_type: row.get(1)?,
                    cache_key: row.get(2)?,
                    content: row.get(3)?,
                    source_claims: json::decode(&ids_raw).unwrap_or_default(),
                    created_at: row.get(5)?,
                    stale: row.get(6)?,
                    ttl_seconds: row.get(7)?,
                }))
            }
            None => Ok(None),
        }
    }

    pub fn put_synthesis_cache(&self, entry: &SynthesisCache) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}synthesis_cache
                 (id, synthesis_type, cache_key, content, source_claims, created_at, stale, ttl_seconds)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
                 ON CONFLICT(synthesis_type, cache_key) DO UPDATE SET
                   content = excluded.content, source_claims = excluded.source_claims,
                   created_at = excluded.created_at, stale = 0"
            ),
            params![
                entry.id.as_str(),
                entry.synthesis_type,
                entry.cache_key,
                entry.content,
                json::encode(&entry.source_claims)?,
                entry.created_at,
                entry.stale,
                entry.ttl_seconds,
            ],
        )?;
        Ok(())
    }

    pub fn invalidate_synthesis_cache_for_claim(&self, claim_id: &Id) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("UPDATE {p}synthesis_cache SET stale = 1 WHERE source_claims LIKE ?1"),
            params![format!("%{}%", claim_id.as_str())],
        )?;
        Ok(())
    }

    pub fn get_active_extraction_program(&self) -> Result<Option<ExtractionProgramRecord>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, version, active FROM {p}extraction_programs WHERE active = 1 LIMIT 1"
        ))?;
        let mut rows = stmt.query([])?;
        match rows.next()? {
            Some(row) => Ok(Some(ExtractionProgramRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                version: row.get(2)?,
                active: row.get(3)?,
            })),
            None => Ok(None),
        }
    }

    pub fn register_extraction_program(&self, record: &ExtractionProgramRecord) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}extraction_programs (id, name, version, active) VALUES (?1,?2,?3,?4)
                 ON CONFLICT(id) DO UPDATE SET active = excluded.active"
            ),
            params![record.id, record.name, record.version, record.active],
        )?;
        Ok(())
    }

    pub fn register_observer_program(&self, record: &ObserverProgramRecord) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}observer_programs (id, name, success_rate, active) VALUES (?1,?2,?3,?4)
                 ON CONFLICT(id) DO NOTHING"
            ),
            params![record.id, record.name, record.success_rate, record.active],
        )?;
        Ok(())
    }

    pub fn update_observer_success_rate(&self, id: &str, success_rate: f64) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("UPDATE {p}observer_programs SET success_rate = ?1 WHERE id = ?2"),
            params![success_rate, id],
        )?;
        Ok(())
    }

    pub fn get_observer_programs(&self) -> Result<Vec<ObserverProgramRecord>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, name, success_rate, active FROM {p}observer_programs"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(ObserverProgramRecord {
                id: row.get(0)?,
                name: row.get(1)?,
                success_rate: row.get(2)?,
                active: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
