//! Layer-1 primitives (propositions, stances, spans, entity mentions). These
//! are written once per conversation unit by the extraction pipeline and
//! read back only for debugging/inspection, so they get a flatter
//! insert-and-list API than the claim/goal repositories.

use rusqlite::params;

use ramble_core::{Attitude, EntityMention, Id, Proposition, Span, Stance};

use crate::error::Result;
use crate::json;
use crate::store::Store;

impl Store {
    pub fn create_proposition(&self, prop: &Proposition) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("INSERT INTO {p}propositions (id, unit_id, tokens) VALUES (?1, ?2, ?3)"),
            params![prop.id.as_str(), prop.unit_id.as_str(), prop.tokens],
        )?;
        Ok(())
    }

    pub fn create_stance(&self, stance: &Stance) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}stances (id, proposition_id, attitude, intensity) VALUES (?1, ?2, ?3, ?4)"
            ),
            params![
                stance.id.as_str(),
                stance.proposition_id.as_str(),
                json::enum_to_str(&stance.attitude)?,
                stance.intensity,
            ],
        )?;
        Ok(())
    }

    pub fn create_span(&self, span: &Span) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}spans (id, unit_id, char_start, char_end, text) VALUES (?1, ?2, ?3, ?4, ?5)"
            ),
            params![span.id.as_str(), span.unit_id.as_str(), span.char_start, span.char_end, span.text],
        )?;
        Ok(())
    }

    pub fn create_entity_mention(&self, mention: &EntityMention) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}entity_mentions (id, entity_id, span_id) VALUES (?1, ?2, ?3)"
            ),
            params![mention.id.as_str(), mention.entity_id.as_str(), mention.span_id.as_str()],
        )?;
        Ok(())
    }

    pub fn get_stances_for_unit(&self, unit_id: &Id) -> Result<Vec<Stance>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT s.id, s.proposition_id, s.attitude, s.intensity
             FROM {p}stances s JOIN {p}propositions pr ON pr.id = s.proposition_id
             WHERE pr.unit_id = ?1"
        ))?;
        let rows = stmt.query_map(params![unit_id.as_str()], |row| {
            let id: String = row.get(0)?;
            let proposition_id: String = row.get(1)?;
            let attitude_raw: String = row.get(2)?;
            let attitude: Attitude = json::enum_from_str(&attitude_raw).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
            })?;
            Ok(Stance {
                id: Id::from_str(&id),
                proposition_id: Id::from_str(&proposition_id),
                attitude,
                intensity: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}
