use std::collections::HashMap;

use rusqlite::params;

use ramble_core::{Correction, Id, Vocabulary};

use crate::error::Result;
use crate::json;
use crate::store::Store;

impl Store {
    pub fn upsert_correction(&self, correction: &Correction) -> Result<Correction> {
        let p = self.prefix();
        let result = self.transaction(|tx| {
            let existing: Option<(String, u32)> = tx
                .query_row(
                    &format!("SELECT id, usage_count FROM {p}corrections WHERE wrong_text = ?1"),
                    params![correction.wrong_text],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .ok();

            if let Some((id, usage_count)) = existing {
                tx.execute(
                    &format!(
                        "UPDATE {p}corrections SET correct_text = ?1, usage_count = ?2, last_used = ?3 WHERE id = ?4"
                    ),
                    params![correction.correct_text, usage_count + 1, correction.last_used, id],
                )?;
                return Ok(Correction {
                    id: Id::from_str(&id),
                    usage_count: usage_count + 1,
                    ..correction.clone()
                });
            }

            tx.execute(
                &format!(
                    "INSERT INTO {p}corrections
                     (id, wrong_text, correct_text, original_case, usage_count, created_at, last_used, source_unit_id)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8)"
                ),
                params![
                    correction.id.as_str(),
                    correction.wrong_text,
                    correction.correct_text,
                    correction.original_case,
                    correction.usage_count,
                    correction.created_at,
                    correction.last_used,
                    correction.source_unit_id.as_ref().map(|i| i.as_str().to_string()),
                ],
            )?;
            Ok(correction.clone())
        });
        if result.is_ok() {
            self.notify_changed("corrections");
        }
        result
    }

    pub fn get_correction_for(&self, wrong_text: &str) -> Result<Option<Correction>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, wrong_text, correct_text, original_case, usage_count, created_at, last_used, source_unit_id
             FROM {p}corrections WHERE wrong_text = ?1"
        ))?;
        let mut rows = stmt.query(params![wrong_text])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_correction(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_all_corrections(&self) -> Result<Vec<Correction>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, wrong_text, correct_text, original_case, usage_count, created_at, last_used, source_unit_id
             FROM {p}corrections ORDER BY usage_count DESC"
        ))?;
        let rows = stmt.query_map([], row_to_correction)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn upsert_vocabulary(&self, entry: &Vocabulary) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}vocabulary
                 (id, correct_spelling, entity_type, context_hints, phonetic_primary,
                  phonetic_secondary, usage_count, variant_counts)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8)
                 ON CONFLICT(id) DO UPDATE SET
                   usage_count = excluded.usage_count,
                   variant_counts = excluded.variant_counts,
                   context_hints = excluded.context_hints"
            ),
            params![
                entry.id.as_str(),
                entry.correct_spelling,
                entry.entity_type,
                json::encode(&entry.context_hints)?,
                entry.phonetic_primary,
                entry.phonetic_secondary,
                entry.usage_count,
                json::encode(&entry.variant_counts)?,
            ],
        )?;
        self.notify_changed("vocabulary");
        Ok(())
    }

    pub fn get_vocabulary_by_phonetic(&self, code: &str) -> Result<Vec<Vocabulary>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, correct_spelling, entity_type, context_hints, phonetic_primary,
                    phonetic_secondary, usage_count, variant_counts
             FROM {p}vocabulary WHERE phonetic_primary = ?1 OR phonetic_secondary = ?1"
        ))?;
        let rows = stmt.query_map(params![code], row_to_vocabulary)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_all_vocabulary(&self) -> Result<Vec<Vocabulary>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, correct_spelling, entity_type, context_hints, phonetic_primary,
                    phonetic_secondary, usage_count, variant_counts
             FROM {p}vocabulary"
        ))?;
        let rows = stmt.query_map([], row_to_vocabulary)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn row_to_correction(row: &rusqlite::Row) -> rusqlite::Result<Correction> {
    let id: String = row.get(0)?;
    let source_unit_id: Option<String> = row.get(7)?;
    Ok(Correction {
        id: Id::from_str(&id),
        wrong_text: row.get(1)?,
        correct_text: row.get(2)?,
        original_case: row.get(3)?,
        usage_count: row.get(4)?,
        created_at: row.get(5)?,
        last_used: row.get(6)?,
        source_unit_id: source_unit_id.map(|s| Id::from_str(&s)),
    })
}

fn row_to_vocabulary(row: &rusqlite::Row) -> rusqlite::Result<Vocabulary> {
    let id: String = row.get(0)?;
    let context_hints_raw: String = row.get(3)?;
    let variant_counts_raw: String = row.get(7)?;
    let context_hints: Vec<String> = json::decode(&context_hints_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;
    let variant_counts: HashMap<String, u32> = json::decode(&variant_counts_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Vocabulary {
        id: Id::from_str(&id),
        correct_spelling: row.get(1)?,
        entity_type: row.get(2)?,
        context_hints,
        phonetic_primary: row.get(4)?,
        phonetic_secondary: row.get(5)?,
        usage_count: row.get(6)?,
        variant_counts,
    })
}
