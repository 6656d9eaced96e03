use rusqlite::params;

use ramble_core::{Claim, ClaimState, Id, MemoryTier, Millis, Stakes, Temporality};

use crate::error::Result;
use crate::json;
use crate::store::Store;

impl Store {
    pub fn create_claim(&self, claim: &Claim, source_unit_id: &Id) -> Result<()> {
        let p = self.prefix();
        self.transaction(|tx| {
            insert_claim(tx, &p, claim)?;
            tx.execute(
                &format!("INSERT INTO {p}claim_sources (claim_id, unit_id) VALUES (?1, ?2)"),
                params![claim.id.as_str(), source_unit_id.as_str()],
            )?;
            Ok(())
        })?;
        self.notify_changed("claims");
        Ok(())
    }

    pub fn add_claim_source(&self, claim_id: &Id, unit_id: &Id) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT OR IGNORE INTO {p}claim_sources (claim_id, unit_id) VALUES (?1, ?2)"
            ),
            params![claim_id.as_str(), unit_id.as_str()],
        )?;
        Ok(())
    }

    pub fn update_claim(&self, claim: &Claim) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "UPDATE {p}claims SET
                    statement = ?2, subject = ?3, claim_type = ?4, temporality = ?5,
                    abstraction = ?6, source_type = ?7, initial_confidence = ?8,
                    current_confidence = ?9, state = ?10, emotional_valence = ?11,
                    emotional_intensity = ?12, stakes = ?13, valid_from = ?14,
                    valid_until = ?15, last_confirmed = ?16, confirmation_count = ?17,
                    superseded_by = ?18, elaborates = ?19, memory_tier = ?20,
                    salience = ?21, promoted_at = ?22, last_accessed = ?23
                 WHERE id = ?1"
            ),
            params![
                claim.id.as_str(),
                claim.statement,
                claim.subject,
                claim.claim_type,
                json::enum_to_str(&claim.temporality)?,
                claim.abstraction,
                claim.source_type,
                claim.initial_confidence,
                claim.current_confidence,
                json::enum_to_str(&claim.state)?,
                claim.emotional_valence,
                claim.emotional_intensity,
                json::enum_to_str(&claim.stakes)?,
                claim.valid_from,
                claim.valid_until,
                claim.last_confirmed,
                claim.confirmation_count,
                claim.superseded_by.as_ref().map(|i| i.as_str().to_string()),
                claim.elaborates.as_ref().map(|i| i.as_str().to_string()),
                json::enum_to_str(&claim.memory_tier)?,
                claim.salience,
                claim.promoted_at,
                claim.last_accessed,
            ],
        )?;
        self.notify_changed("claims");
        Ok(())
    }

    pub fn record_claim_access(&self, id: &Id, at: Millis) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("UPDATE {p}claims SET last_accessed = ?1 WHERE id = ?2"),
            params![at, id.as_str()],
        )?;
        Ok(())
    }

    pub fn get_claim(&self, id: &Id) -> Result<Option<Claim>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", select_claims_sql(&p)))?;
        let mut rows = stmt.query(params![id.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_claim(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_active_claims(&self) -> Result<Vec<Claim>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE state = 'active' ORDER BY salience DESC",
            select_claims_sql(&p)
        ))?;
        let rows = stmt.query_map([], row_to_claim)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_claims_by_subject(&self, subject: &str) -> Result<Vec<Claim>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE subject = ?1 ORDER BY created_at DESC",
            select_claims_sql(&p)
        ))?;
        let rows = stmt.query_map(params![subject], row_to_claim)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_claims_by_tier(&self, tier: MemoryTier) -> Result<Vec<Claim>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE memory_tier = ?1 ORDER BY salience DESC",
            select_claims_sql(&p)
        ))?;
        let rows = stmt.query_map(params![json::enum_to_str(&tier)?], row_to_claim)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_all_claims(&self) -> Result<Vec<Claim>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&select_claims_sql(&p))?;
        let rows = stmt.query_map([], row_to_claim)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_units_for_claim(&self, claim_id: &Id) -> Result<Vec<Id>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT unit_id FROM {p}claim_sources WHERE claim_id = ?1"
        ))?;
        let rows = stmt.query_map(params![claim_id.as_str()], |r| {
            let s: String = r.get(0)?;
            Ok(Id::from_str(&s))
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn select_claims_sql(p: &str) -> String {
    format!(
        "SELECT id, statement, subject, claim_type, temporality, abstraction, source_type,
                initial_confidence, current_confidence, state, emotional_valence,
                emotional_intensity, stakes, valid_from, valid_until, created_at,
                last_confirmed, confirmation_count, extraction_program_id, superseded_by,
                elaborates, memory_tier, salience, promoted_at, last_accessed
         FROM {p}claims"
    )
}

fn insert_claim(tx: &rusqlite::Transaction, p: &str, claim: &Claim) -> Result<()> {
    tx.execute(
        &format!(
            "INSERT INTO {p}claims
             (id, statement, subject, claim_type, temporality, abstraction, source_type,
              initial_confidence, current_confidence, state, emotional_valence,
              emotional_intensity, stakes, valid_from, valid_until, created_at,
              last_confirmed, confirmation_count, extraction_program_id, superseded_by,
              elaborates, memory_tier, salience, promoted_at, last_accessed)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22,?23,?24,?25)"
        ),
        params![
            claim.id.as_str(),
            claim.statement,
            claim.subject,
            claim.claim_type,
            json::enum_to_str(&claim.temporality)?,
            claim.abstraction,
            claim.source_type,
            claim.initial_confidence,
            claim.current_confidence,
            json::enum_to_str(&claim.state)?,
            claim.emotional_valence,
            claim.emotional_intensity,
            json::enum_to_str(&claim.stakes)?,
            claim.valid_from,
            claim.valid_until,
            claim.created_at,
            claim.last_confirmed,
            claim.confirmation_count,
            claim.extraction_program_id,
            claim.superseded_by.as_ref().map(|i| i.as_str().to_string()),
            claim.elaborates.as_ref().map(|i| i.as_str().to_string()),
            json::enum_to_str(&claim.memory_tier)?,
            claim.salience,
            claim.promoted_at,
            claim.last_accessed,
        ],
    )?;
    Ok(())
}

fn row_to_claim(row: &rusqlite::Row) -> rusqlite::Result<Claim> {
    let id: String = row.get(0)?;
    let temporality_raw: String = row.get(4)?;
    let state_raw: String = row.get(9)?;
    let stakes_raw: String = row.get(12)?;
    let tier_raw: String = row.get(21)?;
    let superseded_by: Option<String> = row.get(19)?;
    let elaborates: Option<String> = row.get(20)?;

    let temporality: Temporality = conv(4, &temporality_raw)?;
    let state: ClaimState = conv(9, &state_raw)?;
    let stakes: Stakes = conv(12, &stakes_raw)?;
    let memory_tier: MemoryTier = conv(21, &tier_raw)?;

    Ok(Claim {
        id: Id::from_str(&id),
        statement: row.get(1)?,
        subject: row.get(2)?,
        claim_type: row.get(3)?,
        temporality,
        abstraction: row.get(5)?,
        source_type: row.get(6)?,
        initial_confidence: row.get(7)?,
        current_confidence: row.get(8)?,
        state,
        emotional_valence: row.get(10)?,
        emotional_intensity: row.get(11)?,
        stakes,
        valid_from: row.get(13)?,
        valid_until: row.get(14)?,
        created_at: row.get(15)?,
        last_confirmed: row.get(16)?,
        confirmation_count: row.get(17)?,
        extraction_program_id: row.get(18)?,
        superseded_by: superseded_by.map(|s| Id::from_str(&s)),
        elaborates: elaborates.map(|s| Id::from_str(&s)),
        memory_tier,
        salience: row.get(22)?,
        promoted_at: row.get(23)?,
        last_accessed: row.get(24)?,
    })
}

fn conv<T: serde::de::DeserializeOwned>(col: usize, raw: &str) -> rusqlite::Result<T> {
    json::enum_from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e)))
}
