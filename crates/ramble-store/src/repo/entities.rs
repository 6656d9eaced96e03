use rusqlite::params;

use ramble_core::{Entity, Id, Millis};

use crate::error::Result;
use crate::json;
use crate::store::Store;

impl Store {
    /// Insert a new entity, or bump `mention_count`/`last_referenced` on an
    /// existing one whose trimmed, lowercased name matches. Returns the
    /// record and whether it was freshly created.
    pub fn find_or_create_entity(
        &self,
        canonical_name: &str,
        entity_type: &str,
        now: Millis,
    ) -> Result<(Entity, bool)> {
        let p = self.prefix();
        let name_key = canonical_name.trim().to_lowercase();
        let result = self.transaction(|tx| {
            let existing: Option<(String, String, u32, Millis)> = tx
                .query_row(
                    &format!(
                        "SELECT id, aliases, mention_count, first_mentioned
                         FROM {p}entities WHERE name_key = ?1 AND entity_type = ?2"
                    ),
                    params![name_key, entity_type],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .ok();

            if let Some((id, aliases_raw, mention_count, first_mentioned)) = existing {
                tx.execute(
                    &format!(
                        "UPDATE {p}entities SET mention_count = mention_count + 1, last_referenced = ?1 WHERE id = ?2"
                    ),
                    params![now, id],
                )?;
                let aliases: Vec<String> = json::decode(&aliases_raw)?;
                return Ok((
                    Entity {
                        id: Id::from_str(&id),
                        canonical_name: canonical_name.to_string(),
                        entity_type: entity_type.to_string(),
                        aliases,
                        mention_count: mention_count + 1,
                        first_mentioned,
                        last_referenced: now,
                    },
                    false,
                ));
            }

            let entity = Entity {
                id: Id::new(),
                canonical_name: canonical_name.to_string(),
                entity_type: entity_type.to_string(),
                aliases: Vec::new(),
                mention_count: 1,
                first_mentioned: now,
                last_referenced: now,
            };
            tx.execute(
                &format!(
                    "INSERT INTO {p}entities (id, canonical_name, entity_type, aliases, mention_count, first_mentioned, last_referenced)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
                ),
                params![
                    entity.id.as_str(),
                    entity.canonical_name,
                    entity.entity_type,
                    json::encode(&entity.aliases)?,
                    entity.mention_count,
                    entity.first_mentioned,
                    entity.last_referenced,
                ],
            )?;
            Ok((entity, true))
        });
        if result.is_ok() {
            self.notify_changed("entities");
        }
        result
    }

    pub fn add_entity_alias(&self, id: &Id, alias: &str) -> Result<()> {
        let p = self.prefix();
        self.transaction(|tx| {
            let raw: String = tx.query_row(
                &format!("SELECT aliases FROM {p}entities WHERE id = ?1"),
                params![id.as_str()],
                |r| r.get(0),
            )?;
            let mut aliases: Vec<String> = json::decode(&raw)?;
            if !aliases.iter().any(|a| a == alias) {
                aliases.push(alias.to_string());
            }
            tx.execute(
                &format!("UPDATE {p}entities SET aliases = ?1 WHERE id = ?2"),
                params![json::encode(&aliases)?, id.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn get_entity(&self, id: &Id) -> Result<Option<Entity>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, canonical_name, entity_type, aliases, mention_count, first_mentioned, last_referenced
             FROM {p}entities WHERE id = ?1"
        ))?;
        let mut rows = stmt.query(params![id.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_entity(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_all_entities(&self) -> Result<Vec<Entity>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT id, canonical_name, entity_type, aliases, mention_count, first_mentioned, last_referenced
             FROM {p}entities ORDER BY last_referenced DESC"
        ))?;
        let rows = stmt.query_map([], row_to_entity)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn row_to_entity(row: &rusqlite::Row) -> rusqlite::Result<Entity> {
    let id: String = row.get(0)?;
    let aliases_raw: String = row.get(3)?;
    let aliases: Vec<String> = json::decode(&aliases_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(Entity {
        id: Id::from_str(&id),
        canonical_name: row.get(1)?,
        entity_type: row.get(2)?,
        aliases,
        mention_count: row.get(4)?,
        first_mentioned: row.get(5)?,
        last_referenced: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramble_core::now_millis;

    #[test]
    fn find_or_create_is_idempotent_across_case_and_whitespace() {
        let store = Store::in_memory("default").unwrap();
        let now = now_millis();

        let (first, created_first) = store.find_or_create_entity("Alice", "person", now).unwrap();
        assert!(created_first);
        assert_eq!(first.mention_count, 1);

        let (second, created_second) = store.find_or_create_entity(" alice ", "person", now).unwrap();
        assert!(!created_second);
        assert_eq!(second.id, first.id);
        assert_eq!(second.mention_count, 2);

        assert_eq!(store.get_all_entities().unwrap().len(), 1);
    }
}
