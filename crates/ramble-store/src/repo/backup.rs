use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::store::Store;

/// Logical table names in backup/restore dependency order:
/// programs first (nothing references them), then conversation history,
/// then the claim graph and everything that hangs off a claim, then
/// corrections/tasks/cache which reference claims only loosely.
pub const BACKUP_TABLE_ORDER: &[&str] = &[
    "extraction_programs",
    "observer_programs",
    "sessions",
    "conversation_units",
    "propositions",
    "stances",
    "spans",
    "entity_mentions",
    "claims",
    "claim_sources",
    "entities",
    "goals",
    "goal_progress_updates",
    "observer_outputs",
    "contradictions",
    "patterns",
    "observed_values",
    "corrections",
    "vocabulary",
    "tasks",
    "synthesis_cache",
    "key_value",
];

impl Store {
    /// Dumps every row of `table` as a JSON object keyed by column name.
    pub fn export_table(&self, table: &str) -> Result<Vec<Map<String, Value>>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT * FROM {p}{table}"))?;
        let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
        let rows = stmt.query_map([], |row| {
            let mut map = Map::new();
            for (i, name) in columns.iter().enumerate() {
                let value: SqlValue = row.get(i)?;
                map.insert(name.clone(), sql_to_json(value));
            }
            Ok(map)
        })?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    /// Replaces every row in `rows` into `table` within one transaction;
    /// the whole table's import fails together if any row does.
    pub fn import_table(&self, table: &str, rows: &[Map<String, Value>]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let p = self.prefix();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for row in rows {
            let columns: Vec<&String> = row.keys().collect();
            let column_list = columns.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");
            let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
            let sql = format!(
                "INSERT OR REPLACE INTO {p}{table} ({column_list}) VALUES ({})",
                placeholders.join(",")
            );
            let values: Vec<SqlValue> = columns.iter().map(|c| json_to_sql(&row[*c])).collect();
            tx.execute(&sql, rusqlite::params_from_iter(values))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes every row from every known table, leaving the schema intact.
    pub fn reset_database(&self) -> Result<()> {
        let p = self.prefix();
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for table in BACKUP_TABLE_ORDER.iter().rev() {
            tx.execute(&format!("DELETE FROM {p}{table}"), [])?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn sql_to_json(value: SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(i),
        SqlValue::Real(f) => Value::from(f),
        SqlValue::Text(s) => Value::from(s),
        SqlValue::Blob(b) => Value::from(b),
    }
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(*b as i64),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                SqlValue::Integer(i)
            } else {
                SqlValue::Real(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ramble_core::{now_millis, Id, Session};

    #[test]
    fn export_then_import_round_trips_a_session() {
        let store = Store::in_memory("default").unwrap();
        let session = Session {
            id: Id::new(),
            started_at: now_millis(),
            ended_at: None,
            unit_count: 3,
            summary: None,
            mood_trajectory: None,
        };
        store.create_session(&session).unwrap();

        let rows = store.export_table("sessions").unwrap();
        assert_eq!(rows.len(), 1);

        let store2 = Store::in_memory("default").unwrap();
        store2.import_table("sessions", &rows).unwrap();
        let restored = store2.get_session(&session.id).unwrap().unwrap();
        assert_eq!(restored.unit_count, 3);
    }
}
