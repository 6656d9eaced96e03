use rusqlite::params;

use crate::error::Result;
use crate::store::Store;

impl Store {
    pub fn get_data(&self, key: &str) -> Result<Option<(String, String)>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT value_type, value FROM {p}key_value WHERE key = ?1"))?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
            None => Ok(None),
        }
    }

    pub fn set_data(&self, key: &str, value_type: &str, value: &str, updated_at: i64) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}key_value (key, value_type, value, updated_at) VALUES (?1,?2,?3,?4)
                 ON CONFLICT(key) DO UPDATE SET value_type = excluded.value_type,
                    value = excluded.value, updated_at = excluded.updated_at"
            ),
            params![key, value_type, value, updated_at],
        )?;
        Ok(())
    }

    pub fn delete_data(&self, key: &str) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(&format!("DELETE FROM {p}key_value WHERE key = ?1"), params![key])?;
        Ok(())
    }
}
