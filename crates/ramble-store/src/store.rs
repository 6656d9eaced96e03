use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use regex::Regex;
use rusqlite::Connection;
use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::migrations;

/// SQLite-backed store for one profile's knowledge graph.
///
/// All tables for a profile live in the same database file, prefixed with
/// `{profile}_` (the `"default"` profile is unprefixed). A single mutex
/// around the connection makes every write serialize; reads pay the same
/// cost since SQLite itself only allows one writer at a time under WAL.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
    profile: String,
    table_changed: broadcast::Sender<&'static str>,
}

fn validate_profile(profile: &str) -> Result<()> {
    let re = Regex::new(r"^[a-z0-9-]{1,50}$").expect("static regex");
    if profile == "default" || re.is_match(profile) {
        Ok(())
    } else {
        Err(StoreError::InvalidProfile(profile.to_string()))
    }
}

impl Store {
    /// Open (creating if absent) the database for `profile` under `base_dir`.
    pub fn open(base_dir: &Path, profile: &str) -> Result<Self> {
        validate_profile(profile)?;
        std::fs::create_dir_all(base_dir)
            .map_err(|e| StoreError::Backend(format!("cannot create {}: {e}", base_dir.display())))?;

        let path = base_dir.join("ramble.sqlite3");
        let conn = Connection::open(&path)?;
        Self::from_connection(conn, profile, &path)
    }

    /// Open an in-memory database (tests).
    pub fn in_memory(profile: &str) -> Result<Self> {
        validate_profile(profile)?;
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, profile, Path::new(":memory:"))
    }

    fn from_connection(conn: Connection, profile: &str, path: &Path) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
        conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (id INTEGER PRIMARY KEY);")?;

        let current: i64 = conn
            .query_row("SELECT COALESCE(MAX(id), 0) FROM schema_version", [], |r| r.get(0))
            .unwrap_or(0);

        let prefix = Self::table_prefix(profile);
        let mut conn = conn;
        {
            let tx = conn.transaction().map_err(StoreError::from)?;
            for m in migrations::all() {
                if m.id > current {
                    (m.up)(&tx, &prefix)?;
                    tx.execute("INSERT INTO schema_version (id) VALUES (?1)", [m.id])
                        .map_err(StoreError::from)?;
                }
            }
            tx.commit().map_err(StoreError::from)?;
        }

        debug!(path = %path.display(), profile, "store opened");
        let (tx, _rx) = broadcast::channel(256);
        Ok(Self {
            conn: Mutex::new(conn),
            profile: profile.to_string(),
            table_changed: tx,
        })
    }

    fn table_prefix(profile: &str) -> String {
        if profile == "default" {
            String::new()
        } else {
            format!("{}_", profile.replace('-', "_"))
        }
    }

    pub fn prefix(&self) -> String {
        Self::table_prefix(&self.profile)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    /// Run `f` inside a single transaction; any `Err` rolls the batch back.
    pub fn transaction<T>(&self, f: impl FnOnce(&rusqlite::Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().expect("store mutex poisoned");
        let tx = conn.transaction().map_err(StoreError::from)?;
        let result = f(&tx)?;
        tx.commit().map_err(StoreError::from)?;
        Ok(result)
    }

    /// Signal that rows in `table` changed, waking any `observe` subscribers.
    pub fn notify_changed(&self, table: &'static str) {
        let _ = self.table_changed.send(table);
    }

    /// Subscribe to a table, re-running `loader` against the current
    /// connection state whenever a write touches it. The returned receiver
    /// is seeded with the snapshot at subscribe time.
    pub fn observe<T>(
        self: &Arc<Self>,
        table: &'static str,
        loader: impl Fn(&Store) -> Result<Vec<T>> + Send + Sync + 'static,
    ) -> watch::Receiver<Vec<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let initial = loader(self).unwrap_or_default();
        let (tx, rx) = watch::channel(initial);
        let mut changes = self.table_changed.subscribe();
        let store = Arc::clone(self);

        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(changed_table) if changed_table == table => {
                        if let Ok(rows) = loader(&store) {
                            if tx.send(rows).is_err() {
                                break;
                            }
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        rx
    }
}

pub fn default_data_dir() -> PathBuf {
    std::env::var("HOME")
        .map(|h| PathBuf::from(h).join(".ramble"))
        .unwrap_or_else(|_| PathBuf::from(".ramble"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_in_memory_default_profile() {
        let store = Store::in_memory("default").unwrap();
        assert_eq!(store.prefix(), "");
    }

    #[test]
    fn rejects_invalid_profile_name() {
        let err = Store::in_memory("Not Valid!").unwrap_err();
        assert!(matches!(err, StoreError::InvalidProfile(_)));
    }

    #[test]
    fn prefixes_tables_for_named_profile() {
        let store = Store::in_memory("work-profile").unwrap();
        assert_eq!(store.prefix(), "work_profile_");
        let conn = store.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='work_profile_claims'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn transaction_rolls_back_on_error() {
        let store = Store::in_memory("default").unwrap();
        let result: Result<()> = store.transaction(|tx| {
            tx.execute(
                "INSERT INTO sessions (id, started_at, ended_at, unit_count, summary, mood_trajectory) VALUES ('s1', 0, NULL, 0, NULL, NULL)",
                [],
            )
            .map_err(StoreError::from)?;
            Err(StoreError::Backend("forced failure".into()))
        });
        assert!(result.is_err());
        let conn = store.conn();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
