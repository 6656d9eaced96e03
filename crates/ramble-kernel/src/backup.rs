use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use ramble_core::now_millis;
use ramble_store::{Store, BACKUP_TABLE_ORDER};

use crate::error::{KernelError, Result};

const BACKUP_VERSION: u32 = 1;

/// Fixed backup document shape: every known table's rows keyed
/// by their primary key, in the order they must be restored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupDocument {
    pub version: u32,
    pub exported_at: i64,
    pub tables: Map<String, Value>,
}

pub fn export_backup(store: &Store) -> Result<BackupDocument> {
    let mut tables = Map::new();
    for table in BACKUP_TABLE_ORDER {
        let rows = store.export_table(table)?;
        tables.insert(table.to_string(), Value::Array(rows.into_iter().map(Value::Object).collect()));
    }
    Ok(BackupDocument { version: BACKUP_VERSION, exported_at: now_millis(), tables })
}

/// Imports every table in `BACKUP_TABLE_ORDER`, one Store transaction per
/// table. Aborts on the first table whose rows fail to restore, leaving
/// every table imported before it in place.
pub fn import_backup(store: &Store, doc: &BackupDocument) -> Result<()> {
    if doc.version != BACKUP_VERSION {
        return Err(KernelError::MalformedBackup(format!("unsupported backup version {}", doc.version)));
    }
    for table in BACKUP_TABLE_ORDER {
        let Some(value) = doc.tables.get(*table) else {
            continue;
        };
        let rows: Vec<Map<String, Value>> = match value {
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::Object(map) => Ok(map.clone()),
                    other => Err(KernelError::MalformedBackup(format!("table '{table}' row is not an object: {other}"))),
                })
                .collect::<Result<Vec<_>>>()?,
            other => return Err(KernelError::MalformedBackup(format!("table '{table}' is not an array: {other}"))),
        };
        store
            .import_table(table, &rows)
            .map_err(|e| KernelError::RestoreFailed(table.to_string(), e.to_string()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_then_import_round_trips_an_empty_database() {
        let store = Store::in_memory("default").unwrap();
        let doc = export_backup(&store).unwrap();
        assert_eq!(doc.version, BACKUP_VERSION);

        let store2 = Store::in_memory("default").unwrap();
        import_backup(&store2, &doc).unwrap();
    }

    #[test]
    fn rejects_future_backup_versions() {
        let store = Store::in_memory("default").unwrap();
        let mut doc = export_backup(&store).unwrap();
        doc.version = 99;
        let err = import_backup(&store, &doc).unwrap_err();
        assert!(matches!(err, KernelError::MalformedBackup(_)));
    }
}
