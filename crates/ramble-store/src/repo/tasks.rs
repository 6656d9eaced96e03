use rusqlite::params;

use ramble_core::{BackoffConfig, Checkpoint, Id, Millis, Task, TaskPriority, TaskStatus};

use crate::error::Result;
use crate::json;
use crate::store::Store;

impl Store {
    pub fn create_task(&self, task: &Task) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}tasks
                 (id, task_type, payload, status, priority, priority_value, attempts,
                  max_attempts, last_error, next_retry_at, backoff_config, checkpoint,
                  created_at, started_at, completed_at, execute_at, group_id, depends_on, session_id)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19)"
            ),
            rusqlite::params_from_iter(task_insert_params(task)?),
        )?;
        self.notify_changed("tasks");
        Ok(())
    }

    /// Atomically claim the next eligible task: pending or retry-ready,
    /// with satisfied dependency, highest priority first.
    pub fn claim_next_task(&self, now: Millis) -> Result<Option<Task>> {
        let p = self.prefix();
        self.transaction(|tx| {
            let row: Option<String> = tx
                .query_row(
                    &format!(
                        "SELECT id FROM {p}tasks
                         WHERE (status = 'pending' OR (status = 'failed' AND next_retry_at <= ?1))
                           AND execute_at <= ?1
                           AND (depends_on IS NULL OR depends_on IN
                                (SELECT id FROM {p}tasks WHERE status = 'completed'))
                         ORDER BY priority_value DESC, execute_at ASC
                         LIMIT 1"
                    ),
                    params![now],
                    |r| r.get(0),
                )
                .ok();

            let Some(id) = row else { return Ok(None) };

            tx.execute(
                &format!("UPDATE {p}tasks SET status = 'processing', started_at = ?1 WHERE id = ?2"),
                params![now, id],
            )?;

            let mut stmt = tx.prepare(&format!("{} WHERE id = ?1", select_tasks_sql(&p)))?;
            let task = stmt.query_row(params![id], row_to_task)?;
            Ok(Some(task))
        })
    }

    pub fn save_checkpoint(&self, id: &Id, checkpoint: &Checkpoint) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("UPDATE {p}tasks SET checkpoint = ?1 WHERE id = ?2"),
            params![json::encode(checkpoint)?, id.as_str()],
        )?;
        Ok(())
    }

    pub fn complete_task(&self, id: &Id, completed_at: Millis) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "UPDATE {p}tasks SET status = 'completed', completed_at = ?1 WHERE id = ?2"
            ),
            params![completed_at, id.as_str()],
        )?;
        self.notify_changed("tasks");
        Ok(())
    }

    /// Records a failed attempt. With retries left (`next_retry_at` set)
    /// the task goes back to `pending` so `claim_next_task` can pick it up
    /// again; once attempts are exhausted (`next_retry_at` is `None`) it
    /// becomes `failed`, a terminal state.
    pub fn fail_task(
        &self,
        id: &Id,
        error: &str,
        attempts: u32,
        next_retry_at: Option<Millis>,
    ) -> Result<()> {
        let p = self.prefix();
        let status = if next_retry_at.is_some() { "pending" } else { "failed" };
        self.conn().execute(
            &format!(
                "UPDATE {p}tasks SET status = ?1, last_error = ?2, attempts = ?3, next_retry_at = ?4 WHERE id = ?5"
            ),
            params![status, error, attempts, next_retry_at, id.as_str()],
        )?;
        self.notify_changed("tasks");
        Ok(())
    }

    pub fn pause_task(&self, id: &Id) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!("UPDATE {p}tasks SET status = 'paused' WHERE id = ?1"),
            params![id.as_str()],
        )?;
        Ok(())
    }

    /// Recover tasks stuck `processing` past `stale_after_secs` back to
    /// `pending` so a crashed worker doesn't strand them.
    pub fn recover_stale_tasks(&self, now: Millis, stale_after_ms: i64) -> Result<usize> {
        let p = self.prefix();
        let threshold = now - stale_after_ms;
        let n = self.conn().execute(
            &format!(
                "UPDATE {p}tasks SET status = 'pending'
                 WHERE status = 'processing' AND started_at < ?1"
            ),
            params![threshold],
        )?;
        if n > 0 {
            self.notify_changed("tasks");
        }
        Ok(n)
    }

    pub fn get_task(&self, id: &Id) -> Result<Option<Task>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", select_tasks_sql(&p)))?;
        let mut rows = stmt.query(params![id.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_task(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{} WHERE status = ?1", select_tasks_sql(&p)))?;
        let rows = stmt.query_map(params![json::enum_to_str(&status)?], row_to_task)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_all_tasks(&self) -> Result<Vec<Task>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&select_tasks_sql(&p))?;
        let rows = stmt.query_map([], row_to_task)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn task_insert_params(task: &Task) -> Result<Vec<Box<dyn rusqlite::ToSql>>> {
    Ok(vec![
        Box::new(task.id.as_str().to_string()),
        Box::new(task.task_type.clone()),
        Box::new(json::encode(&task.payload)?),
        Box::new(json::enum_to_str(&task.status)?),
        Box::new(json::enum_to_str(&task.priority)?),
        Box::new(task.priority_value),
        Box::new(task.attempts),
        Box::new(task.max_attempts),
        Box::new(task.last_error.clone()),
        Box::new(task.next_retry_at),
        Box::new(json::encode(&task.backoff_config)?),
        Box::new(match &task.checkpoint {
            Some(c) => Some(json::encode(c)?),
            None => None,
        }),
        Box::new(task.created_at),
        Box::new(task.started_at),
        Box::new(task.completed_at),
        Box::new(task.execute_at),
        Box::new(task.group_id.clone()),
        Box::new(task.depends_on.as_ref().map(|i| i.as_str().to_string())),
        Box::new(task.session_id.as_ref().map(|i| i.as_str().to_string())),
    ])
}

fn select_tasks_sql(p: &str) -> String {
    format!(
        "SELECT id, task_type, payload, status, priority, priority_value, attempts,
                max_attempts, last_error, next_retry_at, backoff_config, checkpoint,
                created_at, started_at, completed_at, execute_at, group_id, depends_on, session_id
         FROM {p}tasks"
    )
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let id: String = row.get(0)?;
    let payload_raw: String = row.get(2)?;
    let status_raw: String = row.get(3)?;
    let priority_raw: String = row.get(4)?;
    let backoff_raw: String = row.get(10)?;
    let checkpoint_raw: Option<String> = row.get(11)?;
    let group_id: Option<String> = row.get(16)?;
    let depends_on: Option<String> = row.get(17)?;
    let session_id: Option<String> = row.get(18)?;

    let payload = json::decode(&payload_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e)))?;
    let status: TaskStatus = conv(3, &status_raw)?;
    let priority: TaskPriority = conv(4, &priority_raw)?;
    let backoff_config: BackoffConfig = json::decode(&backoff_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(10, rusqlite::types::Type::Text, Box::new(e)))?;
    let checkpoint: Option<Checkpoint> = match checkpoint_raw {
        Some(raw) => Some(
            json::decode(&raw)
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e)))?,
        ),
        None => None,
    };

    Ok(Task {
        id: Id::from_str(&id),
        task_type: row.get(1)?,
        payload,
        status,
        priority,
        priority_value: row.get(5)?,
        attempts: row.get(6)?,
        max_attempts: row.get(7)?,
        last_error: row.get(8)?,
        next_retry_at: row.get(9)?,
        backoff_config,
        checkpoint,
        created_at: row.get(12)?,
        started_at: row.get(13)?,
        completed_at: row.get(14)?,
        execute_at: row.get(15)?,
        group_id,
        depends_on: depends_on.map(|s| Id::from_str(&s)),
        session_id: session_id.map(|s| Id::from_str(&s)),
    })
}

fn conv<T: serde::de::DeserializeOwned>(col: usize, raw: &str) -> rusqlite::Result<T> {
    json::enum_from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e)))
}
