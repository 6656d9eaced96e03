use rusqlite::params;

use ramble_core::{Goal, GoalProgressUpdate, GoalStatus, Id, ProgressType, Timeframe};

use crate::error::Result;
use crate::json;
use crate::store::Store;

impl Store {
    pub fn create_goal(&self, goal: &Goal) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}goals
                 (id, statement, goal_type, timeframe, status, parent_goal_id, created_at,
                  last_referenced, priority, progress_type, progress_value, milestones,
                  blockers, source_claim_id, motivation, deadline)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)"
            ),
            rusqlite::params_from_iter(goal_params(goal)?),
        )?;
        self.notify_changed("goals");
        Ok(())
    }

    pub fn update_goal(&self, goal: &Goal) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "UPDATE {p}goals SET
                    statement = ?2, goal_type = ?3, timeframe = ?4, status = ?5,
                    parent_goal_id = ?6, last_referenced = ?8, priority = ?9,
                    progress_type = ?10, progress_value = ?11, milestones = ?12,
                    blockers = ?13, motivation = ?15, deadline = ?16
                 WHERE id = ?1"
            ),
            rusqlite::params_from_iter(goal_params(goal)?),
        )?;
        self.notify_changed("goals");
        Ok(())
    }

    pub fn add_goal_progress_update(&self, update: &GoalProgressUpdate) -> Result<()> {
        let p = self.prefix();
        self.conn().execute(
            &format!(
                "INSERT INTO {p}goal_progress_updates
                 (id, goal_id, value, reason, evidence_claim_id, created_at)
                 VALUES (?1,?2,?3,?4,?5,?6)"
            ),
            params![
                update.id.as_str(),
                update.goal_id.as_str(),
                update.value,
                update.reason,
                update.evidence_claim_id.as_ref().map(|i| i.as_str().to_string()),
                update.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_goal(&self, id: &Id) -> Result<Option<Goal>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", select_goals_sql(&p)))?;
        let mut rows = stmt.query(params![id.as_str()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_goal(row)?)),
            None => Ok(None),
        }
    }

    pub fn get_active_goals(&self) -> Result<Vec<Goal>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE status = 'active' ORDER BY priority DESC, last_referenced DESC",
            select_goals_sql(&p)
        ))?;
        let rows = stmt.query_map([], row_to_goal)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_all_goals(&self) -> Result<Vec<Goal>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&select_goals_sql(&p))?;
        let rows = stmt.query_map([], row_to_goal)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_goal_children(&self, parent_id: &Id) -> Result<Vec<Goal>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE parent_goal_id = ?1 ORDER BY created_at ASC",
            select_goals_sql(&p)
        ))?;
        let rows = stmt.query_map(params![parent_id.as_str()], row_to_goal)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn get_goal_roots(&self) -> Result<Vec<Goal>> {
        let p = self.prefix();
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "{} WHERE parent_goal_id IS NULL ORDER BY priority DESC",
            select_goals_sql(&p)
        ))?;
        let rows = stmt.query_map([], row_to_goal)?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }
}

fn goal_params(goal: &Goal) -> Result<Vec<Box<dyn rusqlite::ToSql>>> {
    Ok(vec![
        Box::new(goal.id.as_str().to_string()),
        Box::new(goal.statement.clone()),
        Box::new(goal.goal_type.clone()),
        Box::new(json::enum_to_str(&goal.timeframe)?),
        Box::new(json::enum_to_str(&goal.status)?),
        Box::new(goal.parent_goal_id.as_ref().map(|i| i.as_str().to_string())),
        Box::new(goal.created_at),
        Box::new(goal.last_referenced),
        Box::new(goal.priority),
        Box::new(json::enum_to_str(&goal.progress_type)?),
        Box::new(goal.progress_value),
        Box::new(json::encode(&goal.milestones)?),
        Box::new(json::encode(&goal.blockers)?),
        Box::new(goal.source_claim_id.as_str().to_string()),
        Box::new(goal.motivation.clone()),
        Box::new(goal.deadline),
    ])
}

fn select_goals_sql(p: &str) -> String {
    format!(
        "SELECT id, statement, goal_type, timeframe, status, parent_goal_id, created_at,
                last_referenced, priority, progress_type, progress_value, milestones,
                blockers, source_claim_id, motivation, deadline
         FROM {p}goals"
    )
}

fn row_to_goal(row: &rusqlite::Row) -> rusqlite::Result<Goal> {
    let id: String = row.get(0)?;
    let timeframe_raw: String = row.get(3)?;
    let status_raw: String = row.get(4)?;
    let parent: Option<String> = row.get(5)?;
    let progress_type_raw: String = row.get(9)?;
    let milestones_raw: String = row.get(11)?;
    let blockers_raw: String = row.get(12)?;
    let source_claim_id: String = row.get(13)?;

    let timeframe: Timeframe = conv(3, &timeframe_raw)?;
    let status: GoalStatus = conv(4, &status_raw)?;
    let progress_type: ProgressType = conv(9, &progress_type_raw)?;
    let milestones = json::decode(&milestones_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(11, rusqlite::types::Type::Text, Box::new(e)))?;
    let blockers = json::decode(&blockers_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(Goal {
        id: Id::from_str(&id),
        statement: row.get(1)?,
        goal_type: row.get(2)?,
        timeframe,
        status,
        parent_goal_id: parent.map(|s| Id::from_str(&s)),
        created_at: row.get(6)?,
        last_referenced: row.get(7)?,
        priority: row.get(8)?,
        progress_type,
        progress_value: row.get(10)?,
        milestones,
        blockers,
        source_claim_id: Id::from_str(&source_claim_id),
        motivation: row.get(14)?,
        deadline: row.get(15)?,
    })
}

fn conv<T: serde::de::DeserializeOwned>(col: usize, raw: &str) -> rusqlite::Result<T> {
    json::enum_from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e)))
}
