use std::sync::Arc;

use ramble_core::{
    now_millis, Blocker, BlockerSeverity, BlockerStatus, Goal, GoalConfig, GoalProgressUpdate, GoalStatus, Id,
    Milestone, Timeframe,
};
use ramble_store::Store;

use crate::error::{GoalError, Result};
use crate::progress_type::infer_progress_type;

/// Parameters accepted by `GoalManager::create_goal` beyond the statement
/// and the claim it was extracted from.
pub struct NewGoal {
    pub statement: String,
    pub goal_type: String,
    pub timeframe: Timeframe,
    pub parent_goal_id: Option<Id>,
    pub motivation: Option<String>,
    pub deadline: Option<i64>,
    pub priority: Option<u8>,
    pub source_claim_id: Id,
}

pub struct GoalManager {
    store: Arc<Store>,
    config: GoalConfig,
}

impl GoalManager {
    pub fn new(store: Arc<Store>, config: GoalConfig) -> Self {
        Self { store, config }
    }

    /// Finds the best fuzzy match among active goals by normalized
    /// Levenshtein distance, or `None` if nothing clears the configured
    /// threshold.
    pub fn find_fuzzy_match(&self, statement: &str) -> Result<Option<Goal>> {
        let goals = self.store.get_active_goals()?;
        let mut best: Option<(Goal, f64)> = None;
        for goal in goals {
            let distance = 1.0 - strsim::normalized_levenshtein(&goal.statement.to_lowercase(), &statement.to_lowercase());
            if distance <= self.config.fuzzy_match_threshold {
                if best.as_ref().map(|(_, d)| distance < *d).unwrap_or(true) {
                    best = Some((goal, distance));
                }
            }
        }
        Ok(best.map(|(g, _)| g))
    }

    pub fn create_goal(&self, new_goal: NewGoal) -> Result<Goal> {
        if let Some(parent_id) = &new_goal.parent_goal_id {
            let depth = self.depth_of(parent_id)?;
            if depth + 1 >= self.config.max_hierarchy_depth {
                return Err(GoalError::TooDeep);
            }
        }

        let now = now_millis();
        let progress_type = infer_progress_type(&new_goal.goal_type, new_goal.timeframe);
        let goal = Goal {
            id: Id::new(),
            statement: new_goal.statement,
            goal_type: new_goal.goal_type,
            timeframe: new_goal.timeframe,
            status: GoalStatus::Active,
            parent_goal_id: new_goal.parent_goal_id,
            created_at: now,
            last_referenced: now,
            priority: new_goal.priority.unwrap_or(50),
            progress_type,
            progress_value: 0.0,
            milestones: Vec::new(),
            blockers: Vec::new(),
            source_claim_id: new_goal.source_claim_id,
            motivation: new_goal.motivation,
            deadline: new_goal.deadline,
        };
        self.store.create_goal(&goal)?;
        Ok(goal)
    }

    /// Walks `parentGoalId` links up to `maxHierarchyDepth` hops to find
    /// the depth of `goal_id`. A chain longer than the bound or a
    /// revisited id is reported as `TooDeep`/`Cycle` rather than looping.
    fn depth_of(&self, goal_id: &Id) -> Result<u32> {
        let mut visited = vec![goal_id.clone()];
        let mut current = self.get(goal_id)?;
        let mut depth = 0u32;
        loop {
            match &current.parent_goal_id {
                None => return Ok(depth),
                Some(parent_id) => {
                    if visited.contains(parent_id) {
                        return Err(GoalError::Cycle);
                    }
                    if depth + 1 >= self.config.max_hierarchy_depth {
                        return Err(GoalError::TooDeep);
                    }
                    visited.push(parent_id.clone());
                    current = self.get(parent_id)?;
                    depth += 1;
                }
            }
        }
    }

    fn get(&self, id: &Id) -> Result<Goal> {
        self.store.get_goal(id)?.ok_or_else(|| GoalError::NotFound(id.clone()))
    }

    pub fn update_progress(
        &self,
        goal_id: &Id,
        value: f64,
        reason: String,
        evidence_claim_id: Option<Id>,
    ) -> Result<Goal> {
        let mut goal = self.get(goal_id)?;
        let clamped = value.clamp(0.0, 100.0);
        goal.progress_value = clamped;
        if clamped >= 100.0 && goal.status == GoalStatus::Active {
            goal.status = GoalStatus::Achieved;
        }
        goal.last_referenced = now_millis();
        self.store.update_goal(&goal)?;
        self.store.add_goal_progress_update(&GoalProgressUpdate {
            id: Id::new(),
            goal_id: goal_id.clone(),
            value: clamped,
            reason,
            evidence_claim_id,
            created_at: now_millis(),
        })?;
        Ok(goal)
    }

    pub fn add_milestone(&self, goal_id: &Id, description: String) -> Result<Goal> {
        let mut goal = self.get(goal_id)?;
        goal.milestones.push(Milestone { id: Id::new(), description, achieved: false, achieved_at: None });
        self.recompute_milestone_progress(&mut goal);
        self.store.update_goal(&goal)?;
        Ok(goal)
    }

    pub fn achieve_milestone(&self, goal_id: &Id, milestone_id: &Id) -> Result<Goal> {
        let mut goal = self.get(goal_id)?;
        if let Some(m) = goal.milestones.iter_mut().find(|m| &m.id == milestone_id) {
            m.achieved = true;
            m.achieved_at = Some(now_millis());
        }
        self.recompute_milestone_progress(&mut goal);
        self.store.update_goal(&goal)?;
        Ok(goal)
    }

    fn recompute_milestone_progress(&self, goal: &mut Goal) {
        use ramble_core::ProgressType;
        if goal.progress_type != ProgressType::Milestone || goal.milestones.is_empty() {
            return;
        }
        let achieved = goal.milestones.iter().filter(|m| m.achieved).count();
        goal.progress_value = 100.0 * achieved as f64 / goal.milestones.len() as f64;
        if goal.progress_value >= 100.0 && goal.status == GoalStatus::Active {
            goal.status = GoalStatus::Achieved;
        }
    }

    pub fn add_blocker(&self, goal_id: &Id, description: String, severity: BlockerSeverity) -> Result<Goal> {
        let mut goal = self.get(goal_id)?;
        goal.blockers.push(Blocker {
            id: Id::new(),
            description,
            severity,
            status: BlockerStatus::Active,
            created_at: now_millis(),
            resolved_at: None,
        });
        if severity == BlockerSeverity::Blocking && goal.status == GoalStatus::Active {
            goal.status = GoalStatus::Blocked;
        }
        self.store.update_goal(&goal)?;
        Ok(goal)
    }

    pub fn resolve_blocker(&self, goal_id: &Id, blocker_id: &Id) -> Result<Goal> {
        let mut goal = self.get(goal_id)?;
        if let Some(b) = goal.blockers.iter_mut().find(|b| &b.id == blocker_id) {
            b.status = BlockerStatus::Resolved;
            b.resolved_at = Some(now_millis());
        }
        let still_blocked = goal
            .blockers
            .iter()
            .any(|b| b.severity == BlockerSeverity::Blocking && b.status == BlockerStatus::Active);
        if !still_blocked && goal.status == GoalStatus::Blocked {
            goal.status = GoalStatus::Active;
        }
        self.store.update_goal(&goal)?;
        Ok(goal)
    }

    /// Validates `parent` exists, that `child` would not create a cycle
    /// (walking from `parent` up must never revisit `child`), and that the
    /// resulting depth stays within bound, before writing.
    pub fn set_parent(&self, child_id: &Id, parent_id: &Id) -> Result<Goal> {
        if child_id == parent_id {
            return Err(GoalError::Cycle);
        }
        self.get(parent_id)?;

        let mut cursor = self.get(parent_id)?;
        let mut hops = 0u32;
        loop {
            match &cursor.parent_goal_id {
                None => break,
                Some(ancestor_id) => {
                    if ancestor_id == child_id {
                        return Err(GoalError::Cycle);
                    }
                    hops += 1;
                    if hops >= self.config.max_hierarchy_depth {
                        return Err(GoalError::TooDeep);
                    }
                    cursor = self.get(ancestor_id)?;
                }
            }
        }

        let parent_depth = self.depth_of(parent_id)?;
        if parent_depth + 1 >= self.config.max_hierarchy_depth {
            return Err(GoalError::TooDeep);
        }

        let mut child = self.get(child_id)?;
        child.parent_goal_id = Some(parent_id.clone());
        self.store.update_goal(&child)?;
        Ok(child)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> GoalManager {
        GoalManager::new(Arc::new(Store::in_memory("default").unwrap()), GoalConfig::default())
    }

    fn new_goal(statement: &str) -> NewGoal {
        NewGoal {
            statement: statement.to_string(),
            goal_type: "outcome".to_string(),
            timeframe: Timeframe::MediumTerm,
            parent_goal_id: None,
            motivation: None,
            deadline: None,
            priority: None,
            source_claim_id: Id::new(),
        }
    }

    #[test]
    fn create_goal_infers_progress_type() {
        let mgr = manager();
        let goal = mgr.create_goal(new_goal("ship the release")).unwrap();
        assert_eq!(goal.progress_type, ramble_core::ProgressType::Percentage);
    }

    #[test]
    fn update_progress_clamps_and_achieves_at_100() {
        let mgr = manager();
        let goal = mgr.create_goal(new_goal("learn rust")).unwrap();
        let updated = mgr.update_progress(&goal.id, 150.0, "done".to_string(), None).unwrap();
        assert_eq!(updated.progress_value, 100.0);
        assert_eq!(updated.status, GoalStatus::Achieved);
    }

    #[test]
    fn blocking_blocker_blocks_goal_and_resolving_reactivates() {
        let mgr = manager();
        let goal = mgr.create_goal(new_goal("launch product")).unwrap();
        let blocked = mgr.add_blocker(&goal.id, "waiting on legal".to_string(), BlockerSeverity::Blocking).unwrap();
        assert_eq!(blocked.status, GoalStatus::Blocked);
        let blocker_id = blocked.blockers[0].id.clone();
        let resolved = mgr.resolve_blocker(&goal.id, &blocker_id).unwrap();
        assert_eq!(resolved.status, GoalStatus::Active);
    }

    #[test]
    fn too_deep_hierarchy_is_rejected() {
        let mut config = GoalConfig::default();
        config.max_hierarchy_depth = 2;
        let mgr = GoalManager::new(Arc::new(Store::in_memory("default").unwrap()), config);
        let root = mgr.create_goal(new_goal("root")).unwrap();
        let mut child_goal = new_goal("child");
        child_goal.parent_goal_id = Some(root.id.clone());
        let child = mgr.create_goal(child_goal).unwrap();
        let mut grandchild_goal = new_goal("grandchild");
        grandchild_goal.parent_goal_id = Some(child.id.clone());
        let result = mgr.create_goal(grandchild_goal);
        assert!(matches!(result, Err(GoalError::TooDeep)));
    }

    #[test]
    fn milestone_progress_recomputed_on_achieve() {
        let mgr = manager();
        let mut goal_params = new_goal("write a book");
        goal_params.timeframe = Timeframe::Life;
        let goal = mgr.create_goal(goal_params).unwrap();
        let goal = mgr.add_milestone(&goal.id, "outline".to_string()).unwrap();
        let goal = mgr.add_milestone(&goal.id, "draft".to_string()).unwrap();
        let m0 = goal.milestones[0].id.clone();
        let goal = mgr.achieve_milestone(&goal.id, &m0).unwrap();
        assert_eq!(goal.progress_value, 50.0);
    }

    #[test]
    fn fuzzy_match_finds_similar_statement() {
        let mgr = manager();
        mgr.create_goal(new_goal("learn to play the guitar")).unwrap();
        let found = mgr.find_fuzzy_match("learn to play guitar").unwrap();
        assert!(found.is_some());
    }
}
