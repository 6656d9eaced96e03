use std::sync::Arc;

use ramble_core::{now_millis, ObserverProgramRecord};
use ramble_store::Store;

use crate::error::Result;
use crate::observer::{Observer, ObserverContext, ObserverOutputKind};
use crate::trigger::Trigger;

/// Exponential moving average weight applied to each observer run's
/// pass/fail outcome when updating its rolling `successRate`.
const SUCCESS_RATE_ALPHA: f64 = 0.2;

/// Holds every registered observer sorted by priority, and drives them
/// against new claims or scheduled triggers.
pub struct ObserverDispatcher {
    store: Arc<Store>,
    observers: Vec<Arc<dyn Observer>>,
}

impl ObserverDispatcher {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, observers: Vec::new() }
    }

    /// Inserts into `observers` ordered by priority descending; ties keep
    /// registration order since `Vec::insert` shifts later elements right.
    pub fn register(&mut self, observer: Arc<dyn Observer>) -> Result<()> {
        let config = observer.config();
        let position = self
            .observers
            .iter()
            .position(|existing| existing.config().priority < config.priority)
            .unwrap_or(self.observers.len());
        self.observers.insert(position, observer);

        self.store.register_observer_program(&ObserverProgramRecord {
            id: config.observer_type.clone(),
            name: config.name,
            success_rate: 1.0,
            active: true,
        })?;
        Ok(())
    }

    pub fn observers(&self) -> &[Arc<dyn Observer>] {
        &self.observers
    }

    /// Runs every registered observer whose `claimTypeFilter` matches at
    /// least one of the new claims (or has no filter), in priority order,
    /// one at a time. A failing observer is logged and its success rate
    /// is nudged down; the loop continues to the next observer.
    pub async fn on_new_claims(&self, ctx: &ObserverContext) -> Result<Vec<ObserverOutputKind>> {
        self.dispatch(ctx, Trigger::NewClaim).await
    }

    pub async fn on_schedule(&self, ctx: &ObserverContext) -> Result<Vec<ObserverOutputKind>> {
        self.dispatch(ctx, Trigger::Schedule).await
    }

    async fn dispatch(&self, ctx: &ObserverContext, trigger: Trigger) -> Result<Vec<ObserverOutputKind>> {
        let mut all_outputs = Vec::new();

        for observer in &self.observers {
            let config = observer.config();
            if !config.triggers.contains(&trigger) {
                continue;
            }
            if !claims_match_filter(ctx, &config.claim_type_filter) {
                continue;
            }

            match observer.execute(ctx).await {
                Ok(outputs) => {
                    self.record_outcome(&config.observer_type, true)?;
                    for output in &outputs {
                        self.persist_output(&config.name, output)?;
                    }
                    all_outputs.extend(outputs);
                }
                Err(err) => {
                    tracing::warn!(observer = %config.name, error = %err, "observer run failed");
                    self.record_outcome(&config.observer_type, false)?;
                }
            }
        }

        Ok(all_outputs)
    }

    fn record_outcome(&self, observer_type: &str, success: bool) -> Result<()> {
        let programs = self.store.get_observer_programs()?;
        let current = programs
            .iter()
            .find(|p| p.id == observer_type)
            .map(|p| p.success_rate)
            .unwrap_or(1.0);
        let sample = if success { 1.0 } else { 0.0 };
        let updated = current + SUCCESS_RATE_ALPHA * (sample - current);
        self.store.update_observer_success_rate(observer_type, updated)?;
        Ok(())
    }

    fn persist_output(&self, observer_name: &str, output: &ObserverOutputKind) -> Result<()> {
        match output {
            ObserverOutputKind::Contradiction(c) => {
                self.store.create_contradiction(c)?;
                self.store.create_observer_output(&ramble_core::ObserverOutput {
                    id: c.id.clone(),
                    observer_name: observer_name.to_string(),
                    kind: "contradiction".to_string(),
                    content: c.explanation.clone(),
                    source_claim_ids: vec![c.claim_a_id.clone(), c.claim_b_id.clone()],
                    created_at: now_millis(),
                    stale: false,
                })?;
            }
            ObserverOutputKind::Pattern(p) => {
                self.store.create_pattern(p)?;
                self.store.create_observer_output(&ramble_core::ObserverOutput {
                    id: p.id.clone(),
                    observer_name: observer_name.to_string(),
                    kind: "pattern".to_string(),
                    content: p.description.clone(),
                    source_claim_ids: p.source_claim_ids.clone(),
                    created_at: now_millis(),
                    stale: false,
                })?;
            }
            ObserverOutputKind::Value(v) => {
                self.store.create_value(v)?;
                self.store.create_observer_output(&ramble_core::ObserverOutput {
                    id: v.id.clone(),
                    observer_name: observer_name.to_string(),
                    kind: "value".to_string(),
                    content: v.statement.clone(),
                    source_claim_ids: v.source_claim_ids.clone(),
                    created_at: now_millis(),
                    stale: false,
                })?;
            }
        }
        Ok(())
    }
}

fn claims_match_filter(ctx: &ObserverContext, filter: &Option<Vec<String>>) -> bool {
    let Some(types) = filter else { return true };
    if ctx.new_claims.is_empty() {
        // schedule/manual triggers carry no claims to filter against
        return true;
    }
    ctx.new_claims.iter().any(|c| types.contains(&c.claim_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::{ContradictionObserver, PatternObserver};
    use ramble_store::Store;

    fn test_store() -> Arc<Store> {
        Arc::new(Store::in_memory("default").unwrap())
    }

    #[test]
    fn registers_observers_sorted_by_priority_descending() {
        let mut dispatcher = ObserverDispatcher::new(test_store());
        dispatcher.register(Arc::new(PatternObserver)).unwrap();
        dispatcher.register(Arc::new(ContradictionObserver)).unwrap();
        let names: Vec<String> = dispatcher.observers().iter().map(|o| o.config().name).collect();
        assert_eq!(names, vec!["contradiction".to_string(), "pattern".to_string()]);
    }
}
