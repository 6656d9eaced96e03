use ramble_core::ConversationUnit;
use ramble_store::Store;

use crate::error::Result;

/// Assembles the fixed-template textual context handed to the LLM, by
/// way of a small set of bounded Store queries — recent units of the
/// same session, recent claims, known entities, and known
/// vocabulary/corrections.
pub struct ContextBuilder<'a> {
    store: &'a Store,
    context_window_units: usize,
    recent_claims_limit: usize,
    recent_entities_limit: usize,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(store: &'a Store, context_window_units: usize) -> Self {
        Self { store, context_window_units, recent_claims_limit: 10, recent_entities_limit: 20 }
    }

    pub fn build(&self, unit: &ConversationUnit) -> Result<String> {
        let mut sections = Vec::new();

        let recent_units = self.store.get_units_by_session(&unit.session_id, self.context_window_units)?;
        sections.push(render_section(
            "Recent Conversation",
            recent_units.iter().map(|u| format!("[{:?}] {}", u.speaker, u.sanitized_text)),
        ));

        let mut claims = self.store.get_active_claims()?;
        claims.truncate(self.recent_claims_limit);

        let mut subjects: Vec<String> = claims.iter().map(|c| c.subject.clone()).collect();
        subjects.sort();
        subjects.dedup();
        sections.push(render_section("Active Topics", subjects.into_iter()));

        let mut entities = self.store.get_all_entities()?;
        entities.sort_by(|a, b| b.last_referenced.cmp(&a.last_referenced));
        entities.truncate(self.recent_entities_limit);
        sections.push(render_section(
            "Known Entities",
            entities.iter().map(|e| format!("{} ({})", e.canonical_name, e.entity_type)),
        ));

        sections.push(render_section("Working Memory", claims.iter().map(|c| c.statement.clone())));

        let goals = self.store.get_active_goals()?;
        sections.push(render_section("Active Goals", goals.iter().map(|g| g.statement.clone())));

        Ok(sections.join("\n\n"))
    }
}

fn render_section(label: &str, lines: impl Iterator<Item = String>) -> String {
    let body: Vec<String> = lines.collect();
    if body.is_empty() {
        format!("## {label}\n(none)")
    } else {
        format!("## {label}\n{}", body.join("\n"))
    }
}
