use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One normalized entity mention, ready for `Store::find_or_create_entity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntity {
    pub name: String,
    pub entity_type: String,
}

/// One normalized claim candidate, sourced from either the LLM's
/// `topics[]` or `memories[]` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedClaim {
    pub content: String,
    pub claim_type: String,
    pub importance: Option<f64>,
}

/// One normalized goal candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedGoal {
    pub statement: String,
    pub goal_type: String,
}

/// One normalized correction candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedCorrection {
    pub wrong: String,
    pub correct: String,
}

/// Everything a single LLM extraction normalized down to, with malformed
/// items silently dropped (each item validated independently).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedExtraction {
    pub entities: Vec<NormalizedEntity>,
    pub claims: Vec<NormalizedClaim>,
    pub goals: Vec<NormalizedGoal>,
    pub corrections: Vec<NormalizedCorrection>,
}

/// Normalize the raw `{entities, topics, memories, goals, corrections}`
/// JSON object the LLM returned. Pure and synchronous: no I/O, fully
/// unit-testable in isolation.
pub fn normalize(raw: &Value) -> NormalizedExtraction {
    let mut out = NormalizedExtraction::default();

    for item in array_field(raw, "entities") {
        if let Some(entity) = normalize_entity(item) {
            out.entities.push(entity);
        }
    }

    for item in array_field(raw, "topics") {
        if let Some(claim) = normalize_memory(item, "topic") {
            out.claims.push(claim);
        }
    }

    for item in array_field(raw, "memories") {
        if let Some(claim) = normalize_memory(item, "fact") {
            out.claims.push(claim);
        }
    }

    for item in array_field(raw, "goals") {
        if let Some(goal) = normalize_goal(item) {
            out.goals.push(goal);
        }
    }

    for item in array_field(raw, "corrections") {
        if let Some(correction) = normalize_correction(item) {
            out.corrections.push(correction);
        }
    }

    merge_duplicate_entities(&mut out.entities);
    out
}

fn array_field<'a>(raw: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    raw.get(key).and_then(Value::as_array).into_iter().flatten()
}

fn normalize_entity(item: &Value) -> Option<NormalizedEntity> {
    match item {
        Value::String(name) if !name.trim().is_empty() => {
            Some(NormalizedEntity { name: name.trim().to_string(), entity_type: "unknown".to_string() })
        }
        Value::Object(map) => {
            let name = map.get("name").and_then(Value::as_str)?.trim();
            if name.is_empty() {
                return None;
            }
            let entity_type = map.get("type").and_then(Value::as_str).unwrap_or("unknown").to_string();
            Some(NormalizedEntity { name: name.to_string(), entity_type })
        }
        _ => None,
    }
}

fn normalize_memory(item: &Value, default_type: &str) -> Option<NormalizedClaim> {
    match item {
        Value::String(content) if !content.trim().is_empty() => Some(NormalizedClaim {
            content: content.trim().to_string(),
            claim_type: default_type.to_string(),
            importance: None,
        }),
        Value::Object(map) => {
            let content = map
                .get("content")
                .or_else(|| map.get("statement"))
                .and_then(Value::as_str)?
                .trim();
            if content.is_empty() {
                return None;
            }
            let claim_type = map.get("type").and_then(Value::as_str).unwrap_or(default_type).to_string();
            let importance = map.get("importance").and_then(Value::as_f64).map(|v| v.clamp(0.0, 1.0));
            Some(NormalizedClaim { content: content.to_string(), claim_type, importance })
        }
        _ => None,
    }
}

fn normalize_goal(item: &Value) -> Option<NormalizedGoal> {
    match item {
        Value::String(statement) if !statement.trim().is_empty() => {
            Some(NormalizedGoal { statement: statement.trim().to_string(), goal_type: "general".to_string() })
        }
        Value::Object(map) => {
            let statement = map
                .get("statement")
                .or_else(|| map.get("content"))
                .and_then(Value::as_str)?
                .trim();
            if statement.is_empty() {
                return None;
            }
            let goal_type = map.get("type").and_then(Value::as_str).unwrap_or("general").to_string();
            Some(NormalizedGoal { statement: statement.to_string(), goal_type })
        }
        _ => None,
    }
}

fn normalize_correction(item: &Value) -> Option<NormalizedCorrection> {
    let map = item.as_object()?;
    let wrong = map.get("wrong").and_then(Value::as_str)?.trim();
    let correct = map.get("correct").and_then(Value::as_str)?.trim();
    if wrong.is_empty() || correct.is_empty() {
        return None;
    }
    Some(NormalizedCorrection { wrong: wrong.to_string(), correct: correct.to_string() })
}

/// Collapse entities that normalize to the same case-insensitive,
/// trimmed key within a single extraction, keeping the first-seen
/// casing and most specific (non-"unknown") type.
fn merge_duplicate_entities(entities: &mut Vec<NormalizedEntity>) {
    let mut merged: Vec<NormalizedEntity> = Vec::with_capacity(entities.len());
    for entity in entities.drain(..) {
        let key = entity.name.to_lowercase();
        if let Some(existing) = merged.iter_mut().find(|e| e.name.to_lowercase() == key) {
            if existing.entity_type == "unknown" && entity.entity_type != "unknown" {
                existing.entity_type = entity.entity_type;
            }
        } else {
            merged.push(entity);
        }
    }
    *entities = merged;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalizes_bare_string_entity() {
        let raw = json!({"entities": ["Alice"]});
        let result = normalize(&raw);
        assert_eq!(result.entities, vec![NormalizedEntity { name: "Alice".to_string(), entity_type: "unknown".to_string() }]);
    }

    #[test]
    fn normalizes_object_entity_with_type() {
        let raw = json!({"entities": [{"name": "Alice", "type": "person"}]});
        let result = normalize(&raw);
        assert_eq!(result.entities[0].entity_type, "person");
    }

    #[test]
    fn rejects_entity_object_without_name() {
        let raw = json!({"entities": [{"type": "person"}]});
        let result = normalize(&raw);
        assert!(result.entities.is_empty());
    }

    #[test]
    fn merges_duplicate_entities_case_insensitively() {
        let raw = json!({"entities": ["alice", {"name": "Alice", "type": "person"}]});
        let result = normalize(&raw);
        assert_eq!(result.entities.len(), 1);
        assert_eq!(result.entities[0].entity_type, "person");
    }

    #[test]
    fn normalizes_memory_string_as_fact() {
        let raw = json!({"memories": ["likes coffee"]});
        let result = normalize(&raw);
        assert_eq!(result.claims[0].claim_type, "fact");
    }

    #[test]
    fn normalizes_goal_accepts_statement_or_content() {
        let raw = json!({"goals": [{"content": "ship v2"}]});
        let result = normalize(&raw);
        assert_eq!(result.goals[0].statement, "ship v2");
    }

    #[test]
    fn correction_requires_both_fields() {
        let raw = json!({"corrections": [{"wrong": "cooper nato"}]});
        let result = normalize(&raw);
        assert!(result.corrections.is_empty());
    }

    #[test]
    fn empty_extraction_is_valid() {
        let result = normalize(&json!({}));
        assert_eq!(result, NormalizedExtraction::default());
    }
}
