use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    NewClaim,
    ClaimUpdate,
    SessionEnd,
    Schedule,
    Manual,
}

/// Static registration metadata for an `Observer`.
#[derive(Debug, Clone)]
pub struct ObserverConfig {
    pub observer_type: String,
    pub name: String,
    pub description: String,
    pub triggers: Vec<Trigger>,
    pub priority: i32,
    pub claim_type_filter: Option<Vec<String>>,
    pub uses_llm: bool,
}
