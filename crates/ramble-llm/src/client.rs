use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Which quality/cost tier a caller wants, resolved to a concrete model
/// by a `TierResolver` — core code never names a provider directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Fast,
    Balanced,
    Deep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub provider: String,
    pub model_id: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Resolves a `Tier` to a concrete `ModelConfig` without core code ever
/// naming a provider.
pub trait TierResolver: Send + Sync {
    fn resolve(&self, tier: Tier) -> ModelConfig;
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    pub model: ModelConfig,
    pub system_prompt: Option<String>,
    pub messages: Vec<LlmMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<LlmUsage>,
}

/// Single-shot LLM call contract. No streaming is named in the system
/// this crate supports — every caller wants one complete response.
pub trait LlmClient: Send + Sync {
    fn call<'a>(&'a self, request: LlmRequest) -> BoxFuture<'a, Result<LlmResponse>>;
}
