pub mod client;
pub mod error;
pub mod http;
pub mod json_repair;
pub mod retry;

pub use client::{LlmClient, LlmMessage, LlmRequest, LlmResponse, LlmUsage, ModelConfig, Tier, TierResolver};
pub use error::{LlmError, Result};
pub use http::HttpLlmClient;
pub use json_repair::{parse_llm_json, JsonExtraction};
pub use retry::RetryingLlmClient;
