use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Top-level Ramble configuration, loaded from a single TOML file with
/// `${ENV_VAR}` expansion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
    #[serde(default)]
    pub goal: GoalConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub observer: ObserverConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_data_dir() -> String {
    "~/.ramble".to_string()
}

impl AppConfig {
    /// Load config from a TOML file, expanding `${ENV_VAR}` references first.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Validation(format!("cannot read {}: {e}", path.display())))?;
        let expanded = expand_env_vars(&content);
        toml::from_str(&expanded)
            .map_err(|e| CoreError::Validation(format!("invalid config: {e}")))
    }

    /// Resolve the data directory, expanding a leading `~/`.
    pub fn data_dir(&self) -> PathBuf {
        if let Some(rest) = self.data_dir.strip_prefix("~/") {
            if let Some(home) = std::env::var("HOME").ok().map(PathBuf::from) {
                return home.join(rest);
            }
        }
        PathBuf::from(&self.data_dir)
    }
}

/// LLM client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model_id() -> String {
    "gpt-4o-mini".to_string()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.0
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    1_000
}
fn default_max_backoff_ms() -> u64 {
    30_000
}

/// Task queue runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrent_tasks: default_max_concurrent_tasks(),
            max_attempts: default_max_attempts(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    500
}
fn default_max_concurrent_tasks() -> usize {
    4
}
fn default_max_attempts() -> u32 {
    5
}
fn default_stale_after_secs() -> u64 {
    300
}

/// Memory service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default = "default_decay_interval_secs")]
    pub decay_interval_secs: u64,
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold: f64,
    #[serde(default = "default_dormant_threshold")]
    pub dormant_threshold: f64,
    #[serde(default = "default_promotion_threshold")]
    pub promotion_threshold: f64,
    #[serde(default = "default_top_of_mind_limit")]
    pub top_of_mind_limit: usize,
    #[serde(default = "default_recency_weight")]
    pub recency_weight: f64,
    #[serde(default = "default_emotional_weight")]
    pub emotional_weight: f64,
    #[serde(default = "default_stakes_weight")]
    pub stakes_weight: f64,
    #[serde(default = "default_confirmation_weight")]
    pub confirmation_weight: f64,
    #[serde(default = "default_access_weight")]
    pub access_weight: f64,
    #[serde(default = "default_access_boost_factor")]
    pub access_boost_factor: f64,
    #[serde(default = "default_access_boost_duration_secs")]
    pub access_boost_duration_secs: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            decay_interval_secs: default_decay_interval_secs(),
            stale_threshold: default_stale_threshold(),
            dormant_threshold: default_dormant_threshold(),
            promotion_threshold: default_promotion_threshold(),
            top_of_mind_limit: default_top_of_mind_limit(),
            recency_weight: default_recency_weight(),
            emotional_weight: default_emotional_weight(),
            stakes_weight: default_stakes_weight(),
            confirmation_weight: default_confirmation_weight(),
            access_weight: default_access_weight(),
            access_boost_factor: default_access_boost_factor(),
            access_boost_duration_secs: default_access_boost_duration_secs(),
        }
    }
}

fn default_decay_interval_secs() -> u64 {
    3_600
}
fn default_stale_threshold() -> f64 {
    0.4
}
fn default_dormant_threshold() -> f64 {
    0.15
}
fn default_promotion_threshold() -> f64 {
    0.7
}
fn default_top_of_mind_limit() -> usize {
    20
}
fn default_recency_weight() -> f64 {
    0.3
}
fn default_emotional_weight() -> f64 {
    0.2
}
fn default_stakes_weight() -> f64 {
    0.25
}
fn default_confirmation_weight() -> f64 {
    0.15
}
fn default_access_weight() -> f64 {
    0.1
}
fn default_access_boost_factor() -> f64 {
    2.0
}
fn default_access_boost_duration_secs() -> u64 {
    300
}

/// Correction service / phonetic matcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    #[serde(default = "default_min_usage_to_learn")]
    pub min_usage_to_learn: u32,
    #[serde(default = "default_levenshtein_threshold")]
    pub levenshtein_threshold: f64,
    #[serde(default = "default_enable_phonetic")]
    pub enable_phonetic_matching: bool,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            min_usage_to_learn: default_min_usage_to_learn(),
            levenshtein_threshold: default_levenshtein_threshold(),
            enable_phonetic_matching: default_enable_phonetic(),
        }
    }
}

fn default_min_usage_to_learn() -> u32 {
    2
}
fn default_levenshtein_threshold() -> f64 {
    0.3
}
fn default_enable_phonetic() -> bool {
    true
}

/// Goal manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalConfig {
    #[serde(default = "default_fuzzy_match_threshold")]
    pub fuzzy_match_threshold: f64,
    #[serde(default = "default_max_hierarchy_depth")]
    pub max_hierarchy_depth: u32,
    #[serde(default = "default_stale_goal_days")]
    pub stale_goal_days: u32,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            fuzzy_match_threshold: default_fuzzy_match_threshold(),
            max_hierarchy_depth: default_max_hierarchy_depth(),
            stale_goal_days: default_stale_goal_days(),
        }
    }
}

fn default_fuzzy_match_threshold() -> f64 {
    0.3
}
fn default_max_hierarchy_depth() -> u32 {
    4
}
fn default_stale_goal_days() -> u32 {
    30
}

/// Extraction pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_name")]
    pub active_program: String,
    #[serde(default = "default_context_window_units")]
    pub context_window_units: usize,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            active_program: default_pipeline_name(),
            context_window_units: default_context_window_units(),
            min_confidence: default_min_confidence(),
        }
    }
}

fn default_pipeline_name() -> String {
    "primitive-pipeline".to_string()
}
fn default_context_window_units() -> usize {
    10
}
fn default_min_confidence() -> f64 {
    0.3
}

/// Observer dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverConfig {
    #[serde(default = "default_enabled_observers")]
    pub enabled_observers: Vec<String>,
    #[serde(default = "default_schedule_interval_secs")]
    pub schedule_interval_secs: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled_observers: default_enabled_observers(),
            schedule_interval_secs: default_schedule_interval_secs(),
        }
    }
}

fn default_enabled_observers() -> Vec<String> {
    vec!["contradiction".to_string(), "pattern".to_string()]
}
fn default_schedule_interval_secs() -> u64 {
    900
}

/// Structured logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: false,
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_env_vars_substitutes_known_var() {
        std::env::set_var("RAMBLE_TEST_VAR", "hello");
        let result = expand_env_vars("key = \"${RAMBLE_TEST_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("RAMBLE_TEST_VAR");
    }

    #[test]
    fn expand_env_vars_leaves_unknown_var_untouched() {
        let result = expand_env_vars("key = \"${RAMBLE_NONEXISTENT_VAR}\"");
        assert_eq!(result, "key = \"${RAMBLE_NONEXISTENT_VAR}\"");
    }

    #[test]
    fn defaults_from_empty_toml() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.queue.max_attempts, 5);
        assert_eq!(config.memory.top_of_mind_limit, 20);
        assert_eq!(config.pipeline.active_program, "primitive-pipeline");
        assert_eq!(config.goal.fuzzy_match_threshold, 0.3);
    }

    #[test]
    fn memory_weights_sum_to_one() {
        let config = MemoryConfig::default();
        let sum = config.recency_weight
            + config.emotional_weight
            + config.stakes_weight
            + config.confirmation_weight
            + config.access_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }
}
