use std::io::Write;

use ramble_core::AppConfig;

#[test]
fn test_load_full_config_from_file() {
    let toml_content = r#"
data_dir = "~/.local/share/ramble-test"

[llm]
provider = "anthropic"
model_id = "claude-sonnet-4-20250514"
api_key = "sk-test-key"
max_tokens = 4096
temperature = 0.5
request_timeout_secs = 45
max_retries = 4
initial_backoff_ms = 500
max_backoff_ms = 15000

[queue]
poll_interval_ms = 250
max_concurrent_tasks = 8
max_attempts = 3
stale_after_secs = 600

[memory]
decay_interval_secs = 1800
stale_threshold = 0.45
dormant_threshold = 0.2
promotion_threshold = 0.8
top_of_mind_limit = 15
recency_weight = 0.25
emotional_weight = 0.25
stakes_weight = 0.2
confirmation_weight = 0.2
access_weight = 0.1
access_boost_factor = 1.5
access_boost_duration_secs = 180

[correction]
min_usage_to_learn = 3
levenshtein_threshold = 0.25
enable_phonetic_matching = false

[goal]
fuzzy_match_threshold = 0.35
max_hierarchy_depth = 4
stale_goal_days = 45

[pipeline]
active_program = "primitive-pipeline"
context_window_units = 15
min_confidence = 0.4

[observer]
enabled_observers = ["contradiction"]
schedule_interval_secs = 600

[log]
filter = "ramble=debug"
json = true
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml_content.as_bytes()).unwrap();

    let config = AppConfig::load(file.path()).unwrap();

    assert_eq!(config.data_dir, "~/.local/share/ramble-test");

    assert_eq!(config.llm.provider, "anthropic");
    assert_eq!(config.llm.model_id, "claude-sonnet-4-20250514");
    assert_eq!(config.llm.api_key.as_deref(), Some("sk-test-key"));
    assert_eq!(config.llm.max_tokens, 4096);
    assert_eq!(config.llm.temperature, 0.5);
    assert_eq!(config.llm.request_timeout_secs, 45);
    assert_eq!(config.llm.max_retries, 4);

    assert_eq!(config.queue.poll_interval_ms, 250);
    assert_eq!(config.queue.max_concurrent_tasks, 8);
    assert_eq!(config.queue.max_attempts, 3);
    assert_eq!(config.queue.stale_after_secs, 600);

    assert_eq!(config.memory.decay_interval_secs, 1800);
    assert_eq!(config.memory.top_of_mind_limit, 15);
    assert_eq!(config.memory.access_boost_factor, 1.5);

    assert_eq!(config.correction.min_usage_to_learn, 3);
    assert!(!config.correction.enable_phonetic_matching);

    assert_eq!(config.goal.max_hierarchy_depth, 4);
    assert_eq!(config.goal.stale_goal_days, 45);

    assert_eq!(config.pipeline.context_window_units, 15);
    assert_eq!(config.pipeline.min_confidence, 0.4);

    assert_eq!(config.observer.enabled_observers, vec!["contradiction".to_string()]);
    assert_eq!(config.observer.schedule_interval_secs, 600);

    assert_eq!(config.log.filter, "ramble=debug");
    assert!(config.log.json);
}

#[test]
fn test_env_var_expansion_in_config() {
    std::env::set_var("RAMBLE_TEST_API_KEY", "expanded-secret-key");

    let toml_content = r#"
[llm]
api_key = "${RAMBLE_TEST_API_KEY}"
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(toml_content.as_bytes()).unwrap();

    let config = AppConfig::load(file.path()).unwrap();
    assert_eq!(config.llm.api_key.as_deref(), Some("expanded-secret-key"));

    std::env::remove_var("RAMBLE_TEST_API_KEY");
}

#[test]
fn test_missing_config_file_is_an_error() {
    let result = AppConfig::load(std::path::Path::new("/nonexistent/ramble.toml"));
    assert!(result.is_err());
}
