use ramble_core::{AppConfig, Source};
use ramble_kernel::Kernel;

#[tokio::test]
async fn process_text_creates_a_unit_and_enqueues_extraction() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = Kernel::initialize(dir.path(), "default", AppConfig::default()).await.unwrap();

    let result = kernel.process_text("I want to learn Rust this year.", Source::Text).unwrap();

    assert!(!result.captured_by_lens);
    assert!(result.task_id.is_some());
    assert!(kernel.store().get_unit(&result.unit_id).unwrap().is_some());

    kernel.shutdown().await.unwrap();
}

#[tokio::test]
async fn empty_input_is_rejected_before_a_unit_is_created() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = Kernel::initialize(dir.path(), "default", AppConfig::default()).await.unwrap();

    let result = kernel.process_text("   ", Source::Text);

    assert!(result.is_err());
    kernel.shutdown().await.unwrap();
}

#[tokio::test]
async fn starting_a_session_ends_the_kernel_initialized_one() {
    let dir = tempfile::tempdir().unwrap();
    let kernel = Kernel::initialize(dir.path(), "default", AppConfig::default()).await.unwrap();

    let initial = kernel.store().get_active_session().unwrap().unwrap();
    let started = kernel.start_session().unwrap();

    assert_ne!(initial.id, started.id);
    assert!(kernel.store().get_session(&initial.id).unwrap().unwrap().ended_at.is_some());

    kernel.end_session().unwrap();
    assert!(kernel.store().get_active_session().unwrap().is_none());

    kernel.shutdown().await.unwrap();
}

#[tokio::test]
async fn backup_export_then_import_round_trips_into_a_fresh_kernel() {
    let dir_a = tempfile::tempdir().unwrap();
    let kernel_a = Kernel::initialize(dir_a.path(), "default", AppConfig::default()).await.unwrap();
    kernel_a.process_text("remember to call Dana", Source::Text).unwrap();
    let doc = kernel_a.export_backup().unwrap();
    kernel_a.shutdown().await.unwrap();

    let dir_b = tempfile::tempdir().unwrap();
    let kernel_b = Kernel::initialize(dir_b.path(), "default", AppConfig::default()).await.unwrap();
    kernel_b.import_backup(&doc).unwrap();

    let restored = kernel_b.store().get_unprocessed_units(10).unwrap();
    assert!(restored.iter().any(|u| u.raw_text == "remember to call Dana"));

    kernel_b.shutdown().await.unwrap();
}
