//! Reconciler loop E2E tests.
//!
//! Covers checkpoint persistence across reconciler instances and the timer
//! driven loop from `initialize` through shutdown.

use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;

use e2e_tests::{settle, TestHarness, COUNTRY, PROJECT};
use keyword_scheduler::{initialize, PassResult, ReconcilerConfig, SchedulerError};

#[tokio::test]
async fn test_checkpoint_advances_and_persists() {
    let harness = TestHarness::new();
    let reconciler = harness.reconciler().await;
    let initial = reconciler.checkpoint().last_processed_time;
    settle().await;

    harness.insert(COUNTRY, &[("label", json!("Peru"))]).await;
    let before = Utc::now();
    reconciler.tick().await.unwrap().unwrap();
    let after = Utc::now();

    let checkpoint = reconciler.checkpoint();
    assert!(checkpoint.last_processed_time > initial);
    assert!(checkpoint.last_processed_time >= before);
    assert!(checkpoint.last_processed_time <= after);
    assert_eq!(checkpoint.pass_count, 1);
    assert_eq!(checkpoint.processed_count, 1);

    let persisted = harness.engine().load_checkpoint().await.unwrap().unwrap();
    assert_eq!(persisted.last_processed_time, checkpoint.last_processed_time);

    // An idle pass still moves the window forward
    settle().await;
    reconciler.tick().await.unwrap().unwrap();
    let idle = reconciler.checkpoint();
    assert!(idle.last_processed_time > checkpoint.last_processed_time);
    assert_eq!(idle.processed_count, 1);
}

#[tokio::test]
async fn test_new_reconciler_resumes_from_checkpoint() {
    let harness = TestHarness::new();
    let first = harness.reconciler().await;
    settle().await;
    let country = harness.insert(COUNTRY, &[("label", json!("Chile"))]).await;
    first.tick().await.unwrap().unwrap();
    let checkpoint = first.checkpoint();
    drop(first);

    // Changes made while no reconciler ran are picked up on resume
    settle().await;
    let project = harness
        .insert(PROJECT, &[("name", json!("Andes")), ("country", json!(country.id))])
        .await;

    let second = harness.reconciler().await;
    assert_eq!(
        second.checkpoint().last_processed_time,
        checkpoint.last_processed_time
    );
    let report = second.tick().await.unwrap().unwrap();
    assert_eq!(report.total_processed(), 1);
    assert_eq!(harness.keywords(&project)[4], json!("Chile"));
    assert_eq!(second.checkpoint().pass_count, 2);
}

#[tokio::test]
async fn test_fresh_start_ignores_history_without_resume() {
    let harness = TestHarness::new();
    harness.insert(COUNTRY, &[("label", json!("Peru"))]).await;
    let first = harness.reconciler().await;
    first.tick().await.unwrap().unwrap();

    settle().await;
    harness.insert(COUNTRY, &[("label", json!("Bolivia"))]).await;
    settle().await;

    let config = ReconcilerConfig::default().with_resume(false);
    let fresh = keyword_scheduler::Reconciler::new(harness.engine(), config)
        .await
        .unwrap();
    let report = fresh.tick().await.unwrap().unwrap();
    assert_eq!(report.total_processed(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_timer_loop_reconciles_until_shutdown() {
    let harness = TestHarness::new();
    let handle = initialize(
        20,
        harness.store(),
        harness.schema.clone(),
        ReconcilerConfig::default(),
    )
    .await
    .unwrap();
    assert!(handle.is_running());
    settle().await;

    let country = harness.insert(COUNTRY, &[("label", json!("Iceland"))]).await;
    let project = harness
        .insert(PROJECT, &[("name", json!("Geyser")), ("country", json!(country.id))])
        .await;

    let mut reconciled = false;
    for _ in 0..100 {
        if harness.keywords(&project).get(4) == Some(&json!("Iceland")) {
            reconciled = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(reconciled, "timer loop never reconciled the project");

    let status = handle.status();
    assert!(status.run_count >= 1);
    assert!(status.checkpoint.is_some());
    assert_eq!(status.error_count, 0);

    handle.shutdown().await.unwrap();
    assert!(!handle.is_running());
    assert!(matches!(handle.trigger().await, Err(SchedulerError::NotRunning)));
    assert!(matches!(handle.shutdown().await, Err(SchedulerError::NotRunning)));

    let persisted = harness.engine().load_checkpoint().await.unwrap().unwrap();
    assert!(persisted.pass_count >= 1);
    assert!(matches!(
        handle.status().last_result,
        Some(PassResult::Success) | Some(PassResult::Skipped(_)) | Some(PassResult::Cancelled)
    ));
}
