// ABOUTME: Lifecycle and circuit-breaker tests for the monitoring scheduler
// ABOUTME: Uses paused tokio time so interval-driven behavior runs instantly
//
// SPDX-License-Identifier: MIT OR Apache-2.0
#![allow(missing_docs, clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use heartbridge::{
    AuthorizationFlowManager, Config, HeartRateService, MemoryStore, MonitoringScheduler,
    MonitoringState, RecordStore,
};

fn scheduler_over(store: Arc<MemoryStore>) -> MonitoringScheduler {
    let config = Config::for_base_url("http://127.0.0.1:9", "client", "secret");
    let flow = Arc::new(AuthorizationFlowManager::new(
        &config,
        store.clone() as Arc<dyn RecordStore>,
        Arc::new(common::NullAuthorizer),
    ));
    let heart_rate = Arc::new(HeartRateService::new(
        config.api_base_url.clone(),
        store.clone(),
        flow,
    ));
    MonitoringScheduler::new(store, heart_rate)
}

#[tokio::test]
async fn start_persists_enabled_state() {
    common::init_test_logging();
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_over(store.clone());

    assert!(scheduler.start(Duration::from_millis(1500)).await.unwrap());
    assert!(scheduler.is_running());

    let state = store.load_monitoring_state().await.unwrap().unwrap();
    assert!(state.enabled);
    assert_eq!(state.interval_ms, 1500);

    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn start_while_running_is_a_no_op() {
    common::init_test_logging();
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_over(store);

    assert!(scheduler.start(Duration::from_secs(60)).await.unwrap());
    assert!(!scheduler.start(Duration::from_secs(60)).await.unwrap());
    assert!(scheduler.is_running());

    scheduler.stop().await.unwrap();
}

#[tokio::test]
async fn stop_is_idempotent_and_keeps_interval() {
    common::init_test_logging();
    let store = Arc::new(MemoryStore::new());
    let scheduler = scheduler_over(store.clone());

    scheduler.start(Duration::from_millis(2500)).await.unwrap();
    scheduler.stop().await.unwrap();
    scheduler.stop().await.unwrap();

    assert!(!scheduler.is_running());
    let state = store.load_monitoring_state().await.unwrap().unwrap();
    assert!(!state.enabled);
    assert_eq!(state.interval_ms, 2500);
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_auto_disable_monitoring() {
    common::init_test_logging();
    let store = Arc::new(MemoryStore::new());
    // No device and no credential: every scheduled fetch falls back to
    // the simulator, which the breaker counts as a failure.
    let scheduler = scheduler_over(store.clone());

    scheduler.start(Duration::from_millis(1000)).await.unwrap();

    // Ticks at 0s, 1s, 2s and 3s produce four consecutive failures,
    // tripping the breaker on the fourth.
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(!scheduler.is_running());
    let state = store.load_monitoring_state().await.unwrap().unwrap();
    assert!(!state.enabled);
    assert_eq!(state.interval_ms, 1000);
}

#[tokio::test]
async fn resume_restarts_only_when_persisted_enabled() {
    common::init_test_logging();
    let store = Arc::new(MemoryStore::new());
    store
        .save_monitoring_state(&MonitoringState::enabled(3000))
        .await
        .unwrap();

    let scheduler = scheduler_over(store.clone());
    assert!(scheduler.resume_if_enabled().await.unwrap());
    assert!(scheduler.is_running());
    scheduler.stop().await.unwrap();

    let idle = scheduler_over(store);
    assert!(!idle.resume_if_enabled().await.unwrap());
    assert!(!idle.is_running());
}

#[tokio::test]
async fn resume_with_no_persisted_state_stays_stopped() {
    common::init_test_logging();
    let scheduler = scheduler_over(Arc::new(MemoryStore::new()));
    assert!(!scheduler.resume_if_enabled().await.unwrap());
    assert!(!scheduler.is_running());
}
