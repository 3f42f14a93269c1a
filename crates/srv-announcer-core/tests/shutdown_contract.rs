//! Contract Test: Shutdown Determinism
//!
//! Constraints verified:
//! - Engine terminates on cancellation
//! - No backend calls happen after cancellation is observed
//! - Health source tasks exit before the announcer returns
//! - An in-flight backend call is allowed to finish

mod common;

use common::*;
use srv_announcer_core::traits::{Health, HealthSource, RecordChange, RecordManager};
use srv_announcer_core::{
    Announcer, EngineConfig, EngineEvent, MockHealthSource, ReconciliationEngine, SrvRecordSpec,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

async fn wait_for(events: &mut mpsc::Receiver<EngineEvent>, wanted: fn(&EngineEvent) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if wanted(&event) {
                return;
            }
        }
        panic!("event channel closed before the expected event");
    })
    .await
    .expect("expected event within 5 seconds");
}

#[tokio::test]
async fn cancellation_terminates_engine_and_stops_backend_calls() {
    let manager = RecordingManager::new();
    let (engine, mut events) = ReconciliationEngine::new(
        Box::new(manager.clone()),
        spec(),
        &EngineConfig::default(),
    )
    .expect("engine construction succeeds");

    let (tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();

    let engine_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine.run(cancel, rx).await }
    });

    tx.send(Health::Healthy).await.unwrap();
    wait_for(&mut events, |e| matches!(e, EngineEvent::RecordAdded { .. })).await;

    cancel.cancel();

    // Anything sent after cancellation must never reach the backend
    let _ = tx.send(Health::Unhealthy).await;

    let result = tokio::time::timeout(Duration::from_secs(5), engine_handle)
        .await
        .expect("engine should terminate within 5 seconds")
        .unwrap();

    assert!(result.is_ok(), "cancellation is a clean shutdown: {:?}", result);
    assert_eq!(manager.calls(), vec![Call::Add]);
}

#[tokio::test]
async fn pre_cancelled_engine_makes_no_calls() {
    let manager = RecordingManager::new();
    let (engine, _events) = ReconciliationEngine::new(
        Box::new(manager.clone()),
        spec(),
        &EngineConfig::default(),
    )
    .expect("engine construction succeeds");

    let (tx, rx) = mpsc::channel(16);
    for health in signals(&[true, false, true]) {
        tx.send(health).await.unwrap();
    }

    let cancel = CancellationToken::new();
    cancel.cancel();

    engine.run(cancel, rx).await.unwrap();
    assert_eq!(manager.call_count(), 0);
}

#[tokio::test]
async fn in_flight_backend_call_completes_before_shutdown() {
    struct SlowManager {
        completed: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl RecordManager for SlowManager {
        async fn add_record(&self, _spec: &SrvRecordSpec) -> srv_announcer_core::Result<RecordChange> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(RecordChange::Created)
        }

        async fn remove_record(
            &self,
            _spec: &SrvRecordSpec,
        ) -> srv_announcer_core::Result<RecordChange> {
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(RecordChange::Removed)
        }

        fn manager_name(&self) -> &'static str {
            "slow"
        }
    }

    let completed = Arc::new(AtomicUsize::new(0));
    let (engine, mut events) = ReconciliationEngine::new(
        Box::new(SlowManager {
            completed: Arc::clone(&completed),
        }),
        spec(),
        &EngineConfig::default(),
    )
    .expect("engine construction succeeds");

    let (tx, rx) = mpsc::channel(16);
    let cancel = CancellationToken::new();
    let engine_handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { engine.run(cancel, rx).await }
    });

    tx.send(Health::Healthy).await.unwrap();
    wait_for(&mut events, |e| matches!(e, EngineEvent::TransitionDetected { .. })).await;

    // Shutdown while the add is in progress
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(5), engine_handle)
        .await
        .expect("engine should terminate within 5 seconds even during an update")
        .unwrap()
        .unwrap();

    assert_eq!(completed.load(Ordering::SeqCst), 1, "the in-flight add ran to completion");
}

#[tokio::test]
async fn announcer_joins_health_source_on_shutdown() {
    struct CountingSource {
        running: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl HealthSource for CountingSource {
        async fn run(&self, cancel: CancellationToken, tx: mpsc::Sender<Health>) {
            self.running.fetch_add(1, Ordering::SeqCst);
            let mut ticker = tokio::time::interval(Duration::from_millis(10));
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        if !srv_announcer_core::traits::send_health(&cancel, &tx, Health::Healthy).await {
                            break;
                        }
                    }
                }
            }
            self.running.fetch_sub(1, Ordering::SeqCst);
        }

        fn source_name(&self) -> &'static str {
            "counting"
        }
    }

    let running = Arc::new(AtomicUsize::new(0));
    let manager = RecordingManager::new();
    let (announcer, mut events) = Announcer::new(
        Box::new(CountingSource {
            running: Arc::clone(&running),
        }),
        Box::new(manager.clone()),
        spec(),
        &EngineConfig::default(),
    )
    .expect("announcer construction succeeds");

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(announcer.run(cancel.clone()));

    wait_for(&mut events, |e| matches!(e, EngineEvent::RecordAdded { .. })).await;
    assert_eq!(running.load(Ordering::SeqCst), 1);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("announcer should terminate within 5 seconds")
        .unwrap()
        .unwrap();

    assert_eq!(running.load(Ordering::SeqCst), 0, "health source task must have exited");
    // Many healthy observations, one backend call
    assert_eq!(manager.calls(), vec![Call::Add]);
}

#[tokio::test]
async fn fatal_engine_error_stops_health_source() {
    let (source, inject) = MockHealthSource::new();
    let manager = RecordingManager::new();
    manager.fail_next([Outcome::Fatal]);

    let (announcer, _events) = Announcer::new(
        Box::new(source),
        Box::new(manager.clone()),
        spec(),
        &EngineConfig::default(),
    )
    .expect("announcer construction succeeds");

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(announcer.run(cancel.clone()));

    inject.send(Health::Healthy).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("announcer should stop on a fatal error")
        .unwrap();

    assert!(result.expect_err("fatal error is returned").is_config());
    assert!(!cancel.is_cancelled(), "the caller's token is left to the caller");
}
