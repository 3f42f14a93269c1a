//! Test doubles and common utilities for engine contract tests

#![allow(dead_code)]

use srv_announcer_core::error::{Error, Result};
use srv_announcer_core::traits::{Health, RecordChange, RecordManager};
use srv_announcer_core::{EngineConfig, EngineEvent, ReconciliationEngine, SrvRecordSpec};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const RECORD_NAME: &str = "_sip._tcp.example.com";

/// A backend call observed by [`RecordingManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Add,
    Remove,
}

/// Scripted outcome for the next backend call
#[derive(Debug, Clone)]
pub enum Outcome {
    Transient,
    Fatal,
}

/// A RecordManager that records every call and can be scripted to fail
///
/// Clones share the call log and the script.
#[derive(Clone, Default)]
pub struct RecordingManager {
    calls: Arc<Mutex<Vec<Call>>>,
    script: Arc<Mutex<VecDeque<Option<Outcome>>>>,
    present: Arc<Mutex<bool>>,
}

impl RecordingManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue failures consumed by the next calls, in order
    pub fn fail_next(&self, outcomes: impl IntoIterator<Item = Outcome>) {
        self.script(outcomes.into_iter().map(Some));
    }

    /// Queue per-call outcomes; `None` lets the call succeed
    pub fn script(&self, outcomes: impl IntoIterator<Item = Option<Outcome>>) {
        self.script.lock().unwrap().extend(outcomes);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Whether the simulated backend holds the entry
    pub fn is_present(&self) -> bool {
        *self.present.lock().unwrap()
    }

    fn record(&self, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match self.script.lock().unwrap().pop_front().flatten() {
            None => Ok(()),
            Some(Outcome::Transient) => Err(Error::backend("recording", "503 Service Unavailable")),
            Some(Outcome::Fatal) => Err(Error::config("zone example.com not found")),
        }
    }
}

#[async_trait::async_trait]
impl RecordManager for RecordingManager {
    async fn add_record(&self, _spec: &SrvRecordSpec) -> Result<RecordChange> {
        self.record(Call::Add)?;
        let mut present = self.present.lock().unwrap();
        let change = if *present {
            RecordChange::Unchanged
        } else {
            RecordChange::Created
        };
        *present = true;
        Ok(change)
    }

    async fn remove_record(&self, _spec: &SrvRecordSpec) -> Result<RecordChange> {
        self.record(Call::Remove)?;
        let mut present = self.present.lock().unwrap();
        let change = if *present {
            RecordChange::Removed
        } else {
            RecordChange::Unchanged
        };
        *present = false;
        Ok(change)
    }

    fn manager_name(&self) -> &'static str {
        "recording"
    }
}

pub fn spec() -> SrvRecordSpec {
    SrvRecordSpec::new("node1.example.com.").with_port(5060)
}

pub fn signals(values: &[bool]) -> Vec<Health> {
    values.iter().copied().map(Health::from).collect()
}

/// Feed `sequence` to a fresh engine and run it until the channel drains
///
/// Returns the engine result and every event it emitted.
pub async fn run_sequence(
    manager: Box<dyn RecordManager>,
    sequence: &[Health],
) -> (Result<()>, Vec<EngineEvent>) {
    let config = EngineConfig {
        health_channel_capacity: sequence.len().max(1),
        event_channel_capacity: 1000,
    };
    let (engine, mut events) =
        ReconciliationEngine::new(manager, spec(), &config).expect("engine construction succeeds");

    let (tx, rx) = mpsc::channel(config.health_channel_capacity);
    for health in sequence {
        tx.send(*health).await.expect("send succeeds");
    }
    drop(tx);

    let result = engine.run(CancellationToken::new(), rx).await;
    drop(engine);

    let mut collected = Vec::new();
    while let Some(event) = events.recv().await {
        collected.push(event);
    }

    (result, collected)
}

/// Events describing transitions and their outcome, without the payload
/// of the record change
pub fn transition_log(events: &[EngineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            EngineEvent::TransitionDetected { from, to } => {
                Some(format!("transition {:?} -> {}", from, to))
            }
            EngineEvent::RecordAdded { .. } => Some("added".to_string()),
            EngineEvent::RecordRemoved { .. } => Some("removed".to_string()),
            EngineEvent::ObservationSkipped { health } => Some(format!("skipped {}", health)),
            _ => None,
        })
        .collect()
}
