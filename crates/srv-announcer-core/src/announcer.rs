//! Announcer: one health source plus one engine under one cancellation token
//!
//! ```text
//!   cancel ─┬──────────────────────────────┐
//!           ▼                              ▼
//!   ┌──────────────┐  mpsc<Health>  ┌──────────────────────┐
//!   │ HealthSource │───────────────▶│ ReconciliationEngine │
//!   │ (spawned)    │                │ (caller's task)      │
//!   └──────────────┘                └──────────────────────┘
//! ```
//!
//! The source runs on a child token, so a fatal engine error stops probing
//! without cancelling the caller's token. `run` only returns once the source
//! task has finished.

use crate::config::{EngineConfig, SrvRecordSpec};
use crate::engine::{EngineEvent, ReconciliationEngine};
use crate::error::Result;
use crate::traits::{HealthSource, RecordManager};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Wires a [`HealthSource`] to a [`ReconciliationEngine`]
pub struct Announcer {
    source: Box<dyn HealthSource>,
    engine: ReconciliationEngine,
    health_channel_capacity: usize,
}

impl Announcer {
    /// Create an announcer
    ///
    /// # Returns
    ///
    /// A tuple of (announcer, event_receiver) where event_receiver yields engine events
    pub fn new(
        source: Box<dyn HealthSource>,
        manager: Box<dyn RecordManager>,
        spec: SrvRecordSpec,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        let (engine, events) = ReconciliationEngine::new(manager, spec, config)?;

        let announcer = Self {
            source,
            engine,
            health_channel_capacity: config.health_channel_capacity,
        };

        Ok((announcer, events))
    }

    /// Run until `cancel` fires or the engine hits a fatal error
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Self {
            source,
            engine,
            health_channel_capacity,
        } = self;

        let (tx, rx) = mpsc::channel(health_channel_capacity);
        let source_token = cancel.child_token();

        info!(source = source.source_name(), "Starting health source");
        let source_task = tokio::spawn({
            let token = source_token.clone();
            async move { source.run(token, tx).await }
        });

        let result = engine.run(cancel, rx).await;

        source_token.cancel();
        if let Err(e) = source_task.await {
            warn!(error = %e, "Health source task ended abnormally");
        }

        result
    }
}
