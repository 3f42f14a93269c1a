//! Reconciliation engine
//!
//! The ReconciliationEngine is responsible for:
//! - Consuming health observations from a HealthSource channel
//! - Debouncing repeated identical observations
//! - Mapping health transitions to RecordManager add/remove calls
//! - Absorbing transient backend failures and stopping on fatal ones
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ HealthSource │─── Health ───┐
//! └──────────────┘              │
//!                               ▼
//!                  ┌───────────────────────┐      ┌────────────┐
//!                  │ ReconciliationEngine  │─────▶│   Events   │
//!                  └───────────────────────┘      │  (notify)  │
//!                               │                 └────────────┘
//!                               ▼
//!                      ┌─────────────────┐
//!                      │  RecordManager  │
//!                      │ (add / remove)  │
//!                      └─────────────────┘
//! ```
//!
//! ## State Machine
//!
//! ```text
//! Unset     --(healthy)-->   Healthy   [add_record]
//! Unset     --(unhealthy)--> Unhealthy [remove_record]
//! Healthy   --(unhealthy)--> Unhealthy [remove_record]
//! Unhealthy --(healthy)-->   Healthy   [add_record]
//! Healthy   --(healthy)-->   Healthy   [no-op]
//! Unhealthy --(unhealthy)--> Unhealthy [no-op]
//! any       --(cancel)-->    Terminated
//! ```
//!
//! ## Retry Policy
//!
//! The last known state only advances once the backend call succeeded. A
//! transient failure therefore leaves the transition pending, and the next
//! observation with the same value re-attempts the same call. Observations
//! equal to the last applied state stay no-ops.

use crate::config::{EngineConfig, SrvRecordSpec};
use crate::error::Result;
use crate::traits::{Health, RecordChange, RecordManager};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Events emitted by the ReconciliationEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started,

    /// An observation differs from the last applied state
    TransitionDetected {
        from: Option<Health>,
        to: Health,
    },

    /// The entry was ensured present
    RecordAdded {
        change: RecordChange,
    },

    /// The entry was ensured absent
    RecordRemoved {
        change: RecordChange,
    },

    /// Observation matched the last applied state (debounced)
    ObservationSkipped {
        health: Health,
    },

    /// A transient backend failure; retried on the next matching observation
    ApplyFailed {
        health: Health,
        error: String,
    },

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// Backend call required by an observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Call `add_record`
    Add,
    /// Call `remove_record`
    Remove,
}

/// Decide which backend call (if any) an observation requires
///
/// `last_known` is the last state successfully applied to the backend,
/// `None` before the first one.
pub fn plan(last_known: Option<Health>, observed: Health) -> Option<Action> {
    if last_known == Some(observed) {
        return None;
    }

    match observed {
        Health::Healthy => Some(Action::Add),
        Health::Unhealthy => Some(Action::Remove),
    }
}

/// Core reconciliation engine
///
/// ## Lifecycle
///
/// 1. Create with [`ReconciliationEngine::new()`]
/// 2. Start with [`ReconciliationEngine::run()`]
/// 3. Engine runs until the token is cancelled, the health channel closes,
///    or a non-retryable error occurs
///
/// ## Threading
///
/// All observations are handled on the task calling `run`, one at a time, so
/// at most one backend call is ever in flight.
pub struct ReconciliationEngine {
    /// Record manager for the managed entry
    manager: Box<dyn RecordManager>,

    /// The managed entry
    spec: SrvRecordSpec,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ReconciliationEngine {
    /// Create a new reconciliation engine
    ///
    /// # Parameters
    ///
    /// - `manager`: Record manager implementation
    /// - `spec`: The SRV entry to announce
    /// - `config`: Engine configuration
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        manager: Box<dyn RecordManager>,
        spec: SrvRecordSpec,
        config: &EngineConfig,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;
        spec.validate()?;

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let engine = Self {
            manager,
            spec,
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// The managed entry
    pub fn spec(&self) -> &SrvRecordSpec {
        &self.spec
    }

    /// Run the engine
    ///
    /// # Parameters
    ///
    /// - `cancel`: Shared cancellation token; checked before every observation
    /// - `health_rx`: Observations from the health source, in production order
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Cancelled, or the health source went away
    /// - `Err(Error)`: A non-retryable error from the record manager
    pub async fn run(
        &self,
        cancel: CancellationToken,
        health_rx: mpsc::Receiver<Health>,
    ) -> Result<()> {
        info!(
            manager = self.manager.manager_name(),
            entry = %self.spec,
            "Reconciliation engine started"
        );
        self.emit_event(EngineEvent::Started);

        let mut observations = ReceiverStream::new(health_rx);
        let mut last_known: Option<Health> = None;

        let (result, reason) = loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!("Shutdown signal received");
                    break (Ok(()), "Shutdown signal".to_string());
                }

                next = observations.next() => {
                    let Some(health) = next else {
                        warn!("Health source stopped sending observations");
                        break (Ok(()), "Health source closed".to_string());
                    };

                    if let Err(e) = self.reconcile(&mut last_known, health).await {
                        error!(
                            manager = self.manager.manager_name(),
                            srv_target = %self.spec.target,
                            error = %e,
                            "Fatal record manager error, stopping"
                        );
                        let reason = e.to_string();
                        break (Err(e), reason);
                    }
                }
            }
        };

        self.emit_event(EngineEvent::Stopped { reason });
        info!("Reconciliation engine stopped");

        result
    }

    /// Handle one observation
    ///
    /// Retryable errors are absorbed here; anything returned is fatal.
    async fn reconcile(&self, last_known: &mut Option<Health>, health: Health) -> Result<()> {
        let Some(action) = plan(*last_known, health) else {
            debug!(health = %health, "Observation unchanged, skipping");
            self.emit_event(EngineEvent::ObservationSkipped { health });
            return Ok(());
        };

        info!(
            from = ?last_known,
            to = %health,
            entry = %self.spec,
            "Health transition"
        );
        self.emit_event(EngineEvent::TransitionDetected {
            from: *last_known,
            to: health,
        });

        let outcome = match action {
            Action::Add => self.manager.add_record(&self.spec).await,
            Action::Remove => self.manager.remove_record(&self.spec).await,
        };

        match outcome {
            Ok(change) => {
                *last_known = Some(health);
                let event = match action {
                    Action::Add => {
                        info!(change = ?change, entry = %self.spec, "SRV entry announced");
                        EngineEvent::RecordAdded { change }
                    }
                    Action::Remove => {
                        info!(change = ?change, entry = %self.spec, "SRV entry withdrawn");
                        EngineEvent::RecordRemoved { change }
                    }
                };
                self.emit_event(event);
                Ok(())
            }
            Err(e) if e.is_retryable() => {
                warn!(
                    operation = ?action,
                    manager = self.manager.manager_name(),
                    srv_target = %self.spec.target,
                    error = %e,
                    "Record update failed, retrying on next matching observation"
                );
                self.emit_event(EngineEvent::ApplyFailed {
                    health,
                    error: e.to_string(),
                });
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Emit an engine event
    ///
    /// # Parameters
    ///
    /// - `event`: The event to emit
    fn emit_event(&self, event: EngineEvent) {
        // Dropping the receiver is allowed; a full channel must never stall reconciliation
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}
