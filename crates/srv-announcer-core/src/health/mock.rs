// # Mock Health Source
//
// Forwards externally injected observations to the engine. Used by tests and
// by embedders that already know the endpoint state from elsewhere.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::traits::{Health, HealthSource, send_health};

/// Health source driven by an injection handle
///
/// # Example
///
/// ```rust,ignore
/// let (source, inject) = MockHealthSource::new();
/// inject.send(Health::Healthy)?;
/// ```
pub struct MockHealthSource {
    injected: Mutex<Option<mpsc::UnboundedReceiver<Health>>>,
}

impl MockHealthSource {
    /// Create a mock source and the handle used to inject observations
    pub fn new() -> (Self, mpsc::UnboundedSender<Health>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let source = Self {
            injected: Mutex::new(Some(rx)),
        };
        (source, tx)
    }
}

#[async_trait]
impl HealthSource for MockHealthSource {
    async fn run(&self, cancel: CancellationToken, tx: mpsc::Sender<Health>) {
        let receiver = self
            .injected
            .lock()
            .ok()
            .and_then(|mut guard| guard.take());

        let Some(receiver) = receiver else {
            warn!("Mock health source can only run once");
            return;
        };

        let mut injected = UnboundedReceiverStream::new(receiver);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Mock health source cancelled");
                    return;
                }
                next = injected.next() => {
                    let Some(health) = next else {
                        debug!("Mock health source injection handle dropped");
                        return;
                    };
                    if !send_health(&cancel, &tx, health).await {
                        return;
                    }
                }
            }
        }
    }

    fn source_name(&self) -> &'static str {
        "mock"
    }
}
