// # Health Source Trait
//
// Defines the interface for components that observe the reachability of the
// announced endpoint.
//
// ## Implementations
//
// - TCP dial check: `srv-announcer-check-tcp` crate
// - Injected observations: `MockHealthSource` in this crate
//
// ## Usage
//
// ```rust,ignore
// use srv_announcer_core::{Health, HealthSource};
// use tokio_util::sync::CancellationToken;
//
// #[tokio::main]
// async fn main() {
//     let source = /* HealthSource implementation */;
//     let cancel = CancellationToken::new();
//     let (tx, mut rx) = tokio::sync::mpsc::channel(16);
//
//     tokio::spawn({
//         let cancel = cancel.clone();
//         async move { source.run(cancel, tx).await }
//     });
//
//     while let Some(health) = rx.recv().await {
//         println!("endpoint is {}", health);
//     }
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// A single health observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// The endpoint accepted a connection
    Healthy,
    /// The endpoint could not be reached
    Unhealthy,
}

impl Health {
    /// Whether this observation is `Healthy`
    pub fn is_healthy(self) -> bool {
        matches!(self, Health::Healthy)
    }
}

impl From<bool> for Health {
    fn from(healthy: bool) -> Self {
        if healthy {
            Health::Healthy
        } else {
            Health::Unhealthy
        }
    }
}

impl From<Health> for bool {
    fn from(health: Health) -> Self {
        health.is_healthy()
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Health::Healthy => f.write_str("healthy"),
            Health::Unhealthy => f.write_str("unhealthy"),
        }
    }
}

/// Trait for health source implementations
///
/// A health source runs on its own task and schedule, pushing one [`Health`]
/// value per completed probe into the channel handed to [`run`](Self::run).
///
/// # Contract
///
/// - Return promptly once `cancel` fires, without sending further values
/// - Every send must also observe `cancel` (use [`send_health`])
/// - Return when the receiving side has been dropped
/// - A failed probe is an `Unhealthy` observation, never an error
/// - Never call the record manager or decide whether DNS should change
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Produce observations until cancelled
    ///
    /// # Parameters
    ///
    /// - `cancel`: Token shared with the engine; stop when it fires
    /// - `tx`: Channel to the engine
    async fn run(&self, cancel: CancellationToken, tx: mpsc::Sender<Health>);

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Send an observation, giving up if `cancel` fires first
///
/// # Returns
///
/// `true` if the value was delivered, `false` if the source should stop
/// (cancelled, or the engine dropped its receiver).
pub async fn send_health(
    cancel: &CancellationToken,
    tx: &mpsc::Sender<Health>,
    health: Health,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        result = tx.send(health) => result.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_bool_conversions() {
        assert_eq!(Health::from(true), Health::Healthy);
        assert_eq!(Health::from(false), Health::Unhealthy);
        assert!(bool::from(Health::Healthy));
        assert!(!bool::from(Health::Unhealthy));
        assert_eq!(Health::Healthy.to_string(), "healthy");
    }

    #[tokio::test]
    async fn test_send_health_delivers() {
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(1);

        assert!(send_health(&cancel, &tx, Health::Healthy).await);
        assert_eq!(rx.recv().await, Some(Health::Healthy));
    }

    #[tokio::test]
    async fn test_send_health_gives_up_on_full_channel_when_cancelled() {
        let cancel = CancellationToken::new();
        let (tx, _rx) = mpsc::channel(1);

        assert!(send_health(&cancel, &tx, Health::Healthy).await);

        // Channel is full now; the next send would block forever without cancellation
        let pending = tokio::spawn({
            let cancel = cancel.clone();
            let tx = tx.clone();
            async move { send_health(&cancel, &tx, Health::Unhealthy).await }
        });

        tokio::task::yield_now().await;
        cancel.cancel();

        let delivered = tokio::time::timeout(std::time::Duration::from_secs(1), pending)
            .await
            .expect("send returns after cancellation")
            .unwrap();
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_send_health_reports_closed_receiver() {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        assert!(!send_health(&cancel, &tx, Health::Healthy).await);
    }
}
