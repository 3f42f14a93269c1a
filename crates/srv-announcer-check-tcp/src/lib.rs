// # TCP Health Check
//
// This crate provides a TCP dial health source for the SRV announcer.
//
// ## Behavior
//
// - Probes once immediately, then once per interval
// - A probe is a TCP connect to `host:port`, bounded by the timeout
// - Connected → `Healthy`; refused, unreachable, unresolvable or timed out → `Unhealthy`
// - Missed ticks (slow probes) are delayed, never bursted
// - Cancellation is observed while waiting for the next tick, during the
//   probe, and while handing the result to the engine

use async_trait::async_trait;
use srv_announcer_core::config::HealthCheckConfig;
use srv_announcer_core::traits::{Health, HealthSource, send_health};
use srv_announcer_core::{Error, Result};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// TCP dial health source
#[derive(Debug, Clone)]
pub struct TcpHealthCheck {
    /// `host:port` to dial
    target: String,

    /// Timeout for a single connect attempt
    timeout: Duration,

    /// Interval between attempts
    interval: Duration,
}

impl TcpHealthCheck {
    /// Create a new TCP health check
    ///
    /// # Parameters
    ///
    /// - `target`: `host:port` to dial
    /// - `timeout`: Timeout for each connect attempt
    /// - `interval`: Interval between attempts
    pub fn new(target: impl Into<String>, timeout: Duration, interval: Duration) -> Self {
        Self {
            target: target.into(),
            timeout,
            interval,
        }
    }

    /// Create from a validated check configuration
    pub fn from_config(config: &HealthCheckConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.target.clone(), config.timeout, config.interval))
    }

    /// The dialed `host:port`
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Perform a single connect attempt
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The connection was established (and is closed again)
    /// - `Err(Error::Probe)`: Connect failed or timed out
    pub async fn probe(&self) -> Result<()> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.target)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(Error::probe(format!("connect to {} failed: {}", self.target, e))),
            Err(_) => Err(Error::probe(format!(
                "connect to {} timed out after {:?}",
                self.target, self.timeout
            ))),
        }
    }
}

#[async_trait]
impl HealthSource for TcpHealthCheck {
    async fn run(&self, cancel: CancellationToken, tx: mpsc::Sender<Health>) {
        info!(
            check_target = %self.target,
            interval = ?self.interval,
            timeout = ?self.timeout,
            "Starting TCP health check"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.probe() => outcome,
            };

            let health = match outcome {
                Ok(()) => {
                    debug!(check_target = %self.target, "Health check succeeded");
                    Health::Healthy
                }
                Err(e) => {
                    debug!(check_target = %self.target, error = %e, "Health check failed");
                    Health::Unhealthy
                }
            };

            if !send_health(&cancel, &tx, health).await {
                break;
            }
        }

        debug!(check_target = %self.target, "TCP health check stopped");
    }

    fn source_name(&self) -> &'static str {
        "tcp"
    }
}
