//! Configuration types for the SRV announcer
//!
//! Everything here is constructed once at startup and validated before the
//! engine runs. The engine itself assumes a valid [`SrvRecordSpec`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The managed SRV entry (RFC 2782 RDATA plus TTL)
///
/// The record-set name and zone are bound into the [`RecordManager`] instead;
/// this struct only describes the one entry the process owns inside that set.
///
/// [`RecordManager`]: crate::traits::RecordManager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SrvRecordSpec {
    /// Target host, usually dot-terminated (e.g., "node1.example.com.")
    pub target: String,

    /// Port the service listens on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Priority of the entry (lower is preferred)
    #[serde(default = "default_priority")]
    pub priority: u16,

    /// Relative weight among entries of equal priority
    #[serde(default = "default_weight")]
    pub weight: u16,

    /// TTL of the record in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl SrvRecordSpec {
    /// Create a spec for `target` with default port, priority, weight and TTL
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            port: default_port(),
            priority: default_priority(),
            weight: default_weight(),
            ttl: default_ttl(),
        }
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: u16) -> Self {
        self.priority = priority;
        self
    }

    /// Set the weight
    pub fn with_weight(mut self, weight: u16) -> Self {
        self.weight = weight;
        self
    }

    /// Set the TTL in seconds
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = ttl;
        self
    }

    /// Whether the target ends with a dot
    pub fn is_fully_qualified(&self) -> bool {
        self.target.ends_with('.')
    }

    /// The target without its trailing dot, as used for dialing
    pub fn target_host(&self) -> &str {
        self.target.trim_end_matches('.')
    }

    /// Whether an existing SRV entry is the one described by this spec
    ///
    /// TTL is a property of the whole record set and does not take part.
    /// Targets compare case-insensitively and ignore a trailing dot.
    pub fn matches(&self, priority: u16, weight: u16, port: u16, target: &str) -> bool {
        self.priority == priority
            && self.weight == weight
            && self.port == port
            && self
                .target_host()
                .eq_ignore_ascii_case(target.trim_end_matches('.'))
    }

    /// Validate the entry
    pub fn validate(&self) -> Result<(), crate::Error> {
        let host = self.target_host();
        if host.is_empty() {
            return Err(crate::Error::config("SRV record target cannot be empty"));
        }

        if host.len() > 253 {
            return Err(crate::Error::config(format!(
                "SRV record target too long: {} chars (max 253)",
                host.len()
            )));
        }

        for label in host.split('.') {
            if label.is_empty() {
                return Err(crate::Error::config(format!(
                    "SRV record target has empty label: '{}'",
                    self.target
                )));
            }

            if label.len() > 63 {
                return Err(crate::Error::config(format!(
                    "SRV record target label too long: '{}'",
                    label
                )));
            }

            if !label
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(crate::Error::config(format!(
                    "SRV record target label contains invalid characters: '{}'",
                    label
                )));
            }
        }

        if self.ttl == 0 {
            return Err(crate::Error::config("SRV record TTL must be > 0"));
        }

        Ok(())
    }
}

impl fmt::Display for SrvRecordSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.priority, self.weight, self.port, self.target
        )
    }
}

fn default_port() -> u16 {
    443
}

fn default_priority() -> u16 {
    10
}

fn default_weight() -> u16 {
    10
}

fn default_ttl() -> u32 {
    60
}

/// TCP health check configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheckConfig {
    /// `host:port` to dial
    pub target: String,

    /// Interval between checks
    #[serde(default = "default_check_interval")]
    pub interval: Duration,

    /// Timeout for each check
    #[serde(default = "default_check_timeout")]
    pub timeout: Duration,
}

impl HealthCheckConfig {
    /// Create a check configuration with default interval and timeout
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            interval: default_check_interval(),
            timeout: default_check_timeout(),
        }
    }

    /// Derive the check target from the SRV record (`target:port`)
    pub fn derived_from(spec: &SrvRecordSpec) -> Self {
        Self::new(format!("{}:{}", spec.target_host(), spec.port))
    }

    /// Set the interval between checks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the timeout for each check
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the check configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        let Some((host, port)) = self.target.rsplit_once(':') else {
            return Err(crate::Error::config(format!(
                "Check target must be host:port, got '{}'",
                self.target
            )));
        };

        if host.is_empty() {
            return Err(crate::Error::config(format!(
                "Check target has an empty host: '{}'",
                self.target
            )));
        }

        if port.parse::<u16>().is_err() {
            return Err(crate::Error::config(format!(
                "Check target has an invalid port: '{}'",
                self.target
            )));
        }

        if self.interval.is_zero() {
            return Err(crate::Error::config("Check interval must be > 0"));
        }

        if self.timeout.is_zero() {
            return Err(crate::Error::config("Check timeout must be > 0"));
        }

        Ok(())
    }
}

fn default_check_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_check_timeout() -> Duration {
    Duration::from_secs(1)
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the channel between health source and engine
    ///
    /// Health sources wait for free capacity, but always give up on cancellation.
    #[serde(default = "default_health_channel_capacity")]
    pub health_channel_capacity: usize,

    /// Capacity of the engine event channel
    ///
    /// When full, events are dropped (with a warning log); reconciliation never waits.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.health_channel_capacity == 0 {
            return Err(crate::Error::config("Health channel capacity must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            health_channel_capacity: default_health_channel_capacity(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_health_channel_capacity() -> usize {
    16
}

fn default_event_channel_capacity() -> usize {
    100
}
