// # Record Manager Trait
//
// Defines the interface for ensuring the presence or absence of the managed
// SRV entry in its record set.
//
// ## Implementations
//
// - Cloudflare: `srv-announcer-provider-cloudflare` crate
// - Dry-run: `DryRunRecordManager` in this crate
// - In-memory record set: `MemoryRecordManager` in this crate

use async_trait::async_trait;
use crate::config::SrvRecordSpec;

/// Result of an add/remove operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordChange {
    /// The entry was created
    Created,
    /// The entry was deleted
    Removed,
    /// The record set already was in the requested state (or nothing was applied)
    Unchanged,
}

/// Trait for record manager implementations
///
/// A record manager is bound to one record set (zone plus `_service._proto.name`)
/// at construction time. Each call ensures a state for the single entry
/// described by the [`SrvRecordSpec`]; other entries in the set are never
/// modified.
///
/// # Idempotency
///
/// Both operations must be idempotent: `add_record` on a present entry and
/// `remove_record` on an absent entry succeed with [`RecordChange::Unchanged`].
///
/// # Errors
///
/// - [`Error::Backend`](crate::Error::Backend): transient failure; the engine
///   retries on the next qualifying observation
/// - [`Error::Config`](crate::Error::Config): the zone or record set cannot be
///   resolved (or credentials are rejected); the engine stops
///
/// Managers must not retry, sleep, or spawn tasks. Retry cadence is owned by
/// the engine and the health source interval.
#[async_trait]
pub trait RecordManager: Send + Sync {
    /// Ensure the entry is present in the record set
    async fn add_record(&self, spec: &SrvRecordSpec) -> Result<RecordChange, crate::Error>;

    /// Ensure the entry is absent from the record set
    async fn remove_record(&self, spec: &SrvRecordSpec) -> Result<RecordChange, crate::Error>;

    /// Get the manager name (for logging/debugging)
    fn manager_name(&self) -> &'static str;
}
