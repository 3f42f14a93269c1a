// # Memory Record Manager
//
// In-memory implementation of RecordManager.
//
// ## Purpose
//
// Simulates one SRV record set inside the process. Useful for tests and for
// embedding the engine where the "backend" is another in-process component.
// Entries seeded by someone else are kept untouched, just like a real zone.
//
// ## Crash Behavior
//
// All state is lost on restart. That matches the sidecar itself, which keeps
// no health history across restarts.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::SrvRecordSpec;
use crate::traits::{RecordChange, RecordManager};
use crate::Error;

/// One entry of an SRV record set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvEntry {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
    pub ttl: u32,
}

impl From<&SrvRecordSpec> for SrvEntry {
    fn from(spec: &SrvRecordSpec) -> Self {
        Self {
            priority: spec.priority,
            weight: spec.weight,
            port: spec.port,
            target: spec.target.clone(),
            ttl: spec.ttl,
        }
    }
}

/// In-memory record set
///
/// Clones share the same record set, so a test can keep one handle while the
/// engine owns another.
///
/// # Example
///
/// ```rust
/// use srv_announcer_core::{MemoryRecordManager, RecordManager, SrvRecordSpec};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let manager = MemoryRecordManager::new("_sip._tcp.example.com");
///     let spec = SrvRecordSpec::new("node1.example.com.").with_port(5060);
///
///     manager.add_record(&spec).await?;
///     assert!(manager.contains(&spec).await);
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryRecordManager {
    record_name: String,
    entries: Arc<RwLock<Vec<SrvEntry>>>,
    mutations: Arc<AtomicUsize>,
}

impl MemoryRecordManager {
    /// Create a manager for an empty record set
    pub fn new(record_name: impl Into<String>) -> Self {
        Self {
            record_name: record_name.into(),
            entries: Arc::new(RwLock::new(Vec::new())),
            mutations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a manager for a record set that already holds `entries`
    pub fn with_entries(record_name: impl Into<String>, entries: Vec<SrvEntry>) -> Self {
        let manager = Self::new(record_name);
        Self {
            entries: Arc::new(RwLock::new(entries)),
            ..manager
        }
    }

    /// The record set name
    pub fn record_name(&self) -> &str {
        &self.record_name
    }

    /// Snapshot of all entries in the record set
    pub async fn entries(&self) -> Vec<SrvEntry> {
        self.entries.read().await.clone()
    }

    /// Whether the entry described by `spec` is present
    pub async fn contains(&self, spec: &SrvRecordSpec) -> bool {
        self.entries
            .read()
            .await
            .iter()
            .any(|e| spec.matches(e.priority, e.weight, e.port, &e.target))
    }

    /// Number of entries in the record set
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Check if the record set is empty
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Number of calls that actually changed the record set
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordManager for MemoryRecordManager {
    async fn add_record(&self, spec: &SrvRecordSpec) -> Result<RecordChange, Error> {
        let mut guard = self.entries.write().await;
        if guard
            .iter()
            .any(|e| spec.matches(e.priority, e.weight, e.port, &e.target))
        {
            return Ok(RecordChange::Unchanged);
        }

        guard.push(SrvEntry::from(spec));
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(RecordChange::Created)
    }

    async fn remove_record(&self, spec: &SrvRecordSpec) -> Result<RecordChange, Error> {
        let mut guard = self.entries.write().await;
        let before = guard.len();
        guard.retain(|e| !spec.matches(e.priority, e.weight, e.port, &e.target));

        if guard.len() == before {
            return Ok(RecordChange::Unchanged);
        }

        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(RecordChange::Removed)
    }

    fn manager_name(&self) -> &'static str {
        "memory"
    }
}
