// # Dry-Run Record Manager
//
// Satisfies the RecordManager contract without touching any backend: every
// call logs the action that would have been taken and succeeds.

use async_trait::async_trait;
use tracing::info;

use crate::config::SrvRecordSpec;
use crate::traits::{RecordChange, RecordManager};
use crate::Error;

/// Record manager that only logs intended changes
#[derive(Debug, Clone)]
pub struct DryRunRecordManager {
    record_name: String,
}

impl DryRunRecordManager {
    /// Create a dry-run manager for the given record set name
    pub fn new(record_name: impl Into<String>) -> Self {
        Self {
            record_name: record_name.into(),
        }
    }

    /// The record set this manager pretends to manage
    pub fn record_name(&self) -> &str {
        &self.record_name
    }
}

#[async_trait]
impl RecordManager for DryRunRecordManager {
    async fn add_record(&self, spec: &SrvRecordSpec) -> Result<RecordChange, Error> {
        info!(
            record_set = %self.record_name,
            entry = %spec,
            ttl = spec.ttl,
            "[DRY-RUN] Would add SRV entry"
        );
        Ok(RecordChange::Unchanged)
    }

    async fn remove_record(&self, spec: &SrvRecordSpec) -> Result<RecordChange, Error> {
        info!(
            record_set = %self.record_name,
            entry = %spec,
            "[DRY-RUN] Would remove SRV entry"
        );
        Ok(RecordChange::Unchanged)
    }

    fn manager_name(&self) -> &'static str {
        "dry-run"
    }
}
