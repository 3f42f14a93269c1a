// # srv-announcer-core
//
// Core library for the SRV announcer sidecar.
//
// ## Architecture Overview
//
// The sidecar keeps one entry of a DNS SRV record set in sync with the
// reachability of a single endpoint:
// - **HealthSource**: Trait for components producing health observations
// - **RecordManager**: Trait for adding/removing the managed SRV entry
// - **ReconciliationEngine**: Debounces observations and drives the manager
// - **Announcer**: Runs a health source and the engine under one cancellation token
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Reconciliation is separate from probing and backends
// 2. **Event-Driven**: Health observations arrive over a channel, never polled by the engine
// 3. **Idempotency**: Managers tolerate repeated add/remove calls
// 4. **Library-First**: Everything the daemon does is usable as a library
// 5. **Explicit Cancellation**: A single `CancellationToken` stops every task

pub mod traits;
pub mod engine;
pub mod announcer;
pub mod config;
pub mod error;
pub mod health;
pub mod managers;

// Re-export core types for convenience
pub use traits::{Health, HealthSource, RecordChange, RecordManager};
pub use engine::{EngineEvent, ReconciliationEngine};
pub use announcer::Announcer;
pub use config::{EngineConfig, HealthCheckConfig, SrvRecordSpec};
pub use error::{Error, Result};
pub use health::MockHealthSource;
pub use managers::{DryRunRecordManager, MemoryRecordManager};
