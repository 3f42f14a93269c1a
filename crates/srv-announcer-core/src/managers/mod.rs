// # Record Manager Implementations
//
// Backend-free implementations of the RecordManager trait. Real DNS backends
// live in their own crates.

pub mod dry_run;
pub mod memory;

pub use dry_run::DryRunRecordManager;
pub use memory::{MemoryRecordManager, SrvEntry};
