//! Core traits for the SRV announcer
//!
//! This module defines the abstract interfaces the engine consumes.
//!
//! - [`HealthSource`]: Produce health observations for one endpoint
//! - [`RecordManager`]: Add or remove the managed SRV entry

pub mod health_source;
pub mod record_manager;

pub use health_source::{Health, HealthSource, send_health};
pub use record_manager::{RecordChange, RecordManager};
