// # Health Source Implementations
//
// Health sources that need no I/O. The TCP dial check lives in the
// `srv-announcer-check-tcp` crate.

pub mod mock;

pub use mock::MockHealthSource;
