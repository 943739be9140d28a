//! Domain layer: pure business logic, no I/O concerns beyond the ports.

pub mod billing;
pub mod foundation;
