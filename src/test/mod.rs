//! Shared fixtures for unit tests.
//!
//! [`ProcBuilder`] assembles small procedures statement by statement, so
//! tests can state the IR they need in a few lines.


pub use builder::ProcBuilder;
