//! Coordination client testing utilities.

/// Scripted keys client with ordered expectations and a change feed.
pub mod mockkeys;

/// Tracing subscriber setup for tests.
pub mod tracing_setup;
