//! Scripted keys client for testing code written against `coordkv_shared::keys::KeysApi`.
//!
//! Instead of a live coordination cluster, tests register the exact sequence of reads
//! and writes the code under test is going to issue, along with the response or error
//! each one produces. The mock hands those back strictly in registration order and
//! fails any call that deviates from the script.
//!
//! # Features
//! - FIFO matching of expected `get` and `set` calls
//! - Scripted errors surfaced verbatim
//! - Fulfillment check for unconsumed and out-of-order expectations
//! - Change feed replaying read expectations as watch events, with manual injection
//!
//! # Example
//! ```ignore
//! use coordkv_testing::mockkeys::FakeKeysApi;
//! use coordkv_shared::keys::KeysApi;
//!
//! let mock = FakeKeysApi::new();
//! mock.expect_set("/config/leader", "node-1");
//! mock.expect_get("/config/leader").will_return_value("node-1");
//!
//! mock.set("/config/leader", "node-1", None).await.unwrap();
//! let resp = mock.get("/config/leader", None).await.unwrap();
//! assert_eq!(resp.node.value, "node-1");
//!
//! mock.expectations_fulfilled().unwrap();
//! ```

/// Tunables for the mock.
mod config;
/// Error types for the mock.
mod error;
/// Expectation queues and matching.
mod expectation;
/// Change feed over the read expectations.
mod feed;
/// The `KeysApi` implementation.
mod store;

// Re-exports
pub use config::{FeedMode, MockConfig};
pub use error::{MockKeysError, Operation, Result, ScriptedError};
pub use expectation::{ExpectationHandle, ExpectationStore};
pub use feed::{ChangeEvent, ChangeFeed};
pub use store::FakeKeysApi;
