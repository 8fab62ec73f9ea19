//! Error types for the mock keys client.

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use coordkv_shared::error::{ClusterError, KeysError};
use thiserror::Error;

/// Result type for mock keys operations.
pub type Result<T> = std::result::Result<T, MockKeysError>;

/// Index reported by the "key not found" errors the mock fabricates.
pub(crate) const MOCK_CLUSTER_INDEX: u64 = 39881395;

/// The keys operation an expectation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Get,
    Set,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Get => f.write_str("Get"),
            Operation::Set => f.write_str("Set"),
        }
    }
}

/// An error attached to an expectation by the test, handed back verbatim when the
/// expectation is consumed.
///
/// The attached error is exposed as the source so that it can be downcast, e.g. to a
/// [`ClusterError`].
#[derive(Clone)]
pub struct ScriptedError(Arc<dyn StdError + Send + Sync + 'static>);

impl ScriptedError {
    pub fn new(err: impl Into<KeysError>) -> Self {
        let err: KeysError = err.into();
        ScriptedError(Arc::from(err))
    }

    /// Attempt to downcast the attached error to a concrete type.
    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        self.0.downcast_ref::<T>()
    }
}

impl fmt::Debug for ScriptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ScriptedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for ScriptedError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&*self.0)
    }
}

/// Errors returned by the mock keys client.
#[derive(Error, Debug, Clone)]
pub enum MockKeysError {
    #[error("Unexpected key {operation} for {key}, no expectation queued")]
    NoExpectationQueued { operation: Operation, key: String },

    #[error("{cluster}")]
    KeyMismatch {
        expected: String,
        requested: String,
        #[source]
        cluster: ClusterError,
    },

    #[error(
        "wrong key/value pair in Set, expected a set for {expected_key}/{expected_value}, got {key}/{value}"
    )]
    WriteMismatch {
        expected_key: String,
        expected_value: String,
        key: String,
        value: String,
    },

    #[error("malformed expected-{operation} for {key}, neither a response nor an error was set")]
    MalformedExpectation { operation: Operation, key: String },

    #[error(transparent)]
    Scripted(ScriptedError),

    #[error("mock {0} not implemented")]
    NotImplemented(&'static str),

    #[error("{0}")]
    UnfulfilledExpectations(String),

    #[error("Config Error - {0}")]
    Config(String),
}

impl MockKeysError {
    pub(crate) fn key_mismatch(expected: &str, requested: &str) -> Self {
        MockKeysError::KeyMismatch {
            expected: expected.to_string(),
            requested: requested.to_string(),
            cluster: ClusterError::key_not_found(requested, MOCK_CLUSTER_INDEX),
        }
    }
}
