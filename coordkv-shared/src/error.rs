use std::error::Error as StdError;

use thiserror::Error;

/// Error type for keys operations (boxed for object safety).
pub type KeysError = Box<dyn StdError + Send + Sync + 'static>;

/// Result type returned by every [`crate::keys::KeysApi`] operation.
pub type KeysResult<T> = std::result::Result<T, KeysError>;

pub const ERROR_CODE_KEY_NOT_FOUND: u32 = 100;
pub const ERROR_CODE_TEST_FAILED: u32 = 101;
pub const ERROR_CODE_NOT_FILE: u32 = 102;
pub const ERROR_CODE_NOT_DIR: u32 = 104;
pub const ERROR_CODE_NODE_EXIST: u32 = 105;
pub const ERROR_CODE_ROOT_READ_ONLY: u32 = 107;
pub const ERROR_CODE_DIR_NOT_EMPTY: u32 = 108;
pub const ERROR_CODE_RAFT_INTERNAL: u32 = 300;
pub const ERROR_CODE_WATCHER_CLEARED: u32 = 401;

/// An error as reported by the coordination service itself.
///
/// Renders in the service's wire form, e.g. `100: Key not found (/foo) [42]`,
/// so callers matching on the message keep working against a double.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{code}: {message} ({cause}) [{index}]")]
pub struct ClusterError {
    /// Numeric error code, one of the `ERROR_CODE_*` constants.
    pub code: u32,
    /// Human readable message for the code.
    pub message: String,
    /// What triggered the error, usually the key.
    pub cause: String,
    /// Cluster index at which the error was observed.
    pub index: u64,
}

impl ClusterError {
    pub fn new(code: u32, cause: impl Into<String>, index: u64) -> Self {
        ClusterError {
            code,
            message: message_for(code).to_string(),
            cause: cause.into(),
            index,
        }
    }

    pub fn key_not_found(key: impl Into<String>, index: u64) -> Self {
        Self::new(ERROR_CODE_KEY_NOT_FOUND, key, index)
    }

    pub fn is_key_not_found(&self) -> bool {
        self.code == ERROR_CODE_KEY_NOT_FOUND
    }
}

fn message_for(code: u32) -> &'static str {
    match code {
        ERROR_CODE_KEY_NOT_FOUND => "Key not found",
        ERROR_CODE_TEST_FAILED => "Compare failed",
        ERROR_CODE_NOT_FILE => "Not a file",
        ERROR_CODE_NOT_DIR => "Not a directory",
        ERROR_CODE_NODE_EXIST => "Key already exists",
        ERROR_CODE_ROOT_READ_ONLY => "Root is read only",
        ERROR_CODE_DIR_NOT_EMPTY => "Directory not empty",
        ERROR_CODE_RAFT_INTERNAL => "Raft Internal Error",
        ERROR_CODE_WATCHER_CLEARED => "watcher is cleared due to etcd recovery",
        _ => "Unknown error",
    }
}

/// Finds the first [`ClusterError`] in the error's source chain, the error itself included.
pub fn cluster_error<'a>(err: &'a (dyn StdError + 'static)) -> Option<&'a ClusterError> {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(cluster) = e.downcast_ref::<ClusterError>() {
            return Some(cluster);
        }
        current = e.source();
    }
    None
}

/// Returns true if the error, or anything it wraps, is a "key not found" cluster error.
pub fn is_key_not_found(err: &(dyn StdError + 'static)) -> bool {
    cluster_error(err).is_some_and(ClusterError::is_key_not_found)
}
