//! Generic keys client traits for a key/value coordination service.
//!
//! This module mirrors the keys surface of a coordination-service client so that
//! code can be written against [`KeysApi`] and run either against a live cluster
//! or against an in-process double.
//!
//! The traits use `async_trait` to enable object safety, allowing usage as
//! `Arc<dyn KeysApi>` for dynamic dispatch.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::KeysResult;

/// The operation that produced a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Get,
    Set,
    Delete,
    Create,
    Update,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match self {
            Action::Get => "get",
            Action::Set => "set",
            Action::Delete => "delete",
            Action::Create => "create",
            Action::Update => "update",
        };
        f.write_str(action)
    }
}

/// A single key and the value stored under it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub key: String,
    pub value: String,
}

impl Node {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Node {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Response returned by a keys operation or a watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// The operation that produced this response.
    pub action: Action,
    /// The node the operation acted on.
    pub node: Node,
}

impl Response {
    pub fn new(action: Action, node: Node) -> Self {
        Response { action, node }
    }
}

/// Whether a set should require the key to exist beforehand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrevExist {
    #[default]
    Ignore,
    Exist,
    NoExist,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Return the whole subtree below a directory key.
    pub recursive: bool,
    /// Sort the children of a directory key.
    pub sort: bool,
    /// Serve the read through the leader.
    pub quorum: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Only set if the current value equals this.
    pub prev_value: Option<String>,
    /// Only set if the current modified index equals this.
    pub prev_index: Option<u64>,
    pub prev_exist: PrevExist,
    /// Expire the key after this long.
    pub ttl: Option<Duration>,
    /// Refresh the TTL without notifying watchers.
    pub refresh: bool,
    pub dir: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOptions {
    pub prev_value: Option<String>,
    pub prev_index: Option<u64>,
    pub recursive: bool,
    pub dir: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateInOrderOptions {
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatcherOptions {
    /// Start watching after this cluster index.
    pub after_index: u64,
    /// Watch the whole subtree below the key.
    pub recursive: bool,
}

/// A subscription to changes under a key.
#[async_trait]
pub trait Watcher: Send {
    /// Wait for the next change and return it.
    ///
    /// There is no built-in timeout; drop the future (for example through
    /// `tokio::time::timeout` or `tokio::select!`) to stop waiting.
    async fn next(&mut self) -> KeysResult<Response>;
}

/// KeysApi defines the keys interface of a coordination-service client.
///
/// This trait is object-safe and can be used as `Arc<dyn KeysApi>` for dynamic dispatch.
#[async_trait]
pub trait KeysApi: Send + Sync {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str, opts: Option<&GetOptions>) -> KeysResult<Response>;

    /// Store `value` under `key`, creating or replacing it.
    async fn set(
        &self,
        key: &str,
        value: &str,
        opts: Option<&SetOptions>,
    ) -> KeysResult<Response>;

    /// Remove `key`.
    async fn delete(&self, key: &str, opts: Option<&DeleteOptions>) -> KeysResult<Response>;

    /// Store `value` under `key`, failing if the key already exists.
    async fn create(&self, key: &str, value: &str) -> KeysResult<Response>;

    /// Store `value` under a new, sequentially named key inside `dir`.
    async fn create_in_order(
        &self,
        dir: &str,
        value: &str,
        opts: Option<&CreateInOrderOptions>,
    ) -> KeysResult<Response>;

    /// Replace the value of an existing `key`.
    async fn update(&self, key: &str, value: &str) -> KeysResult<Response>;

    /// Subscribe to changes of `key`.
    fn watcher(&self, key: &str, opts: Option<&WatcherOptions>) -> Box<dyn Watcher>;
}
