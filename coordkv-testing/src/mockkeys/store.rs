//! The scripted keys client handed to the code under test.

use std::sync::Arc;

use async_trait::async_trait;
use coordkv_shared::error::KeysResult;
use coordkv_shared::keys::{
    Action, CreateInOrderOptions, DeleteOptions, GetOptions, KeysApi, Response, SetOptions,
    Watcher, WatcherOptions,
};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};

use super::config::MockConfig;
use super::error::{MockKeysError, Result};
use super::expectation::{ExpectationHandle, ExpectationStore};
use super::feed::ChangeFeed;

/// Scripted stand-in for a coordination-service keys client.
///
/// Register the expected operations with [`FakeKeysApi::expect_get`] and
/// [`FakeKeysApi::expect_set`], hand the mock to the code under test as a
/// [`KeysApi`], then assert [`FakeKeysApi::expectations_fulfilled`] at the end of the
/// test. Reads and writes must be issued in the order they were expected.
///
/// Clones share the same expectations. Change feeds started from the mock are stopped
/// once the last clone is dropped, or earlier through [`FakeKeysApi::shutdown`].
#[derive(Clone)]
pub struct FakeKeysApi {
    expectations: ExpectationStore,
    config: Arc<MockConfig>,
    cancel: CancellationToken,
    _shutdown_on_drop: Arc<DropGuard>,
}

impl std::fmt::Debug for FakeKeysApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeKeysApi")
            .field("expectations", &self.expectations)
            .field("config", &self.config)
            .finish()
    }
}

impl Default for FakeKeysApi {
    fn default() -> Self {
        Self::with_config(MockConfig::default())
    }
}

impl FakeKeysApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MockConfig) -> Self {
        let cancel = CancellationToken::new();
        FakeKeysApi {
            expectations: ExpectationStore::new(),
            config: Arc::new(config),
            _shutdown_on_drop: Arc::new(cancel.clone().drop_guard()),
            cancel,
        }
    }

    pub fn config(&self) -> &MockConfig {
        &self.config
    }

    /// The expectation queues behind this mock.
    pub fn store(&self) -> &ExpectationStore {
        &self.expectations
    }

    /// Expect a `get` of `key`.
    pub fn expect_get(&self, key: impl Into<String>) -> ExpectationHandle {
        self.expectations.expect_get(key)
    }

    /// Expect a `set` of `value` to `key`.
    pub fn expect_set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> ExpectationHandle {
        self.expectations.expect_set(key, value)
    }

    /// Check that every expected read and write was issued, in order.
    pub fn expectations_fulfilled(&self) -> Result<()> {
        self.expectations.expectations_fulfilled()
    }

    /// Start a change feed over the read expectations of this mock.
    ///
    /// Unlike [`KeysApi::watcher`] this returns the concrete feed, which also allows
    /// injecting events and checking that every event was consumed.
    /// Must be called from within a Tokio runtime.
    pub fn change_feed(&self) -> ChangeFeed {
        ChangeFeed::start(
            self.expectations.clone(),
            self.config.feed_mode,
            self.config.feed_scan_interval,
            &self.cancel,
        )
    }

    /// Stop every change feed started from this mock.
    pub fn shutdown(&self) {
        info!("Shutting down mock keys client");
        self.cancel.cancel();
    }
}

#[async_trait]
impl KeysApi for FakeKeysApi {
    async fn get(&self, key: &str, _opts: Option<&GetOptions>) -> KeysResult<Response> {
        let node = self.expectations.consume_get(key)?;
        Ok(Response::new(Action::Get, node))
    }

    async fn set(
        &self,
        key: &str,
        value: &str,
        _opts: Option<&SetOptions>,
    ) -> KeysResult<Response> {
        let node = self.expectations.consume_set(key, value)?;
        Ok(Response::new(Action::Set, node))
    }

    async fn delete(&self, key: &str, _opts: Option<&DeleteOptions>) -> KeysResult<Response> {
        debug!(key, "Delete called on mock");
        Err(MockKeysError::NotImplemented("Delete").into())
    }

    async fn create(&self, key: &str, _value: &str) -> KeysResult<Response> {
        debug!(key, "Create called on mock");
        Err(MockKeysError::NotImplemented("Create").into())
    }

    async fn create_in_order(
        &self,
        dir: &str,
        _value: &str,
        _opts: Option<&CreateInOrderOptions>,
    ) -> KeysResult<Response> {
        debug!(dir, "CreateInOrder called on mock");
        Err(MockKeysError::NotImplemented("CreateInOrder").into())
    }

    async fn update(&self, key: &str, _value: &str) -> KeysResult<Response> {
        debug!(key, "Update called on mock");
        Err(MockKeysError::NotImplemented("Update").into())
    }

    /// The feed covers every read expectation; `key` and `opts` are not used to filter.
    fn watcher(&self, key: &str, _opts: Option<&WatcherOptions>) -> Box<dyn Watcher> {
        debug!(key, "Watcher requested on mock");
        Box::new(self.change_feed())
    }
}
