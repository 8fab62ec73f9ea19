//! Ordered expectation queues and the strict FIFO matching over them.
//!
//! Reads and writes each have their own queue. A consumption always pops the head of
//! its queue before validating it, so a failed call still uses up the expectation and
//! the next call is matched against the following one.

use std::collections::VecDeque;
use std::sync::Arc;

use coordkv_shared::error::KeysError;
use coordkv_shared::keys::Node;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::error::{MockKeysError, Operation, Result, ScriptedError};

/// One anticipated read or write, and the outcome it should produce.
#[derive(Debug, Clone)]
pub(crate) struct ExpectedOperation {
    /// Registration order, unique across both queues of a store.
    pub(crate) seq: u64,
    pub(crate) key: String,
    pub(crate) value: Option<String>,
    pub(crate) error: Option<ScriptedError>,
}

impl ExpectedOperation {
    /// The (key, value) response, if one has been configured.
    pub(crate) fn payload(&self) -> Option<Node> {
        self.value
            .as_ref()
            .map(|value| Node::new(self.key.as_str(), value.as_str()))
    }

    fn same_pair(&self, other: &ExpectedOperation) -> bool {
        self.key == other.key && self.value == other.value
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.key, self.value.as_deref().unwrap_or("<none>"))
    }
}

#[derive(Debug, Default)]
pub(crate) struct ExpectationState {
    next_seq: u64,
    /// Read expectations still waiting to be consumed.
    reads: VecDeque<ExpectedOperation>,
    /// Write expectations still waiting to be consumed.
    writes: VecDeque<ExpectedOperation>,
    /// Every write ever expected, in declaration order.
    declared_writes: Vec<ExpectedOperation>,
    /// Writes that were consumed as declared, in consumption order.
    received_writes: Vec<ExpectedOperation>,
}

impl ExpectationState {
    fn register(&mut self, operation: Operation, key: String, value: Option<String>) -> u64 {
        self.next_seq += 1;
        let expected = ExpectedOperation {
            seq: self.next_seq,
            key,
            value,
            error: None,
        };
        match operation {
            Operation::Get => self.reads.push_back(expected),
            Operation::Set => {
                self.declared_writes.push(expected.clone());
                self.writes.push_back(expected);
            }
        }
        self.next_seq
    }

    /// Apply `update` to a registered expectation, wherever it is still tracked.
    fn update(
        &mut self,
        operation: Operation,
        seq: u64,
        update: impl Fn(&mut ExpectedOperation),
    ) -> bool {
        let pending = match operation {
            Operation::Get => self.reads.iter_mut().find(|e| e.seq == seq),
            Operation::Set => self.writes.iter_mut().find(|e| e.seq == seq),
        };
        let Some(pending) = pending else {
            return false;
        };
        update(pending);

        // the declared copy has to follow along so fulfillment compares like with like
        if operation == Operation::Set {
            self.declared_writes
                .iter_mut()
                .filter(|e| e.seq == seq)
                .for_each(&update);
        }
        true
    }
}

/// Returned by the `expect_*` calls to configure the outcome of the expectation.
///
/// Only the last configured outcome counts. Configuring an expectation after it was
/// consumed has no effect.
#[derive(Debug, Clone)]
pub struct ExpectationHandle {
    state: Arc<Mutex<ExpectationState>>,
    operation: Operation,
    seq: u64,
}

impl ExpectationHandle {
    /// Succeed with `value` when consumed.
    pub fn will_return_value(self, value: impl Into<String>) -> Self {
        let value = value.into();
        self.apply(|e| e.value = Some(value.clone()));
        self
    }

    /// Fail with `err` when consumed. The error is surfaced as is.
    pub fn will_return_error(self, err: impl Into<KeysError>) -> Self {
        let scripted = ScriptedError::new(err);
        self.apply(|e| e.error = Some(scripted.clone()));
        self
    }

    fn apply(&self, update: impl Fn(&mut ExpectedOperation)) {
        if !self.state.lock().update(self.operation, self.seq, update) {
            warn!(
                operation = %self.operation,
                seq = self.seq,
                "Expectation already consumed, ignoring late configuration"
            );
        }
    }
}

/// Holds the read and write expectations of one test case.
///
/// Cloning is cheap and every clone shares the same queues.
#[derive(Debug, Clone, Default)]
pub struct ExpectationStore {
    state: Arc<Mutex<ExpectationState>>,
}

impl ExpectationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect a read of `key`. Configure the result through the returned handle.
    pub fn expect_get(&self, key: impl Into<String>) -> ExpectationHandle {
        let key = key.into();
        debug!(%key, "Registering expected Get");
        let seq = self.state.lock().register(Operation::Get, key, None);
        self.handle(Operation::Get, seq)
    }

    /// Expect a write of `value` to `key`.
    pub fn expect_set(
        &self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> ExpectationHandle {
        let key = key.into();
        let value = value.into();
        debug!(%key, %value, "Registering expected Set");
        let seq = self.state.lock().register(Operation::Set, key, Some(value));
        self.handle(Operation::Set, seq)
    }

    fn handle(&self, operation: Operation, seq: u64) -> ExpectationHandle {
        ExpectationHandle {
            state: Arc::clone(&self.state),
            operation,
            seq,
        }
    }

    /// Consume the next read expectation for a read of `key`.
    pub fn consume_get(&self, key: &str) -> Result<Node> {
        let Some(expected) = self.state.lock().reads.pop_front() else {
            warn!(key, "Get issued with no expectation queued");
            return Err(MockKeysError::NoExpectationQueued {
                operation: Operation::Get,
                key: key.to_string(),
            });
        };

        if let Some(err) = expected.error.clone() {
            debug!(key, "Returning scripted error for Get");
            return Err(MockKeysError::Scripted(err));
        }
        let Some(node) = expected.payload() else {
            warn!(key = %expected.key, "Expected Get has neither a value nor an error");
            return Err(MockKeysError::MalformedExpectation {
                operation: Operation::Get,
                key: expected.key,
            });
        };
        if node.key != key {
            warn!(expected = %node.key, requested = key, "Get issued for unexpected key");
            return Err(MockKeysError::key_mismatch(&node.key, key));
        }

        debug!(key, "Matched expected Get");
        Ok(node)
    }

    /// Consume the next write expectation for a write of `value` to `key`.
    pub fn consume_set(&self, key: &str, value: &str) -> Result<Node> {
        let mut state = self.state.lock();
        let Some(expected) = state.writes.pop_front() else {
            warn!(key, value, "Set issued with no expectation queued");
            return Err(MockKeysError::NoExpectationQueued {
                operation: Operation::Set,
                key: key.to_string(),
            });
        };

        if let Some(err) = expected.error.clone() {
            debug!(key, "Returning scripted error for Set");
            state.received_writes.push(expected);
            return Err(MockKeysError::Scripted(err));
        }
        let Some(node) = expected.payload() else {
            warn!(key = %expected.key, "Expected Set has neither a value nor an error");
            return Err(MockKeysError::MalformedExpectation {
                operation: Operation::Set,
                key: expected.key,
            });
        };
        if node.key != key || node.value != value {
            warn!(
                expected_key = %node.key,
                expected_value = %node.value,
                key,
                value,
                "Set issued with unexpected key/value"
            );
            return Err(MockKeysError::WriteMismatch {
                expected_key: node.key,
                expected_value: node.value,
                key: key.to_string(),
                value: value.to_string(),
            });
        }

        debug!(key, value, "Matched expected Set");
        state.received_writes.push(expected);
        Ok(node)
    }

    /// Check that every read was consumed and every declared write was received, in order.
    pub fn expectations_fulfilled(&self) -> Result<()> {
        let state = self.state.lock();

        if !state.reads.is_empty() {
            let keys: Vec<&str> = state.reads.iter().map(|e| e.key.as_str()).collect();
            return Err(MockKeysError::UnfulfilledExpectations(format!(
                "unmet expectations in FakeKeysApi, {} Get(s) outstanding: {keys:?}",
                keys.len()
            )));
        }

        if state.declared_writes.len() != state.received_writes.len() {
            return Err(MockKeysError::UnfulfilledExpectations(format!(
                "one or more unfulfilled expected sets, expected {} but received {}",
                state.declared_writes.len(),
                state.received_writes.len()
            )));
        }

        let out_of_order = state
            .declared_writes
            .iter()
            .zip(state.received_writes.iter())
            .enumerate()
            .find(|(_, (declared, received))| !declared.same_pair(received));
        if let Some((position, (declared, received))) = out_of_order {
            return Err(MockKeysError::UnfulfilledExpectations(format!(
                "expected sets run out of order at position {position}, expected {} but received {}",
                declared.describe(),
                received.describe()
            )));
        }

        Ok(())
    }

    /// Number of read expectations not yet consumed.
    pub fn pending_reads(&self) -> usize {
        self.state.lock().reads.len()
    }

    /// Number of write expectations not yet consumed.
    pub fn pending_writes(&self) -> usize {
        self.state.lock().writes.len()
    }

    /// The writes consumed as declared so far, oldest first.
    pub fn received_writes(&self) -> Vec<Node> {
        self.state
            .lock()
            .received_writes
            .iter()
            .filter_map(ExpectedOperation::payload)
            .collect()
    }

    /// Payloads of outstanding read expectations registered after `after_seq`, in
    /// registration order, with the highest sequence number seen.
    ///
    /// Entries scripted to fail are passed over. An entry with no outcome yet stops the
    /// scan, so that its payload is still published in order once it is configured.
    pub(crate) fn read_payloads_after(&self, after_seq: u64) -> (Vec<Node>, u64) {
        let state = self.state.lock();
        let mut cursor = after_seq;
        let mut payloads = Vec::new();
        for expected in state.reads.iter().filter(|e| e.seq > after_seq) {
            if expected.error.is_some() {
                cursor = expected.seq;
                continue;
            }
            let Some(node) = expected.payload() else {
                break;
            };
            cursor = expected.seq;
            payloads.push(node);
        }
        (payloads, cursor)
    }

    /// Payloads of every outstanding read expectation not scripted to fail, in
    /// registration order.
    pub(crate) fn read_payloads(&self) -> Vec<Node> {
        self.state
            .lock()
            .reads
            .iter()
            .filter(|e| e.error.is_none())
            .filter_map(ExpectedOperation::payload)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordkv_shared::error::{ClusterError, is_key_not_found};

    #[test]
    fn test_get_returns_configured_value() {
        let store = ExpectationStore::new();
        store.expect_get("/test/key").will_return_value("test value");
        assert_eq!(store.pending_reads(), 1);

        let node = store.consume_get("/test/key").unwrap();
        assert_eq!(node, Node::new("/test/key", "test value"));
        assert_eq!(store.pending_reads(), 0);
        assert!(store.expectations_fulfilled().is_ok());
    }

    #[test]
    fn test_get_returns_scripted_error_verbatim() {
        let store = ExpectationStore::new();
        let key = "/test/key";
        store
            .expect_get(key)
            .will_return_error(format!("100: Key not found ({key}) [39881395]"));

        let err = store.consume_get(key).unwrap_err();
        assert!(matches!(err, MockKeysError::Scripted(_)));
        assert_eq!(err.to_string(), "100: Key not found (/test/key) [39881395]");
        assert!(store.expectations_fulfilled().is_ok());
    }

    #[test]
    fn test_get_scripted_cluster_error_can_be_classified() {
        let store = ExpectationStore::new();
        store
            .expect_get("/k")
            .will_return_error(ClusterError::key_not_found("/k", 12));

        let err = store.consume_get("/k").unwrap_err();
        assert!(is_key_not_found(&err));
    }

    #[test]
    fn test_get_on_empty_queue() {
        let store = ExpectationStore::new();
        let err = store.consume_get("/nothing").unwrap_err();
        assert!(matches!(
            err,
            MockKeysError::NoExpectationQueued { operation: Operation::Get, ref key } if key == "/nothing"
        ));
        assert!(err.to_string().contains("/nothing"));
    }

    #[test]
    fn test_get_without_outcome_is_malformed() {
        let store = ExpectationStore::new();
        store.expect_get("/a");

        let err = store.consume_get("/a").unwrap_err();
        assert!(matches!(err, MockKeysError::MalformedExpectation { .. }));
        assert_eq!(store.pending_reads(), 0);
    }

    #[test]
    fn test_get_key_mismatch_consumes_the_expectation() {
        let store = ExpectationStore::new();
        store.expect_get("/a").will_return_value("1");
        store.expect_get("/b").will_return_value("2");

        // strict FIFO: /b is not searched for
        let err = store.consume_get("/b").unwrap_err();
        assert!(matches!(err, MockKeysError::KeyMismatch { ref expected, .. } if expected == "/a"));
        assert_eq!(err.to_string(), "100: Key not found (/b) [39881395]");
        assert!(is_key_not_found(&err));

        // the fulfillment check still sees /b outstanding
        assert!(matches!(
            store.expectations_fulfilled(),
            Err(MockKeysError::UnfulfilledExpectations(_))
        ));

        // the next call moves on to /b
        assert_eq!(store.consume_get("/b").unwrap(), Node::new("/b", "2"));
        assert!(store.expectations_fulfilled().is_ok());
    }

    #[test]
    fn test_reads_consumed_in_order() {
        let store = ExpectationStore::new();
        for i in 0..5 {
            store.expect_get(format!("/k/{i}")).will_return_value(i.to_string());
        }
        for i in 0..5 {
            let node = store.consume_get(&format!("/k/{i}")).unwrap();
            assert_eq!(node.value, i.to_string());
        }
        assert!(store.expectations_fulfilled().is_ok());
    }

    #[test]
    fn test_last_configured_outcome_wins() {
        let store = ExpectationStore::new();
        store
            .expect_get("/a")
            .will_return_value("first")
            .will_return_value("second");
        assert_eq!(store.consume_get("/a").unwrap().value, "second");
    }

    #[test]
    fn test_late_configuration_is_ignored() {
        let store = ExpectationStore::new();
        let handle = store.expect_get("/a").will_return_value("1");
        store.consume_get("/a").unwrap();

        // nothing left to configure, and nothing is re-queued
        let _ = handle.will_return_value("2");
        assert_eq!(store.pending_reads(), 0);
    }

    #[test]
    fn test_set_matches_and_is_received() {
        let store = ExpectationStore::new();
        store.expect_set("/some/key", "some value");

        let node = store.consume_set("/some/key", "some value").unwrap();
        assert_eq!(node, Node::new("/some/key", "some value"));
        assert_eq!(store.received_writes(), vec![node]);
        assert_eq!(store.pending_writes(), 0);
        assert!(store.expectations_fulfilled().is_ok());
    }

    #[test]
    fn test_set_mismatch_is_not_received() {
        let store = ExpectationStore::new();
        store.expect_set("/some/key", "some value");

        let err = store.consume_set("/some/other/key", "some value").unwrap_err();
        assert_eq!(
            err.to_string(),
            "wrong key/value pair in Set, expected a set for /some/key/some value, got /some/other/key/some value"
        );
        assert!(store.received_writes().is_empty());
        assert_eq!(store.pending_writes(), 0);
        assert!(matches!(
            store.expectations_fulfilled(),
            Err(MockKeysError::UnfulfilledExpectations(_))
        ));
    }

    #[test]
    fn test_set_comparison_is_exact() {
        let store = ExpectationStore::new();
        store.expect_set("/Key", "Value");
        assert!(matches!(
            store.consume_set("/Key", "value"),
            Err(MockKeysError::WriteMismatch { .. })
        ));
    }

    #[test]
    fn test_set_on_empty_queue() {
        let store = ExpectationStore::new();
        let err = store.consume_set("/a", "b").unwrap_err();
        assert!(matches!(
            err,
            MockKeysError::NoExpectationQueued { operation: Operation::Set, .. }
        ));
    }

    #[test]
    fn test_set_scripted_error() {
        let store = ExpectationStore::new();
        store
            .expect_set("/a", "b")
            .will_return_error("101: Compare failed ([x != y]) [9]");

        let err = store.consume_set("/a", "b").unwrap_err();
        assert_eq!(err.to_string(), "101: Compare failed ([x != y]) [9]");
        assert!(store.expectations_fulfilled().is_ok());
    }

    #[test]
    fn test_declared_set_never_received() {
        let store = ExpectationStore::new();
        store.expect_set("/some/key", "some value");

        let err = store.expectations_fulfilled().unwrap_err();
        assert_eq!(
            err.to_string(),
            "one or more unfulfilled expected sets, expected 1 but received 0"
        );
    }

    #[test]
    fn test_unconsumed_reads_fail_fulfillment() {
        let store = ExpectationStore::new();
        store.expect_get("/a").will_return_value("1");
        store.expect_get("/b").will_return_value("2");

        let err = store.expectations_fulfilled().unwrap_err();
        assert!(err.to_string().contains("2 Get(s) outstanding"));
        assert!(err.to_string().contains("/b"));
    }

    #[test]
    fn test_read_payloads_after_cursor() {
        let store = ExpectationStore::new();
        store.expect_get("/a").will_return_value("1");
        let pending = store.expect_get("/b");
        store.expect_get("/c").will_return_value("3");
        store.expect_get("/d").will_return_error("scripted");
        store.expect_get("/e").will_return_value("5");

        let (payloads, cursor) = store.read_payloads_after(0);
        assert_eq!(payloads, vec![Node::new("/a", "1")]);

        // nothing new until /b gets its value
        let (payloads, same_cursor) = store.read_payloads_after(cursor);
        assert!(payloads.is_empty());
        assert_eq!(same_cursor, cursor);

        let _ = pending.will_return_value("2");
        let (payloads, _) = store.read_payloads_after(cursor);
        assert_eq!(
            payloads,
            vec![Node::new("/b", "2"), Node::new("/c", "3"), Node::new("/e", "5")]
        );

        assert_eq!(store.read_payloads().len(), 4);
        assert_eq!(store.pending_reads(), 5);
    }
}
