//! Change feed that republishes read expectations as watch events.
//!
//! A background task periodically scans the read expectations of an
//! [`ExpectationStore`] without consuming them and queues a [`ChangeEvent`] for every
//! expectation that carries a value. Consumers pull events one at a time with
//! [`ChangeFeed::next`].

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use coordkv_shared::error::KeysResult;
use coordkv_shared::keys::{Action, Node, Response, Watcher};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace};

use super::config::FeedMode;
use super::error::{MockKeysError, Result};
use super::expectation::ExpectationStore;

const MIN_SCAN_INTERVAL: Duration = Duration::from_micros(1);

/// A key/value change published by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub key: String,
    pub value: String,
}

impl ChangeEvent {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        ChangeEvent {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl From<Node> for ChangeEvent {
    fn from(node: Node) -> Self {
        ChangeEvent {
            key: node.key,
            value: node.value,
        }
    }
}

impl From<ChangeEvent> for Response {
    fn from(event: ChangeEvent) -> Self {
        Response::new(Action::Set, Node::new(event.key, event.value))
    }
}

/// Event queue shared between the scan task and the consumers.
#[derive(Debug, Default)]
struct EventQueue {
    events: Mutex<VecDeque<ChangeEvent>>,
    available: Notify,
}

impl EventQueue {
    fn push_all(&self, events: impl IntoIterator<Item = ChangeEvent>) {
        let mut queue = self.events.lock();
        let before = queue.len();
        queue.extend(events);
        let added = queue.len() - before;
        drop(queue);
        if added > 0 {
            self.available.notify_one();
        }
    }

    fn pop(&self) -> Option<ChangeEvent> {
        let mut queue = self.events.lock();
        let event = queue.pop_front();
        // pass the wakeup on so another waiter picks up the rest of a batch
        if event.is_some() && !queue.is_empty() {
            self.available.notify_one();
        }
        event
    }
}

/// A pollable stream of change events backed by a background scan task.
///
/// The scan task stops when the feed is dropped or when the token it was started
/// with is cancelled.
pub struct ChangeFeed {
    queue: Arc<EventQueue>,
    cancel: CancellationToken,
    _stop_on_drop: DropGuard,
}

impl fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("queue", &self.queue)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

impl ChangeFeed {
    /// Start a feed over the read expectations of `store`.
    ///
    /// Must be called from within a Tokio runtime. The scan task runs on a child of
    /// `parent`, so cancelling `parent` stops it as well.
    pub fn start(
        store: ExpectationStore,
        mode: FeedMode,
        scan_interval: Duration,
        parent: &CancellationToken,
    ) -> Self {
        let queue = Arc::new(EventQueue::default());
        let cancel = parent.child_token();

        info!(?mode, ?scan_interval, "Starting change feed");
        tokio::spawn(scan(
            store,
            Arc::clone(&queue),
            mode,
            scan_interval,
            cancel.clone(),
        ));

        ChangeFeed {
            queue,
            _stop_on_drop: cancel.clone().drop_guard(),
            cancel,
        }
    }

    /// Wait until an event is available and return the oldest one.
    ///
    /// Never times out on its own; drop the future to stop waiting.
    pub async fn next(&self) -> ChangeEvent {
        loop {
            if let Some(event) = self.queue.pop() {
                return event;
            }
            self.queue.available.notified().await;
        }
    }

    /// Return the oldest event if one is queued, without waiting.
    pub fn try_next(&self) -> Option<ChangeEvent> {
        self.queue.pop()
    }

    /// Queue an event directly, bypassing the scan.
    pub fn inject(&self, event: ChangeEvent) {
        debug!(%event, "Injecting change event");
        self.queue.push_all([event]);
    }

    /// Number of events waiting to be consumed.
    pub fn len(&self) -> usize {
        self.queue.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check that every queued event was consumed.
    pub fn expectations_fulfilled(&self) -> Result<()> {
        let events = self.queue.events.lock();
        if events.is_empty() {
            return Ok(());
        }
        let outstanding: Vec<String> = events.iter().map(ChangeEvent::to_string).collect();
        Err(MockKeysError::UnfulfilledExpectations(format!(
            "unmet expectations in Watcher, {} event(s) not consumed: {outstanding:?}",
            outstanding.len()
        )))
    }

    /// Stop the scan task. Events already queued stay available.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[async_trait]
impl Watcher for ChangeFeed {
    async fn next(&mut self) -> KeysResult<Response> {
        Ok(ChangeFeed::next(self).await.into())
    }
}

/// Periodically republish the read expectations of `store` into `queue` until cancelled.
async fn scan(
    store: ExpectationStore,
    queue: Arc<EventQueue>,
    mode: FeedMode,
    scan_interval: Duration,
    cancel: CancellationToken,
) {
    // interval() panics on a zero period
    let mut ticker = tokio::time::interval(scan_interval.max(MIN_SCAN_INTERVAL));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut cursor = 0;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Cancellation token triggered. Stopping change feed scan.");
                return;
            }
            _ = ticker.tick() => {}
        }

        let payloads = match mode {
            FeedMode::Drain => {
                let (payloads, next_cursor) = store.read_payloads_after(cursor);
                cursor = next_cursor;
                payloads
            }
            FeedMode::LevelTriggered => store.read_payloads(),
        };
        if !payloads.is_empty() {
            trace!(count = payloads.len(), cursor, "Publishing read expectations");
        }
        queue.push_all(payloads.into_iter().map(ChangeEvent::from));
    }
}
