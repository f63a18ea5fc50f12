//! Polling change feed
//!
//! Each subscription owns one worker task that lists the watched prefix on
//! an interval, diffs it against the previous snapshot and pushes events
//! into a bounded channel. A subscriber that falls behind gets coalesced
//! events: only the newest event per key is kept while the channel is full.
//!
//! Workers stop when the subscriber drops its [`Subscription`], when the
//! subscription is cancelled, or when the feed's shutdown token fires.

use crate::context::{KeyScope, UserContext};
use crate::error::{CoreError, Result};
use crate::prefix::{relativize, resolve_prefix};
use crate::tombstone::{is_tombstone_key, original_key_of};
use chrono::{DateTime, Utc};
use futures::Stream;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use syncgate_store::{ObjectStore, MAX_LIST_PAGE};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Change feed tuning
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Interval used when the subscriber does not ask for one
    pub default_interval: Duration,
    /// Fastest allowed polling
    pub min_interval: Duration,
    /// Slowest allowed polling
    pub max_interval: Duration,
    /// Events buffered per subscriber before coalescing starts
    pub channel_capacity: usize,
    /// Objects a single subscription may track
    pub max_tracked_objects: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_millis(2000),
            min_interval: Duration::from_millis(500),
            max_interval: Duration::from_millis(60_000),
            channel_capacity: 64,
            max_tracked_objects: 100_000,
        }
    }
}

impl FeedConfig {
    /// Clamp a requested interval into the allowed range
    pub fn effective_interval(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_interval)
            .clamp(self.min_interval, self.max_interval.max(self.min_interval))
    }
}

/// Kind of feed event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Object created or modified
    Change,
    /// Object removed
    Delete,
    /// Keep-alive, nothing changed
    Ping,
}

impl ChangeKind {
    /// Wire name of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Change => "change",
            Self::Delete => "delete",
            Self::Ping => "ping",
        }
    }
}

/// One event delivered to a subscriber
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    /// Event kind
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    /// Key relative to the subscriber's root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Last modified time for changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    /// Size for changes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ChangeEvent {
    pub fn change(key: impl Into<String>, last_modified: DateTime<Utc>, size: u64) -> Self {
        Self {
            kind: ChangeKind::Change,
            key: Some(key.into()),
            last_modified: Some(last_modified),
            size: Some(size),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self {
            kind: ChangeKind::Delete,
            key: Some(key.into()),
            last_modified: None,
            size: None,
        }
    }

    pub fn ping() -> Self {
        Self {
            kind: ChangeKind::Ping,
            key: None,
            last_modified: None,
            size: None,
        }
    }
}

/// What a subscriber asked to watch
#[derive(Clone, Debug, Default)]
pub struct SubscribeRequest {
    /// Relative prefix, empty for the whole root
    pub prefix: String,
    /// Own or team namespace
    pub scope: KeyScope,
    /// Requested polling interval
    pub interval: Option<Duration>,
}

/// Lifecycle of a feed worker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedState {
    Starting,
    Polling,
    Emitting,
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Entry {
    last_modified: DateTime<Utc>,
    size: u64,
}

type Snapshot = BTreeMap<String, Entry>;

/// Feed factory holding the shared store and shutdown signal
pub struct ChangeFeed<S: ObjectStore> {
    store: Arc<S>,
    config: FeedConfig,
    shutdown: CancellationToken,
}

impl<S: ObjectStore + 'static> ChangeFeed<S> {
    /// Create a feed; cancelling `shutdown` stops every worker
    pub fn new(store: Arc<S>, config: FeedConfig, shutdown: CancellationToken) -> Self {
        Self {
            store,
            config,
            shutdown,
        }
    }

    /// Get the feed configuration
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Start watching a prefix
    ///
    /// The baseline snapshot is taken before this returns, so anything
    /// that already exists is never reported as a change.
    pub async fn subscribe(&self, ctx: &UserContext, request: SubscribeRequest) -> Result<Subscription> {
        let prefix = resolve_prefix(&request.prefix, ctx, request.scope)?;
        let root = ctx
            .root(request.scope)
            .ok_or(CoreError::Forbidden)?
            .to_string();
        let interval = self.config.effective_interval(request.interval);

        let baseline = snapshot(self.store.as_ref(), &prefix, self.config.max_tracked_objects).await?;
        debug!(
            prefix = %prefix,
            interval_ms = interval.as_millis() as u64,
            tracked = baseline.len(),
            "Feed subscribed"
        );

        let (tx, rx) = mpsc::channel(self.config.channel_capacity.max(1));
        let cancel = self.shutdown.child_token();

        let worker = FeedWorker {
            store: Arc::clone(&self.store),
            prefix,
            root,
            interval,
            max_tracked: self.config.max_tracked_objects,
            baseline,
            backlog: Backlog::default(),
            tx,
            cancel: cancel.clone(),
            state: FeedState::Starting,
        };
        tokio::spawn(worker.run());

        Ok(Subscription { events: rx, cancel })
    }
}

/// Receiving side of a feed; dropping it stops the worker
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    cancel: CancellationToken,
}

impl Subscription {
    /// Next event, `None` once the feed has stopped
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    /// Stop the worker; buffered events are still drained
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for Subscription {
    type Item = ChangeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Pending events while the subscriber is slow, newest per key
///
/// Replacing a key's event leaves the old entry in the queue marked stale
/// through `latest`; stale entries are skipped on pop and compacted away
/// once they outnumber live ones.
#[derive(Default)]
struct Backlog {
    events: VecDeque<(u64, ChangeEvent)>,
    latest: HashMap<String, u64>,
    next_seq: u64,
    live: usize,
    ping_pending: bool,
}

impl Backlog {
    fn push(&mut self, event: ChangeEvent) {
        let seq = self.next_seq;
        self.next_seq += 1;

        match &event.key {
            Some(key) => {
                if self.latest.insert(key.clone(), seq).is_none() {
                    self.live += 1;
                }
            }
            None => {
                // One pending ping is enough
                if self.ping_pending {
                    return;
                }
                self.ping_pending = true;
                self.live += 1;
            }
        }
        self.events.push_back((seq, event));
        self.compact();
    }

    fn pop_front(&mut self) -> Option<ChangeEvent> {
        while let Some((seq, event)) = self.events.pop_front() {
            match &event.key {
                Some(key) => {
                    if self.latest.get(key) != Some(&seq) {
                        continue;
                    }
                    self.latest.remove(key);
                }
                None => self.ping_pending = false,
            }
            self.live -= 1;
            return Some(event);
        }
        None
    }

    /// Put back an event that was just popped and could not be delivered
    fn push_front(&mut self, event: ChangeEvent) {
        let seq = match self.events.front() {
            Some((front, _)) => front.wrapping_sub(1),
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };
        match &event.key {
            Some(key) => {
                if self.latest.contains_key(key) {
                    return;
                }
                self.latest.insert(key.clone(), seq);
            }
            None => {
                if self.ping_pending {
                    return;
                }
                self.ping_pending = true;
            }
        }
        self.live += 1;
        self.events.push_front((seq, event));
    }

    fn compact(&mut self) {
        if self.events.len() <= 2 * self.live + 64 {
            return;
        }
        let latest = &self.latest;
        self.events.retain(|(seq, event)| match &event.key {
            Some(key) => latest.get(key) == Some(seq),
            None => true,
        });
    }

    fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn len(&self) -> usize {
        self.live
    }
}

struct FeedWorker<S: ObjectStore> {
    store: Arc<S>,
    prefix: String,
    root: String,
    interval: Duration,
    max_tracked: usize,
    baseline: Snapshot,
    backlog: Backlog,
    tx: mpsc::Sender<ChangeEvent>,
    cancel: CancellationToken,
    state: FeedState,
}

impl<S: ObjectStore> FeedWorker<S> {
    async fn run(mut self) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.transition(FeedState::Polling);
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let polled = tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = self.tx.closed() => break,
                polled = snapshot(self.store.as_ref(), &self.prefix, self.max_tracked) => polled,
            };

            self.transition(FeedState::Emitting);
            match polled {
                Ok(current) => {
                    let events = diff(&self.baseline, &current, &self.root);
                    self.baseline = advance(&self.baseline, current);
                    if events.is_empty() {
                        if self.backlog.is_empty() {
                            self.backlog.push(ChangeEvent::ping());
                        }
                    } else {
                        trace!(prefix = %self.prefix, count = events.len(), "Feed diff");
                        for event in events {
                            self.backlog.push(event);
                        }
                    }
                }
                Err(e) => {
                    warn!(prefix = %self.prefix, error = %e, "Feed poll failed");
                    if self.backlog.is_empty() {
                        self.backlog.push(ChangeEvent::ping());
                    }
                }
            }

            if self.cancel.is_cancelled() || !self.flush() {
                break;
            }
        }

        self.transition(FeedState::Closed);
        debug!(prefix = %self.prefix, pending = self.backlog.len(), "Feed closed");
    }

    /// Move as much of the backlog into the channel as fits; false once the
    /// receiver is gone
    fn flush(&mut self) -> bool {
        while let Some(event) = self.backlog.pop_front() {
            match self.tx.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(event)) => {
                    if event.kind != ChangeKind::Ping {
                        self.backlog.push_front(event);
                    }
                    debug!(prefix = %self.prefix, backlog = self.backlog.len(), "Subscriber lagging");
                    return true;
                }
                Err(TrySendError::Closed(_)) => return false,
            }
        }
        true
    }

    fn transition(&mut self, next: FeedState) {
        if self.state != next {
            trace!(prefix = %self.prefix, from = ?self.state, to = ?next, "Feed state");
            self.state = next;
        }
    }
}

/// List every object under a prefix
async fn snapshot<S: ObjectStore + ?Sized>(store: &S, prefix: &str, max_tracked: usize) -> Result<Snapshot> {
    let mut snapshot = Snapshot::new();
    let mut continuation_token: Option<String> = None;

    loop {
        let page = store
            .list(prefix, MAX_LIST_PAGE, continuation_token.as_deref())
            .await?;
        for object in page.objects {
            snapshot.insert(
                object.key,
                Entry {
                    last_modified: object.last_modified,
                    size: object.size,
                },
            );
        }
        if snapshot.len() > max_tracked {
            return Err(CoreError::InvalidArgument(format!(
                "prefix holds more than {} objects",
                max_tracked
            )));
        }

        match page.next_continuation_token {
            Some(token) if page.is_truncated => continuation_token = Some(token),
            _ => break,
        }
    }

    Ok(snapshot)
}

/// Next baseline; a key still present keeps the newest timestamp seen so
/// its reported `lastModified` never goes backwards
fn advance(previous: &Snapshot, mut current: Snapshot) -> Snapshot {
    for (key, entry) in current.iter_mut() {
        if let Some(old) = previous.get(key) {
            if old.last_modified > entry.last_modified {
                entry.last_modified = old.last_modified;
            }
        }
    }
    current
}

/// Events between two snapshots, keys relative to `root`
///
/// A tombstone appearing reports a delete of the key it records. Tombstones
/// disappearing are cleanup and report nothing.
fn diff(previous: &Snapshot, current: &Snapshot, root: &str) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (key, entry) in current {
        let changed = match previous.get(key) {
            None => true,
            Some(old) => entry.last_modified > old.last_modified,
        };
        if !changed {
            continue;
        }

        let relative = relativize(key, root);
        if is_tombstone_key(relative) {
            if let Some(original) = original_key_of(relative) {
                events.push(ChangeEvent::delete(original));
            }
        } else {
            events.push(ChangeEvent::change(relative, entry.last_modified, entry.size));
        }
    }

    for key in previous.keys() {
        if current.contains_key(key) {
            continue;
        }
        let relative = relativize(key, root);
        if !is_tombstone_key(relative) {
            events.push(ChangeEvent::delete(relative));
        }
    }

    events
}
