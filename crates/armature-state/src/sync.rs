#![forbid(unsafe_code)]

//! Cross-context change notification.
//!
//! A saved record is announced on two channels:
//!
//! - the **local channel**, dispatched synchronously to every subscriber in
//!   the same execution context (the originator included), so co-located
//!   instances converge without a round trip through the platform; and
//! - the **cross-context channel**, queued by the [`ContextHub`] for every
//!   *other* context attached to the same stores and delivered when that
//!   context pumps its queue.
//!
//! Signals are ephemeral ([`ChangeSignal`]) and never authoritative: a
//! receiving instance re-reads the stored record rather than trusting any
//! payload. The [`LoadGuard`] is the recursion break — while an instance is
//! applying a signal, its own saves are no-ops, so a load can never fan out
//! into another save/signal round.
//!
//! # Invariants
//!
//! 1. Local delivery is synchronous and in registration order.
//! 2. Cross-context delivery never reaches the originating context.
//! 3. Dropping a [`ChannelSubscription`] removes exactly that handler;
//!    other subscribers on the same topic are unaffected.
//! 4. The guard flag is cleared on scope exit even if a handler panics.
//!
//! # Failure Modes
//!
//! Host adapters backed by real platform signals may fail to publish or
//! subscribe; implementations degrade silently (log, keep running) and the
//! instance simply operates unsynchronized. The in-memory channels here
//! cannot fail.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use ahash::AHashMap;
use tracing::debug;

use crate::key::StateKey;
use crate::store::now_millis;

/// Ephemeral notification that the record under a key changed.
///
/// Carries no state; consumers re-read the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
    /// The topic (storage key or its sibling) that fired.
    pub topic: String,
    /// When the signal was published (epoch millis).
    pub fired_at: u64,
}

impl ChangeSignal {
    fn new(topic: &str) -> Self {
        Self {
            topic: topic.to_string(),
            fired_at: now_millis(),
        }
    }
}

/// Boxed handler invoked on signal delivery.
pub type SignalHandler = Rc<dyn Fn(&ChangeSignal)>;

/// A topic-keyed notification channel.
///
/// The two built-in implementations are [`LocalChannel`] (same-context,
/// synchronous) and [`CrossContextChannel`] (hub-queued). Hosts bridging a
/// real platform signal implement this for their transport.
pub trait SyncChannel {
    /// Announce `topic` to this channel's audience.
    fn publish(&self, topic: &str);

    /// Register `handler` for `topic`. The handler fires until the returned
    /// subscription is dropped.
    fn subscribe(&self, topic: &str, handler: SignalHandler) -> ChannelSubscription;
}

// ---------------------------------------------------------------------------
// Handler registry + RAII subscription
// ---------------------------------------------------------------------------

type HandlerId = u64;

#[derive(Default)]
struct Registry {
    topics: AHashMap<String, Vec<(HandlerId, SignalHandler)>>,
    next_id: HandlerId,
}

impl Registry {
    fn subscribe(&mut self, topic: &str, handler: SignalHandler) -> HandlerId {
        let id = self.next_id;
        self.next_id += 1;
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push((id, handler));
        id
    }

    fn unsubscribe(&mut self, topic: &str, id: HandlerId) {
        if let Some(handlers) = self.topics.get_mut(topic) {
            handlers.retain(|(hid, _)| *hid != id);
            if handlers.is_empty() {
                self.topics.remove(topic);
            }
        }
    }

    /// Snapshot the handlers for a topic so dispatch never holds the borrow
    /// while running user code (handlers may subscribe/unsubscribe).
    fn handlers_for(&self, topic: &str) -> Vec<SignalHandler> {
        self.topics
            .get(topic)
            .map(|handlers| handlers.iter().map(|(_, h)| Rc::clone(h)).collect())
            .unwrap_or_default()
    }
}

/// RAII guard for a channel subscription; dropping it unsubscribes.
///
/// Holding the registry weakly means a subscription outliving its channel
/// degrades to a no-op drop.
#[must_use = "dropping this subscription removes the handler"]
pub struct ChannelSubscription {
    registry: Weak<RefCell<Registry>>,
    topic: String,
    id: HandlerId,
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.borrow_mut().unsubscribe(&self.topic, self.id);
        }
    }
}

impl std::fmt::Debug for ChannelSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelSubscription")
            .field("topic", &self.topic)
            .finish()
    }
}

/// Dispatch to the topic's current handlers; returns how many ran.
fn dispatch(registry: &Rc<RefCell<Registry>>, signal: &ChangeSignal) -> usize {
    let handlers = registry.borrow().handlers_for(&signal.topic);
    let count = handlers.len();
    for handler in handlers {
        handler(signal);
    }
    count
}

// ---------------------------------------------------------------------------
// LocalChannel — same-context, synchronous
// ---------------------------------------------------------------------------

/// Same-context channel: `publish` dispatches synchronously to every
/// subscriber registered in this context, the originator included.
#[derive(Clone, Default)]
pub struct LocalChannel {
    registry: Rc<RefCell<Registry>>,
}

impl LocalChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SyncChannel for LocalChannel {
    fn publish(&self, topic: &str) {
        dispatch(&self.registry, &ChangeSignal::new(topic));
    }

    fn subscribe(&self, topic: &str, handler: SignalHandler) -> ChannelSubscription {
        let id = self.registry.borrow_mut().subscribe(topic, handler);
        ChannelSubscription {
            registry: Rc::downgrade(&self.registry),
            topic: topic.to_string(),
            id,
        }
    }
}

impl std::fmt::Debug for LocalChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalChannel")
            .field("topics", &self.registry.borrow().topics.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ContextHub + CrossContextChannel
// ---------------------------------------------------------------------------

/// Identifies one execution context attached to a hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(u64);

type SignalQueue = Rc<RefCell<VecDeque<ChangeSignal>>>;

/// The shared signal fabric between execution contexts.
///
/// Each attached context gets a queue; publishing from one context enqueues
/// the signal for every *other* context. This stands in for the platform
/// mechanism that fires storage signals everywhere but the originating
/// context.
#[derive(Default)]
pub struct ContextHub {
    inner: RefCell<HubInner>,
}

#[derive(Default)]
struct HubInner {
    next_id: u64,
    queues: AHashMap<ContextId, SignalQueue>,
}

impl ContextHub {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a context; returns its id and its private signal queue.
    pub(crate) fn register(&self) -> (ContextId, SignalQueue) {
        let mut inner = self.inner.borrow_mut();
        let id = ContextId(inner.next_id);
        inner.next_id += 1;
        let queue: SignalQueue = Rc::default();
        inner.queues.insert(id, Rc::clone(&queue));
        (id, queue)
    }

    pub(crate) fn unregister(&self, id: ContextId) {
        self.inner.borrow_mut().queues.remove(&id);
    }

    /// Queue `topic` for every context except the originator.
    pub(crate) fn broadcast_from(&self, origin: ContextId, topic: &str) {
        let signal = ChangeSignal::new(topic);
        for (id, queue) in &self.inner.borrow().queues {
            if *id != origin {
                queue.borrow_mut().push_back(signal.clone());
            }
        }
    }

    /// Number of contexts currently attached.
    #[must_use]
    pub fn context_count(&self) -> usize {
        self.inner.borrow().queues.len()
    }
}

impl std::fmt::Debug for ContextHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHub")
            .field("contexts", &self.context_count())
            .finish()
    }
}

/// One context's view of the cross-context signal fabric.
///
/// `publish` hands the topic to the hub (which queues it for the *other*
/// contexts); [`CrossContextChannel::pump`] drains this context's own queue
/// and dispatches to local subscribers. Hosts with an event loop call
/// `pump` once per tick.
#[derive(Clone)]
pub struct CrossContextChannel {
    hub: Rc<ContextHub>,
    id: ContextId,
    queue: SignalQueue,
    registry: Rc<RefCell<Registry>>,
}

impl CrossContextChannel {
    pub(crate) fn attach(hub: Rc<ContextHub>) -> Self {
        let (id, queue) = hub.register();
        Self {
            hub,
            id,
            queue,
            registry: Rc::default(),
        }
    }

    pub(crate) fn id(&self) -> ContextId {
        self.id
    }

    /// Deliver every queued signal to this context's subscribers.
    ///
    /// Returns the number of signals that reached at least one handler.
    /// Signals whose topic has no remaining subscribers (instance torn down
    /// since the signal was queued) are discarded silently.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        // Signals queued *during* delivery wait for the next pump, matching
        // platform event-queue behavior.
        let pending: Vec<ChangeSignal> = self.queue.borrow_mut().drain(..).collect();
        for signal in pending {
            debug!(topic = %signal.topic, "delivering cross-context signal");
            if dispatch(&self.registry, &signal) > 0 {
                delivered += 1;
            }
        }
        delivered
    }

    /// Whether signals are waiting to be pumped.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty()
    }
}

impl SyncChannel for CrossContextChannel {
    fn publish(&self, topic: &str) {
        self.hub.broadcast_from(self.id, topic);
    }

    fn subscribe(&self, topic: &str, handler: SignalHandler) -> ChannelSubscription {
        let id = self.registry.borrow_mut().subscribe(topic, handler);
        ChannelSubscription {
            registry: Rc::downgrade(&self.registry),
            topic: topic.to_string(),
            id,
        }
    }
}

impl std::fmt::Debug for CrossContextChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossContextChannel")
            .field("context", &self.id)
            .field("pending", &self.queue.borrow().len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// SyncBus — both channels wired for one instance
// ---------------------------------------------------------------------------

/// One instance's subscriptions on both channels, plus its announce path.
///
/// `enable_persistence` registers a single handler under the key's local
/// topic and its cross-context sibling topic; `announce` publishes both
/// after a save. Dropping the bus (or calling [`SyncBus::detach`]) removes
/// the listeners without affecting other instances on the same key.
pub struct SyncBus {
    local: LocalChannel,
    cross: CrossContextChannel,
    subscriptions: Vec<ChannelSubscription>,
}

impl SyncBus {
    #[must_use]
    pub(crate) fn new(local: LocalChannel, cross: CrossContextChannel) -> Self {
        Self {
            local,
            cross,
            subscriptions: Vec::new(),
        }
    }

    /// Subscribe `handler` to both notification channels for `key`.
    pub fn enable_persistence(&mut self, key: &StateKey, handler: SignalHandler) {
        self.subscriptions
            .push(self.cross.subscribe(&key.sibling_topic(), Rc::clone(&handler)));
        self.subscriptions.push(self.local.subscribe(key.as_str(), handler));
    }

    /// Announce a completed save on both channels.
    ///
    /// The cross-context publish only queues; the local publish dispatches
    /// synchronously before this returns.
    pub fn announce(&self, key: &StateKey) {
        self.cross.publish(&key.sibling_topic());
        self.notify_local(key);
    }

    /// Fire only the same-context channel for `key`.
    pub fn notify_local(&self, key: &StateKey) {
        self.local.publish(key.as_str());
    }

    /// Remove this instance's listeners from both channels.
    pub fn detach(&mut self) {
        self.subscriptions.clear();
    }

    /// Whether the bus currently holds any subscriptions.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        !self.subscriptions.is_empty()
    }
}

impl std::fmt::Debug for SyncBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncBus")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// LoadGuard — scoped recursion break
// ---------------------------------------------------------------------------

/// Scoped-release guard around "applying a loaded record".
///
/// While held, the owning instance's saves are no-ops. `Drop` clears the
/// flag, so the guard releases even when the reaction hook panics. Boolean,
/// not reentrant-counted: an `on_external_change` hook that synchronously
/// calls back into `update_state` has that save suppressed.
#[must_use = "dropping this guard ends the loading window"]
pub struct LoadGuard {
    flag: Rc<Cell<bool>>,
}

impl LoadGuard {
    /// Raise `flag` for the lifetime of the returned guard.
    pub fn hold(flag: &Rc<Cell<bool>>) -> Self {
        flag.set(true);
        Self {
            flag: Rc::clone(flag),
        }
    }
}

impl Drop for LoadGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}
