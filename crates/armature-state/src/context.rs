#![forbid(unsafe_code)]

//! Explicit wiring between instances, storage tiers, and the signal fabric.
//!
//! There are no ambient statics here: a host constructs one [`SharedStores`]
//! (both tiers plus the [`ContextHub`]) and passes it, by reference, to
//! whatever needs it. Each execution context — a window, a tab, a test —
//! attaches once to obtain a [`StateContext`], which carries that context's
//! local channel and its cross-context queue.
//!
//! A host with an event loop calls [`StateContext::pump`] once per tick;
//! everything else in this layer is synchronous.

use std::rc::Rc;

use crate::store::{FileTier, MemoryTier, PersistentStateStore, StorageTier};
use crate::sync::{ContextHub, CrossContextChannel, LocalChannel, SyncBus};

/// Process-wide registry: the two storage tiers and the signal hub.
///
/// Explicitly constructed and explicitly dropped; every context attached to
/// the same `SharedStores` shares records and signals.
pub struct SharedStores {
    tier_a: Rc<dyn StorageTier>,
    tier_b: Rc<dyn StorageTier>,
    hub: Rc<ContextHub>,
}

impl SharedStores {
    /// Build from explicit tier adapters.
    #[must_use]
    pub fn new(tier_a: Rc<dyn StorageTier>, tier_b: Rc<dyn StorageTier>) -> Rc<Self> {
        Rc::new(Self {
            tier_a,
            tier_b,
            hub: Rc::new(ContextHub::new()),
        })
    }

    /// Both tiers in memory. The single-process and testing configuration:
    /// durable-tier semantics without touching the filesystem.
    #[must_use]
    pub fn in_memory() -> Rc<Self> {
        Self::new(Rc::new(MemoryTier::new()), Rc::new(MemoryTier::new()))
    }

    /// Durable tier rooted at `dir`, volatile tier in memory.
    ///
    /// Never fails; an unusable directory degrades the durable tier to a
    /// logged no-op (see [`FileTier::open`]).
    #[must_use]
    pub fn durable(dir: impl Into<std::path::PathBuf>) -> Rc<Self> {
        Self::new(Rc::new(FileTier::open(dir)), Rc::new(MemoryTier::new()))
    }

    /// Attach a new execution context to these stores.
    #[must_use]
    pub fn attach(self: &Rc<Self>) -> Rc<StateContext> {
        Rc::new(StateContext {
            shared: Rc::clone(self),
            local: LocalChannel::new(),
            cross: CrossContextChannel::attach(Rc::clone(&self.hub)),
        })
    }

    /// A store handle over the two tiers.
    #[must_use]
    pub fn store(&self) -> PersistentStateStore {
        PersistentStateStore::new(Rc::clone(&self.tier_a), Rc::clone(&self.tier_b))
    }
}

impl std::fmt::Debug for SharedStores {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStores")
            .field("tier_a", &self.tier_a.name())
            .field("tier_b", &self.tier_b.name())
            .field("hub", &self.hub)
            .finish()
    }
}

/// One execution context attached to a [`SharedStores`].
///
/// Instances created against the same context share its local channel
/// (synchronous same-context sync); instances in different contexts reach
/// each other through the hub once the receiving context pumps.
pub struct StateContext {
    shared: Rc<SharedStores>,
    local: LocalChannel,
    cross: CrossContextChannel,
}

impl StateContext {
    /// Deliver queued cross-context signals to this context's instances.
    ///
    /// Returns the number of signals delivered.
    pub fn pump(&self) -> usize {
        self.cross.pump()
    }

    /// Whether cross-context signals are waiting for [`StateContext::pump`].
    #[must_use]
    pub fn has_pending_signals(&self) -> bool {
        self.cross.has_pending()
    }

    /// A store handle over the shared tiers.
    #[must_use]
    pub fn store(&self) -> PersistentStateStore {
        self.shared.store()
    }

    /// A sync bus wired to this context's channels.
    #[must_use]
    pub fn bus(&self) -> SyncBus {
        SyncBus::new(self.local.clone(), self.cross.clone())
    }

    /// The stores this context is attached to.
    #[must_use]
    pub fn shared(&self) -> &Rc<SharedStores> {
        &self.shared
    }
}

impl Drop for StateContext {
    fn drop(&mut self) {
        self.shared.hub.unregister(self.cross.id());
    }
}

impl std::fmt::Debug for StateContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateContext")
            .field("cross", &self.cross)
            .finish()
    }
}
