#![forbid(unsafe_code)]

//! Per-instance runtime core: the state half of a widget base class.
//!
//! A [`WidgetCore`] owns one instance's resolved configuration and JSON
//! state, and wires persistence and synchronization when the resolved
//! `persistence` leaf is on:
//!
//! - at construction, stored state is loaded and shallow-merged over the
//!   caller's initial state (stored fields win);
//! - [`WidgetCore::update_state`] merges a partial update and re-persists,
//!   announcing the save on both sync channels;
//! - on receiving a change signal, the core re-reads the store, applies the
//!   result, and invokes the instance's `on_external_change` hook — with the
//!   loading guard held for the whole sequence, so the reaction can never
//!   fan out into another save/signal round.
//!
//! Per instance the phases are strictly `Idle → Loading → Idle` and
//! `Idle → Saving → Idle`; Saving is skipped entirely while Loading.
//!
//! Teardown ([`WidgetCore::detach`] or drop) removes the channel listeners;
//! the stored record intentionally outlives the instance so reloads and
//! sibling contexts can pick it up. Signal handlers hold the instance
//! weakly — a signal already queued when the instance died is skipped, not
//! delivered to a corpse.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use armature_config::{ConfigSource, ResolvedConfig, resolve};
use serde_json::Value;
use tracing::debug;

use crate::context::StateContext;
use crate::key::{StateKey, derive_key, generate_uid};
use crate::store::{JsonMap, PersistentStateStore, merge_state};
use crate::sync::{LoadGuard, SignalHandler, SyncBus};

struct CoreInner {
    state: JsonMap,
    hook: Option<Rc<dyn Fn(&JsonMap)>>,
}

/// The runtime state core of one widget instance.
pub struct WidgetCore {
    uid: String,
    kind: String,
    key: StateKey,
    config: ResolvedConfig,
    store: PersistentStateStore,
    bus: SyncBus,
    inner: Rc<RefCell<CoreInner>>,
    loading: Rc<Cell<bool>>,
    persistent: bool,
}

impl WidgetCore {
    /// Create the state core for a widget instance.
    ///
    /// `initial` may carry a `uid` (kept; generated otherwise) and an `id`
    /// (a non-empty string makes the storage key explicit and therefore
    /// shareable between instances). Configuration resolves
    /// `component ▸ user ▸ system ▸ defaults`; when the resolved
    /// `persistence` leaf is `false` the instance runs purely in memory and
    /// never touches storage or channels.
    #[must_use]
    pub fn new(
        ctx: &Rc<StateContext>,
        kind: impl Into<String>,
        mut initial: JsonMap,
        component: Option<&ConfigSource>,
        user: Option<&ConfigSource>,
        system: Option<&ConfigSource>,
    ) -> Self {
        let kind = kind.into();
        let config = resolve(component, user, system);

        let uid = match initial.get("uid").and_then(Value::as_str) {
            Some(uid) if !uid.is_empty() => uid.to_string(),
            _ => {
                let uid = generate_uid();
                initial.insert("uid".to_string(), Value::String(uid.clone()));
                uid
            }
        };
        let explicit_id = initial
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string);
        let key = derive_key(explicit_id.as_deref(), &kind, &uid);

        let persistent = config.persistence();
        let store = ctx.store();
        let inner = Rc::new(RefCell::new(CoreInner {
            state: initial,
            hook: None,
        }));
        let loading = Rc::new(Cell::new(false));
        let mut bus = ctx.bus();

        if persistent {
            // Restore before anything can observe the instance. The guard is
            // held even though a load cannot save, to keep the Loading phase
            // rule uniform.
            {
                let _guard = LoadGuard::hold(&loading);
                if let Some(loaded) = store.load(&key) {
                    merge_state(&mut inner.borrow_mut().state, loaded);
                }
            }
            bus.enable_persistence(&key, Self::reload_handler(&inner, &loading, &store, &key));
            debug!(key = %key, kind = %kind, "instance persistence enabled");
        }

        Self {
            uid,
            kind,
            key,
            config,
            store,
            bus,
            inner,
            loading,
            persistent,
        }
    }

    /// Handler shared by both channels: reload, apply, then react, with the
    /// guard held across all three steps.
    fn reload_handler(
        inner: &Rc<RefCell<CoreInner>>,
        loading: &Rc<Cell<bool>>,
        store: &PersistentStateStore,
        key: &StateKey,
    ) -> SignalHandler {
        let inner = Rc::downgrade(inner);
        let loading = Rc::clone(loading);
        let store = store.clone();
        let key = key.clone();
        Rc::new(move |_signal| {
            // Instance may have been torn down after the signal was queued.
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let _guard = LoadGuard::hold(&loading);
            if let Some(loaded) = store.load(&key) {
                merge_state(&mut inner.borrow_mut().state, loaded);
            }
            let hook = inner.borrow().hook.clone();
            if let Some(hook) = hook {
                // Snapshot outside the borrow: the hook may call back into
                // the instance (its save will be suppressed by the guard).
                let state = inner.borrow().state.clone();
                hook(&state);
            }
        })
    }

    /// Merge a partial update into the instance state and re-persist.
    ///
    /// Fields in `partial` win over current fields. While the instance is
    /// applying an external change (guard held), the persist step — and with
    /// it the change signal — is skipped.
    pub fn update_state(&mut self, partial: impl IntoIterator<Item = (String, Value)>) {
        {
            let mut inner = self.inner.borrow_mut();
            for (field, value) in partial {
                inner.state.insert(field, value);
            }
        }
        self.persist();
    }

    fn persist(&self) {
        if !self.persistent || self.loading.get() {
            return;
        }
        let saved = {
            let inner = self.inner.borrow();
            self.store.save(&self.key, &inner.state)
        };
        if saved {
            // Local subscribers (this instance included) run synchronously
            // inside this call; sibling contexts receive on their next pump.
            self.bus.announce(&self.key);
        }
    }

    /// Register the reaction hook invoked after an external change was
    /// applied to this instance's state. Replaces any previous hook.
    pub fn on_external_change(&mut self, hook: impl Fn(&JsonMap) + 'static) {
        self.inner.borrow_mut().hook = Some(Rc::new(hook));
    }

    /// Remove this instance's sync listeners. State stays usable in memory
    /// and the stored record remains for future instances.
    pub fn detach(&mut self) {
        self.bus.detach();
    }

    // -- accessors ----------------------------------------------------------

    /// Read the state without cloning it.
    pub fn with_state<R>(&self, read: impl FnOnce(&JsonMap) -> R) -> R {
        read(&self.inner.borrow().state)
    }

    /// Clone the full state.
    #[must_use]
    pub fn state_snapshot(&self) -> JsonMap {
        self.inner.borrow().state.clone()
    }

    /// Clone one state field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.borrow().state.get(field).cloned()
    }

    /// The instance uid (generated at construction if absent).
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The component kind this instance was created as.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The derived storage key.
    #[must_use]
    pub fn state_key(&self) -> &StateKey {
        &self.key
    }

    /// The resolved configuration for this instance.
    #[must_use]
    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    /// Whether persistence (and sync) is enabled for this instance.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Whether the instance currently holds channel subscriptions.
    #[must_use]
    pub fn is_synchronized(&self) -> bool {
        self.bus.is_attached()
    }
}

impl std::fmt::Debug for WidgetCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetCore")
            .field("kind", &self.kind)
            .field("key", &self.key)
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}
