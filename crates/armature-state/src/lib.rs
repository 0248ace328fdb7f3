#![forbid(unsafe_code)]

//! Runtime state layer for Armature widgets.
//!
//! Everything a widget needs besides pixels:
//!
//! - [`store`]: a dual-tier persistent store — durable-but-bounded tier A,
//!   volatile-but-roomy tier B — written redundantly under a derived
//!   per-instance [`key`](key::StateKey).
//! - [`sync`]: change signals over two channels (same-context synchronous,
//!   cross-context queued) with a recursion guard against feedback loops.
//! - [`collection`]: an ordered collection that notifies a callback exactly
//!   once per mutating call.
//! - [`instance`]: [`WidgetCore`](instance::WidgetCore), the per-instance
//!   glue: config resolution, load-and-merge at construction,
//!   `update_state`, `on_external_change`, teardown.
//! - [`context`]: explicit wiring — [`SharedStores`](context::SharedStores)
//!   and per-context [`StateContext`](context::StateContext) handles.
//!
//! Synchronization is best-effort and last-write-wins; persistence failures
//! degrade to in-memory operation and are logged, never surfaced as errors.

pub mod collection;
pub mod context;
pub mod error;
pub mod instance;
pub mod key;
pub mod store;
pub mod sync;

pub use collection::InstrumentedCollection;
pub use context::{SharedStores, StateContext};
pub use error::StorageError;
pub use instance::WidgetCore;
pub use key::{StateKey, derive_key, generate_uid};
pub use store::{
    DURABLE_RECORD_LIMIT, FileTier, JsonMap, MemoryTier, PersistentStateStore, RECORD_TTL_MILLIS,
    StorageTier, StoredRecord, merge_state,
};
pub use sync::{
    ChangeSignal, ChannelSubscription, ContextHub, CrossContextChannel, LoadGuard, LocalChannel,
    SignalHandler, SyncBus, SyncChannel,
};
