#![forbid(unsafe_code)]

//! Armature public facade and prelude.
//!
//! Re-exports the widget state layer: the configuration cascade from
//! [`armature_config`] and the persistence/sync/collection core from
//! [`armature_state`]. Widget crates depend on this one.

pub use armature_config as config;
pub use armature_state as state;

pub use armature_config::{ConfigSource, ResolvedConfig, resolve};
pub use armature_state::{
    InstrumentedCollection, JsonMap, SharedStores, StateContext, StateKey, WidgetCore,
};

/// Everything a widget implementation typically needs.
pub mod prelude {
    pub use armature_config::{
        Cascade, ConfigSource, Direction, DurationStyle, DurationUnit, FileSizeUnit, FormatSource,
        ResolvedConfig, resolve,
    };
    pub use armature_state::{
        ChangeSignal, ChannelSubscription, InstrumentedCollection, JsonMap, PersistentStateStore,
        SharedStores, StateContext, StateKey, StorageTier, SyncChannel, WidgetCore, derive_key,
    };
}
