#![forbid(unsafe_code)]

//! Three-tier configuration cascade for Armature widgets.
//!
//! Every widget instance resolves its configuration from up to three partial
//! sources — `component` (instance-specific), `user` (preferences), and
//! `system` (administered) — merged leaf-by-leaf into a [`ResolvedConfig`]:
//!
//! ```text
//! component ▸ user ▸ system ▸ builtin default
//! ```
//!
//! Resolution is *per leaf*, not per subtree: a source that defines only
//! `formats.number.decimals` contributes exactly that leaf and nothing else.
//! Presence is decided by `Option` — a leaf explicitly set to `false` or `0`
//! in a higher-priority source still wins over lower-priority sources.
//!
//! # Invariants
//!
//! 1. **Pure and total**: [`resolve`] never fails; absent sources behave as
//!    empty trees.
//! 2. **Per-leaf independence**: each leaf resolves without looking at any
//!    other leaf.
//! 3. **Defaults are the floor**: `resolve(None, None, None)` equals
//!    [`ResolvedConfig::default()`].
//! 4. **No I/O**: loading source documents is a host concern (see the
//!    `serde` feature).

pub mod cascade;
pub mod tree;

pub use cascade::{Cascade, resolve};
pub use tree::{
    ConfigSource, CurrencySource, Direction, DurationSource, DurationStyle, DurationUnit,
    FileSizeSource, FileSizeUnit, FormatSource, NumberSource, PercentageSource, ResolvedConfig,
    ResolvedCurrency, ResolvedDuration, ResolvedFileSize, ResolvedFormats, ResolvedNumber,
    ResolvedPercentage,
};
