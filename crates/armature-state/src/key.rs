#![forbid(unsafe_code)]

//! Storage-key derivation and instance uids.
//!
//! A [`StateKey`] maps a widget instance to its stored record and its sync
//! topics. Derivation is deterministic: an explicit id is used verbatim, so
//! any number of instances that share it also share persisted state; without
//! one, the key embeds a process-unique uid and never collides.
//!
//! # Invariants
//!
//! 1. `derive_key(Some(id), ..)` depends only on `id`.
//! 2. `derive_key(None, kind, uid)` is distinct for distinct uids.
//! 3. [`generate_uid`] never returns the same value twice within one
//!    process lifetime.

use core::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::store::now_millis;

/// Unique identifier for an instance's persisted state.
///
/// Also the base of the instance's sync topics: the local channel uses the
/// key itself, the cross-context channel uses [`StateKey::sibling_topic`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey(String);

impl StateKey {
    /// The key as a plain string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Topic announcing that the record under this key changed, observed by
    /// other execution contexts (`"{key}-updated"`).
    #[must_use]
    pub fn sibling_topic(&self) -> String {
        format!("{}-updated", self.0)
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Derive the storage key for an instance.
///
/// An explicit, non-empty `id` is used verbatim — instances sharing it share
/// persisted state by design. Otherwise the key is
/// `"{kind-lowercased}-{uid}"`, which never collides because uids are
/// process-unique.
///
/// ```
/// use armature_state::key::derive_key;
///
/// assert_eq!(
///     derive_key(Some("order-7"), "Widget", "u1"),
///     derive_key(Some("order-7"), "Widget", "u2"),
/// );
/// assert_ne!(
///     derive_key(None, "Widget", "u1"),
///     derive_key(None, "Widget", "u2"),
/// );
/// ```
#[must_use]
pub fn derive_key(explicit_id: Option<&str>, kind: &str, uid: &str) -> StateKey {
    match explicit_id {
        Some(id) if !id.is_empty() => StateKey(id.to_string()),
        _ => StateKey(format!("{}-{uid}", kind.to_lowercase())),
    }
}

static UID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a process-unique instance uid.
///
/// Shaped as `"{epoch-millis}-{sequence}"`. The timestamp keeps uids
/// readable and roughly ordered; uniqueness rests on the monotonic sequence
/// alone.
#[must_use]
pub fn generate_uid() -> String {
    let seq = UID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{}-{seq}", now_millis())
}
