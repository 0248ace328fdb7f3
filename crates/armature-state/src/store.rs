#![forbid(unsafe_code)]

//! Dual-tier persistent store for instance state.
//!
//! Instance state is a small JSON object written redundantly to two tiers:
//!
//! - **Tier A** ([`FileTier`]): durable, size-limited, records expire after
//!   a fixed multi-month window.
//! - **Tier B** ([`MemoryTier`]): volatile, uncapped, shared by every
//!   context attached to the same [`SharedStores`](crate::context::SharedStores).
//!
//! Loads prefer tier B and fall back to tier A; saves write both. A record
//! is not the instance's state — loaded fields are shallow-merged *over* the
//! caller's current state, so restored state overwrites constructor defaults
//! without having to express every field.
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Tier unavailable | Root dir not creatable, store disabled | No-op, warned once |
//! | Corrupt payload | Schema drift, truncated write | Record dropped, `None`, warning |
//! | Oversized record | State beyond the tier-A budget | Tier-A write rejected, warning |
//! | Expired record | Written > 365 days ago | Read as absent, dropped |
//!
//! Nothing in this module returns an error to the widget; persistence
//! degrades to in-memory operation.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;

use ahash::AHashMap;
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use web_time::{SystemTime, UNIX_EPOCH};

use crate::error::StorageError;
use crate::key::StateKey;

/// Instance state as stored and merged: a flat JSON object.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Milliseconds since the Unix epoch (wasm-safe clock).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// How long tier-A records live before they read as absent.
pub const RECORD_TTL_MILLIS: u64 = 365 * 24 * 60 * 60 * 1000;

/// Per-record payload budget for the durable tier.
pub const DURABLE_RECORD_LIMIT: usize = 4096;

/// One persisted record, replicated identically into both tiers on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The storage key this record belongs to.
    pub key: String,
    /// Serialized instance state.
    pub payload: String,
    /// When the record was written (epoch millis).
    pub written_at: u64,
    /// When the record stops being served (epoch millis). `None` on the
    /// volatile tier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl StoredRecord {
    /// Whether the record has outlived its expiry.
    #[must_use]
    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// A keyed record store. Implementations are shared, append/overwrite-only;
/// no instance owns a tier and any number of instances may read or write the
/// same key.
pub trait StorageTier {
    /// Human-readable tier name for logs.
    fn name(&self) -> &'static str;

    /// Read the record under `key`, if present and readable.
    fn read(&self, key: &str) -> Option<StoredRecord>;

    /// Write (or overwrite) the record under `key`.
    fn write(&self, key: &str, record: &StoredRecord) -> Result<(), StorageError>;

    /// Drop the record under `key`. Used to discard corrupt or expired
    /// records; absence is not an error.
    fn remove(&self, key: &str);
}

// ---------------------------------------------------------------------------
// MemoryTier — tier B
// ---------------------------------------------------------------------------

/// Volatile tier: a process-lifetime map shared across contexts.
#[derive(Debug, Default)]
pub struct MemoryTier {
    records: RefCell<AHashMap<String, StoredRecord>>,
}

impl MemoryTier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }
}

impl StorageTier for MemoryTier {
    fn name(&self) -> &'static str {
        "volatile"
    }

    fn read(&self, key: &str) -> Option<StoredRecord> {
        self.records.borrow().get(key).cloned()
    }

    fn write(&self, key: &str, record: &StoredRecord) -> Result<(), StorageError> {
        self.records
            .borrow_mut()
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    fn remove(&self, key: &str) {
        self.records.borrow_mut().remove(key);
    }
}

// ---------------------------------------------------------------------------
// FileTier — tier A
// ---------------------------------------------------------------------------

/// Durable tier: one JSON file per key under an explicit root directory.
///
/// The root is always passed in by the host — there is no ambient default
/// location. Keys are arbitrary strings, so filenames are the URL-safe
/// base64 of the key. Records carry an expiry and a size budget
/// ([`DURABLE_RECORD_LIMIT`]); both are enforced here, not by callers.
#[derive(Debug)]
pub struct FileTier {
    root: PathBuf,
    available: bool,
    warned: Cell<bool>,
}

impl FileTier {
    /// Open (creating if needed) a durable tier rooted at `root`.
    ///
    /// Never fails: if the directory cannot be created the tier comes up
    /// unavailable and every operation is a logged no-op.
    #[must_use]
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let available = match fs::create_dir_all(&root) {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    root = %root.display(),
                    %err,
                    "durable tier unavailable; persistence degrades to volatile"
                );
                false
            }
        };
        Self {
            root,
            available,
            warned: Cell::new(!available),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.json", URL_SAFE_NO_PAD.encode(key)))
    }

    fn warn_once(&self, err: &StorageError) {
        if !self.warned.replace(true) {
            warn!(tier = self.name(), %err, "durable tier write failed");
        }
    }
}

impl StorageTier for FileTier {
    fn name(&self) -> &'static str {
        "durable"
    }

    fn read(&self, key: &str) -> Option<StoredRecord> {
        if !self.available {
            return None;
        }
        let path = self.path_for(key);
        let raw = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<StoredRecord>(&raw) {
            Ok(record) => {
                if record.is_expired(now_millis()) {
                    debug!(key, "durable record expired; dropping");
                    self.remove(key);
                    None
                } else {
                    Some(record)
                }
            }
            Err(err) => {
                warn!(key, %err, "durable record corrupt; dropping");
                self.remove(key);
                None
            }
        }
    }

    fn write(&self, key: &str, record: &StoredRecord) -> Result<(), StorageError> {
        if !self.available {
            return Err(StorageError::Unavailable("durable tier".into()));
        }
        if record.payload.len() > DURABLE_RECORD_LIMIT {
            let err = StorageError::RecordTooLarge {
                size: record.payload.len(),
                limit: DURABLE_RECORD_LIMIT,
            };
            self.warn_once(&err);
            return Err(err);
        }
        let raw = serde_json::to_string(record).map_err(StorageError::Serialize)?;
        fs::write(self.path_for(key), raw).map_err(|err| {
            let err = StorageError::Io(err);
            self.warn_once(&err);
            err
        })
    }

    fn remove(&self, key: &str) {
        if self.available {
            let _ = fs::remove_file(self.path_for(key));
        }
    }
}

// ---------------------------------------------------------------------------
// PersistentStateStore
// ---------------------------------------------------------------------------

/// Load/save primitives over the two tiers.
///
/// Cheap to clone; clones share the same tiers.
#[derive(Clone)]
pub struct PersistentStateStore {
    tier_a: Rc<dyn StorageTier>,
    tier_b: Rc<dyn StorageTier>,
}

impl std::fmt::Debug for PersistentStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentStateStore")
            .field("tier_a", &self.tier_a.name())
            .field("tier_b", &self.tier_b.name())
            .finish()
    }
}

impl PersistentStateStore {
    /// Build a store over a durable tier (A) and a volatile tier (B).
    #[must_use]
    pub fn new(tier_a: Rc<dyn StorageTier>, tier_b: Rc<dyn StorageTier>) -> Self {
        Self { tier_a, tier_b }
    }

    /// Load the state stored under `key`.
    ///
    /// Prefers the volatile tier, falling back to the durable tier. Corrupt
    /// payloads are dropped from the tier that served them and read as
    /// absent. Never fails.
    #[must_use]
    pub fn load(&self, key: &StateKey) -> Option<JsonMap> {
        for tier in [&self.tier_b, &self.tier_a] {
            let Some(record) = tier.read(key.as_str()) else {
                continue;
            };
            match serde_json::from_str::<JsonMap>(&record.payload) {
                Ok(state) => return Some(state),
                Err(err) => {
                    let err = StorageError::Deserialize(err);
                    warn!(key = %key, tier = tier.name(), %err, "dropping stored record");
                    tier.remove(key.as_str());
                }
            }
        }
        None
    }

    /// Serialize `state` and write it to both tiers.
    ///
    /// Best-effort: a failure in either tier is logged and swallowed.
    /// Returns `true` when at least one tier accepted the write — the
    /// caller's cue to emit a change signal.
    pub fn save(&self, key: &StateKey, state: &JsonMap) -> bool {
        let payload = match serde_json::to_string(state) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(key = %key, %err, "state not serializable; skipping save");
                return false;
            }
        };
        let written_at = now_millis();
        let durable = StoredRecord {
            key: key.as_str().to_string(),
            payload: payload.clone(),
            written_at,
            expires_at: Some(written_at + RECORD_TTL_MILLIS),
        };
        let volatile = StoredRecord {
            key: key.as_str().to_string(),
            payload,
            written_at,
            expires_at: None,
        };

        let mut persisted = false;
        for (tier, record) in [(&self.tier_a, &durable), (&self.tier_b, &volatile)] {
            match tier.write(key.as_str(), record) {
                Ok(()) => persisted = true,
                Err(err) => {
                    debug!(key = %key, tier = tier.name(), %err, "tier write failed");
                }
            }
        }
        persisted
    }
}

/// Shallow-merge `loaded` over `target`, loaded values winning per field.
pub fn merge_state(target: &mut JsonMap, loaded: JsonMap) {
    for (field, value) in loaded {
        target.insert(field, value);
    }
}
