#![forbid(unsafe_code)]

//! Storage error taxonomy.
//!
//! Errors here never cross the widget boundary: every failure is caught
//! inside the store layer, logged, and degraded to a no-op. The enum exists
//! so tier adapters and the store can speak precisely to each other (and to
//! the log).

use std::fmt;

/// Why a storage tier rejected an operation.
#[derive(Debug)]
pub enum StorageError {
    /// The backend is not usable at all (directory cannot be created,
    /// platform store disabled). Reported once per tier instance.
    Unavailable(String),
    /// The record exceeds the tier's per-record budget.
    RecordTooLarge { size: usize, limit: usize },
    /// Instance state could not be serialized.
    Serialize(serde_json::Error),
    /// A stored payload is not valid for the expected shape.
    Deserialize(serde_json::Error),
    /// Filesystem failure underneath a durable tier.
    Io(std::io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(what) => write!(f, "storage unavailable: {what}"),
            Self::RecordTooLarge { size, limit } => {
                write!(f, "record of {size} bytes exceeds tier limit of {limit} bytes")
            }
            Self::Serialize(err) => write!(f, "state serialization failed: {err}"),
            Self::Deserialize(err) => write!(f, "stored payload is corrupt: {err}"),
            Self::Io(err) => write!(f, "storage i/o failed: {err}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Serialize(err) | Self::Deserialize(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_failure() {
        let err = StorageError::RecordTooLarge {
            size: 5000,
            limit: 4096,
        };
        let msg = err.to_string();
        assert!(msg.contains("5000"));
        assert!(msg.contains("4096"));

        let err = StorageError::Unavailable("durable tier".into());
        assert!(err.to_string().contains("durable tier"));
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: StorageError = io.into();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
