//! Auto-save error types.
//!
//! Store and configuration errors provide user-friendly messages and
//! optional remediation hints. None of these are fatal: the debounce layer
//! logs store failures and keeps running on in-memory state.

use std::path::PathBuf;
use thiserror::Error;

/// Boxed error returned by save collaborators.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Preference store error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O error.
    #[error("Failed to {operation} preference file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Preferences could not be encoded as JSON.
    #[error("Failed to serialize learned preferences")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },

    /// Stored preferences are not valid JSON for the expected shape.
    #[error("Failed to deserialize learned preferences")]
    Deserialization {
        #[source]
        source: serde_json::Error,
    },

    /// Atomic write failed (temp file couldn't be renamed).
    #[error("Failed to complete preference write")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Get a user-friendly message for this error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io {
                operation, path, ..
            } => format!("Could not {} the preference file at {}", operation, path.display()),
            Self::Serialization { .. } => {
                "An error occurred while saving learned auto-save timings.".to_string()
            }
            Self::Deserialization { .. } => {
                "Stored auto-save timings are unreadable and were ignored.".to_string()
            }
            Self::AtomicWriteFailed { target_path, .. } => format!(
                "Could not write learned timings to {}. Please check disk space and permissions.",
                target_path.display()
            ),
        }
    }

    /// Get a suggestion for how to resolve this error.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::Io { operation, .. } => {
                if *operation == "read" {
                    Some("Check that you have permission to read the data directory.".into())
                } else {
                    Some("Check that you have permission to write to the data directory.".into())
                }
            }
            Self::Serialization { .. } => None,
            Self::Deserialization { .. } => {
                Some("Run `nbsave prefs clear` to discard the stored timings.".into())
            }
            Self::AtomicWriteFailed { .. } => {
                Some("Free up disk space or point the store at a different directory.".into())
            }
        }
    }
}

/// Auto-save settings error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Settings file could not be read or written.
    #[error("Failed to {operation} settings file: {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file is not valid TOML.
    #[error("Failed to parse settings file: {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Settings could not be encoded as TOML.
    #[error("Failed to serialize settings")]
    Serialize {
        #[source]
        source: toml::ser::Error,
    },

    /// Settings parsed but are inconsistent.
    #[error("Invalid auto-save settings: {reason}")]
    Invalid { reason: String },
}

/// Failure reported by a save collaborator.
#[derive(Debug, Error)]
pub enum SaveError {
    /// The collaborator rejected or failed the save.
    #[error("Failed to save item {item_id}")]
    Failed {
        item_id: String,
        #[source]
        source: BoxError,
    },
}

impl SaveError {
    /// Wrap a collaborator failure for the given item.
    pub fn failed(item_id: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Failed {
            item_id: item_id.into(),
            source: source.into(),
        }
    }
}

/// Result type alias for preference store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_io_error_suggests_permissions() {
        let error = StoreError::Io {
            operation: "read",
            path: PathBuf::from("/tmp/prefs.json"),
            source: std::io::Error::other("denied"),
        };
        assert!(error.user_message().contains("/tmp/prefs.json"));
        assert!(error.suggestion().unwrap().contains("read"));
    }

    #[test]
    fn test_save_error_keeps_source() {
        let error = SaveError::failed("note-1", "network down");
        assert_eq!(error.to_string(), "Failed to save item note-1");
        let source = std::error::Error::source(&error).unwrap();
        assert_eq!(source.to_string(), "network down");
    }
}
