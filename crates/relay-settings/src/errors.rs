//! Why the relay could not use its settings.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// A settings file could not be used, or a value would stop the relay from
/// running.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The file exists but could not be read.
    #[error("cannot read settings file {}: {source}", .path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not JSON, or its values do not fit the settings layout
    /// (for example a string where `server.port` expects a number).
    #[error("settings file {} is malformed: {source}", .path.display())]
    Malformed {
        /// File that was being parsed.
        path: PathBuf,
        /// JSON syntax or type error.
        #[source]
        source: serde_json::Error,
    },
    /// A setting parsed but the relay cannot run with it.
    #[error("invalid setting {key}: {reason}")]
    Invalid {
        /// Dotted camelCase key, as written in the file.
        key: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn malformed(path: &Path, source: serde_json::Error) -> Self {
        Self::Malformed {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }

    /// The offending file, when the failure came from one.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Read { path, .. } | Self::Malformed { path, .. } => Some(path),
            Self::Invalid { .. } => None,
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn malformed_names_file_and_cause() {
        let cause = serde_json::from_str::<serde_json::Value>("{port").unwrap_err();
        let err = SettingsError::malformed(Path::new("/etc/relay.json"), cause);
        let text = err.to_string();
        assert!(text.starts_with("settings file /etc/relay.json is malformed: "));
        assert!(err.source().is_some());
        assert_eq!(err.path(), Some(Path::new("/etc/relay.json")));
    }

    #[test]
    fn invalid_names_the_key() {
        let err = SettingsError::invalid("relay.queueCapacity", "must be greater than 0");
        assert_eq!(
            err.to_string(),
            "invalid setting relay.queueCapacity: must be greater than 0"
        );
        assert!(err.path().is_none());
    }

    #[test]
    fn read_keeps_io_kind() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SettingsError::read(Path::new("settings.json"), io);
        match &err {
            SettingsError::Read { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::PermissionDenied);
            }
            other => panic!("expected Read, got {other:?}"),
        }
    }
}
