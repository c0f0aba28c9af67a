//! Error types for script project analysis and repair
//!
//! Classification outcomes ("not a script project", "no script projects",
//! "everything valid") are values, not errors. Everything here is either an
//! environment failure, a corrupt project, or a failed migration step.

use mdk_xml::XmlError;
use semver::Version;
use std::path::PathBuf;

/// Main error type for analysis and upgrade operations
#[derive(Debug, thiserror::Error)]
pub enum UpgradeError {
    /// Project or options document could not be read, parsed or written
    #[error("xml error: {0}")]
    Xml(#[from] XmlError),

    /// Filesystem operation failed
    #[error("io error on {path}: {source}")]
    Io {
        /// Path the operation failed on
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Options descriptor failure
    #[error("options error: {0}")]
    Options(#[from] OptionsError),

    /// Project document has no `<Project>` root element
    #[error("{path} has no <Project> root element")]
    MissingProjectRoot {
        /// Project file
        path: PathBuf,
    },

    /// A recorded bad reference no longer points at an element
    #[error("bad reference points at a missing element: {element}")]
    StaleReference {
        /// Element handle that failed to resolve
        element: String,
    },

    /// A migration step failed; steps applied before it are kept
    #[error("migration from {from} to {to} failed: {source}")]
    Migration {
        /// Version recorded before the step
        from: Version,
        /// Version of the failing step
        to: Version,
        /// Step failure
        #[source]
        source: MigrationError,
    },

    /// Host project operation failed
    #[error("host error: {0}")]
    Host(#[from] HostError),

    /// Background worker panicked or was cancelled
    #[error("worker failed: {0}")]
    Worker(String),

    /// Invalid analysis configuration
    #[error("configuration error: {0}")]
    Config(String),
}

impl UpgradeError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create migration error for the step that failed
    pub fn migration(from: Version, to: Version, source: MigrationError) -> Self {
        Self::Migration { from, to, source }
    }

    /// Check if the project itself is damaged (as opposed to the environment)
    #[inline]
    #[must_use]
    pub fn is_corrupt_project(&self) -> bool {
        matches!(
            self,
            Self::MissingProjectRoot { .. } | Self::StaleReference { .. }
        )
    }
}

/// Options descriptor errors
#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    /// Descriptor could not be read or written
    #[error("io error on {path}: {source}")]
    Io {
        /// Path the operation failed on
        path: PathBuf,
        /// Underlying failure
        #[source]
        source: std::io::Error,
    },

    /// Descriptor document error
    #[error("xml error: {0}")]
    Xml(#[from] XmlError),
}

impl OptionsError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by a single migration step
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    /// Step-specific failure
    #[error("{0}")]
    Failed(String),
}

/// Errors reported by the host's project model
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Unload failed
    #[error("failed to unload {project}: {message}")]
    Unload {
        /// Project name
        project: String,
        /// Host message
        message: String,
    },

    /// Reload failed
    #[error("failed to reload {project}: {message}")]
    Reload {
        /// Project name
        project: String,
        /// Host message
        message: String,
    },
}

/// Result type alias for upgrade operations
pub type UpgradeResult<T> = Result<T, UpgradeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migration_error_display_carries_versions() {
        let err = UpgradeError::migration(
            Version::new(1, 0, 0),
            Version::new(1, 1, 0),
            MigrationError::Failed("boom".to_string()),
        );
        assert_eq!(err.to_string(), "migration from 1.0.0 to 1.1.0 failed: boom");
    }

    #[test]
    fn corrupt_project_classification() {
        let err = UpgradeError::MissingProjectRoot {
            path: PathBuf::from("a.csproj"),
        };
        assert!(err.is_corrupt_project());

        let err = UpgradeError::Worker("panicked".to_string());
        assert!(!err.is_corrupt_project());
    }

    #[test]
    fn error_conversions() {
        let err: UpgradeError = XmlError::MissingRoot.into();
        assert!(matches!(err, UpgradeError::Xml(_)));

        let err: UpgradeError = OptionsError::Xml(XmlError::MissingRoot).into();
        assert!(matches!(err, UpgradeError::Options(_)));

        let err: UpgradeError = HostError::Unload {
            project: "Script".to_string(),
            message: "busy".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "host error: failed to unload Script: busy");
    }
}
