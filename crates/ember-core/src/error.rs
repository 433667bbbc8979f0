//! Error types for Ember operations.
//!
//! This module defines [`EmberError`], the error enum shared across the Ember
//! workspace. Errors carry enough context to be shown to the user as-is: a
//! failed run surfaces exactly one human-readable message, and nothing in the
//! visualization path is allowed to take the process down.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`EmberError`].
pub type Result<T> = std::result::Result<T, EmberError>;

/// Error type for all Ember operations.
///
/// Classification matters more than variety here: an error is either fatal to
/// the process (internal bugs), fatal to a single run
/// (generator/manifest problems, surfaced as a run-failure notice), or a
/// startup configuration problem. Everything else in the pipeline degrades
/// silently by design and never becomes an error at all.
#[derive(Debug, Error)]
pub enum EmberError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Configuration file not found (only when a path was given explicitly)
    #[error("Configuration not found at {path}")]
    ConfigNotFound {
        path: PathBuf,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Configuration file is invalid YAML
    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error with context
    #[error("I/O error {operation}: {path}")]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory creation failed
    #[error("Failed to create directory: {path}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // =========================================================================
    // Manifest Errors
    // =========================================================================
    /// Run manifest file is missing
    #[error("Manifest not found: {path}")]
    ManifestNotFound { path: PathBuf },

    /// Run manifest could not be parsed
    #[error("Invalid manifest {path}: {message}")]
    ManifestInvalid { path: PathBuf, message: String },

    /// Run manifest parsed but lists no agents
    #[error("Manifest {path} contains no agents")]
    ManifestEmpty { path: PathBuf },

    // =========================================================================
    // Generator Errors
    // =========================================================================
    /// Generator process could not be started
    #[error("Failed to start generator {program}: {message}")]
    GeneratorSpawn { program: String, message: String },

    /// Generator ran but did not signal success
    #[error("Generator failed: {message}")]
    GeneratorFailed { message: String },

    /// Generator exceeded its time budget
    #[error("Generator timed out after {timeout_secs}s")]
    GeneratorTimeout { timeout_secs: u64 },

    // =========================================================================
    // Run Errors
    // =========================================================================
    /// A run is already outstanding
    #[error("A run is already in progress")]
    RunInProgress,

    // =========================================================================
    // File Watching Errors
    // =========================================================================
    /// File watcher initialization failed
    #[error("Failed to initialize file watcher: {message}")]
    WatcherInit { message: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal error (bug in Ember)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl EmberError {
    // =========================================================================
    // Constructor helpers for common error patterns
    // =========================================================================

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a manifest parse error
    pub fn manifest_invalid(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ManifestInvalid {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a generator spawn error
    pub fn generator_spawn(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GeneratorSpawn {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create a generator failure with the message to surface to the user
    pub fn generator_failed(message: impl Into<String>) -> Self {
        Self::GeneratorFailed {
            message: message.into(),
        }
    }

    /// Create a watcher initialization error
    pub fn watcher_init(message: impl Into<String>) -> Self {
        Self::WatcherInit {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    // =========================================================================
    // Error classification helpers
    // =========================================================================

    /// Returns true if this error ends one run but leaves the process healthy.
    ///
    /// These are the errors the run controller translates into a
    /// run-failure notice; nothing else escapes the pipeline.
    pub fn is_run_failure(&self) -> bool {
        matches!(
            self,
            Self::GeneratorSpawn { .. }
                | Self::GeneratorFailed { .. }
                | Self::GeneratorTimeout { .. }
                | Self::ManifestNotFound { .. }
                | Self::ManifestInvalid { .. }
                | Self::ManifestEmpty { .. }
                | Self::WatcherInit { .. }
        )
    }

    /// Returns true if this error is fatal (should exit application)
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigNotFound { .. } | Self::ConfigInvalid { .. })
    }

    /// Returns actionable guidance for the user
    pub fn guidance(&self) -> Option<&'static str> {
        match self {
            Self::ConfigNotFound { .. } => {
                Some("Check the --config path, or omit it to use built-in defaults")
            }
            Self::ConfigInvalid { .. } => Some("Check YAML syntax in ~/.ember/config.yaml"),
            Self::GeneratorSpawn { .. } => {
                Some("Check generator.program and generator.working_dir in the configuration")
            }
            Self::GeneratorTimeout { .. } => Some("Increase generator.timeout_secs and retry"),
            Self::ManifestNotFound { .. } => {
                Some("The generator writes the manifest; check manifest_path matches its output")
            }
            Self::ManifestEmpty { .. } => Some("Re-run with an agent count of at least 1"),
            Self::RunInProgress => Some("Wait for the current run to finish before starting another"),
            _ => None,
        }
    }
}
