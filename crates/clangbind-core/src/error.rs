//! Error types for the clangbind binding layer
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! Loader failures, version gaps, parse failures and misuse of disposed or
//! reparsed objects are all reported through [`Error`]. Of these only
//! [`Error::MissingFunction`] is expected during normal operation: the
//! native API surface differs between releases and callers routinely skip
//! a field when the loaded library is too old to produce it.

use std::path::PathBuf;
use std::str::Utf8Error;

use clangbind_ffi::{ErrorCode, Function, LibraryVersion};
use thiserror::Error;

/// Main error type for clangbind operations
#[derive(Error, Debug)]
pub enum Error {
    /// No candidate library file could be found
    #[error("libclang not found (searched: {})", display_paths(.searched))]
    LibraryNotFound { searched: Vec<PathBuf> },

    /// A candidate exists but the system loader rejected it
    #[error("Failed to load libclang from {}: {source}", .path.display())]
    LibraryLoad {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    /// A process-wide library is already active
    #[error("A native library is already active (loaded from {path})")]
    AlreadyLoaded { path: String },

    /// The loaded library predates the entry point or does not export it
    #[error("{} requires libclang {min_version} (loaded: {loaded_version})", .function.symbol())]
    MissingFunction {
        function: Function,
        min_version: LibraryVersion,
        loaded_version: LibraryVersion,
    },

    /// The native parser produced no translation unit
    #[error("Failed to parse {filename}: {reason}")]
    Parse {
        filename: String,
        reason: String,
        code: Option<ErrorCode>,
    },

    /// A wrapper was used after its owning index or translation unit was disposed
    #[error("{object} used after its owner was disposed")]
    UseAfterDispose { object: &'static str },

    /// A wrapper was used after its translation unit was reparsed
    #[error("{object} belongs to a translation unit that has since been reparsed")]
    Stale { object: &'static str },

    /// Native text was not valid UTF-8; the native buffer has already been released
    #[error("Invalid UTF-8 in {context}: {source}")]
    InvalidText {
        context: &'static str,
        #[source]
        source: Utf8Error,
    },

    /// A caller-supplied value cannot be passed to the native layer
    #[error("Invalid argument: {name} - {message}")]
    InvalidArgument { name: &'static str, message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this is the recoverable "not supported by this library" condition
    pub fn is_missing_function(&self) -> bool {
        matches!(self, Error::MissingFunction { .. })
    }

    pub(crate) fn internal(message: impl Into<String>) -> Self {
        anyhow::Error::msg(message.into()).into()
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "system loader only".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// Conversion implementations
impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}
