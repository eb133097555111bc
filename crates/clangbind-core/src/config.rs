//! Configuration for loading the native library and creating sessions
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! Load options are merged from:
//! - Explicit values set by the caller
//! - A JSON configuration file
//! - Environment variables (only for fields left unset)

use std::ops::{BitOr, BitOrAssign};
use std::path::{Path, PathBuf};

use clangbind_ffi::LibraryVersion;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Explicit library location, overriding the default search
pub const ENV_LIBRARY_PATH: &str = "LIBCLANG_PATH";
/// Base library name, `libclang` when unset
pub const ENV_LIBRARY_NAME: &str = "CLANGBIND_LIBRARY_NAME";
/// Version suffix appended to the library name (`libclang-<suffix>.so`)
pub const ENV_VERSION_SUFFIX: &str = "CLANGBIND_LIBCLANG_VERSION";
/// Version assumed when the library cannot report its own
pub const ENV_ASSUME_VERSION: &str = "CLANGBIND_ASSUME_VERSION";

/// Where to find the native library and how to interpret it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Library file, or a directory searched for the library file
    pub path: Option<PathBuf>,

    /// Base file name without extension (default `libclang`)
    pub name: Option<String>,

    /// Appended to the name as `<name>-<suffix>`
    pub version_suffix: Option<String>,

    /// Version used when the library exposes no version query
    pub assume_version: Option<LibraryVersion>,
}

impl LoadOptions {
    /// Options pointing at an explicit library file or directory
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Options read entirely from the environment
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();
        options.merge_with_env()?;
        Ok(options)
    }

    /// Load options from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options = serde_json::from_str(&content)?;
        Ok(options)
    }

    /// Fill fields left unset from the environment
    pub fn merge_with_env(&mut self) -> Result<()> {
        if self.path.is_none() {
            self.path = env_value(ENV_LIBRARY_PATH).map(PathBuf::from);
        }
        if self.name.is_none() {
            self.name = env_value(ENV_LIBRARY_NAME);
        }
        if self.version_suffix.is_none() {
            self.version_suffix = env_value(ENV_VERSION_SUFFIX);
        }
        if self.assume_version.is_none() {
            if let Some(raw) = env_value(ENV_ASSUME_VERSION) {
                let version = LibraryVersion::parse(&raw).map_err(|e| Error::Configuration {
                    message: format!("{} must be a version such as 3.4, got '{}'", ENV_ASSUME_VERSION, raw),
                    source: Some(e.into()),
                })?;
                self.assume_version = Some(version);
            }
        }
        Ok(())
    }

    /// Base library name without extension or suffix
    pub fn library_name(&self) -> &str {
        self.name.as_deref().unwrap_or("libclang")
    }

    /// File names tried in each search directory, most specific first
    pub fn file_names(&self) -> Vec<String> {
        let stem = match &self.version_suffix {
            Some(suffix) => format!("{}-{}", self.library_name(), suffix),
            None => self.library_name().to_string(),
        };
        let mut names = vec![format!("{}.{}", stem, std::env::consts::DLL_EXTENSION)];
        if cfg!(target_os = "linux") {
            names.push(format!("{}.so.1", stem));
        }
        names
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Flags accepted by the native parse entry points
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParseOptions(u32);

impl ParseOptions {
    pub const NONE: ParseOptions = ParseOptions(0x00);
    /// Keep macro definitions and expansions in the tree
    pub const DETAILED_PREPROCESSING_RECORD: ParseOptions = ParseOptions(0x01);
    /// Tolerate an incomplete unit, as for headers
    pub const INCOMPLETE: ParseOptions = ParseOptions(0x02);
    pub const PRECOMPILED_PREAMBLE: ParseOptions = ParseOptions(0x04);
    pub const CACHE_COMPLETION_RESULTS: ParseOptions = ParseOptions(0x08);
    pub const FOR_SERIALIZATION: ParseOptions = ParseOptions(0x10);
    pub const SKIP_FUNCTION_BODIES: ParseOptions = ParseOptions(0x40);
    pub const INCLUDE_BRIEF_COMMENTS_IN_CODE_COMPLETION: ParseOptions = ParseOptions(0x80);

    /// Raw flag bits
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: ParseOptions) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ParseOptions {
    type Output = ParseOptions;

    fn bitor(self, rhs: ParseOptions) -> ParseOptions {
        ParseOptions(self.0 | rhs.0)
    }
}

impl BitOrAssign for ParseOptions {
    fn bitor_assign(&mut self, rhs: ParseOptions) {
        self.0 |= rhs.0;
    }
}

/// Flags passed when creating an index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    /// Skip declarations that come from a precompiled header
    pub exclude_declarations_from_pch: bool,

    /// Let the native library print diagnostics to stderr as it parses
    pub display_diagnostics: bool,
}
