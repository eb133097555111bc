//! Clangbind Core - safe bindings over the libclang C interface
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! This crate loads a libclang shared library at runtime, resolves its entry
//! points against the version the library reports, and exposes parsed
//! sources as ordinary Rust values.
//!
//! # Main Components
//!
//! - **Loading**: [`Library`] finds, opens and version-checks the shared
//!   library; [`load`] installs one process-wide
//! - **Sessions**: [`Index`] parses sources into [`TranslationUnit`]s and
//!   disposes them again, in that order
//! - **Handles**: [`Cursor`], [`Type`], [`SourceLocation`], [`SourceRange`],
//!   [`File`], [`Token`] and [`Diagnostic`] compare and hash the way the
//!   native library does
//! - **Traversal**: [`Children`] and [`Walk`] turn the native visitor
//!   callback into iterators
//!
//! Entry points missing from the loaded library surface as
//! [`Error::MissingFunction`], so callers can skip one field and carry on.
//!
//! # Example
//!
//! ```no_run
//! use clangbind_core::{Index, LoadOptions, ParseOptions, Result};
//!
//! fn example() -> Result<()> {
//!     clangbind_core::load(&LoadOptions::from_env()?)?;
//!     let index = Index::new()?;
//!     let unit = index.parse(Some("main.c"), &["-std=c11"], &[], ParseOptions::NONE)?;
//!     for diagnostic in unit.diagnostics()? {
//!         eprintln!("{}", diagnostic?);
//!     }
//!     for child in unit.cursor()?.children()? {
//!         println!("{} {}", child.kind()?, child.spelling()?);
//!     }
//!     Ok(())
//! }
//! ```

#[macro_use]
mod library;

pub mod config;
pub mod cursor;
pub mod diagnostic;
pub mod error;
pub mod index;
pub mod kinds;
pub mod location;
mod string;
pub mod token;
pub mod traversal;
pub mod types;
pub mod unit;

// Re-export main types for convenience
pub use config::{IndexOptions, LoadOptions, ParseOptions};
pub use cursor::Cursor;
pub use diagnostic::{Diagnostic, Diagnostics};
pub use error::{Error, Result};
pub use index::{Index, UnsavedFile};
pub use kinds::{CursorKindExt, KindSpelling};
pub use library::{active, install, load, search_dirs, unload, Library};
pub use location::{File, Position, SourceLocation, SourceRange};
pub use token::Token;
pub use traversal::{Children, Walk};
pub use types::Type;
pub use unit::TranslationUnit;

// Re-export the native vocabulary callers need alongside the wrappers
pub use clangbind_ffi::{
    CursorKind, ErrorCode, Function, LibraryVersion, Severity, SymbolSource, TokenKind, TypeKind,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
