//! clangbind FFI - raw C ABI declarations for libclang
//!
//! This crate describes the native boundary and nothing else: payload
//! layouts passed by value, native enumeration tags, and the table of entry
//! points with the release that introduced each of them. Safe wrappers live
//! in `clangbind-core`.
//!
//! # Safety
//!
//! Nothing here calls into the native library. Callers that reinterpret a
//! resolved address as one of the [`signatures`] aliases must ensure:
//! - The address came from a [`SymbolSource`] lookup of the same symbol
//! - The source outlives every call made through the address
//! - Payloads passed in were produced by the same library instance

#![warn(missing_docs)]

mod functions;
mod kinds;
mod source;
mod types;
mod version;

pub use functions::{signatures, Function};
pub use kinds::{CursorKind, ErrorCode, Severity, TokenKind, TypeKind};
pub use source::SymbolSource;
pub use types::*;
pub use version::{LibraryVersion, VersionError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_function_has_signature_module_entry() {
        // The alias exists for every entry; spot-check one from each group.
        let _: Option<signatures::clang_getCString> = None;
        let _: Option<signatures::clang_parseTranslationUnit2> = None;
        let _: Option<signatures::clang_visitChildren> = None;
        let _: Option<signatures::clang_getDiagnosticSpelling> = None;
        assert!(Function::ALL.len() > 60);
    }
}
