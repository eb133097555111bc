//! Versioned native entry point table
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! Every entry point the binding layer may call is listed exactly once here,
//! together with the release that introduced it and its exact C signature.
//! The table generates:
//!
//! - [`Function`], an identifier per entry point with its symbol name and
//!   minimum version;
//! - [`signatures`], one `unsafe extern "C" fn` alias per entry point, named
//!   after the symbol, so a resolved address can only be reinterpreted as the
//!   signature it was declared with.

use std::os::raw::{c_char, c_int, c_uint};

use crate::types::*;
use crate::version::LibraryVersion;

macro_rules! native_functions {
    (
        $(
            $(#[$meta:meta])*
            fn $name:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)? = ($major:literal, $minor:literal);
        )*
    ) => {
        /// Identifier for a native entry point
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Function {
            $($(#[$meta])* $name,)*
        }

        impl Function {
            /// Every entry point in declaration order
            pub const ALL: &'static [Function] = &[$(Function::$name,)*];

            /// Exported symbol name
            pub fn symbol(self) -> &'static str {
                match self {
                    $(Function::$name => stringify!($name),)*
                }
            }

            /// Release that introduced the entry point
            pub fn min_version(self) -> LibraryVersion {
                match self {
                    $(Function::$name => LibraryVersion::new($major, $minor),)*
                }
            }

            /// Look an entry point up by its exported symbol name
            pub fn from_symbol(symbol: &str) -> Option<Function> {
                match symbol {
                    $(stringify!($name) => Some(Function::$name),)*
                    _ => None,
                }
            }
        }

        /// Exact C signatures, one alias per [`Function`]
        #[allow(non_camel_case_types)]
        pub mod signatures {
            use super::*;

            $(pub type $name = unsafe extern "C" fn($($arg: $ty),*) $(-> $ret)?;)*
        }
    };
}

native_functions! {
    // Strings
    fn clang_getCString(string: CXString) -> *const c_char = (2, 7);
    fn clang_disposeString(string: CXString) = (2, 7);
    fn clang_getClangVersion() -> CXString = (2, 7);

    // Index and translation units
    fn clang_createIndex(exclude_declarations_from_pch: c_int, display_diagnostics: c_int) -> CXIndex = (2, 7);
    fn clang_disposeIndex(index: CXIndex) = (2, 7);
    fn clang_createTranslationUnitFromSourceFile(
        index: CXIndex,
        source_filename: *const c_char,
        num_clang_command_line_args: c_int,
        clang_command_line_args: *const *const c_char,
        num_unsaved_files: c_uint,
        unsaved_files: *mut CXUnsavedFile,
    ) -> CXTranslationUnit = (2, 7);
    fn clang_createTranslationUnit(index: CXIndex, ast_filename: *const c_char) -> CXTranslationUnit = (2, 7);
    fn clang_parseTranslationUnit(
        index: CXIndex,
        source_filename: *const c_char,
        command_line_args: *const *const c_char,
        num_command_line_args: c_int,
        unsaved_files: *mut CXUnsavedFile,
        num_unsaved_files: c_uint,
        options: c_uint,
    ) -> CXTranslationUnit = (2, 8);
    fn clang_parseTranslationUnit2(
        index: CXIndex,
        source_filename: *const c_char,
        command_line_args: *const *const c_char,
        num_command_line_args: c_int,
        unsaved_files: *mut CXUnsavedFile,
        num_unsaved_files: c_uint,
        options: c_uint,
        out_tu: *mut CXTranslationUnit,
    ) -> c_int = (3, 5);
    fn clang_reparseTranslationUnit(
        tu: CXTranslationUnit,
        num_unsaved_files: c_uint,
        unsaved_files: *mut CXUnsavedFile,
        options: c_uint,
    ) -> c_int = (2, 8);
    fn clang_defaultReparseOptions(tu: CXTranslationUnit) -> c_uint = (2, 8);
    fn clang_disposeTranslationUnit(tu: CXTranslationUnit) = (2, 7);
    fn clang_getTranslationUnitSpelling(tu: CXTranslationUnit) -> CXString = (2, 7);
    fn clang_getTranslationUnitCursor(tu: CXTranslationUnit) -> CXCursor = (2, 7);

    // Files
    fn clang_getFile(tu: CXTranslationUnit, file_name: *const c_char) -> CXFile = (2, 7);
    fn clang_getFileName(file: CXFile) -> CXString = (2, 7);
    fn clang_getFileTime(file: CXFile) -> i64 = (2, 7);
    fn clang_getFileUniqueID(file: CXFile, out_id: *mut CXFileUniqueID) -> c_int = (3, 3);
    fn clang_File_isEqual(file1: CXFile, file2: CXFile) -> c_int = (3, 6);

    // Locations and ranges
    fn clang_getNullLocation() -> CXSourceLocation = (2, 7);
    fn clang_equalLocations(loc1: CXSourceLocation, loc2: CXSourceLocation) -> c_uint = (2, 7);
    fn clang_getLocation(tu: CXTranslationUnit, file: CXFile, line: c_uint, column: c_uint) -> CXSourceLocation = (2, 7);
    fn clang_getLocationForOffset(tu: CXTranslationUnit, file: CXFile, offset: c_uint) -> CXSourceLocation = (2, 7);
    fn clang_getInstantiationLocation(
        location: CXSourceLocation,
        file: *mut CXFile,
        line: *mut c_uint,
        column: *mut c_uint,
        offset: *mut c_uint,
    ) = (2, 7);
    fn clang_getExpansionLocation(
        location: CXSourceLocation,
        file: *mut CXFile,
        line: *mut c_uint,
        column: *mut c_uint,
        offset: *mut c_uint,
    ) = (3, 0);
    fn clang_getSpellingLocation(
        location: CXSourceLocation,
        file: *mut CXFile,
        line: *mut c_uint,
        column: *mut c_uint,
        offset: *mut c_uint,
    ) = (2, 9);
    fn clang_getNullRange() -> CXSourceRange = (2, 7);
    fn clang_getRange(begin: CXSourceLocation, end: CXSourceLocation) -> CXSourceRange = (2, 7);
    fn clang_equalRanges(range1: CXSourceRange, range2: CXSourceRange) -> c_uint = (3, 0);
    fn clang_getRangeStart(range: CXSourceRange) -> CXSourceLocation = (2, 7);
    fn clang_getRangeEnd(range: CXSourceRange) -> CXSourceLocation = (2, 7);

    // Cursors
    fn clang_getNullCursor() -> CXCursor = (2, 7);
    fn clang_equalCursors(a: CXCursor, b: CXCursor) -> c_uint = (2, 7);
    fn clang_hashCursor(cursor: CXCursor) -> c_uint = (2, 9);
    fn clang_getCursorKind(cursor: CXCursor) -> c_int = (2, 7);
    fn clang_getCursorKindSpelling(kind: c_int) -> CXString = (2, 7);
    fn clang_isDeclaration(kind: c_int) -> c_uint = (2, 7);
    fn clang_isReference(kind: c_int) -> c_uint = (2, 7);
    fn clang_isExpression(kind: c_int) -> c_uint = (2, 7);
    fn clang_isStatement(kind: c_int) -> c_uint = (2, 7);
    fn clang_isInvalid(kind: c_int) -> c_uint = (2, 7);
    fn clang_isTranslationUnit(kind: c_int) -> c_uint = (2, 7);
    fn clang_isPreprocessing(kind: c_int) -> c_uint = (2, 8);
    fn clang_isUnexposed(kind: c_int) -> c_uint = (2, 8);
    fn clang_getCursor(tu: CXTranslationUnit, location: CXSourceLocation) -> CXCursor = (2, 7);
    fn clang_getCursorLocation(cursor: CXCursor) -> CXSourceLocation = (2, 7);
    fn clang_getCursorExtent(cursor: CXCursor) -> CXSourceRange = (2, 7);
    fn clang_visitChildren(parent: CXCursor, visitor: CXCursorVisitor, client_data: CXClientData) -> c_uint = (2, 7);
    fn clang_getCursorUSR(cursor: CXCursor) -> CXString = (2, 7);
    fn clang_getCursorSpelling(cursor: CXCursor) -> CXString = (2, 7);
    fn clang_getCursorDisplayName(cursor: CXCursor) -> CXString = (2, 9);
    fn clang_getCursorReferenced(cursor: CXCursor) -> CXCursor = (2, 7);
    fn clang_getCursorDefinition(cursor: CXCursor) -> CXCursor = (2, 7);
    fn clang_isCursorDefinition(cursor: CXCursor) -> c_uint = (2, 7);
    fn clang_getCursorSemanticParent(cursor: CXCursor) -> CXCursor = (2, 9);
    fn clang_getCursorLexicalParent(cursor: CXCursor) -> CXCursor = (2, 9);
    fn clang_getCursorType(cursor: CXCursor) -> CXType = (2, 8);
    fn clang_getCursorResultType(cursor: CXCursor) -> CXType = (2, 8);

    // Types
    fn clang_equalTypes(a: CXType, b: CXType) -> c_uint = (2, 8);
    fn clang_getTypeSpelling(ty: CXType) -> CXString = (3, 3);
    fn clang_getTypeKindSpelling(kind: c_int) -> CXString = (2, 8);
    fn clang_getCanonicalType(ty: CXType) -> CXType = (2, 8);
    fn clang_getPointeeType(ty: CXType) -> CXType = (2, 8);
    fn clang_getResultType(ty: CXType) -> CXType = (2, 8);
    fn clang_getTypeDeclaration(ty: CXType) -> CXCursor = (2, 8);

    // Tokens
    fn clang_tokenize(tu: CXTranslationUnit, range: CXSourceRange, tokens: *mut *mut CXToken, num_tokens: *mut c_uint) = (2, 7);
    fn clang_disposeTokens(tu: CXTranslationUnit, tokens: *mut CXToken, num_tokens: c_uint) = (2, 7);
    fn clang_getTokenKind(token: CXToken) -> c_int = (2, 7);
    fn clang_getTokenSpelling(tu: CXTranslationUnit, token: CXToken) -> CXString = (2, 7);
    fn clang_getTokenLocation(tu: CXTranslationUnit, token: CXToken) -> CXSourceLocation = (2, 7);
    fn clang_getTokenExtent(tu: CXTranslationUnit, token: CXToken) -> CXSourceRange = (2, 7);

    // Diagnostics
    fn clang_getNumDiagnostics(tu: CXTranslationUnit) -> c_uint = (2, 8);
    fn clang_getDiagnostic(tu: CXTranslationUnit, index: c_uint) -> CXDiagnostic = (2, 8);
    fn clang_disposeDiagnostic(diagnostic: CXDiagnostic) = (2, 8);
    fn clang_formatDiagnostic(diagnostic: CXDiagnostic, options: c_uint) -> CXString = (2, 8);
    fn clang_defaultDiagnosticDisplayOptions() -> c_uint = (2, 8);
    fn clang_getDiagnosticSeverity(diagnostic: CXDiagnostic) -> c_int = (2, 8);
    fn clang_getDiagnosticLocation(diagnostic: CXDiagnostic) -> CXSourceLocation = (2, 8);
    fn clang_getDiagnosticSpelling(diagnostic: CXDiagnostic) -> CXString = (2, 8);
}
