//! C ABI payload definitions
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! All types in this module mirror the layouts declared in `clang-c/Index.h`
//! and are passed by value across the native boundary.

use std::os::raw::{c_char, c_int, c_uint, c_ulong, c_ulonglong, c_void};

/// Opaque handle for a native index
pub type CXIndex = *mut c_void;

/// Opaque handle for a parsed translation unit
pub type CXTranslationUnit = *mut c_void;

/// Opaque handle for a file known to a translation unit
pub type CXFile = *mut c_void;

/// Opaque handle for a single diagnostic
pub type CXDiagnostic = *mut c_void;

/// Client data threaded through the visitor callback
pub type CXClientData = *mut c_void;

/// Visitor invoked once per child during `clang_visitChildren`
pub type CXCursorVisitor =
    extern "C" fn(cursor: CXCursor, parent: CXCursor, client_data: CXClientData) -> c_int;

/// Natively owned text buffer; must be released with `clang_disposeString`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CXString {
    /// Implementation-defined pointer to the text
    pub data: *const c_void,
    /// Implementation-defined ownership flags
    pub private_flags: c_uint,
}

/// A node in the parsed source tree
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CXCursor {
    /// Cursor kind tag
    pub kind: c_int,
    /// Implementation-defined extra data
    pub xdata: c_int,
    /// Implementation-defined pointers
    pub data: [*const c_void; 3],
}

/// A semantic type description
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CXType {
    /// Type kind tag
    pub kind: c_int,
    /// Implementation-defined pointers
    pub data: [*mut c_void; 2],
}

/// A position in the source
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CXSourceLocation {
    pub ptr_data: [*const c_void; 2],
    pub int_data: c_uint,
}

/// A half-open span of source
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CXSourceRange {
    pub ptr_data: [*const c_void; 2],
    pub begin_int_data: c_uint,
    pub end_int_data: c_uint,
}

/// A lexical token
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CXToken {
    pub int_data: [c_uint; 4],
    pub ptr_data: *mut c_void,
}

/// In-memory override for a file's contents during parsing
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CXUnsavedFile {
    /// Null-terminated file name
    pub filename: *const c_char,
    /// File contents, not necessarily null-terminated
    pub contents: *const c_char,
    /// Length of `contents` in bytes
    pub length: c_ulong,
}

/// Identity of a file that survives different spellings of its path
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CXFileUniqueID {
    /// Device, inode and modification time on most platforms
    pub data: [c_ulonglong; 3],
}

/// Result of a visitor callback
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CXChildVisitResult {
    /// Stop the traversal
    Break = 0,
    /// Continue with the next sibling
    Continue = 1,
    /// Descend into the current cursor's children
    Recurse = 2,
}

impl CXChildVisitResult {
    /// Raw integer passed back to the native visitor driver
    pub fn as_raw(self) -> c_int {
        self as c_int
    }
}

impl CXString {
    /// An empty string value, as produced for absent text
    pub fn empty() -> Self {
        Self {
            data: std::ptr::null(),
            private_flags: 0,
        }
    }
}

impl CXCursor {
    /// Payload equivalent to `clang_getNullCursor()` in every known release
    pub fn zeroed(kind: c_int) -> Self {
        Self {
            kind,
            xdata: 0,
            data: [std::ptr::null(); 3],
        }
    }
}

impl CXType {
    /// Payload with the given kind and no backing data
    pub fn zeroed(kind: c_int) -> Self {
        Self {
            kind,
            data: [std::ptr::null_mut(); 2],
        }
    }
}

impl CXSourceLocation {
    /// Payload equivalent to `clang_getNullLocation()`
    pub fn zeroed() -> Self {
        Self {
            ptr_data: [std::ptr::null(); 2],
            int_data: 0,
        }
    }
}

impl CXSourceRange {
    /// Payload equivalent to `clang_getNullRange()`
    pub fn zeroed() -> Self {
        Self {
            ptr_data: [std::ptr::null(); 2],
            begin_int_data: 0,
            end_int_data: 0,
        }
    }
}
