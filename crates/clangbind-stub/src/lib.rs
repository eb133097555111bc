//! In-process stand-in for libclang
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! [`StubLibrary`] implements [`SymbolSource`] over a table of `extern "C"`
//! functions with the exact libclang signatures, backed by a toy C front
//! end. Every handle it gives out is tracked per thread, so tests can assert
//! that each native resource was released exactly once:
//!
//! ```ignore
//! clangbind_stub::reset();
//! let source = StubLibrary::new().with_version(3, 4);
//! // ... drive the binding layer ...
//! assert!(clangbind_stub::counters().balanced());
//! ```
//!
//! State is thread-local: a test must create, use and inspect its objects on
//! one thread.

mod api;
mod state;
mod syntax;

use std::collections::HashSet;
use std::os::raw::c_void;

use clangbind_ffi::{Function, LibraryVersion, SymbolSource};

pub use state::{counters, last_parse_args, reset, Counters};

/// Symbol table of the stub, configurable per test
#[derive(Debug, Clone)]
pub struct StubLibrary {
    version: Option<LibraryVersion>,
    omitted: HashSet<String>,
}

impl StubLibrary {
    /// Reports a recent release and exports every known symbol
    pub fn new() -> Self {
        Self {
            version: Some(LibraryVersion::new(17, 0)),
            omitted: HashSet::new(),
        }
    }

    /// Report `major.minor` from `clang_getClangVersion`
    pub fn with_version(mut self, major: u32, minor: u32) -> Self {
        self.version = Some(LibraryVersion::new(major, minor));
        self
    }

    /// Stop exporting `clang_getClangVersion`, as very old builds do
    pub fn without_version_query(mut self) -> Self {
        self.version = None;
        self
    }

    /// Stop exporting `symbol`
    pub fn without(mut self, symbol: &str) -> Self {
        self.omitted.insert(symbol.to_string());
        self
    }

    /// Boxed for handing to the binding layer
    pub fn into_source(self) -> Box<dyn SymbolSource> {
        Box::new(self)
    }
}

impl Default for StubLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolSource for StubLibrary {
    fn origin(&self) -> String {
        "<clangbind stub>".to_string()
    }

    unsafe fn lookup(&self, symbol: &str) -> Option<*const c_void> {
        if self.omitted.contains(symbol) {
            return None;
        }
        let function = Function::from_symbol(symbol)?;
        if function == Function::clang_getClangVersion {
            let version = self.version?;
            let banner = format!("clang version {}.{}.0 (clangbind stub)", version.major, version.minor);
            state::with_state(|state| state.banner = banner);
        }
        api::address(function)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clangbind_ffi::{
        signatures, CXChildVisitResult, CXClientData, CXCursor, CXFileUniqueID, CXString, CXUnsavedFile, CursorKind,
    };
    use pretty_assertions::assert_eq;
    use std::ffi::{CStr, CString};
    use std::os::raw::{c_char, c_int};

    macro_rules! resolve {
        ($stub:expr, $name:ident) => {{
            let address = unsafe { $stub.lookup(stringify!($name)) }.expect(stringify!($name));
            unsafe { std::mem::transmute::<*const c_void, signatures::$name>(address) }
        }};
    }

    fn text(stub: &StubLibrary, string: CXString) -> String {
        let get = resolve!(stub, clang_getCString);
        let dispose = resolve!(stub, clang_disposeString);
        unsafe {
            let value = CStr::from_ptr(get(string)).to_string_lossy().into_owned();
            dispose(string);
            value
        }
    }

    extern "C" fn collect(cursor: CXCursor, _parent: CXCursor, data: CXClientData) -> c_int {
        let out = unsafe { &mut *(data as *mut Vec<CXCursor>) };
        out.push(cursor);
        CXChildVisitResult::Continue.as_raw()
    }

    #[test]
    fn test_version_banner() {
        reset();
        let stub = StubLibrary::new().with_version(3, 4);
        let banner = unsafe { resolve!(stub, clang_getClangVersion)() };
        assert_eq!(text(&stub, banner), "clang version 3.4.0 (clangbind stub)");
        assert!(counters().balanced());

        let old = StubLibrary::new().without_version_query();
        assert!(unsafe { old.lookup("clang_getClangVersion") }.is_none());
    }

    #[test]
    fn test_omitted_and_unknown_symbols() {
        let stub = StubLibrary::new().without("clang_hashCursor");
        unsafe {
            assert!(stub.lookup("clang_hashCursor").is_none());
            assert!(stub.lookup("clang_equalCursors").is_some());
            assert!(stub.lookup("clang_notARealFunction").is_none());
        }
    }

    #[test]
    fn test_parse_visit_dispose() {
        reset();
        let stub = StubLibrary::new();
        let filename = CString::new("t.c").unwrap();
        let source = b"int f(int x) { return x; }";
        let mut unsaved = [CXUnsavedFile {
            filename: filename.as_ptr(),
            contents: source.as_ptr() as *const c_char,
            length: source.len() as _,
        }];

        unsafe {
            let index = resolve!(stub, clang_createIndex)(0, 0);
            let tu = resolve!(stub, clang_parseTranslationUnit)(
                index,
                filename.as_ptr(),
                std::ptr::null(),
                0,
                unsaved.as_mut_ptr(),
                1,
                0,
            );
            assert!(!tu.is_null());

            let root = resolve!(stub, clang_getTranslationUnitCursor)(tu);
            let mut children: Vec<CXCursor> = Vec::new();
            resolve!(stub, clang_visitChildren)(root, collect, &mut children as *mut _ as CXClientData);
            assert_eq!(children.len(), 1);
            assert_eq!(CursorKind(children[0].kind), CursorKind::FUNCTION_DECL);
            assert_eq!(text(&stub, resolve!(stub, clang_getCursorSpelling)(children[0])), "f");

            resolve!(stub, clang_disposeTranslationUnit)(tu);
            resolve!(stub, clang_disposeIndex)(index);
        }

        let counters = counters();
        assert_eq!(counters.visit_calls, 1);
        assert_eq!(counters.indexes_disposed_with_live_units, 0);
        assert!(counters.balanced(), "{:?}", counters);
    }

    #[test]
    fn test_double_dispose_is_counted() {
        reset();
        let stub = StubLibrary::new();
        unsafe {
            let index = resolve!(stub, clang_createIndex)(0, 0);
            let dispose = resolve!(stub, clang_disposeIndex);
            dispose(index);
            dispose(index);
        }
        assert_eq!(counters().double_disposals, 1);
    }

    #[test]
    fn test_missing_file_fails_parse() {
        reset();
        let stub = StubLibrary::new();
        let filename = CString::new("/nonexistent/clangbind/missing.c").unwrap();
        unsafe {
            let index = resolve!(stub, clang_createIndex)(0, 0);
            let mut tu = std::ptr::null_mut();
            let code = resolve!(stub, clang_parseTranslationUnit2)(
                index,
                filename.as_ptr(),
                std::ptr::null(),
                0,
                std::ptr::null_mut(),
                0,
                0,
                &mut tu,
            );
            assert_eq!(code, clangbind_ffi::ErrorCode::FAILURE.raw());
            assert!(tu.is_null());
            resolve!(stub, clang_disposeIndex)(index);
        }
        assert_eq!(counters().units_created, 0);
    }

    #[test]
    fn test_reparse_releases_diagnostics() {
        reset();
        let stub = StubLibrary::new();
        let filename = CString::new("r.c").unwrap();
        let broken = b"int a = ;\n";
        let fixed = b"int a;\n";
        let unsaved = |source: &[u8]| CXUnsavedFile {
            filename: filename.as_ptr(),
            contents: source.as_ptr() as *const c_char,
            length: source.len() as _,
        };

        unsafe {
            let index = resolve!(stub, clang_createIndex)(0, 0);
            let mut first = [unsaved(broken)];
            let tu = resolve!(stub, clang_parseTranslationUnit)(
                index,
                filename.as_ptr(),
                std::ptr::null(),
                0,
                first.as_mut_ptr(),
                1,
                0,
            );
            let diagnostic = resolve!(stub, clang_getDiagnostic)(tu, 0);
            assert!(!diagnostic.is_null());

            let mut second = [unsaved(fixed)];
            let code = resolve!(stub, clang_reparseTranslationUnit)(tu, 1, second.as_mut_ptr(), 0);
            assert_eq!(code, clangbind_ffi::ErrorCode::SUCCESS.raw());
            assert_eq!(resolve!(stub, clang_getNumDiagnostics)(tu), 0);
            assert_eq!(counters().diagnostics_disposed, 1);

            // the old handle is gone; releasing it again is caught
            resolve!(stub, clang_disposeDiagnostic)(diagnostic);
            assert_eq!(counters().double_disposals, 1);

            let file = resolve!(stub, clang_getFile)(tu, filename.as_ptr());
            let mut id = CXFileUniqueID::default();
            assert_eq!(resolve!(stub, clang_getFileUniqueID)(file, &mut id), 0);
            assert_eq!(id.data[1], tu as u64);
            assert_ne!(resolve!(stub, clang_getFileUniqueID)(std::ptr::null_mut(), &mut id), 0);

            resolve!(stub, clang_disposeTranslationUnit)(tu);
            resolve!(stub, clang_disposeIndex)(index);
        }
    }
}
