//! Index: the parsing context that owns translation units
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license

use std::cell::{Cell, RefCell};
use std::ffi::CString;
use std::os::raw::{c_char, c_int, c_uint, c_ulong};
use std::path::Path;
use std::rc::{Rc, Weak};

use clangbind_ffi::{signatures, CXIndex, CXTranslationUnit, CXUnsavedFile, ErrorCode, Function};
use tracing::debug;

use crate::config::{IndexOptions, ParseOptions};
use crate::error::{Error, Result};
use crate::library::{self, Library};
use crate::unit::{TranslationUnit, UnitInner};

/// In-memory contents standing in for a file on disk during a parse
///
/// The contents are passed with their length and may hold any bytes; only
/// the name must be free of NUL bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsavedFile {
    pub name: String,
    pub contents: Vec<u8>,
}

impl UnsavedFile {
    pub fn new(name: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }
}

/// Unsaved files converted for the native layer
///
/// Owns the names and contents the `CXUnsavedFile` records point into, so
/// the records stay valid for as long as this value lives.
pub(crate) struct NativeUnsaved {
    _names: Vec<CString>,
    _contents: Vec<Vec<u8>>,
    records: Vec<CXUnsavedFile>,
}

impl NativeUnsaved {
    pub(crate) fn new(files: &[UnsavedFile]) -> Result<Self> {
        let names = files
            .iter()
            .map(|f| c_string("unsaved_files", f.name.as_bytes()))
            .collect::<Result<Vec<_>>>()?;
        let contents: Vec<Vec<u8>> = files.iter().map(|f| f.contents.clone()).collect();
        let records = names
            .iter()
            .zip(&contents)
            .map(|(name, body)| CXUnsavedFile {
                filename: name.as_ptr(),
                contents: body.as_ptr() as *const c_char,
                length: body.len() as c_ulong,
            })
            .collect();
        Ok(Self {
            _names: names,
            _contents: contents,
            records,
        })
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut CXUnsavedFile {
        if self.records.is_empty() {
            std::ptr::null_mut()
        } else {
            self.records.as_mut_ptr()
        }
    }

    pub(crate) fn len(&self) -> c_uint {
        self.records.len() as c_uint
    }
}

pub(crate) fn c_string(name: &'static str, bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|e| Error::InvalidArgument {
        name,
        message: format!("interior NUL byte at position {}", e.nul_position()),
    })
}

pub(crate) struct IndexInner {
    library: Library,
    raw: Cell<CXIndex>,
    dispose: signatures::clang_disposeIndex,
    units: RefCell<Vec<Weak<UnitInner>>>,
}

impl IndexInner {
    pub(crate) fn library(&self) -> &Library {
        &self.library
    }

    pub(crate) fn raw(&self) -> Result<CXIndex> {
        let raw = self.raw.get();
        if raw.is_null() {
            Err(Error::UseAfterDispose { object: "index" })
        } else {
            Ok(raw)
        }
    }

    fn live_units(&self) -> Vec<Rc<UnitInner>> {
        let mut units = self.units.borrow_mut();
        units.retain(|unit| unit.upgrade().map(|u| !u.is_disposed()).unwrap_or(false));
        units.iter().filter_map(Weak::upgrade).collect()
    }

    fn dispose(&self) {
        for unit in self.live_units() {
            unit.dispose();
        }
        self.units.borrow_mut().clear();

        let raw = self.raw.replace(std::ptr::null_mut());
        if !raw.is_null() {
            debug!("disposing index");
            // SAFETY: the handle is nulled before release, so it is released once
            unsafe { (self.dispose)(raw) }
        }
    }
}

impl Drop for IndexInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A parsing context
///
/// Every translation unit keeps its index alive. Disposing the index
/// explicitly first disposes every translation unit it produced.
///
/// Indexes and everything derived from them are confined to one thread.
#[derive(Clone)]
pub struct Index {
    inner: Rc<IndexInner>,
}

impl Index {
    /// Create an index on the process-wide active library
    pub fn new() -> Result<Index> {
        Index::with_library(&library::active()?, IndexOptions::default())
    }

    /// Create an index on an explicit library
    pub fn with_library(library: &Library, options: IndexOptions) -> Result<Index> {
        let create = native!(library, clang_createIndex);
        let dispose = native!(library, clang_disposeIndex);

        // SAFETY: plain integer flags
        let raw = unsafe {
            create(
                options.exclude_declarations_from_pch as c_int,
                options.display_diagnostics as c_int,
            )
        };
        if raw.is_null() {
            return Err(Error::internal("clang_createIndex returned null"));
        }
        debug!(version = %library.version(), "created index");

        Ok(Index {
            inner: Rc::new(IndexInner {
                library: library.clone(),
                raw: Cell::new(raw),
                dispose,
                units: RefCell::new(Vec::new()),
            }),
        })
    }

    /// The library this index was created on
    pub fn library(&self) -> &Library {
        &self.inner.library
    }

    /// Parse a source file into a translation unit
    ///
    /// `args` are compiler-style arguments passed through unmodified. When
    /// `filename` is `None` the native library takes the file name from
    /// `args`. Unsaved files override the contents of files on disk.
    ///
    /// Fails with [`Error::Parse`] only when no translation unit could be
    /// produced; errors in the source are reported as diagnostics on the
    /// returned unit.
    pub fn parse(
        &self,
        filename: Option<&str>,
        args: &[&str],
        unsaved: &[UnsavedFile],
        options: ParseOptions,
    ) -> Result<TranslationUnit> {
        let library = &self.inner.library;
        let c_filename = filename.map(|f| c_string("filename", f.as_bytes())).transpose()?;
        let c_args = args
            .iter()
            .map(|a| c_string("args", a.as_bytes()))
            .collect::<Result<Vec<_>>>()?;
        let arg_ptrs: Vec<*const c_char> = c_args.iter().map(|a| a.as_ptr()).collect();
        let mut native_unsaved = NativeUnsaved::new(unsaved)?;

        let index = self.inner.raw()?;
        let dispose = native!(library, clang_disposeTranslationUnit);
        let name_ptr = c_filename.as_ref().map(|f| f.as_ptr()).unwrap_or(std::ptr::null());
        let described = filename
            .map(str::to_string)
            .or_else(|| args.iter().rev().find(|a| !a.starts_with('-')).map(|a| a.to_string()))
            .unwrap_or_default();
        debug!(filename = %described, args = args.len(), unsaved = unsaved.len(), "parsing");

        let raw: CXTranslationUnit = if library.supports(Function::clang_parseTranslationUnit2) {
            let parse = native!(library, clang_parseTranslationUnit2);
            let mut out: CXTranslationUnit = std::ptr::null_mut();
            // SAFETY: every pointer is backed by a value that outlives the call
            let code = unsafe {
                parse(
                    index,
                    name_ptr,
                    arg_ptrs.as_ptr(),
                    arg_ptrs.len() as c_int,
                    native_unsaved.as_mut_ptr(),
                    native_unsaved.len(),
                    options.bits(),
                    &mut out,
                )
            };
            let code = ErrorCode(code);
            if code != ErrorCode::SUCCESS || out.is_null() {
                return Err(Error::Parse {
                    filename: described,
                    reason: format!("native parser reported {}", code),
                    code: Some(code),
                });
            }
            out
        } else if library.supports(Function::clang_parseTranslationUnit) {
            let parse = native!(library, clang_parseTranslationUnit);
            // SAFETY: as above
            unsafe {
                parse(
                    index,
                    name_ptr,
                    arg_ptrs.as_ptr(),
                    arg_ptrs.len() as c_int,
                    native_unsaved.as_mut_ptr(),
                    native_unsaved.len(),
                    options.bits(),
                )
            }
        } else {
            log::warn!(
                "libclang {} has no parse entry point; falling back to clang_createTranslationUnitFromSourceFile (options ignored)",
                library.version()
            );
            let create = native!(library, clang_createTranslationUnitFromSourceFile);
            // SAFETY: as above
            unsafe {
                create(
                    index,
                    name_ptr,
                    arg_ptrs.len() as c_int,
                    arg_ptrs.as_ptr(),
                    native_unsaved.len(),
                    native_unsaved.as_mut_ptr(),
                )
            }
        };

        if raw.is_null() {
            return Err(Error::Parse {
                filename: described,
                reason: "native parser produced no translation unit".to_string(),
                code: None,
            });
        }
        Ok(self.adopt(raw, dispose, described))
    }

    /// Load a translation unit serialized to an AST file
    pub fn load_ast(&self, path: &Path) -> Result<TranslationUnit> {
        let library = &self.inner.library;
        let described = path.display().to_string();
        let c_path = c_string("path", described.as_bytes())?;
        let index = self.inner.raw()?;
        let create = native!(library, clang_createTranslationUnit);
        let dispose = native!(library, clang_disposeTranslationUnit);

        // SAFETY: `c_path` outlives the call
        let raw = unsafe { create(index, c_path.as_ptr()) };
        if raw.is_null() {
            return Err(Error::Parse {
                filename: described,
                reason: "could not read AST file".to_string(),
                code: None,
            });
        }
        Ok(self.adopt(raw, dispose, described))
    }

    fn adopt(&self, raw: CXTranslationUnit, dispose: signatures::clang_disposeTranslationUnit, filename: String) -> TranslationUnit {
        let inner = Rc::new(UnitInner::new(self.inner.clone(), raw, dispose, filename));
        self.inner.units.borrow_mut().push(Rc::downgrade(&inner));
        TranslationUnit::from_inner(inner)
    }

    /// Dispose every translation unit produced here, then the index itself
    ///
    /// Wrappers derived from those units fail with
    /// [`Error::UseAfterDispose`] from then on. Disposing twice is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Whether [`Index::dispose`] has run
    pub fn is_disposed(&self) -> bool {
        self.inner.raw.get().is_null()
    }

    /// Number of translation units produced here that are neither dropped nor disposed
    pub fn translation_units_alive(&self) -> usize {
        self.inner.live_units().len()
    }
}

impl std::fmt::Debug for Index {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Index")
            .field("library", &self.inner.library)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clangbind_stub::StubLibrary;

    fn index_on(stub: StubLibrary) -> Index {
        clangbind_stub::reset();
        let library = Library::from_source(stub.into_source(), None).unwrap();
        Index::with_library(&library, IndexOptions::default()).unwrap()
    }

    fn source() -> Vec<UnsavedFile> {
        vec![UnsavedFile::new("t.c", "int f(int x) { return x; }")]
    }

    #[test]
    fn test_parse_and_drop_releases_everything() {
        {
            let index = index_on(StubLibrary::new());
            let unit = index.parse(Some("t.c"), &[], &source(), ParseOptions::NONE).unwrap();
            assert_eq!(unit.spelling().unwrap(), "t.c");
            assert_eq!(index.translation_units_alive(), 1);
        }
        let counters = clangbind_stub::counters();
        assert_eq!(counters.units_created, 1);
        assert!(counters.balanced(), "{:?}", counters);
        assert_eq!(counters.indexes_disposed_with_live_units, 0);
    }

    #[test]
    fn test_arguments_pass_through_unmodified() {
        let index = index_on(StubLibrary::new());
        let args = ["-x", "c", "-std=c99", "-DNAME=value"];
        index.parse(Some("t.c"), &args, &source(), ParseOptions::NONE).unwrap();
        assert_eq!(clangbind_stub::last_parse_args(), args.to_vec());
    }

    #[test]
    fn test_filename_from_args() {
        let index = index_on(StubLibrary::new());
        let unit = index.parse(None, &["-x", "c", "t.c"], &source(), ParseOptions::NONE).unwrap();
        assert_eq!(unit.spelling().unwrap(), "t.c");
    }

    #[test]
    fn test_older_parse_entry_points() {
        for stub in [
            StubLibrary::new().with_version(3, 4),
            StubLibrary::new().with_version(2, 7),
        ] {
            let index = index_on(stub);
            let unit = index.parse(Some("t.c"), &[], &source(), ParseOptions::NONE).unwrap();
            assert_eq!(unit.spelling().unwrap(), "t.c");
        }
    }

    #[test]
    fn test_missing_file_is_parse_error() {
        let index = index_on(StubLibrary::new());
        let err = index
            .parse(Some("/nonexistent/clangbind/missing.c"), &[], &[], ParseOptions::NONE)
            .unwrap_err();
        match err {
            Error::Parse { filename, code, .. } => {
                assert_eq!(filename, "/nonexistent/clangbind/missing.c");
                assert_eq!(code, Some(ErrorCode::FAILURE));
            }
            other => panic!("expected Parse, got {:?}", other),
        }

        let index = index_on(StubLibrary::new().with_version(3, 0));
        let err = index
            .parse(Some("/nonexistent/clangbind/missing.c"), &[], &[], ParseOptions::NONE)
            .unwrap_err();
        assert!(matches!(err, Error::Parse { code: None, .. }));
    }

    #[test]
    fn test_nul_bytes_rejected_before_native_call() {
        let index = index_on(StubLibrary::new());
        let err = index.parse(Some("t\0.c"), &[], &[], ParseOptions::NONE).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { name: "filename", .. }));

        let err = index.parse(Some("t.c"), &["-D\0"], &[], ParseOptions::NONE).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { name: "args", .. }));

        let unsaved = [UnsavedFile::new("t\0.c", "int a;")];
        let err = index.parse(Some("t.c"), &[], &unsaved, ParseOptions::NONE).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { name: "unsaved_files", .. }));
        assert_eq!(clangbind_stub::last_parse_args(), Vec::<String>::new());
    }

    #[test]
    fn test_unsaved_contents_keep_nul_bytes() {
        let index = index_on(StubLibrary::new());
        let contents = b"int a; /* \0 */\nint b;\n".to_vec();
        let unsaved = [UnsavedFile::new("nul.c", contents.clone())];
        let unit = index.parse(Some("nul.c"), &[], &unsaved, ParseOptions::NONE).unwrap();

        let names: Vec<String> = unit
            .cursor()
            .unwrap()
            .children()
            .unwrap()
            .map(|c| c.spelling().unwrap())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let native = NativeUnsaved::new(&unsaved).unwrap();
        assert_eq!(native.records[0].length as usize, contents.len());
    }

    #[test]
    fn test_load_ast_failure() {
        let index = index_on(StubLibrary::new());
        let err = index.load_ast(Path::new("missing.ast")).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_parse_after_dispose() {
        let index = index_on(StubLibrary::new());
        index.dispose();
        assert!(index.is_disposed());
        let err = index.parse(Some("t.c"), &[], &source(), ParseOptions::NONE).unwrap_err();
        assert!(matches!(err, Error::UseAfterDispose { object: "index" }));
        index.dispose();
        assert_eq!(clangbind_stub::counters().double_disposals, 0);
    }
}
