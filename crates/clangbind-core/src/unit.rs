//! Translation units: one parsed source and everything reachable from it
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license

use std::cell::Cell;
use std::fmt;
use std::os::raw::c_uint;
use std::rc::Rc;

use clangbind_ffi::{signatures, CXTranslationUnit, ErrorCode};
use tracing::debug;

use crate::cursor::Cursor;
use crate::diagnostic::Diagnostics;
use crate::error::{Error, Result};
use crate::index::{c_string, IndexInner, NativeUnsaved, UnsavedFile};
use crate::library::Library;
use crate::location::{File, SourceLocation, SourceRange};
use crate::string::{self, TokenBuffer};
use crate::token::Token;

pub(crate) struct UnitInner {
    index: Rc<IndexInner>,
    raw: Cell<CXTranslationUnit>,
    /// Bumped by every successful reparse
    generation: Cell<u64>,
    dispose: signatures::clang_disposeTranslationUnit,
    filename: String,
}

impl UnitInner {
    pub(crate) fn new(
        index: Rc<IndexInner>,
        raw: CXTranslationUnit,
        dispose: signatures::clang_disposeTranslationUnit,
        filename: String,
    ) -> Self {
        Self {
            index,
            raw: Cell::new(raw),
            generation: Cell::new(0),
            dispose,
            filename,
        }
    }

    pub(crate) fn library(&self) -> &Library {
        self.index.library()
    }

    /// Native handle, or [`Error::UseAfterDispose`] naming `object`
    pub(crate) fn raw(&self, object: &'static str) -> Result<CXTranslationUnit> {
        let raw = self.raw.get();
        if raw.is_null() {
            Err(Error::UseAfterDispose { object })
        } else {
            Ok(raw)
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.raw.get().is_null()
    }

    pub(crate) fn dispose(&self) {
        let raw = self.raw.replace(std::ptr::null_mut());
        if !raw.is_null() {
            debug!(filename = %self.filename, "disposing translation unit");
            // SAFETY: the handle is nulled before release, so it is released once
            unsafe { (self.dispose)(raw) }
        }
    }
}

impl Drop for UnitInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A translation unit as it was when a wrapper was derived from it
///
/// Reparsing replaces the native tree, so wrappers from before a reparse
/// fail with [`Error::Stale`] instead of reading the replaced one.
#[derive(Clone)]
pub(crate) struct UnitRef {
    inner: Rc<UnitInner>,
    generation: u64,
}

impl UnitRef {
    fn current(inner: &Rc<UnitInner>) -> Self {
        Self {
            inner: inner.clone(),
            generation: inner.generation.get(),
        }
    }

    pub(crate) fn inner(&self) -> &Rc<UnitInner> {
        &self.inner
    }

    pub(crate) fn library(&self) -> &Library {
        self.inner.library()
    }

    /// Native handle, or an error naming `object` once the unit was
    /// disposed or reparsed
    pub(crate) fn raw(&self, object: &'static str) -> Result<CXTranslationUnit> {
        let raw = self.inner.raw(object)?;
        if self.generation != self.inner.generation.get() {
            return Err(Error::Stale { object });
        }
        Ok(raw)
    }

    pub(crate) fn ensure_alive(&self, object: &'static str) -> Result<()> {
        self.raw(object).map(|_| ())
    }

    /// Disposed, or derived before the latest reparse
    pub(crate) fn is_disposed(&self) -> bool {
        self.inner.is_disposed() || self.generation != self.inner.generation.get()
    }

    /// Same unit and same parse
    pub(crate) fn same_parse(&self, other: &UnitRef) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner) && self.generation == other.generation
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

/// One parsed source
///
/// Clones share the native unit. The unit is released when the last clone
/// and the last wrapper derived from it are dropped, when
/// [`TranslationUnit::dispose`] is called, or when its index is disposed.
#[derive(Clone)]
pub struct TranslationUnit {
    inner: Rc<UnitInner>,
}

impl TranslationUnit {
    pub(crate) fn from_inner(inner: Rc<UnitInner>) -> Self {
        Self { inner }
    }

    fn current(&self) -> UnitRef {
        UnitRef::current(&self.inner)
    }

    /// The library this unit was parsed with
    pub fn library(&self) -> &Library {
        self.inner.library()
    }

    /// Name of the parsed source file
    pub fn spelling(&self) -> Result<String> {
        let raw = self.inner.raw("translation unit")?;
        let library = self.library();
        string::text(library, "translation unit spelling", || {
            let spelling = native!(library, clang_getTranslationUnitSpelling);
            // SAFETY: live unit handle
            Ok(unsafe { spelling(raw) })
        })
    }

    /// Root cursor of the tree
    pub fn cursor(&self) -> Result<Cursor> {
        let raw = self.inner.raw("translation unit")?;
        let root = native!(self.library(), clang_getTranslationUnitCursor);
        // SAFETY: live unit handle
        Ok(Cursor::new(self.current(), unsafe { root(raw) }))
    }

    /// Diagnostics in the order the native parser reported them
    pub fn diagnostics(&self) -> Result<Diagnostics> {
        Diagnostics::new(self.current())
    }

    /// The file called `name` that takes part in this unit, if any
    pub fn file(&self, name: &str) -> Result<Option<File>> {
        let raw = self.inner.raw("translation unit")?;
        let c_name = c_string("name", name.as_bytes())?;
        let get = native!(self.library(), clang_getFile);
        // SAFETY: `c_name` outlives the call
        let file = unsafe { get(raw, c_name.as_ptr()) };
        Ok(File::new(self.current(), file))
    }

    /// Location of a 1-based line and column in `file`
    pub fn location(&self, file: &File, line: u32, column: u32) -> Result<SourceLocation> {
        let raw = self.inner.raw("translation unit")?;
        let get = native!(self.library(), clang_getLocation);
        // SAFETY: live unit and file handles
        let location = unsafe { get(raw, file.raw()?, line as c_uint, column as c_uint) };
        Ok(SourceLocation::in_unit(self.current(), location))
    }

    /// Location of a byte offset in `file`
    pub fn location_for_offset(&self, file: &File, offset: u32) -> Result<SourceLocation> {
        let raw = self.inner.raw("translation unit")?;
        let get = native!(self.library(), clang_getLocationForOffset);
        // SAFETY: live unit and file handles
        let location = unsafe { get(raw, file.raw()?, offset as c_uint) };
        Ok(SourceLocation::in_unit(self.current(), location))
    }

    /// Most specific cursor at `location`, or `None` if nothing is there
    pub fn cursor_at(&self, location: &SourceLocation) -> Result<Option<Cursor>> {
        let raw = self.inner.raw("translation unit")?;
        let get = native!(self.library(), clang_getCursor);
        // SAFETY: live unit handle
        let cursor = Cursor::new(self.current(), unsafe { get(raw, location.raw()?) });
        Ok(if cursor.is_null()? { None } else { Some(cursor) })
    }

    /// Tokens whose start lies within `range`
    pub fn tokenize(&self, range: &SourceRange) -> Result<Vec<Token>> {
        let raw = self.inner.raw("translation unit")?;
        let library = self.library();
        let native_range = range.raw()?;
        let buffer = TokenBuffer::acquire(library, raw, |tokens, count| {
            let tokenize = native!(library, clang_tokenize);
            // SAFETY: out-pointers point into the buffer guard
            unsafe { tokenize(raw, native_range, tokens, count) };
            Ok(())
        })?;
        Ok(buffer
            .to_vec()
            .into_iter()
            .map(|token| Token::new(self.current(), token))
            .collect())
    }

    /// Parse the source again, optionally with new unsaved contents
    ///
    /// Cursors, types, locations, files, tokens and diagnostics obtained
    /// before the reparse fail with [`Error::Stale`] afterwards.
    pub fn reparse(&self, unsaved: &[UnsavedFile]) -> Result<()> {
        let raw = self.inner.raw("translation unit")?;
        let library = self.library();
        let mut native_unsaved = NativeUnsaved::new(unsaved)?;
        let defaults = native!(library, clang_defaultReparseOptions);
        let reparse = native!(library, clang_reparseTranslationUnit);

        // SAFETY: every pointer is backed by a value that outlives the call
        let code = unsafe {
            let options = defaults(raw);
            reparse(raw, native_unsaved.len(), native_unsaved.as_mut_ptr(), options)
        };
        let code = ErrorCode(code);
        // The native tree is replaced or gone either way
        self.inner.generation.set(self.inner.generation.get() + 1);
        if code != ErrorCode::SUCCESS {
            // A failed reparse leaves the unit unusable
            self.inner.dispose();
            return Err(Error::Parse {
                filename: self.inner.filename.clone(),
                reason: format!("reparse failed with {}", code),
                code: Some(code),
            });
        }
        debug!(
            filename = %self.inner.filename,
            generation = self.inner.generation.get(),
            "reparsed translation unit"
        );
        Ok(())
    }

    /// Release the native unit now
    ///
    /// Every wrapper derived from it fails with [`Error::UseAfterDispose`]
    /// from then on. Disposing twice is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Whether the unit has been disposed, directly or through its index
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl PartialEq for TranslationUnit {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for TranslationUnit {}

impl fmt::Display for TranslationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.spelling() {
            Ok(spelling) => f.write_str(&spelling),
            Err(_) => write!(f, "<translation unit {}>", self.inner.filename),
        }
    }
}

impl fmt::Debug for TranslationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationUnit")
            .field("filename", &self.inner.filename)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexOptions, ParseOptions};
    use crate::index::Index;
    use clangbind_stub::StubLibrary;

    const SOURCE: &str = "int one = 1;\n\nint add(int a, int b) {\n  return a + b;\n}\n";

    fn parse() -> (Index, TranslationUnit) {
        clangbind_stub::reset();
        let library = Library::from_source(StubLibrary::new().into_source(), None).unwrap();
        let index = Index::with_library(&library, IndexOptions::default()).unwrap();
        let unit = index
            .parse(Some("add.c"), &[], &[UnsavedFile::new("add.c", SOURCE)], ParseOptions::NONE)
            .unwrap();
        (index, unit)
    }

    #[test]
    fn test_spelling_and_display() {
        let (_index, unit) = parse();
        assert_eq!(unit.spelling().unwrap(), "add.c");
        assert_eq!(unit.to_string(), "add.c");
    }

    #[test]
    fn test_file_lookup() {
        let (_index, unit) = parse();
        let file = unit.file("add.c").unwrap().expect("file");
        assert_eq!(file.name().unwrap(), "add.c");
        assert!(unit.file("other.c").unwrap().is_none());
    }

    #[test]
    fn test_location_and_cursor_at() {
        let (_index, unit) = parse();
        let file = unit.file("add.c").unwrap().unwrap();

        let location = unit.location(&file, 3, 5).unwrap();
        assert_eq!(location.offset().unwrap(), 18);
        assert_eq!(location.line().unwrap(), 3);
        assert_eq!(location.column().unwrap(), 5);

        let same = unit.location_for_offset(&file, 18).unwrap();
        assert_eq!(location, same);

        let cursor = unit.cursor_at(&location).unwrap().expect("cursor");
        assert_eq!(cursor.spelling().unwrap(), "add");
    }

    #[test]
    fn test_tokenize_releases_array() {
        let (_index, unit) = parse();
        let extent = unit.cursor().unwrap().extent().unwrap();
        let tokens = unit.tokenize(&extent).unwrap();
        let spellings: Vec<String> = tokens.iter().take(5).map(|t| t.spelling().unwrap()).collect();
        assert_eq!(spellings, vec!["int", "one", "=", "1", ";"]);

        let counters = clangbind_stub::counters();
        assert_eq!(counters.token_arrays_allocated, 1);
        assert_eq!(counters.token_arrays_disposed, 1);
    }

    #[test]
    fn test_reparse_with_new_contents() {
        let (_index, unit) = parse();
        unit.reparse(&[UnsavedFile::new("add.c", "int only;\n")]).unwrap();
        let children: Vec<_> = unit.cursor().unwrap().children().unwrap().collect();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].spelling().unwrap(), "only");
    }

    #[test]
    fn test_reparse_invalidates_earlier_wrappers() {
        let (_index, unit) = parse();
        let root = unit.cursor().unwrap();
        let one = root.children().unwrap().next().unwrap();
        let ty = one.ty().unwrap();
        let file = unit.file("add.c").unwrap().unwrap();
        let location = one.location().unwrap();

        unit.reparse(&[UnsavedFile::new("add.c", SOURCE)]).unwrap();
        assert!(!unit.is_disposed());
        assert!(matches!(one.spelling(), Err(Error::Stale { object: "cursor" })));
        assert!(matches!(ty.kind(), Err(Error::Stale { object: "type" })));
        assert!(matches!(file.name(), Err(Error::Stale { object: "file" })));
        assert!(matches!(location.line(), Err(Error::Stale { .. })));
        assert!(matches!(unit.location(&file, 1, 1), Err(Error::Stale { .. })));
        assert!(matches!(root.try_eq(&unit.cursor().unwrap()), Err(Error::Stale { .. })));
        assert_eq!(format!("{:?}", one), "Cursor(<disposed>)");

        // wrappers taken after the reparse work as usual
        let again = unit.cursor().unwrap().children().unwrap().next().unwrap();
        assert_eq!(again.spelling().unwrap(), "one");
    }

    #[test]
    fn test_failed_reparse_disposes_unit() {
        let (index, unit) = parse();
        let root = unit.cursor().unwrap();
        // add.c only ever existed as unsaved contents
        let err = unit.reparse(&[]).unwrap_err();
        assert!(matches!(err, Error::Parse { code: Some(ErrorCode::FAILURE), .. }));
        assert!(unit.is_disposed());
        assert!(matches!(root.spelling(), Err(Error::UseAfterDispose { .. })));
        assert_eq!(index.translation_units_alive(), 0);
    }

    #[test]
    fn test_dispose_invalidates_wrappers() {
        let (index, unit) = parse();
        let root = unit.cursor().unwrap();
        unit.dispose();
        assert!(unit.is_disposed());
        assert!(matches!(root.spelling(), Err(Error::UseAfterDispose { object: "cursor" })));
        assert!(matches!(unit.cursor(), Err(Error::UseAfterDispose { .. })));
        assert_eq!(index.translation_units_alive(), 0);

        unit.dispose();
        drop(root);
        drop(unit);
        drop(index);
        assert!(clangbind_stub::counters().balanced());
    }
}
