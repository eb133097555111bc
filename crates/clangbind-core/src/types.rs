//! Semantic types attached to cursors
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license

use std::fmt;
use std::hash::{Hash, Hasher};

use clangbind_ffi::{CXType, CursorKind, TypeKind};

use crate::cursor::Cursor;
use crate::error::Result;
use crate::library::Library;
use crate::string;
use crate::unit::UnitRef;

const OBJECT: &str = "type";

/// A semantic type
///
/// Relations that do not apply (the pointee of a non-pointer, the result
/// of a non-function, the declaration of a builtin) are `None`.
///
/// # Panics
///
/// `==` and hashing panic once the translation unit is disposed or
/// reparsed; use [`Type::try_eq`] to get the error instead.
#[derive(Clone)]
pub struct Type {
    unit: UnitRef,
    raw: CXType,
}

impl Type {
    pub(crate) fn new(unit: UnitRef, raw: CXType) -> Self {
        Self { unit, raw }
    }

    fn raw(&self) -> Result<CXType> {
        self.unit.ensure_alive(OBJECT)?;
        Ok(self.raw)
    }

    fn library(&self) -> &Library {
        self.unit.library()
    }

    fn derive(&self, raw: CXType) -> Type {
        Type::new(self.unit.clone(), raw)
    }

    fn valid(&self, raw: CXType) -> Option<Type> {
        if raw.kind == TypeKind::INVALID.raw() {
            None
        } else {
            Some(self.derive(raw))
        }
    }

    pub fn kind(&self) -> Result<TypeKind> {
        Ok(TypeKind(self.raw()?.kind))
    }

    /// Whether the native library produced an actual type
    pub fn is_valid(&self) -> Result<bool> {
        Ok(self.kind()? != TypeKind::INVALID)
    }

    /// Type as written in source, e.g. `int *`
    ///
    /// Needs libclang 3.3; older libraries report
    /// [`Error::MissingFunction`](crate::Error::MissingFunction).
    pub fn spelling(&self) -> Result<String> {
        let raw = self.raw()?;
        let library = self.library();
        string::text(library, "type spelling", || {
            let spelling = native!(library, clang_getTypeSpelling);
            // SAFETY: type of a live unit
            Ok(unsafe { spelling(raw) })
        })
    }

    /// Type with typedefs and other sugar removed; itself when already canonical
    pub fn canonical_type(&self) -> Result<Type> {
        let raw = self.raw()?;
        let canonical = native!(self.library(), clang_getCanonicalType);
        // SAFETY: type of a live unit
        Ok(self.derive(unsafe { canonical(raw) }))
    }

    /// Pointed-to type of a pointer-like type
    pub fn pointee_type(&self) -> Result<Option<Type>> {
        let raw = self.raw()?;
        let pointee = native!(self.library(), clang_getPointeeType);
        // SAFETY: type of a live unit
        Ok(self.valid(unsafe { pointee(raw) }))
    }

    /// Return type of a function type
    pub fn result_type(&self) -> Result<Option<Type>> {
        let raw = self.raw()?;
        let result = native!(self.library(), clang_getResultType);
        // SAFETY: type of a live unit
        Ok(self.valid(unsafe { result(raw) }))
    }

    /// Declaration that introduced the type
    pub fn declaration(&self) -> Result<Option<Cursor>> {
        let raw = self.raw()?;
        let declaration = native!(self.library(), clang_getTypeDeclaration);
        // SAFETY: type of a live unit
        let cursor = unsafe { declaration(raw) };
        if CursorKind(cursor.kind).is_invalid_tag() {
            return Ok(None);
        }
        Ok(Some(Cursor::new(self.unit.clone(), cursor)))
    }

    /// Native equality
    pub fn try_eq(&self, other: &Type) -> Result<bool> {
        let (a, b) = (self.raw()?, other.raw()?);
        let equal = native!(self.library(), clang_equalTypes);
        // SAFETY: types of live units
        Ok(unsafe { equal(a, b) } != 0)
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        self.try_eq(other).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Eq for Type {}

impl Hash for Type {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Equal types always share a kind
        self.kind().unwrap_or_else(|e| panic!("{}", e)).hash(state);
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Type");
        debug.field("kind", &TypeKind(self.raw.kind));
        if !self.unit.is_disposed() {
            if let Ok(spelling) = self.spelling() {
                debug.field("spelling", &spelling);
            }
        }
        debug.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexOptions, ParseOptions};
    use crate::index::{Index, UnsavedFile};
    use clangbind_stub::StubLibrary;
    use std::collections::HashSet;

    const SOURCE: &str = "int *p;\nint n;\nint f(int a) { return a; }\n";

    fn decls(stub: StubLibrary) -> (Index, Vec<Cursor>) {
        clangbind_stub::reset();
        let library = Library::from_source(stub.into_source(), None).unwrap();
        let index = Index::with_library(&library, IndexOptions::default()).unwrap();
        let unit = index
            .parse(Some("t.c"), &[], &[UnsavedFile::new("t.c", SOURCE)], ParseOptions::NONE)
            .unwrap();
        let decls = unit.cursor().unwrap().children().unwrap().collect();
        (index, decls)
    }

    #[test]
    fn test_pointer_type() {
        let (_index, decls) = decls(StubLibrary::new());
        let ty = decls[0].ty().unwrap();
        assert_eq!(ty.kind().unwrap(), TypeKind::POINTER);
        assert_eq!(ty.spelling().unwrap(), "int *");

        let pointee = ty.pointee_type().unwrap().expect("pointee");
        assert_eq!(pointee.kind().unwrap(), TypeKind::INT);
        assert_eq!(pointee, decls[1].ty().unwrap());
        assert_eq!(pointee.pointee_type().unwrap(), None);
    }

    #[test]
    fn test_function_type() {
        let (_index, decls) = decls(StubLibrary::new());
        let ty = decls[2].ty().unwrap();
        assert_eq!(ty.kind().unwrap(), TypeKind::FUNCTION_PROTO);
        assert_eq!(ty.spelling().unwrap(), "int (int)");
        assert_eq!(ty.result_type().unwrap().unwrap().kind().unwrap(), TypeKind::INT);
        assert_eq!(ty.pointee_type().unwrap(), None);
    }

    #[test]
    fn test_canonical_and_declaration() {
        let (_index, decls) = decls(StubLibrary::new());
        let ty = decls[1].ty().unwrap();
        assert_eq!(ty.canonical_type().unwrap(), ty);
        assert_eq!(ty.declaration().unwrap(), None);
    }

    #[test]
    fn test_equal_types_hash_equal() {
        let (_index, decls) = decls(StubLibrary::new());
        let a = decls[1].ty().unwrap();
        let b = decls[0].ty().unwrap().pointee_type().unwrap().unwrap();
        let set: HashSet<Type> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_spelling_needs_newer_library() {
        let (_index, decls) = decls(StubLibrary::new().with_version(3, 2));
        let ty = decls[1].ty().unwrap();
        assert_eq!(ty.kind().unwrap(), TypeKind::INT);
        let err = ty.spelling().unwrap_err();
        assert!(err.is_missing_function());
        assert_eq!(clangbind_stub::counters().live_strings(), 0);
    }
}
