//! Cursors: nodes of the parsed tree
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! Relations the native library answers with a sentinel (the null cursor,
//! an invalid-kind cursor, or the cursor itself) surface here as `None`.

use std::fmt;
use std::hash::{Hash, Hasher};

use clangbind_ffi::{CXCursor, CursorKind, Function};

use crate::error::Result;
use crate::kinds::CursorKindExt;
use crate::library::Library;
use crate::location::{SourceLocation, SourceRange};
use crate::string;
use crate::token::Token;
use crate::traversal::{self, Children, Walk};
use crate::types::Type;
use crate::unit::{TranslationUnit, UnitRef};

const OBJECT: &str = "cursor";

/// A node of the parsed tree
///
/// Equality and hashing follow the native notion of cursor identity, so
/// cursors reached along different paths compare equal.
///
/// # Panics
///
/// `==` and hashing panic with the [`Error::UseAfterDispose`] or
/// [`Error::Stale`] message once the translation unit is disposed or
/// reparsed; use [`Cursor::try_eq`] to get the error instead.
///
/// [`Error::UseAfterDispose`]: crate::Error::UseAfterDispose
/// [`Error::Stale`]: crate::Error::Stale
#[derive(Clone)]
pub struct Cursor {
    unit: UnitRef,
    raw: CXCursor,
}

impl Cursor {
    pub(crate) fn new(unit: UnitRef, raw: CXCursor) -> Self {
        Self { unit, raw }
    }

    pub(crate) fn raw(&self) -> Result<CXCursor> {
        self.unit.ensure_alive(OBJECT)?;
        Ok(self.raw)
    }

    pub(crate) fn unit(&self) -> &UnitRef {
        &self.unit
    }

    fn library(&self) -> &Library {
        self.unit.library()
    }

    fn derive(&self, raw: CXCursor) -> Cursor {
        Cursor::new(self.unit.clone(), raw)
    }

    /// The translation unit this cursor belongs to
    pub fn translation_unit(&self) -> TranslationUnit {
        TranslationUnit::from_inner(self.unit.inner().clone())
    }

    pub fn kind(&self) -> Result<CursorKind> {
        let raw = self.raw()?;
        let kind = native!(self.library(), clang_getCursorKind);
        // SAFETY: cursor of a live unit
        Ok(CursorKind(unsafe { kind(raw) }))
    }

    /// Name of the entity, or an empty string for unnamed nodes
    pub fn spelling(&self) -> Result<String> {
        let raw = self.raw()?;
        let library = self.library();
        string::text(library, "cursor spelling", || {
            let spelling = native!(library, clang_getCursorSpelling);
            // SAFETY: cursor of a live unit
            Ok(unsafe { spelling(raw) })
        })
    }

    /// Name with extra detail, such as parameter types for functions
    pub fn display_name(&self) -> Result<String> {
        let raw = self.raw()?;
        let library = self.library();
        string::text(library, "cursor display name", || {
            let display = native!(library, clang_getCursorDisplayName);
            // SAFETY: cursor of a live unit
            Ok(unsafe { display(raw) })
        })
    }

    /// Unified symbol resolution string
    pub fn usr(&self) -> Result<String> {
        let raw = self.raw()?;
        let library = self.library();
        string::text(library, "cursor USR", || {
            let usr = native!(library, clang_getCursorUSR);
            // SAFETY: cursor of a live unit
            Ok(unsafe { usr(raw) })
        })
    }

    pub fn location(&self) -> Result<SourceLocation> {
        let raw = self.raw()?;
        let location = native!(self.library(), clang_getCursorLocation);
        // SAFETY: cursor of a live unit
        Ok(SourceLocation::in_unit(self.unit.clone(), unsafe { location(raw) }))
    }

    /// Source range covered by the node
    pub fn extent(&self) -> Result<SourceRange> {
        let raw = self.raw()?;
        let extent = native!(self.library(), clang_getCursorExtent);
        // SAFETY: cursor of a live unit
        Ok(SourceRange::in_unit(self.unit.clone(), unsafe { extent(raw) }))
    }

    /// Immediate children in document order
    ///
    /// Each call issues a fresh native traversal, so calling again restarts
    /// the sequence.
    pub fn children(&self) -> Result<Children> {
        Children::new(self)
    }

    /// Every descendant in pre-order, paired with its depth below `self`
    pub fn walk(&self) -> Result<Walk> {
        Walk::new(self)
    }

    /// Entity this cursor refers to
    pub fn referenced(&self) -> Result<Option<Cursor>> {
        let raw = self.raw()?;
        let referenced = native!(self.library(), clang_getCursorReferenced);
        // SAFETY: cursor of a live unit
        self.related(unsafe { referenced(raw) })
    }

    /// Defining declaration of the entity this cursor declares or names
    pub fn definition(&self) -> Result<Option<Cursor>> {
        let raw = self.raw()?;
        let definition = native!(self.library(), clang_getCursorDefinition);
        // SAFETY: cursor of a live unit
        self.related(unsafe { definition(raw) })
    }

    pub fn semantic_parent(&self) -> Result<Option<Cursor>> {
        let raw = self.raw()?;
        let parent = native!(self.library(), clang_getCursorSemanticParent);
        // SAFETY: cursor of a live unit
        self.related(unsafe { parent(raw) })
    }

    pub fn lexical_parent(&self) -> Result<Option<Cursor>> {
        let raw = self.raw()?;
        let parent = native!(self.library(), clang_getCursorLexicalParent);
        // SAFETY: cursor of a live unit
        self.related(unsafe { parent(raw) })
    }

    fn related(&self, raw: CXCursor) -> Result<Option<Cursor>> {
        let other = self.derive(raw);
        if other.kind()?.is_invalid_tag() || other.try_eq(self)? {
            return Ok(None);
        }
        Ok(Some(other))
    }

    /// Whether this cursor is the defining declaration of its entity
    pub fn is_definition(&self) -> Result<bool> {
        let raw = self.raw()?;
        let is_definition = native!(self.library(), clang_isCursorDefinition);
        // SAFETY: cursor of a live unit
        Ok(unsafe { is_definition(raw) } != 0)
    }

    /// Whether this is the null cursor
    pub fn is_null(&self) -> Result<bool> {
        let raw = self.raw()?;
        let null = native!(self.library(), clang_getNullCursor);
        // SAFETY: no arguments
        self.try_eq(&self.derive(unsafe { null() }))
            .map(|equal| equal || raw.kind == CursorKind::INVALID_FILE.raw())
    }

    /// Type of the entity
    pub fn ty(&self) -> Result<Type> {
        let raw = self.raw()?;
        let ty = native!(self.library(), clang_getCursorType);
        // SAFETY: cursor of a live unit
        Ok(Type::new(self.unit.clone(), unsafe { ty(raw) }))
    }

    /// Result type of a function-like cursor
    pub fn result_type(&self) -> Result<Option<Type>> {
        let raw = self.raw()?;
        let result = native!(self.library(), clang_getCursorResultType);
        // SAFETY: cursor of a live unit
        let ty = Type::new(self.unit.clone(), unsafe { result(raw) });
        Ok(if ty.is_valid()? { Some(ty) } else { None })
    }

    /// Tokens covered by the node
    pub fn tokens(&self) -> Result<Vec<Token>> {
        self.translation_unit().tokenize(&self.extent()?)
    }

    pub fn is_declaration(&self) -> Result<bool> {
        self.kind()?.is_declaration(self.library())
    }

    pub fn is_reference(&self) -> Result<bool> {
        self.kind()?.is_reference(self.library())
    }

    pub fn is_expression(&self) -> Result<bool> {
        self.kind()?.is_expression(self.library())
    }

    pub fn is_statement(&self) -> Result<bool> {
        self.kind()?.is_statement(self.library())
    }

    /// Native equality
    pub fn try_eq(&self, other: &Cursor) -> Result<bool> {
        let (a, b) = (self.raw()?, other.raw()?);
        let equal = native!(self.library(), clang_equalCursors);
        // SAFETY: cursors of live units
        Ok(unsafe { equal(a, b) } != 0)
    }

    /// Native hash; falls back to the kind on libraries without a cursor hash
    pub fn try_hash(&self) -> Result<u32> {
        let raw = self.raw()?;
        if !self.library().supports(Function::clang_hashCursor) {
            return Ok(self.kind()?.raw() as u32);
        }
        let hash = native!(self.library(), clang_hashCursor);
        // SAFETY: cursor of a live unit
        Ok(unsafe { hash(raw) })
    }
}

pub(crate) fn collect_children(cursor: &Cursor) -> Result<Vec<CXCursor>> {
    traversal::visit_children(cursor.unit(), cursor.raw()?)
}

impl PartialEq for Cursor {
    fn eq(&self, other: &Cursor) -> bool {
        self.try_eq(other).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Eq for Cursor {}

impl Hash for Cursor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.try_hash().unwrap_or_else(|e| panic!("{}", e)).hash(state);
    }
}

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_disposed() {
            return f.write_str("Cursor(<disposed>)");
        }
        f.debug_struct("Cursor")
            .field("kind", &CursorKind(self.raw.kind))
            .field("spelling", &self.spelling().unwrap_or_default())
            .finish()
    }
}
