//! Native spelling and classification of kind tags
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! The tag newtypes live in `clangbind-ffi` and know the names of the tags
//! this crate was built with. The traits here ask the loaded library
//! instead, so tags added by newer releases classify correctly.

use clangbind_ffi::{signatures, CursorKind, TypeKind};

use crate::error::Result;
use crate::library::Library;
use crate::string;

/// Kinds the native library can spell
pub trait KindSpelling {
    /// Native name of the kind, e.g. `FunctionDecl` or `Pointer`
    fn spelling(self, library: &Library) -> Result<String>;
}

impl KindSpelling for CursorKind {
    fn spelling(self, library: &Library) -> Result<String> {
        string::text(library, "cursor kind spelling", || {
            let spelling = native!(library, clang_getCursorKindSpelling);
            // SAFETY: any tag is accepted
            Ok(unsafe { spelling(self.raw()) })
        })
    }
}

impl KindSpelling for TypeKind {
    fn spelling(self, library: &Library) -> Result<String> {
        string::text(library, "type kind spelling", || {
            let spelling = native!(library, clang_getTypeKindSpelling);
            // SAFETY: any tag is accepted
            Ok(unsafe { spelling(self.raw()) })
        })
    }
}

fn classify(kind: CursorKind, predicate: signatures::clang_isDeclaration) -> bool {
    // SAFETY: the predicates accept any tag
    unsafe { predicate(kind.raw()) != 0 }
}

/// Native classification of cursor kinds
pub trait CursorKindExt {
    fn is_declaration(self, library: &Library) -> Result<bool>;
    fn is_reference(self, library: &Library) -> Result<bool>;
    fn is_expression(self, library: &Library) -> Result<bool>;
    fn is_statement(self, library: &Library) -> Result<bool>;
    /// Whether the kind is one of the native "invalid" kinds
    fn is_invalid(self, library: &Library) -> Result<bool>;
    fn is_translation_unit(self, library: &Library) -> Result<bool>;
    /// Preprocessing entities such as macro definitions; needs 2.8
    fn is_preprocessing(self, library: &Library) -> Result<bool>;
    /// Kinds the native library does not model in detail; needs 2.8
    fn is_unexposed(self, library: &Library) -> Result<bool>;
}

impl CursorKindExt for CursorKind {
    fn is_declaration(self, library: &Library) -> Result<bool> {
        Ok(classify(self, native!(library, clang_isDeclaration)))
    }

    fn is_reference(self, library: &Library) -> Result<bool> {
        Ok(classify(self, native!(library, clang_isReference)))
    }

    fn is_expression(self, library: &Library) -> Result<bool> {
        Ok(classify(self, native!(library, clang_isExpression)))
    }

    fn is_statement(self, library: &Library) -> Result<bool> {
        Ok(classify(self, native!(library, clang_isStatement)))
    }

    fn is_invalid(self, library: &Library) -> Result<bool> {
        Ok(classify(self, native!(library, clang_isInvalid)))
    }

    fn is_translation_unit(self, library: &Library) -> Result<bool> {
        Ok(classify(self, native!(library, clang_isTranslationUnit)))
    }

    fn is_preprocessing(self, library: &Library) -> Result<bool> {
        Ok(classify(self, native!(library, clang_isPreprocessing)))
    }

    fn is_unexposed(self, library: &Library) -> Result<bool> {
        Ok(classify(self, native!(library, clang_isUnexposed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clangbind_stub::StubLibrary;

    fn library(stub: StubLibrary) -> Library {
        clangbind_stub::reset();
        Library::from_source(stub.into_source(), None).unwrap()
    }

    #[test]
    fn test_kind_spelling() {
        let library = library(StubLibrary::new());
        assert_eq!(CursorKind::FUNCTION_DECL.spelling(&library).unwrap(), "FunctionDecl");
        assert_eq!(TypeKind::POINTER.spelling(&library).unwrap(), "Pointer");
        assert_eq!(clangbind_stub::counters().live_strings(), 0);
    }

    #[test]
    fn test_classification() {
        let library = library(StubLibrary::new());
        assert!(CursorKind::VAR_DECL.is_declaration(&library).unwrap());
        assert!(!CursorKind::VAR_DECL.is_expression(&library).unwrap());
        assert!(CursorKind::DECL_REF_EXPR.is_expression(&library).unwrap());
        assert!(CursorKind::RETURN_STMT.is_statement(&library).unwrap());
        assert!(CursorKind::TYPE_REF.is_reference(&library).unwrap());
        assert!(CursorKind::NO_DECL_FOUND.is_invalid(&library).unwrap());
        assert!(CursorKind::TRANSLATION_UNIT.is_translation_unit(&library).unwrap());
        assert!(CursorKind::MACRO_DEFINITION.is_preprocessing(&library).unwrap());
        assert!(CursorKind::UNEXPOSED_DECL.is_unexposed(&library).unwrap());
    }

    #[test]
    fn test_classification_is_version_gated() {
        let library = library(StubLibrary::new().with_version(2, 7));
        assert!(CursorKind::VAR_DECL.is_declaration(&library).unwrap());
        assert!(CursorKind::MACRO_DEFINITION.is_preprocessing(&library).unwrap_err().is_missing_function());
        assert!(TypeKind::INT.spelling(&library).unwrap_err().is_missing_function());
    }
}
