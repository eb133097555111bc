//! Lexical tokens
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license

use std::fmt;
use std::hash::{Hash, Hasher};

use clangbind_ffi::{CXToken, TokenKind};

use crate::error::Result;
use crate::location::{SourceLocation, SourceRange};
use crate::string;
use crate::unit::UnitRef;

const OBJECT: &str = "token";

/// One token of a translation unit
///
/// Tokens are copied out of the native token array, which is released as
/// soon as tokenizing returns.
#[derive(Clone)]
pub struct Token {
    unit: UnitRef,
    raw: CXToken,
}

impl Token {
    pub(crate) fn new(unit: UnitRef, raw: CXToken) -> Self {
        Self { unit, raw }
    }

    pub fn kind(&self) -> Result<TokenKind> {
        self.unit.ensure_alive(OBJECT)?;
        let kind = native!(self.unit.library(), clang_getTokenKind);
        // SAFETY: token copied from a live unit
        Ok(TokenKind(unsafe { kind(self.raw) }))
    }

    /// Source text of the token
    pub fn spelling(&self) -> Result<String> {
        let unit = self.unit.raw(OBJECT)?;
        let library = self.unit.library();
        string::text(library, "token spelling", || {
            let spelling = native!(library, clang_getTokenSpelling);
            // SAFETY: token copied from a live unit
            Ok(unsafe { spelling(unit, self.raw) })
        })
    }

    pub fn location(&self) -> Result<SourceLocation> {
        let unit = self.unit.raw(OBJECT)?;
        let location = native!(self.unit.library(), clang_getTokenLocation);
        // SAFETY: token copied from a live unit
        let raw = unsafe { location(unit, self.raw) };
        Ok(SourceLocation::in_unit(self.unit.clone(), raw))
    }

    pub fn extent(&self) -> Result<SourceRange> {
        let unit = self.unit.raw(OBJECT)?;
        let extent = native!(self.unit.library(), clang_getTokenExtent);
        // SAFETY: token copied from a live unit
        let raw = unsafe { extent(unit, self.raw) };
        Ok(SourceRange::in_unit(self.unit.clone(), raw))
    }

    fn try_eq(&self, other: &Token) -> Result<bool> {
        Ok(self.kind()? == other.kind()? && self.location()?.try_eq(&other.location()?)?)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Token) -> bool {
        self.try_eq(other).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let kind = self.kind().unwrap_or_else(|e| panic!("{}", e));
        let location = self.location().unwrap_or_else(|e| panic!("{}", e));
        kind.hash(state);
        location.hash(state);
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind(), self.spelling()) {
            (Ok(kind), Ok(spelling)) => write!(f, "Token({} {:?})", kind, spelling),
            _ => f.write_str("Token(<disposed>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexOptions, ParseOptions};
    use crate::index::{Index, UnsavedFile};
    use crate::library::Library;
    use crate::unit::TranslationUnit;
    use crate::Error;
    use clangbind_stub::StubLibrary;
    use pretty_assertions::assert_eq;

    fn unit(source: &str) -> (Index, TranslationUnit) {
        clangbind_stub::reset();
        let library = Library::from_source(StubLibrary::new().into_source(), None).unwrap();
        let index = Index::with_library(&library, IndexOptions::default()).unwrap();
        let unit = index
            .parse(Some("tok.c"), &[], &[UnsavedFile::new("tok.c", source)], ParseOptions::NONE)
            .unwrap();
        (index, unit)
    }

    #[test]
    fn test_token_kinds() {
        let (_index, unit) = unit("int x = 42;");
        let tokens = unit.cursor().unwrap().tokens().unwrap();
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind().unwrap()).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::KEYWORD,
                TokenKind::IDENTIFIER,
                TokenKind::PUNCTUATION,
                TokenKind::LITERAL,
                TokenKind::PUNCTUATION,
            ]
        );
    }

    #[test]
    fn test_token_position() {
        let (_index, unit) = unit("int x;\nint yy;\n");
        let tokens = unit.cursor().unwrap().tokens().unwrap();
        let yy = &tokens[4];
        assert_eq!(yy.spelling().unwrap(), "yy");
        assert_eq!(yy.location().unwrap().line().unwrap(), 2);
        assert_eq!(yy.location().unwrap().column().unwrap(), 5);
        assert_eq!(yy.extent().unwrap().end().unwrap().offset().unwrap(), 13);
        assert_eq!(tokens[4], tokens[4].clone());
        assert_ne!(tokens[3], tokens[4]);
    }

    #[test]
    fn test_cursor_tokens_are_scoped() {
        let (_index, unit) = unit("int a;\nint b;\n");
        let b = unit.cursor().unwrap().children().unwrap().nth(1).unwrap();
        let spellings: Vec<String> = b.tokens().unwrap().iter().map(|t| t.spelling().unwrap()).collect();
        assert_eq!(spellings, vec!["int", "b", ";"]);
    }

    #[test]
    fn test_tokens_deduplicate_in_sets() {
        let (_index, unit) = unit("int a;\nint b;\n");
        let root = unit.cursor().unwrap();
        let mut seen: std::collections::HashSet<Token> = root.tokens().unwrap().into_iter().collect();
        assert_eq!(seen.len(), 6);

        // the same tokens reached through each declaration add nothing
        for decl in root.children().unwrap() {
            seen.extend(decl.tokens().unwrap());
        }
        assert_eq!(seen.len(), 6);
    }

    #[test]
    fn test_token_after_dispose() {
        let (_index, unit) = unit("int a;");
        let token = unit.cursor().unwrap().tokens().unwrap().remove(0);
        unit.dispose();
        assert!(matches!(token.spelling(), Err(Error::UseAfterDispose { object: "token" })));
    }
}
