//! Shared test support utilities for integration tests

#![allow(dead_code)]

use clangbind_core::{Cursor, Index, IndexOptions, Library, ParseOptions, TranslationUnit, UnsavedFile};
use clangbind_stub::StubLibrary;

/// The source every end-to-end scenario starts from
pub const IDENTITY: &str = "int f(int x) { return x; }";

/// Fresh stub state and a library on it
pub fn stub_library(stub: StubLibrary) -> Library {
    clangbind_stub::reset();
    Library::from_source(stub.into_source(), None).expect("stub library")
}

/// An index on a fresh stub reporting a recent release
pub fn stub_index() -> Index {
    index_on(StubLibrary::new())
}

pub fn index_on(stub: StubLibrary) -> Index {
    let library = stub_library(stub);
    Index::with_library(&library, IndexOptions::default()).expect("index")
}

/// Parse `source` as the in-memory file `name`
pub fn parse_source(index: &Index, name: &str, source: impl Into<Vec<u8>>) -> TranslationUnit {
    index
        .parse(Some(name), &[], &[UnsavedFile::new(name, source)], ParseOptions::NONE)
        .expect("parse")
}

/// Every cursor below `root`, in pre-order
pub fn descendants(root: &Cursor) -> Vec<Cursor> {
    root.walk()
        .expect("walk")
        .map(|entry| entry.expect("walk entry").1)
        .collect()
}
