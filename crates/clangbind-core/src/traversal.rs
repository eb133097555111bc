//! Pull-based iteration over the native callback traversal
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! `clang_visitChildren` calls back once per child. The callback here only
//! appends the child payload to a buffer and asks for the next sibling, so
//! one native call yields exactly one level of the tree and no native
//! function runs inside the callback. Deeper levels are fetched by separate
//! native calls after the previous one has returned.

use std::os::raw::c_int;

use clangbind_ffi::{CXChildVisitResult, CXClientData, CXCursor};
use tracing::trace;

use crate::cursor::{collect_children, Cursor};
use crate::error::Result;
use crate::unit::UnitRef;

extern "C" fn buffer_child(cursor: CXCursor, _parent: CXCursor, client_data: CXClientData) -> c_int {
    // SAFETY: `client_data` is the `Vec` passed by `visit_children`, which
    // is borrowed for the duration of the native call
    let buffer = unsafe { &mut *(client_data as *mut Vec<CXCursor>) };
    buffer.push(cursor);
    CXChildVisitResult::Continue.as_raw()
}

/// Immediate children of `parent`, in the order the native library reports them
pub(crate) fn visit_children(unit: &UnitRef, parent: CXCursor) -> Result<Vec<CXCursor>> {
    unit.ensure_alive("cursor")?;
    let visit = native!(unit.library(), clang_visitChildren);

    let mut buffer: Vec<CXCursor> = Vec::new();
    // SAFETY: the callback only touches `buffer`, which outlives the call
    unsafe { visit(parent, buffer_child, &mut buffer as *mut Vec<CXCursor> as CXClientData) };
    trace!(children = buffer.len(), "visited one level");
    Ok(buffer)
}

/// Immediate children of a cursor
///
/// Produced by [`Cursor::children`]; calling that again restarts the
/// sequence with a fresh native traversal.
pub struct Children {
    unit: UnitRef,
    buffered: std::vec::IntoIter<CXCursor>,
}

impl Children {
    pub(crate) fn new(parent: &Cursor) -> Result<Self> {
        Ok(Self {
            unit: parent.unit().clone(),
            buffered: collect_children(parent)?.into_iter(),
        })
    }
}

impl Iterator for Children {
    type Item = Cursor;

    fn next(&mut self) -> Option<Cursor> {
        self.buffered.next().map(|raw| Cursor::new(self.unit.clone(), raw))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.buffered.size_hint()
    }
}

impl ExactSizeIterator for Children {}

/// Pre-order walk over every descendant of a cursor
///
/// Yields `(depth, cursor)` with depth 1 for immediate children. Each level
/// is buffered by its own native traversal before any of its cursors is
/// descended into. After an error the walk ends.
pub struct Walk {
    unit: UnitRef,
    stack: Vec<std::vec::IntoIter<CXCursor>>,
}

impl Walk {
    pub(crate) fn new(root: &Cursor) -> Result<Self> {
        Ok(Self {
            unit: root.unit().clone(),
            stack: vec![collect_children(root)?.into_iter()],
        })
    }
}

impl Iterator for Walk {
    type Item = Result<(usize, Cursor)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let depth = self.stack.len();
            let level = self.stack.last_mut()?;
            let Some(raw) = level.next() else {
                self.stack.pop();
                continue;
            };
            match visit_children(&self.unit, raw) {
                Ok(children) => self.stack.push(children.into_iter()),
                Err(e) => {
                    self.stack.clear();
                    return Some(Err(e));
                }
            }
            return Some(Ok((depth, Cursor::new(self.unit.clone(), raw))));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexOptions, ParseOptions};
    use crate::index::{Index, UnsavedFile};
    use crate::library::Library;
    use crate::Error;
    use clangbind_ffi::CursorKind;
    use clangbind_stub::StubLibrary;
    use pretty_assertions::assert_eq;

    fn root(source: &str) -> (Index, Cursor) {
        clangbind_stub::reset();
        let library = Library::from_source(StubLibrary::new().into_source(), None).unwrap();
        let index = Index::with_library(&library, IndexOptions::default()).unwrap();
        let unit = index
            .parse(Some("w.c"), &[], &[UnsavedFile::new("w.c", source)], ParseOptions::NONE)
            .unwrap();
        let root = unit.cursor().unwrap();
        (index, root)
    }

    #[test]
    fn test_children_in_document_order() {
        let (_index, root) = root("int a;\nint b;\nint c;\n");
        let children = root.children().unwrap();
        assert_eq!(children.len(), 3);
        let names: Vec<String> = children.map(|c| c.spelling().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_children_restart() {
        let (_index, root) = root("int a;\nint f(int x) { return x; }\n");
        let first: Vec<Cursor> = root.children().unwrap().collect();
        let second: Vec<Cursor> = root.children().unwrap().collect();
        assert_eq!(first.len(), second.len());
        assert_eq!(first, second);
        assert_eq!(clangbind_stub::counters().visit_calls, 2);
    }

    #[test]
    fn test_walk_pre_order_with_depth() {
        let (_index, root) = root("int f(int x) { return x; }");
        let entries: Vec<(usize, CursorKind)> = root
            .walk()
            .unwrap()
            .map(|entry| {
                let (depth, cursor) = entry.unwrap();
                (depth, cursor.kind().unwrap())
            })
            .collect();
        assert_eq!(
            entries,
            vec![
                (1, CursorKind::FUNCTION_DECL),
                (2, CursorKind::PARM_DECL),
                (2, CursorKind::COMPOUND_STMT),
                (3, CursorKind::RETURN_STMT),
                (4, CursorKind::DECL_REF_EXPR),
            ]
        );
        assert_eq!(clangbind_stub::counters().reentrant_visits, 0);
    }

    #[test]
    fn test_walk_stops_after_dispose() {
        let (index, root) = root("int f(int x) { return x; }");
        let mut walk = root.walk().unwrap();
        index.dispose();
        assert!(matches!(walk.next(), Some(Err(Error::UseAfterDispose { .. }))));
        assert!(walk.next().is_none());
    }

    #[test]
    fn test_leaf_has_no_children() {
        let (_index, root) = root("int a;");
        let a = root.children().unwrap().next().unwrap();
        assert_eq!(a.children().unwrap().count(), 0);
    }
}
