//! `extern "C"` entry points of the stub library
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! Each function is named after the native symbol it stands in for and is
//! checked against the declared signature when the symbol table is built.
//! None of these functions may panic: unwinding out of an `extern "C"`
//! function aborts the process, so bad handles are counted and answered
//! with null values instead.

#![allow(non_snake_case)]

use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_void};

use clangbind_ffi::{
    signatures, CXChildVisitResult, CXClientData, CXCursor, CXCursorVisitor, CXDiagnostic,
    CXFile, CXFileUniqueID, CXIndex, CXSourceLocation, CXSourceRange, CXString, CXToken, CXTranslationUnit,
    CXType, CXUnsavedFile, CursorKind, ErrorCode, Function, TypeKind,
};

use crate::state::*;
use crate::syntax::Syntax;

/// `CXDiagnostic_DisplaySourceLocation`
const DISPLAY_SOURCE_LOCATION: c_uint = 0x01;
/// `CXDiagnostic_DisplayColumn`
const DISPLAY_COLUMN: c_uint = 0x02;
/// Timestamp reported for every stub file
const FILE_TIME: i64 = 1_700_000_000;

macro_rules! symbol_table {
    ($function:expr; $($name:ident),* $(,)?) => {
        match $function {
            $(Function::$name => Some($name as signatures::$name as *const c_void),)*
        }
    };
}

/// Address of the stub implementation of `function`
pub(crate) fn address(function: Function) -> Option<*const c_void> {
    symbol_table!(function;
        clang_getCString, clang_disposeString, clang_getClangVersion,
        clang_createIndex, clang_disposeIndex, clang_createTranslationUnitFromSourceFile,
        clang_createTranslationUnit, clang_parseTranslationUnit, clang_parseTranslationUnit2,
        clang_reparseTranslationUnit, clang_defaultReparseOptions, clang_disposeTranslationUnit,
        clang_getTranslationUnitSpelling, clang_getTranslationUnitCursor,
        clang_getFile, clang_getFileName, clang_getFileTime, clang_getFileUniqueID, clang_File_isEqual,
        clang_getNullLocation, clang_equalLocations, clang_getLocation, clang_getLocationForOffset,
        clang_getInstantiationLocation, clang_getExpansionLocation, clang_getSpellingLocation,
        clang_getNullRange, clang_getRange, clang_equalRanges, clang_getRangeStart, clang_getRangeEnd,
        clang_getNullCursor, clang_equalCursors, clang_hashCursor, clang_getCursorKind,
        clang_getCursorKindSpelling, clang_isDeclaration, clang_isReference, clang_isExpression,
        clang_isStatement, clang_isInvalid, clang_isTranslationUnit, clang_isPreprocessing,
        clang_isUnexposed, clang_getCursor, clang_getCursorLocation, clang_getCursorExtent,
        clang_visitChildren, clang_getCursorUSR, clang_getCursorSpelling, clang_getCursorDisplayName,
        clang_getCursorReferenced, clang_getCursorDefinition, clang_isCursorDefinition,
        clang_getCursorSemanticParent, clang_getCursorLexicalParent, clang_getCursorType,
        clang_getCursorResultType,
        clang_equalTypes, clang_getTypeSpelling, clang_getTypeKindSpelling, clang_getCanonicalType,
        clang_getPointeeType, clang_getResultType, clang_getTypeDeclaration,
        clang_tokenize, clang_disposeTokens, clang_getTokenKind, clang_getTokenSpelling,
        clang_getTokenLocation, clang_getTokenExtent,
        clang_getNumDiagnostics, clang_getDiagnostic, clang_disposeDiagnostic, clang_formatDiagnostic,
        clang_defaultDiagnosticDisplayOptions, clang_getDiagnosticSeverity,
        clang_getDiagnosticLocation, clang_getDiagnosticSpelling,
    )
}

fn make_string(bytes: &[u8]) -> CXString {
    let bytes: Vec<u8> = bytes.iter().copied().filter(|b| *b != 0).collect();
    let raw = match CString::new(bytes) {
        Ok(owned) => owned.into_raw(),
        Err(_) => return CXString::empty(),
    };
    with_state(|state| {
        state.strings.insert(raw as usize);
        state.counters.strings_allocated += 1;
    });
    CXString {
        data: raw as *const c_void,
        private_flags: 1,
    }
}

fn with_unit<R>(unit: usize, f: impl FnOnce(&Unit) -> R) -> Option<R> {
    with_state(|state| state.units.get(&unit).map(f))
}

fn with_node<R>(cursor: &CXCursor, f: impl FnOnce(usize, &Syntax, usize) -> R) -> Option<R> {
    let (unit, node) = cursor_node(cursor)?;
    with_state(|state| {
        let syntax = &state.units.get(&unit)?.syntax;
        if node < syntax.nodes.len() {
            Some(f(unit, syntax, node))
        } else {
            None
        }
    })
}

fn node_cursor(unit: usize, syntax: &Syntax, node: usize, alias: usize) -> CXCursor {
    cursor(unit, node, syntax.nodes[node].kind, alias)
}

// Strings

unsafe extern "C" fn clang_getCString(string: CXString) -> *const c_char {
    string.data as *const c_char
}

unsafe extern "C" fn clang_disposeString(string: CXString) {
    if string.private_flags == 0 || string.data.is_null() {
        return;
    }
    let known = with_state(|state| {
        let known = state.strings.remove(&(string.data as usize));
        if known {
            state.counters.strings_disposed += 1;
        } else {
            state.counters.double_disposals += 1;
        }
        known
    });
    if known {
        drop(CString::from_raw(string.data as *mut c_char));
    }
}

unsafe extern "C" fn clang_getClangVersion() -> CXString {
    let banner = with_state(|state| state.banner.clone());
    make_string(banner.as_bytes())
}

// Index and translation units

unsafe extern "C" fn clang_createIndex(_exclude: c_int, _display: c_int) -> CXIndex {
    with_state(|state| {
        let id = state.next_id();
        state.indexes.insert(id);
        state.counters.indexes_created += 1;
        id_ptr(id)
    })
}

unsafe extern "C" fn clang_disposeIndex(index: CXIndex) {
    let id = ptr_id(index);
    with_state(|state| {
        if !state.indexes.remove(&id) {
            state.counters.double_disposals += 1;
            return;
        }
        state.counters.indexes_disposed += 1;
        if state.units.values().any(|unit| unit.index == id) {
            state.counters.indexes_disposed_with_live_units += 1;
        }
    });
}

unsafe fn read_args(args: *const *const c_char, count: c_int) -> Vec<String> {
    if args.is_null() {
        return Vec::new();
    }
    (0..count.max(0) as usize)
        .map(|i| *args.add(i))
        .filter(|arg| !arg.is_null())
        .map(|arg| CStr::from_ptr(arg).to_string_lossy().into_owned())
        .collect()
}

unsafe fn read_unsaved(files: *mut CXUnsavedFile, count: c_uint) -> Vec<(String, Vec<u8>)> {
    if files.is_null() {
        return Vec::new();
    }
    (0..count as usize)
        .map(|i| &*files.add(i))
        .filter(|file| !file.filename.is_null())
        .map(|file| {
            let name = CStr::from_ptr(file.filename).to_string_lossy().into_owned();
            let contents = if file.contents.is_null() {
                Vec::new()
            } else {
                std::slice::from_raw_parts(file.contents as *const u8, file.length as usize).to_vec()
            };
            (name, contents)
        })
        .collect()
}

fn read_source(filename: &str, unsaved: &[(String, Vec<u8>)]) -> Option<Vec<u8>> {
    unsaved
        .iter()
        .find(|(name, _)| name == filename)
        .map(|(_, contents)| contents.clone())
        .or_else(|| std::fs::read(filename).ok())
}

unsafe fn parse_common(
    index: CXIndex,
    source_filename: *const c_char,
    args: *const *const c_char,
    num_args: c_int,
    unsaved_files: *mut CXUnsavedFile,
    num_unsaved: c_uint,
) -> Option<usize> {
    let args = read_args(args, num_args);
    let unsaved = read_unsaved(unsaved_files, num_unsaved);
    let index = ptr_id(index);

    let filename = if source_filename.is_null() {
        args.iter().rev().find(|arg| !arg.starts_with('-'))?.clone()
    } else {
        CStr::from_ptr(source_filename).to_string_lossy().into_owned()
    };

    with_state(|state| state.last_args = args.clone());
    if !with_state(|state| state.indexes.contains(&index)) {
        return None;
    }
    let source = read_source(&filename, &unsaved)?;
    let syntax = Syntax::parse(&filename, &source);

    Some(with_state(|state| {
        let id = state.next_id();
        state.units.insert(
            id,
            Unit {
                index,
                filename,
                syntax,
            },
        );
        state.counters.units_created += 1;
        id
    }))
}

unsafe extern "C" fn clang_createTranslationUnitFromSourceFile(
    index: CXIndex,
    source_filename: *const c_char,
    num_args: c_int,
    args: *const *const c_char,
    num_unsaved: c_uint,
    unsaved_files: *mut CXUnsavedFile,
) -> CXTranslationUnit {
    parse_common(index, source_filename, args, num_args, unsaved_files, num_unsaved)
        .map(id_ptr)
        .unwrap_or(std::ptr::null_mut())
}

unsafe extern "C" fn clang_createTranslationUnit(_index: CXIndex, _ast_filename: *const c_char) -> CXTranslationUnit {
    // The stub cannot read serialized ASTs.
    std::ptr::null_mut()
}

unsafe extern "C" fn clang_parseTranslationUnit(
    index: CXIndex,
    source_filename: *const c_char,
    args: *const *const c_char,
    num_args: c_int,
    unsaved_files: *mut CXUnsavedFile,
    num_unsaved: c_uint,
    _options: c_uint,
) -> CXTranslationUnit {
    parse_common(index, source_filename, args, num_args, unsaved_files, num_unsaved)
        .map(id_ptr)
        .unwrap_or(std::ptr::null_mut())
}

unsafe extern "C" fn clang_parseTranslationUnit2(
    index: CXIndex,
    source_filename: *const c_char,
    args: *const *const c_char,
    num_args: c_int,
    unsaved_files: *mut CXUnsavedFile,
    num_unsaved: c_uint,
    _options: c_uint,
    out_tu: *mut CXTranslationUnit,
) -> c_int {
    if out_tu.is_null() {
        return ErrorCode::INVALID_ARGUMENTS.raw();
    }
    match parse_common(index, source_filename, args, num_args, unsaved_files, num_unsaved) {
        Some(id) => {
            *out_tu = id_ptr(id);
            ErrorCode::SUCCESS.raw()
        }
        None => {
            *out_tu = std::ptr::null_mut();
            ErrorCode::FAILURE.raw()
        }
    }
}

unsafe extern "C" fn clang_reparseTranslationUnit(
    tu: CXTranslationUnit,
    num_unsaved: c_uint,
    unsaved_files: *mut CXUnsavedFile,
    _options: c_uint,
) -> c_int {
    let id = ptr_id(tu);
    let unsaved = read_unsaved(unsaved_files, num_unsaved);
    let filename = match with_unit(id, |unit| unit.filename.clone()) {
        Some(filename) => filename,
        None => return ErrorCode::INVALID_ARGUMENTS.raw(),
    };
    let source = match read_source(&filename, &unsaved) {
        Some(source) => source,
        None => return ErrorCode::FAILURE.raw(),
    };
    let syntax = Syntax::parse(&filename, &source);
    with_state(|state| {
        if let Some(unit) = state.units.get_mut(&id) {
            unit.syntax = syntax;
        }
        // The previous diagnostic set goes away with the previous tree
        let before = state.diagnostics.len();
        state.diagnostics.retain(|_, (unit, _)| *unit != id);
        state.counters.diagnostics_disposed += before - state.diagnostics.len();
    });
    ErrorCode::SUCCESS.raw()
}

unsafe extern "C" fn clang_defaultReparseOptions(_tu: CXTranslationUnit) -> c_uint {
    0
}

unsafe extern "C" fn clang_disposeTranslationUnit(tu: CXTranslationUnit) {
    let id = ptr_id(tu);
    with_state(|state| {
        if state.units.remove(&id).is_none() {
            state.counters.double_disposals += 1;
            return;
        }
        state.counters.units_disposed += 1;
        // Diagnostics still held by the caller are released with their unit
        let before = state.diagnostics.len();
        state.diagnostics.retain(|_, (unit, _)| *unit != id);
        state.counters.diagnostics_disposed += before - state.diagnostics.len();
    });
}

unsafe extern "C" fn clang_getTranslationUnitSpelling(tu: CXTranslationUnit) -> CXString {
    match with_unit(ptr_id(tu), |unit| unit.filename.clone()) {
        Some(filename) => make_string(filename.as_bytes()),
        None => CXString::empty(),
    }
}

unsafe extern "C" fn clang_getTranslationUnitCursor(tu: CXTranslationUnit) -> CXCursor {
    let id = ptr_id(tu);
    with_unit(id, |_| cursor(id, 0, CursorKind::TRANSLATION_UNIT, 0)).unwrap_or_else(null_cursor)
}

// Files

unsafe extern "C" fn clang_getFile(tu: CXTranslationUnit, file_name: *const c_char) -> CXFile {
    if file_name.is_null() {
        return std::ptr::null_mut();
    }
    let id = ptr_id(tu);
    let wanted = CStr::from_ptr(file_name).to_string_lossy().into_owned();
    match with_unit(id, |unit| unit.filename == wanted) {
        Some(true) => file_handle(id),
        _ => std::ptr::null_mut(),
    }
}

unsafe extern "C" fn clang_getFileName(file: CXFile) -> CXString {
    let name = file_unit(file).and_then(|unit| with_unit(unit, |unit| unit.filename.clone()));
    match name {
        Some(name) => make_string(name.as_bytes()),
        None => CXString::empty(),
    }
}

unsafe extern "C" fn clang_getFileTime(file: CXFile) -> i64 {
    if file_unit(file).is_some() {
        FILE_TIME
    } else {
        0
    }
}

unsafe extern "C" fn clang_getFileUniqueID(file: CXFile, out_id: *mut CXFileUniqueID) -> c_int {
    match file_unit(file) {
        Some(unit) if !out_id.is_null() => {
            *out_id = CXFileUniqueID {
                data: [1, unit as u64, FILE_TIME as u64],
            };
            0
        }
        _ => 1,
    }
}

unsafe extern "C" fn clang_File_isEqual(file1: CXFile, file2: CXFile) -> c_int {
    (file1 == file2) as c_int
}

// Locations and ranges

unsafe extern "C" fn clang_getNullLocation() -> CXSourceLocation {
    CXSourceLocation::zeroed()
}

unsafe extern "C" fn clang_equalLocations(loc1: CXSourceLocation, loc2: CXSourceLocation) -> c_uint {
    (loc1.ptr_data[0] == loc2.ptr_data[0] && loc1.int_data == loc2.int_data) as c_uint
}

unsafe extern "C" fn clang_getLocation(tu: CXTranslationUnit, file: CXFile, line: c_uint, column: c_uint) -> CXSourceLocation {
    let id = ptr_id(tu);
    if file_unit(file) != Some(id) {
        return CXSourceLocation::zeroed();
    }
    with_unit(id, |unit| location(id, unit.syntax.offset_of(line, column), 0))
        .unwrap_or_else(CXSourceLocation::zeroed)
}

unsafe extern "C" fn clang_getLocationForOffset(tu: CXTranslationUnit, file: CXFile, offset: c_uint) -> CXSourceLocation {
    let id = ptr_id(tu);
    if file_unit(file) != Some(id) {
        return CXSourceLocation::zeroed();
    }
    with_unit(id, |unit| location(id, offset.min(unit.syntax.source.len() as u32), 0))
        .unwrap_or_else(CXSourceLocation::zeroed)
}

unsafe fn decompose(
    loc: CXSourceLocation,
    file: *mut CXFile,
    line: *mut c_uint,
    column: *mut c_uint,
    offset: *mut c_uint,
) {
    let resolved = location_parts(&loc).and_then(|(unit, at)| {
        with_unit(unit, |u| {
            let (l, c) = u.syntax.line_column(at);
            (file_handle(unit), l, c, at)
        })
    });
    let (f, l, c, o) = resolved.unwrap_or((std::ptr::null_mut(), 0, 0, 0));
    if !file.is_null() {
        *file = f;
    }
    if !line.is_null() {
        *line = l;
    }
    if !column.is_null() {
        *column = c;
    }
    if !offset.is_null() {
        *offset = o;
    }
}

unsafe extern "C" fn clang_getInstantiationLocation(
    location: CXSourceLocation,
    file: *mut CXFile,
    line: *mut c_uint,
    column: *mut c_uint,
    offset: *mut c_uint,
) {
    decompose(location, file, line, column, offset)
}

unsafe extern "C" fn clang_getExpansionLocation(
    location: CXSourceLocation,
    file: *mut CXFile,
    line: *mut c_uint,
    column: *mut c_uint,
    offset: *mut c_uint,
) {
    decompose(location, file, line, column, offset)
}

unsafe extern "C" fn clang_getSpellingLocation(
    location: CXSourceLocation,
    file: *mut CXFile,
    line: *mut c_uint,
    column: *mut c_uint,
    offset: *mut c_uint,
) {
    decompose(location, file, line, column, offset)
}

unsafe extern "C" fn clang_getNullRange() -> CXSourceRange {
    CXSourceRange::zeroed()
}

unsafe extern "C" fn clang_getRange(begin: CXSourceLocation, end: CXSourceLocation) -> CXSourceRange {
    if begin.ptr_data[0].is_null() || begin.ptr_data[0] != end.ptr_data[0] {
        return CXSourceRange::zeroed();
    }
    CXSourceRange {
        ptr_data: [begin.ptr_data[0], std::ptr::null()],
        begin_int_data: begin.int_data,
        end_int_data: end.int_data,
    }
}

unsafe extern "C" fn clang_equalRanges(range1: CXSourceRange, range2: CXSourceRange) -> c_uint {
    (range1.ptr_data[0] == range2.ptr_data[0]
        && range1.begin_int_data == range2.begin_int_data
        && range1.end_int_data == range2.end_int_data) as c_uint
}

unsafe extern "C" fn clang_getRangeStart(range: CXSourceRange) -> CXSourceLocation {
    if range.ptr_data[0].is_null() {
        return CXSourceLocation::zeroed();
    }
    CXSourceLocation {
        ptr_data: [range.ptr_data[0], std::ptr::null()],
        int_data: range.begin_int_data,
    }
}

unsafe extern "C" fn clang_getRangeEnd(range: CXSourceRange) -> CXSourceLocation {
    if range.ptr_data[0].is_null() {
        return CXSourceLocation::zeroed();
    }
    CXSourceLocation {
        ptr_data: [range.ptr_data[0], std::ptr::null()],
        int_data: range.end_int_data,
    }
}

// Cursors

unsafe extern "C" fn clang_getNullCursor() -> CXCursor {
    null_cursor()
}

unsafe extern "C" fn clang_equalCursors(a: CXCursor, b: CXCursor) -> c_uint {
    // xdata and data[2] are deliberately ignored
    (a.kind == b.kind && a.data[0] == b.data[0] && a.data[1] == b.data[1]) as c_uint
}

unsafe extern "C" fn clang_hashCursor(cursor: CXCursor) -> c_uint {
    let (unit, node) = cursor_node(&cursor).unwrap_or((0, 0));
    let mut hash: u32 = 2166136261;
    for part in [cursor.kind as u32, unit as u32, node as u32] {
        hash ^= part;
        hash = hash.wrapping_mul(16777619);
    }
    hash
}

unsafe extern "C" fn clang_getCursorKind(cursor: CXCursor) -> c_int {
    cursor.kind
}

unsafe extern "C" fn clang_getCursorKindSpelling(kind: c_int) -> CXString {
    make_string(CursorKind(kind).name().unwrap_or("").as_bytes())
}

unsafe extern "C" fn clang_isDeclaration(kind: c_int) -> c_uint {
    (1..=39).contains(&kind) as c_uint
}

unsafe extern "C" fn clang_isReference(kind: c_int) -> c_uint {
    (40..=50).contains(&kind) as c_uint
}

unsafe extern "C" fn clang_isExpression(kind: c_int) -> c_uint {
    (100..200).contains(&kind) as c_uint
}

unsafe extern "C" fn clang_isStatement(kind: c_int) -> c_uint {
    (200..300).contains(&kind) as c_uint
}

unsafe extern "C" fn clang_isInvalid(kind: c_int) -> c_uint {
    CursorKind(kind).is_invalid_tag() as c_uint
}

unsafe extern "C" fn clang_isTranslationUnit(kind: c_int) -> c_uint {
    (kind == CursorKind::TRANSLATION_UNIT.raw()) as c_uint
}

unsafe extern "C" fn clang_isPreprocessing(kind: c_int) -> c_uint {
    (500..=503).contains(&kind) as c_uint
}

unsafe extern "C" fn clang_isUnexposed(kind: c_int) -> c_uint {
    matches!(kind, 1 | 100 | 200 | 400) as c_uint
}

unsafe extern "C" fn clang_getCursor(tu: CXTranslationUnit, loc: CXSourceLocation) -> CXCursor {
    let id = ptr_id(tu);
    match location_parts(&loc) {
        Some((unit, offset)) if unit == id => with_unit(id, |u| {
            let node = u.syntax.node_at(offset);
            node_cursor(id, &u.syntax, node, 0)
        })
        .unwrap_or_else(null_cursor),
        _ => null_cursor(),
    }
}

unsafe extern "C" fn clang_getCursorLocation(cursor: CXCursor) -> CXSourceLocation {
    with_node(&cursor, |unit, syntax, node| location(unit, syntax.nodes[node].location, node))
        .unwrap_or_else(CXSourceLocation::zeroed)
}

unsafe extern "C" fn clang_getCursorExtent(cursor: CXCursor) -> CXSourceRange {
    with_node(&cursor, |unit, syntax, node| {
        let n = &syntax.nodes[node];
        range(unit, n.start, n.end)
    })
    .unwrap_or_else(CXSourceRange::zeroed)
}

fn visit(parent: CXCursor, visitor: CXCursorVisitor, client_data: CXClientData) -> bool {
    let children: Vec<CXCursor> = with_node(&parent, |unit, syntax, node| {
        syntax.nodes[node]
            .children
            .iter()
            .map(|child| node_cursor(unit, syntax, *child, 0))
            .collect()
    })
    .unwrap_or_default();

    // The state borrow is released before the callback runs.
    for child in children {
        let result = visitor(child, parent, client_data);
        if result == CXChildVisitResult::Break.as_raw() {
            return true;
        }
        if result == CXChildVisitResult::Recurse.as_raw() && visit(child, visitor, client_data) {
            return true;
        }
    }
    false
}

unsafe extern "C" fn clang_visitChildren(parent: CXCursor, visitor: CXCursorVisitor, client_data: CXClientData) -> c_uint {
    with_state(|state| {
        state.counters.visit_calls += 1;
        if state.visit_depth > 0 {
            state.counters.reentrant_visits += 1;
        }
        state.visit_depth += 1;
    });
    let broke = visit(parent, visitor, client_data);
    with_state(|state| state.visit_depth -= 1);
    broke as c_uint
}

unsafe extern "C" fn clang_getCursorUSR(cursor: CXCursor) -> CXString {
    let usr = with_node(&cursor, |_, syntax, node| {
        let n = &syntax.nodes[node];
        let name = String::from_utf8_lossy(&n.spelling);
        let parent = n.parent.map(|p| String::from_utf8_lossy(&syntax.nodes[p].spelling).into_owned());
        match n.kind {
            CursorKind::FUNCTION_DECL => format!("c:@F@{}", name),
            CursorKind::VAR_DECL => format!("c:@{}", name),
            CursorKind::PARM_DECL => format!("c:@F@{}@{}", parent.unwrap_or_default(), name),
            _ => String::new(),
        }
    })
    .unwrap_or_default();
    make_string(usr.as_bytes())
}

unsafe extern "C" fn clang_getCursorSpelling(cursor: CXCursor) -> CXString {
    let spelling = with_node(&cursor, |_, syntax, node| syntax.nodes[node].spelling.clone()).unwrap_or_default();
    make_string(&spelling)
}

unsafe extern "C" fn clang_getCursorDisplayName(cursor: CXCursor) -> CXString {
    let name = with_node(&cursor, |_, syntax, node| {
        let n = &syntax.nodes[node];
        let mut name = n.spelling.clone();
        if n.kind == CursorKind::FUNCTION_DECL {
            let params: Vec<&str> = n
                .children
                .iter()
                .map(|c| &syntax.nodes[*c])
                .filter(|c| c.kind == CursorKind::PARM_DECL)
                .map(|c| syntax.types[c.ty].spelling.as_str())
                .collect();
            name.extend_from_slice(format!("({})", params.join(", ")).as_bytes());
        }
        name
    })
    .unwrap_or_default();
    make_string(&name)
}

unsafe extern "C" fn clang_getCursorReferenced(cursor: CXCursor) -> CXCursor {
    with_node(&cursor, |unit, syntax, node| {
        syntax.nodes[node]
            .referenced
            .map(|target| node_cursor(unit, syntax, target, 1))
    })
    .flatten()
    .unwrap_or_else(null_cursor)
}

unsafe extern "C" fn clang_getCursorDefinition(cursor: CXCursor) -> CXCursor {
    with_node(&cursor, |unit, syntax, node| {
        syntax
            .definition_of(node)
            .map(|target| node_cursor(unit, syntax, target, 2))
    })
    .flatten()
    .unwrap_or_else(null_cursor)
}

unsafe extern "C" fn clang_isCursorDefinition(cursor: CXCursor) -> c_uint {
    with_node(&cursor, |_, syntax, node| {
        syntax.nodes[node].referenced == Some(node) && syntax.definition_of(node) == Some(node)
    })
    .unwrap_or(false) as c_uint
}

unsafe extern "C" fn clang_getCursorSemanticParent(cursor: CXCursor) -> CXCursor {
    with_node(&cursor, |unit, syntax, node| {
        syntax.nodes[node]
            .parent
            .map(|parent| node_cursor(unit, syntax, parent, 0))
    })
    .flatten()
    .unwrap_or_else(null_cursor)
}

unsafe extern "C" fn clang_getCursorLexicalParent(cursor: CXCursor) -> CXCursor {
    clang_getCursorSemanticParent(cursor)
}

unsafe extern "C" fn clang_getCursorType(cursor: CXCursor) -> CXType {
    with_node(&cursor, |unit, syntax, node| {
        let ty = syntax.nodes[node].ty;
        type_value(unit, ty, syntax.types[ty].kind)
    })
    .unwrap_or_else(|| CXType::zeroed(TypeKind::INVALID.raw()))
}

unsafe extern "C" fn clang_getCursorResultType(cursor: CXCursor) -> CXType {
    clang_getResultType(clang_getCursorType(cursor))
}

// Types

fn with_type<R>(ty: &CXType, f: impl FnOnce(usize, &Syntax, usize) -> R) -> Option<R> {
    let (unit, entry) = type_entry(ty)?;
    with_state(|state| {
        let syntax = &state.units.get(&unit)?.syntax;
        if entry < syntax.types.len() {
            Some(f(unit, syntax, entry))
        } else {
            None
        }
    })
}

fn invalid_type() -> CXType {
    CXType::zeroed(TypeKind::INVALID.raw())
}

unsafe extern "C" fn clang_equalTypes(a: CXType, b: CXType) -> c_uint {
    (a.kind == b.kind && a.data[0] == b.data[0] && a.data[1] == b.data[1]) as c_uint
}

unsafe extern "C" fn clang_getTypeSpelling(ty: CXType) -> CXString {
    let spelling = with_type(&ty, |_, syntax, entry| syntax.types[entry].spelling.clone()).unwrap_or_default();
    make_string(spelling.as_bytes())
}

unsafe extern "C" fn clang_getTypeKindSpelling(kind: c_int) -> CXString {
    make_string(TypeKind(kind).name().unwrap_or("Unexposed").as_bytes())
}

unsafe extern "C" fn clang_getCanonicalType(ty: CXType) -> CXType {
    // Stub types have no sugar, so every type is already canonical
    with_type(&ty, |unit, syntax, entry| type_value(unit, entry, syntax.types[entry].kind))
        .unwrap_or_else(invalid_type)
}

unsafe extern "C" fn clang_getPointeeType(ty: CXType) -> CXType {
    with_type(&ty, |unit, syntax, entry| {
        syntax.types[entry]
            .pointee
            .map(|p| type_value(unit, p, syntax.types[p].kind))
    })
    .flatten()
    .unwrap_or_else(invalid_type)
}

unsafe extern "C" fn clang_getResultType(ty: CXType) -> CXType {
    with_type(&ty, |unit, syntax, entry| {
        syntax.types[entry]
            .result
            .map(|r| type_value(unit, r, syntax.types[r].kind))
    })
    .flatten()
    .unwrap_or_else(invalid_type)
}

unsafe extern "C" fn clang_getTypeDeclaration(_ty: CXType) -> CXCursor {
    CXCursor::zeroed(CursorKind::NO_DECL_FOUND.raw())
}

// Tokens

unsafe extern "C" fn clang_tokenize(
    tu: CXTranslationUnit,
    range: CXSourceRange,
    tokens: *mut *mut CXToken,
    num_tokens: *mut c_uint,
) {
    if tokens.is_null() || num_tokens.is_null() {
        return;
    }
    *tokens = std::ptr::null_mut();
    *num_tokens = 0;

    let id = ptr_id(tu);
    if file_unit(range.ptr_data[0]) != Some(id) {
        return;
    }
    let collected: Vec<CXToken> = with_unit(id, |unit| {
        unit.syntax
            .lexemes
            .iter()
            .filter(|l| l.start >= range.begin_int_data && l.start < range.end_int_data)
            .map(|l| CXToken {
                int_data: [l.kind.raw() as c_uint, l.start, l.end, 0],
                ptr_data: id_ptr(id),
            })
            .collect()
    })
    .unwrap_or_default();
    if collected.is_empty() {
        return;
    }

    let len = collected.len();
    let array = Box::into_raw(collected.into_boxed_slice()) as *mut CXToken;
    with_state(|state| {
        state.token_arrays.insert(array as usize, len);
        state.counters.token_arrays_allocated += 1;
    });
    *tokens = array;
    *num_tokens = len as c_uint;
}

unsafe extern "C" fn clang_disposeTokens(_tu: CXTranslationUnit, tokens: *mut CXToken, num_tokens: c_uint) {
    if tokens.is_null() {
        return;
    }
    let len = with_state(|state| match state.token_arrays.remove(&(tokens as usize)) {
        Some(len) if len == num_tokens as usize => {
            state.counters.token_arrays_disposed += 1;
            Some(len)
        }
        Some(len) => {
            // Wrong length: keep the allocation tracked rather than free it wrongly
            state.token_arrays.insert(tokens as usize, len);
            state.counters.double_disposals += 1;
            None
        }
        None => {
            state.counters.double_disposals += 1;
            None
        }
    });
    if let Some(len) = len {
        drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(tokens, len)));
    }
}

unsafe extern "C" fn clang_getTokenKind(token: CXToken) -> c_int {
    token.int_data[0] as c_int
}

unsafe extern "C" fn clang_getTokenSpelling(tu: CXTranslationUnit, token: CXToken) -> CXString {
    let text = with_unit(ptr_id(tu), |unit| {
        let start = (token.int_data[1] as usize).min(unit.syntax.source.len());
        let end = (token.int_data[2] as usize).clamp(start, unit.syntax.source.len());
        unit.syntax.source[start..end].to_vec()
    })
    .unwrap_or_default();
    make_string(&text)
}

unsafe extern "C" fn clang_getTokenLocation(tu: CXTranslationUnit, token: CXToken) -> CXSourceLocation {
    let id = ptr_id(tu);
    with_unit(id, |_| location(id, token.int_data[1], 0)).unwrap_or_else(CXSourceLocation::zeroed)
}

unsafe extern "C" fn clang_getTokenExtent(tu: CXTranslationUnit, token: CXToken) -> CXSourceRange {
    let id = ptr_id(tu);
    with_unit(id, |_| range(id, token.int_data[1], token.int_data[2])).unwrap_or_else(CXSourceRange::zeroed)
}

// Diagnostics

fn with_diagnostic<R>(diagnostic: CXDiagnostic, f: impl FnOnce(usize, &Unit, usize) -> R) -> Option<R> {
    with_state(|state| {
        let (unit, index) = *state.diagnostics.get(&ptr_id(diagnostic))?;
        let owner = state.units.get(&unit)?;
        if index < owner.syntax.diagnostics.len() {
            Some(f(unit, owner, index))
        } else {
            None
        }
    })
}

unsafe extern "C" fn clang_getNumDiagnostics(tu: CXTranslationUnit) -> c_uint {
    with_unit(ptr_id(tu), |unit| unit.syntax.diagnostics.len() as c_uint).unwrap_or(0)
}

unsafe extern "C" fn clang_getDiagnostic(tu: CXTranslationUnit, index: c_uint) -> CXDiagnostic {
    let unit = ptr_id(tu);
    with_state(|state| {
        let count = state.units.get(&unit).map(|u| u.syntax.diagnostics.len()).unwrap_or(0);
        if index as usize >= count {
            return std::ptr::null_mut();
        }
        let id = state.next_id();
        state.diagnostics.insert(id, (unit, index as usize));
        state.counters.diagnostics_created += 1;
        id_ptr(id)
    })
}

unsafe extern "C" fn clang_disposeDiagnostic(diagnostic: CXDiagnostic) {
    with_state(|state| {
        if state.diagnostics.remove(&ptr_id(diagnostic)).is_some() {
            state.counters.diagnostics_disposed += 1;
        } else {
            state.counters.double_disposals += 1;
        }
    });
}

unsafe extern "C" fn clang_formatDiagnostic(diagnostic: CXDiagnostic, options: c_uint) -> CXString {
    let text = with_diagnostic(diagnostic, |_, unit, index| {
        let diag = &unit.syntax.diagnostics[index];
        let (line, column) = unit.syntax.line_column(diag.offset);
        let prefix = if options & DISPLAY_SOURCE_LOCATION == 0 {
            String::new()
        } else if options & DISPLAY_COLUMN == 0 {
            format!("{}:{}: ", unit.filename, line)
        } else {
            format!("{}:{}:{}: ", unit.filename, line, column)
        };
        format!("{}{}: {}", prefix, diag.severity, diag.message)
    })
    .unwrap_or_default();
    make_string(text.as_bytes())
}

unsafe extern "C" fn clang_defaultDiagnosticDisplayOptions() -> c_uint {
    DISPLAY_SOURCE_LOCATION | DISPLAY_COLUMN
}

unsafe extern "C" fn clang_getDiagnosticSeverity(diagnostic: CXDiagnostic) -> c_int {
    with_diagnostic(diagnostic, |_, unit, index| unit.syntax.diagnostics[index].severity.raw()).unwrap_or(0)
}

unsafe extern "C" fn clang_getDiagnosticLocation(diagnostic: CXDiagnostic) -> CXSourceLocation {
    with_diagnostic(diagnostic, |id, unit, index| location(id, unit.syntax.diagnostics[index].offset, 0))
        .unwrap_or_else(CXSourceLocation::zeroed)
}

unsafe extern "C" fn clang_getDiagnosticSpelling(diagnostic: CXDiagnostic) -> CXString {
    let message = with_diagnostic(diagnostic, |_, unit, index| unit.syntax.diagnostics[index].message.clone())
        .unwrap_or_default();
    make_string(message.as_bytes())
}
