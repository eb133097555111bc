//! Per-thread bookkeeping for the stub library
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! Handles given out to the binding layer are small integer ids disguised as
//! pointers, so a stale or doubly released handle is detected and counted
//! instead of touching freed memory.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::os::raw::c_void;

use clangbind_ffi::{CXCursor, CXSourceLocation, CXSourceRange, CXType, CursorKind};

use crate::syntax::Syntax;

/// Snapshot of allocation and disposal events on the current thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Counters {
    pub indexes_created: usize,
    pub indexes_disposed: usize,
    pub units_created: usize,
    pub units_disposed: usize,
    pub strings_allocated: usize,
    pub strings_disposed: usize,
    pub token_arrays_allocated: usize,
    pub token_arrays_disposed: usize,
    pub diagnostics_created: usize,
    pub diagnostics_disposed: usize,
    /// Releases of handles that were already released or never issued
    pub double_disposals: usize,
    /// Indexes disposed while translation units parsed from them were alive
    pub indexes_disposed_with_live_units: usize,
    /// Calls to the entry point that drives child visitation
    pub visit_calls: usize,
    /// Visitation started from inside a visitor callback
    pub reentrant_visits: usize,
}

impl Counters {
    /// Natively owned strings handed out and not yet released
    pub fn live_strings(&self) -> usize {
        self.strings_allocated - self.strings_disposed
    }

    /// Whether every allocation has been matched by exactly one release
    pub fn balanced(&self) -> bool {
        self.indexes_created == self.indexes_disposed
            && self.units_created == self.units_disposed
            && self.strings_allocated == self.strings_disposed
            && self.token_arrays_allocated == self.token_arrays_disposed
            && self.diagnostics_created == self.diagnostics_disposed
            && self.double_disposals == 0
    }
}

pub(crate) struct Unit {
    pub index: usize,
    pub filename: String,
    pub syntax: Syntax,
}

#[derive(Default)]
pub(crate) struct State {
    next_id: usize,
    pub indexes: HashSet<usize>,
    pub units: HashMap<usize, Unit>,
    pub strings: HashSet<usize>,
    pub token_arrays: HashMap<usize, usize>,
    pub diagnostics: HashMap<usize, (usize, usize)>,
    pub counters: Counters,
    pub banner: String,
    pub visit_depth: usize,
    pub last_args: Vec<String>,
}

impl State {
    pub fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }
}

thread_local! {
    static STATE: RefCell<State> = RefCell::new(State::default());
}

/// Runs `f` with the current thread's state; never call back into the
/// visitor while this borrow is held.
pub(crate) fn with_state<R>(f: impl FnOnce(&mut State) -> R) -> R {
    STATE.with(|state| f(&mut state.borrow_mut()))
}

/// Counters for the current thread
pub fn counters() -> Counters {
    with_state(|state| state.counters.clone())
}

/// Arguments received by the most recent parse on this thread
pub fn last_parse_args() -> Vec<String> {
    with_state(|state| state.last_args.clone())
}

/// Clears every handle and counter on the current thread
pub fn reset() {
    with_state(|state| *state = State::default());
}

// Handle encoding. Ids start at 1 so a valid handle is never null.

pub(crate) fn id_ptr(id: usize) -> *mut c_void {
    id as *mut c_void
}

pub(crate) fn ptr_id(ptr: *const c_void) -> usize {
    ptr as usize
}

/// Files are encoded as `unit << 8 | 1`; each unit has exactly one file
pub(crate) fn file_handle(unit: usize) -> *mut c_void {
    ((unit << 8) | 1) as *mut c_void
}

pub(crate) fn file_unit(file: *const c_void) -> Option<usize> {
    let raw = file as usize;
    if raw & 0xff == 1 {
        Some(raw >> 8)
    } else {
        None
    }
}

pub(crate) fn cursor(unit: usize, node: usize, kind: CursorKind, alias: usize) -> CXCursor {
    CXCursor {
        kind: kind.raw(),
        xdata: alias as i32,
        data: [id_ptr(unit), id_ptr(node + 1), alias as *const c_void],
    }
}

pub(crate) fn null_cursor() -> CXCursor {
    CXCursor::zeroed(CursorKind::INVALID_FILE.raw())
}

/// `(unit, node)` for a cursor produced by this stub
pub(crate) fn cursor_node(cursor: &CXCursor) -> Option<(usize, usize)> {
    let unit = ptr_id(cursor.data[0]);
    let node = ptr_id(cursor.data[1]);
    if unit == 0 || node == 0 {
        None
    } else {
        Some((unit, node - 1))
    }
}

pub(crate) fn type_value(unit: usize, ty: usize, kind: clangbind_ffi::TypeKind) -> CXType {
    if ty == 0 {
        return CXType::zeroed(clangbind_ffi::TypeKind::INVALID.raw());
    }
    CXType {
        kind: kind.raw(),
        data: [id_ptr(unit), id_ptr(ty + 1)],
    }
}

pub(crate) fn type_entry(ty: &CXType) -> Option<(usize, usize)> {
    let unit = ptr_id(ty.data[0]);
    let entry = ptr_id(ty.data[1]);
    if unit == 0 || entry == 0 {
        None
    } else {
        Some((unit, entry - 1))
    }
}

/// Locations carry the file handle and an offset; `ptr_data[1]` is an
/// arbitrary tag that comparisons must ignore.
pub(crate) fn location(unit: usize, offset: u32, tag: usize) -> CXSourceLocation {
    CXSourceLocation {
        ptr_data: [file_handle(unit), tag as *const c_void],
        int_data: offset,
    }
}

pub(crate) fn location_parts(location: &CXSourceLocation) -> Option<(usize, u32)> {
    file_unit(location.ptr_data[0]).map(|unit| (unit, location.int_data))
}

pub(crate) fn range(unit: usize, start: u32, end: u32) -> CXSourceRange {
    CXSourceRange {
        ptr_data: [file_handle(unit), std::ptr::null()],
        begin_int_data: start,
        end_int_data: end,
    }
}
