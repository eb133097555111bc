//! Diagnostics reported while parsing
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license

use std::fmt;
use std::hash::{Hash, Hasher};
use std::os::raw::c_uint;
use std::rc::Rc;

use clangbind_ffi::{signatures, CXDiagnostic, Severity};
use tracing::trace;

use crate::error::{Error, Result};
use crate::location::SourceLocation;
use crate::string;
use crate::unit::UnitRef;

const OBJECT: &str = "diagnostic";

/// Show `file:line:` before the message
pub const DISPLAY_SOURCE_LOCATION: u32 = 0x01;
/// Add the column to the location
pub const DISPLAY_COLUMN: u32 = 0x02;
/// Add the source ranges the diagnostic refers to
pub const DISPLAY_SOURCE_RANGES: u32 = 0x04;
/// Add the warning option that enabled the diagnostic
pub const DISPLAY_OPTION: u32 = 0x08;
/// Add the diagnostic category id
pub const DISPLAY_CATEGORY_ID: u32 = 0x10;
/// Add the diagnostic category name
pub const DISPLAY_CATEGORY_NAME: u32 = 0x20;

/// A warning, error or note attached to a translation unit
///
/// Owns its native handle. The handle is released on drop, or together
/// with the translation unit if that goes first.
pub struct Diagnostic {
    unit: UnitRef,
    raw: CXDiagnostic,
    index: u32,
    dispose: signatures::clang_disposeDiagnostic,
}

impl Diagnostic {
    fn raw(&self) -> Result<CXDiagnostic> {
        self.unit.ensure_alive(OBJECT)?;
        Ok(self.raw)
    }

    /// Position in the unit's diagnostic list
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn severity(&self) -> Result<Severity> {
        let raw = self.raw()?;
        let severity = native!(self.unit.library(), clang_getDiagnosticSeverity);
        // SAFETY: live diagnostic handle
        Ok(Severity(unsafe { severity(raw) }))
    }

    /// Message text without location or severity
    pub fn spelling(&self) -> Result<String> {
        let raw = self.raw()?;
        let library = self.unit.library();
        string::text(library, "diagnostic spelling", || {
            let spelling = native!(library, clang_getDiagnosticSpelling);
            // SAFETY: live diagnostic handle
            Ok(unsafe { spelling(raw) })
        })
    }

    /// Formatted with the native library's default display options
    pub fn format(&self) -> Result<String> {
        self.raw()?;
        let defaults = native!(self.unit.library(), clang_defaultDiagnosticDisplayOptions);
        // SAFETY: no arguments
        let options = unsafe { defaults() };
        self.format_with(options)
    }

    /// Formatted with an explicit combination of the `DISPLAY_*` flags
    pub fn format_with(&self, options: u32) -> Result<String> {
        let raw = self.raw()?;
        let library = self.unit.library();
        string::text(library, "formatted diagnostic", || {
            let format = native!(library, clang_formatDiagnostic);
            // SAFETY: live diagnostic handle
            Ok(unsafe { format(raw, options as c_uint) })
        })
    }

    pub fn location(&self) -> Result<SourceLocation> {
        let raw = self.raw()?;
        let location = native!(self.unit.library(), clang_getDiagnosticLocation);
        // SAFETY: live diagnostic handle
        Ok(SourceLocation::in_unit(self.unit.clone(), unsafe { location(raw) }))
    }
}

impl Drop for Diagnostic {
    fn drop(&mut self) {
        // A disposed or reparsed unit has already taken its diagnostics with it
        if !self.unit.is_disposed() {
            // SAFETY: each wrapper owns a distinct handle
            unsafe { (self.dispose)(self.raw) }
        }
    }
}

impl PartialEq for Diagnostic {
    fn eq(&self, other: &Diagnostic) -> bool {
        self.unit.same_parse(&other.unit) && self.index == other.index
    }
}

impl Eq for Diagnostic {}

impl Hash for Diagnostic {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Rc::as_ptr(self.unit.inner()).hash(state);
        self.unit.generation().hash(state);
        self.index.hash(state);
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.format() {
            Ok(text) => f.write_str(&text),
            Err(e) => write!(f, "<{}>", e),
        }
    }
}

impl fmt::Debug for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Diagnostic");
        debug.field("index", &self.index);
        if let Ok(severity) = self.severity() {
            debug.field("severity", &severity);
        }
        if let Ok(spelling) = self.spelling() {
            debug.field("spelling", &spelling);
        }
        debug.finish()
    }
}

/// Diagnostics of a translation unit, in reporting order
///
/// Yields one [`Error::UseAfterDispose`] or [`Error::Stale`] if the unit is
/// disposed or reparsed part way through, then ends.
pub struct Diagnostics {
    unit: UnitRef,
    next: u32,
    count: u32,
    get: signatures::clang_getDiagnostic,
    dispose: signatures::clang_disposeDiagnostic,
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("next", &self.next)
            .field("count", &self.count)
            .finish()
    }
}

impl Diagnostics {
    pub(crate) fn new(unit: UnitRef) -> Result<Diagnostics> {
        let raw = unit.raw("translation unit")?;
        let library = unit.library();
        let count = native!(library, clang_getNumDiagnostics);
        let get = native!(library, clang_getDiagnostic);
        let dispose = native!(library, clang_disposeDiagnostic);
        // SAFETY: live unit handle
        let count = unsafe { count(raw) };
        trace!(count, "diagnostics");
        Ok(Diagnostics {
            unit,
            next: 0,
            count,
            get,
            dispose,
        })
    }

    fn finish(&mut self) {
        self.next = self.count;
    }
}

impl Iterator for Diagnostics {
    type Item = Result<Diagnostic>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let raw_unit = match self.unit.raw(OBJECT) {
            Ok(raw) => raw,
            Err(e) => {
                self.finish();
                return Some(Err(e));
            }
        };
        let index = self.next;
        self.next += 1;
        // SAFETY: index is below the count reported for this unit
        let raw = unsafe { (self.get)(raw_unit, index) };
        if raw.is_null() {
            self.finish();
            return Some(Err(Error::internal(format!("diagnostic {} of {} missing", index, self.count))));
        }
        Some(Ok(Diagnostic {
            unit: self.unit.clone(),
            raw,
            index,
            dispose: self.dispose,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some((self.count - self.next) as usize))
    }
}

impl std::iter::FusedIterator for Diagnostics {}
