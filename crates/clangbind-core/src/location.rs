//! Source locations, ranges and files
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license

use std::fmt;
use std::hash::{Hash, Hasher};
use std::os::raw::c_uint;

use chrono::{DateTime, Utc};
use clangbind_ffi::{CXFile, CXFileUniqueID, CXSourceLocation, CXSourceRange, Function};

use crate::error::{Error, Result};
use crate::library::Library;
use crate::string;
use crate::unit::UnitRef;

/// What keeps a location or range valid
///
/// Null locations and ranges belong to no translation unit and only need
/// the library.
#[derive(Clone)]
enum Owner {
    Library(Library),
    Unit(UnitRef),
}

impl Owner {
    fn library(&self) -> &Library {
        match self {
            Owner::Library(library) => library,
            Owner::Unit(unit) => unit.library(),
        }
    }

    fn ensure_alive(&self, object: &'static str) -> Result<()> {
        match self {
            Owner::Library(_) => Ok(()),
            Owner::Unit(unit) => unit.ensure_alive(object),
        }
    }

    fn is_disposed(&self) -> bool {
        matches!(self, Owner::Unit(unit) if unit.is_disposed())
    }
}

/// A file position resolved from a [`SourceLocation`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// `None` for the null location
    pub file: Option<File>,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

/// A point in the source
///
/// # Panics
///
/// `==` and hashing panic once the translation unit is disposed or reparsed.
#[derive(Clone)]
pub struct SourceLocation {
    owner: Owner,
    raw: CXSourceLocation,
}

impl SourceLocation {
    pub(crate) fn in_unit(unit: UnitRef, raw: CXSourceLocation) -> Self {
        Self {
            owner: Owner::Unit(unit),
            raw,
        }
    }

    /// The location that refers to nothing
    pub fn null(library: &Library) -> Result<SourceLocation> {
        let null = native!(library, clang_getNullLocation);
        Ok(SourceLocation {
            owner: Owner::Library(library.clone()),
            // SAFETY: no arguments
            raw: unsafe { null() },
        })
    }

    pub(crate) fn raw(&self) -> Result<CXSourceLocation> {
        self.owner.ensure_alive("source location")?;
        Ok(self.raw)
    }

    /// Where the location ends up after macro expansion
    pub fn expansion(&self) -> Result<Position> {
        let library = self.owner.library();
        if library.supports(Function::clang_getExpansionLocation) {
            let expansion = native!(library, clang_getExpansionLocation);
            self.decompose(expansion)
        } else {
            let instantiation = native!(library, clang_getInstantiationLocation);
            self.decompose(instantiation)
        }
    }

    /// Where the characters of the location are spelled
    pub fn spelling(&self) -> Result<Position> {
        let spelling = native!(self.owner.library(), clang_getSpellingLocation);
        self.decompose(spelling)
    }

    fn decompose(
        &self,
        entry: unsafe extern "C" fn(CXSourceLocation, *mut CXFile, *mut c_uint, *mut c_uint, *mut c_uint),
    ) -> Result<Position> {
        let raw = self.raw()?;
        let (mut file, mut line, mut column, mut offset): (CXFile, c_uint, c_uint, c_uint) =
            (std::ptr::null_mut(), 0, 0, 0);
        // SAFETY: out-pointers reference locals
        unsafe { entry(raw, &mut file, &mut line, &mut column, &mut offset) };

        let file = match &self.owner {
            Owner::Unit(unit) => File::new(unit.clone(), file),
            Owner::Library(_) => None,
        };
        Ok(Position {
            file,
            line,
            column,
            offset,
        })
    }

    pub fn file(&self) -> Result<Option<File>> {
        Ok(self.expansion()?.file)
    }

    /// 1-based line
    pub fn line(&self) -> Result<u32> {
        Ok(self.expansion()?.line)
    }

    /// 1-based column
    pub fn column(&self) -> Result<u32> {
        Ok(self.expansion()?.column)
    }

    /// Byte offset into the file
    pub fn offset(&self) -> Result<u32> {
        Ok(self.expansion()?.offset)
    }

    /// Whether this is the null location
    pub fn is_null(&self) -> Result<bool> {
        self.try_eq(&SourceLocation::null(self.owner.library())?)
    }

    /// Native equality
    pub fn try_eq(&self, other: &SourceLocation) -> Result<bool> {
        let (a, b) = (self.raw()?, other.raw()?);
        let equal = native!(self.owner.library(), clang_equalLocations);
        // SAFETY: locations of live units
        Ok(unsafe { equal(a, b) } != 0)
    }

    fn try_hash(&self) -> Result<(u32, u32, u32)> {
        let position = self.expansion()?;
        Ok((position.line, position.column, position.offset))
    }
}

impl PartialEq for SourceLocation {
    fn eq(&self, other: &SourceLocation) -> bool {
        self.try_eq(other).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Eq for SourceLocation {}

impl Hash for SourceLocation {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.try_hash().unwrap_or_else(|e| panic!("{}", e)).hash(state);
    }
}

impl fmt::Debug for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.owner.is_disposed() {
            return f.write_str("SourceLocation(<disposed>)");
        }
        match self.expansion() {
            Ok(position) => write!(
                f,
                "SourceLocation({}:{}:{})",
                position.file.map(|file| file.to_string()).unwrap_or_default(),
                position.line,
                position.column
            ),
            Err(_) => f.write_str("SourceLocation(?)"),
        }
    }
}

/// A half-open span of source between two locations
///
/// # Panics
///
/// `==` and hashing panic once the translation unit is disposed or reparsed.
#[derive(Clone)]
pub struct SourceRange {
    owner: Owner,
    raw: CXSourceRange,
}

impl SourceRange {
    pub(crate) fn in_unit(unit: UnitRef, raw: CXSourceRange) -> Self {
        Self {
            owner: Owner::Unit(unit),
            raw,
        }
    }

    /// The range that covers nothing
    pub fn null(library: &Library) -> Result<SourceRange> {
        let null = native!(library, clang_getNullRange);
        Ok(SourceRange {
            owner: Owner::Library(library.clone()),
            // SAFETY: no arguments
            raw: unsafe { null() },
        })
    }

    /// Range from `start` to `end`
    pub fn new(start: &SourceLocation, end: &SourceLocation) -> Result<SourceRange> {
        let (begin, finish) = (start.raw()?, end.raw()?);
        let range = native!(start.owner.library(), clang_getRange);
        Ok(SourceRange {
            owner: start.owner.clone(),
            // SAFETY: locations of live units
            raw: unsafe { range(begin, finish) },
        })
    }

    pub(crate) fn raw(&self) -> Result<CXSourceRange> {
        self.owner.ensure_alive("source range")?;
        Ok(self.raw)
    }

    pub fn start(&self) -> Result<SourceLocation> {
        let raw = self.raw()?;
        let start = native!(self.owner.library(), clang_getRangeStart);
        Ok(SourceLocation {
            owner: self.owner.clone(),
            // SAFETY: range of a live unit
            raw: unsafe { start(raw) },
        })
    }

    pub fn end(&self) -> Result<SourceLocation> {
        let raw = self.raw()?;
        let end = native!(self.owner.library(), clang_getRangeEnd);
        Ok(SourceLocation {
            owner: self.owner.clone(),
            // SAFETY: range of a live unit
            raw: unsafe { end(raw) },
        })
    }

    /// Native equality; compares both ends on libraries older than 3.0
    pub fn try_eq(&self, other: &SourceRange) -> Result<bool> {
        let library = self.owner.library();
        if !library.supports(Function::clang_equalRanges) {
            return Ok(self.start()?.try_eq(&other.start()?)? && self.end()?.try_eq(&other.end()?)?);
        }
        let (a, b) = (self.raw()?, other.raw()?);
        let equal = native!(library, clang_equalRanges);
        // SAFETY: ranges of live units
        Ok(unsafe { equal(a, b) } != 0)
    }
}

impl PartialEq for SourceRange {
    fn eq(&self, other: &SourceRange) -> bool {
        self.try_eq(other).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Eq for SourceRange {}

impl Hash for SourceRange {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let ends = self.start().and_then(|start| Ok((start, self.end()?)));
        let (start, end) = ends.unwrap_or_else(|e| panic!("{}", e));
        start.hash(state);
        end.hash(state);
    }
}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.owner.is_disposed() {
            return f.write_str("SourceRange(<disposed>)");
        }
        match (self.start(), self.end()) {
            (Ok(start), Ok(end)) => f.debug_tuple("SourceRange").field(&start).field(&end).finish(),
            _ => f.write_str("SourceRange(?)"),
        }
    }
}

/// A file taking part in a translation unit
///
/// # Panics
///
/// `==` and hashing panic once the translation unit is disposed or reparsed.
#[derive(Clone)]
pub struct File {
    unit: UnitRef,
    raw: CXFile,
}

impl File {
    /// `None` for the null handle
    pub(crate) fn new(unit: UnitRef, raw: CXFile) -> Option<File> {
        if raw.is_null() {
            None
        } else {
            Some(File { unit, raw })
        }
    }

    pub(crate) fn raw(&self) -> Result<CXFile> {
        self.unit.ensure_alive("file")?;
        Ok(self.raw)
    }

    fn name_bytes(&self) -> Result<Vec<u8>> {
        let raw = self.raw()?;
        let library = self.unit.library();
        string::bytes(library, || {
            let name = native!(library, clang_getFileName);
            // SAFETY: file of a live unit
            Ok(unsafe { name(raw) })
        })
    }

    /// Path of the file as given to the parser
    pub fn name(&self) -> Result<String> {
        let raw = self.raw()?;
        let library = self.unit.library();
        string::text(library, "file name", || {
            let name = native!(library, clang_getFileName);
            // SAFETY: file of a live unit
            Ok(unsafe { name(raw) })
        })
    }

    /// Last modification time
    pub fn time(&self) -> Result<DateTime<Utc>> {
        let raw = self.raw()?;
        let time = native!(self.unit.library(), clang_getFileTime);
        // SAFETY: file of a live unit
        let seconds = unsafe { time(raw) };
        DateTime::from_timestamp(seconds, 0).ok_or_else(|| Error::internal(format!("file time {} out of range", seconds)))
    }

    /// Identity of the file on disk, independent of how its path was spelled
    ///
    /// `None` when the native library cannot determine it.
    pub fn unique_id(&self) -> Result<Option<[u64; 3]>> {
        let raw = self.raw()?;
        let unique_id = native!(self.unit.library(), clang_getFileUniqueID);
        let mut id = CXFileUniqueID::default();
        // SAFETY: file of a live unit; `id` outlives the call
        let failed = unsafe { unique_id(raw, &mut id) } != 0;
        Ok(if failed { None } else { Some(id.data) })
    }

    /// Native file equality; handle identity on libraries older than 3.6
    pub fn try_eq(&self, other: &File) -> Result<bool> {
        let (a, b) = (self.raw()?, other.raw()?);
        let library = self.unit.library();
        if !library.supports(Function::clang_File_isEqual) {
            return Ok(a == b);
        }
        let equal = native!(library, clang_File_isEqual);
        // SAFETY: files of live units
        Ok(unsafe { equal(a, b) } != 0)
    }
}

impl PartialEq for File {
    fn eq(&self, other: &File) -> bool {
        self.try_eq(other).unwrap_or_else(|e| panic!("{}", e))
    }
}

impl Eq for File {}

impl Hash for File {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Follows `try_eq`: native equality compares unique ids, the
        // fallback compares handles
        let raw = self.raw().unwrap_or_else(|e| panic!("{}", e));
        if self.unit.library().supports(Function::clang_File_isEqual) {
            self.unique_id().unwrap_or_else(|e| panic!("{}", e)).hash(state);
        } else {
            (raw as usize).hash(state);
        }
    }
}

impl fmt::Display for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name_bytes() {
            Ok(name) => f.write_str(&String::from_utf8_lossy(&name)),
            Err(_) => f.write_str("<disposed file>"),
        }
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IndexOptions, ParseOptions};
    use crate::index::{Index, UnsavedFile};
    use crate::unit::TranslationUnit;
    use clangbind_stub::StubLibrary;

    // `second` is at offset 12 on line 3, `third` at offset 24 on line 4
    const SOURCE: &str = "int first;\n\nint second;\nint third;\n";

    fn unit_with(stub: StubLibrary) -> (Index, TranslationUnit) {
        clangbind_stub::reset();
        let library = Library::from_source(stub.into_source(), None).unwrap();
        let index = Index::with_library(&library, IndexOptions::default()).unwrap();
        let unit = index
            .parse(Some("loc.c"), &[], &[UnsavedFile::new("loc.c", SOURCE)], ParseOptions::NONE)
            .unwrap();
        (index, unit)
    }

    #[test]
    fn test_null_location() {
        let (_index, unit) = unit_with(StubLibrary::new());
        let null = SourceLocation::null(unit.library()).unwrap();
        assert!(null.is_null().unwrap());
        assert_eq!(null.file().unwrap(), None);
        assert_eq!(null.line().unwrap(), 0);
        assert_eq!(null.column().unwrap(), 0);
        assert_eq!(null.offset().unwrap(), 0);
        assert_eq!(null, SourceLocation::null(unit.library()).unwrap());
    }

    #[test]
    fn test_cursor_location() {
        let (_index, unit) = unit_with(StubLibrary::new());
        let third = unit.cursor().unwrap().children().unwrap().nth(2).unwrap();
        let location = third.location().unwrap();
        assert_eq!(location.file().unwrap().unwrap().name().unwrap(), "loc.c");
        assert_eq!((location.line().unwrap(), location.column().unwrap()), (4, 5));
        assert_eq!(location.spelling().unwrap(), location.expansion().unwrap());
        assert!(!location.is_null().unwrap());
    }

    #[test]
    fn test_instantiation_fallback() {
        let (_index, unit) = unit_with(StubLibrary::new().with_version(2, 9));
        let second = unit.cursor().unwrap().children().unwrap().nth(1).unwrap();
        let position = second.location().unwrap().expansion().unwrap();
        assert_eq!((position.line, position.column), (3, 5));
    }

    #[test]
    fn test_ranges() {
        let (_index, unit) = unit_with(StubLibrary::new());
        let first = unit.cursor().unwrap().children().unwrap().next().unwrap();
        let extent = first.extent().unwrap();
        assert_eq!(extent.start().unwrap().offset().unwrap(), 0);
        assert_eq!(extent.end().unwrap().offset().unwrap(), 10);

        let rebuilt = SourceRange::new(&extent.start().unwrap(), &extent.end().unwrap()).unwrap();
        assert_eq!(rebuilt, extent);

        let null = SourceRange::null(unit.library()).unwrap();
        assert_ne!(null, extent);
        assert!(null.start().unwrap().is_null().unwrap());
    }

    #[test]
    fn test_range_equality_without_native_comparison() {
        let (_index, unit) = unit_with(StubLibrary::new().with_version(2, 9));
        let first = unit.cursor().unwrap().children().unwrap().next().unwrap();
        let extent = first.extent().unwrap();
        let rebuilt = SourceRange::new(&extent.start().unwrap(), &extent.end().unwrap()).unwrap();
        assert!(rebuilt.try_eq(&extent).unwrap());
        let second = unit.cursor().unwrap().children().unwrap().nth(1).unwrap();
        assert!(!second.extent().unwrap().try_eq(&extent).unwrap());
    }

    #[test]
    fn test_file_identity_and_time() {
        let (_index, unit) = unit_with(StubLibrary::new());
        let a = unit.file("loc.c").unwrap().unwrap();
        let b = unit
            .cursor()
            .unwrap()
            .children()
            .unwrap()
            .next()
            .unwrap()
            .location()
            .unwrap()
            .file()
            .unwrap()
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "loc.c");
        assert_eq!(a.time().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_file_identity_without_native_comparison() {
        let (_index, unit) = unit_with(StubLibrary::new().with_version(3, 5));
        let a = unit.file("loc.c").unwrap().unwrap();
        let b = unit.file("loc.c").unwrap().unwrap();
        assert!(a.try_eq(&b).unwrap());
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    fn hash_of(value: &impl Hash) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_file_hash_follows_unique_id() {
        let (_index, unit) = unit_with(StubLibrary::new());
        let a = unit.file("loc.c").unwrap().unwrap();
        let first = unit.cursor().unwrap().children().unwrap().next().unwrap();
        let b = first.location().unwrap().file().unwrap().unwrap();
        let id = a.unique_id().unwrap().expect("unique id");
        assert_eq!(b.unique_id().unwrap(), Some(id));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let files: std::collections::HashSet<File> = [a, b].into_iter().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_unique_id_needs_newer_library() {
        let (_index, unit) = unit_with(StubLibrary::new().with_version(3, 2));
        let file = unit.file("loc.c").unwrap().unwrap();
        assert!(file.unique_id().unwrap_err().is_missing_function());
        // handle identity still hashes without it
        assert_eq!(hash_of(&file), hash_of(&file.clone()));
    }
}
