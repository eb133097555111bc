//! Native library loading, version resolution and the function registry
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! A [`Library`] is a loaded native library together with the version it
//! reports. Entry points are resolved through [`Library::resolve`], which
//! refuses anything introduced after that version and caches every lookup
//! for the lifetime of the library.
//!
//! Libraries are explicit values. For callers that prefer a single global
//! library, [`load`] installs one as the process-wide active library and
//! [`active`] returns it.

use std::collections::HashMap;
use std::fmt;
use std::os::raw::c_void;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clangbind_ffi::{signatures, Function, LibraryVersion, SymbolSource};
use tracing::{debug, info, trace};

use crate::config::LoadOptions;
use crate::error::{Error, Result};
use crate::string::NativeString;

/// Resolve `$name` on `$library` as its declared signature
///
/// Returns early from the enclosing function with the resolution error.
macro_rules! native {
    ($library:expr, $name:ident) => {{
        let address = $library.resolve(::clangbind_ffi::Function::$name)?;
        // SAFETY: `resolve` only hands out the address exported for this
        // symbol, and the alias is its declared signature.
        unsafe {
            ::std::mem::transmute::<*const ::std::os::raw::c_void, ::clangbind_ffi::signatures::$name>(address)
        }
    }};
}

/// A loaded native library and its reported version
///
/// Cloning is cheap and shares the symbol cache. The library stays mapped
/// until the last clone, and every wrapper created through it, is dropped.
#[derive(Clone)]
pub struct Library {
    inner: Arc<LibraryInner>,
}

struct LibraryInner {
    source: Box<dyn SymbolSource>,
    version: LibraryVersion,
    path: Option<PathBuf>,
    cache: Mutex<HashMap<Function, Option<usize>>>,
}

/// Symbols looked up in a library opened by the system loader
#[derive(Debug)]
struct DynamicSource {
    path: PathBuf,
    library: libloading::Library,
}

impl SymbolSource for DynamicSource {
    fn origin(&self) -> String {
        self.path.display().to_string()
    }

    unsafe fn lookup(&self, symbol: &str) -> Option<*const c_void> {
        let symbol: libloading::Symbol<'_, *const c_void> = self.library.get(symbol.as_bytes()).ok()?;
        Some(*symbol)
    }
}

impl Library {
    /// Locate and load the native library described by `options`
    ///
    /// An explicit `path` must exist: a missing file fails with
    /// [`Error::LibraryNotFound`] without consulting the default search.
    /// A file that exists but cannot be opened fails with
    /// [`Error::LibraryLoad`].
    pub fn load(options: &LoadOptions) -> Result<Library> {
        let names = options.file_names();

        let (path, library) = match &options.path {
            Some(explicit) => open_explicit(explicit, &names)?,
            None => open_default(&names)?,
        };
        debug!(path = %path.display(), "opened native library");

        let source = Box::new(DynamicSource {
            path: path.clone(),
            library,
        });
        let loaded = Library::build(source, options.assume_version, Some(path))?;
        info!(
            path = %loaded.origin(),
            version = %loaded.version(),
            "loaded libclang"
        );
        Ok(loaded)
    }

    /// Build a library over any symbol source
    ///
    /// The version is read from `clang_getClangVersion` when the source
    /// exports it; otherwise `assume_version` is used, and failing that the
    /// oldest supported release.
    pub fn from_source(source: Box<dyn SymbolSource>, assume_version: Option<LibraryVersion>) -> Result<Library> {
        Library::build(source, assume_version, None)
    }

    fn build(source: Box<dyn SymbolSource>, assume_version: Option<LibraryVersion>, path: Option<PathBuf>) -> Result<Library> {
        let version = match query_version(source.as_ref())? {
            Some(version) => version,
            None => {
                let fallback = assume_version.unwrap_or(LibraryVersion::FLOOR);
                debug!(version = %fallback, "library reports no version; assuming");
                fallback
            }
        };

        Ok(Library {
            inner: Arc::new(LibraryInner {
                source,
                version,
                path,
                cache: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Version the library reported (or was assumed to have)
    pub fn version(&self) -> LibraryVersion {
        self.inner.version
    }

    /// File the library was loaded from, when it came from disk
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Human-readable origin of the symbols
    pub fn origin(&self) -> String {
        self.inner.source.origin()
    }

    /// Address of the entry point for `function`
    ///
    /// Fails with [`Error::MissingFunction`] when the loaded version predates
    /// the entry point or the library does not export it. Both outcomes are
    /// cached.
    pub fn resolve(&self, function: Function) -> Result<*const c_void> {
        if function.min_version() > self.inner.version {
            return Err(self.missing(function));
        }

        let mut cache = self
            .inner
            .cache
            .lock()
            .map_err(|_| Error::internal("symbol cache lock poisoned"))?;
        let address = match cache.get(&function) {
            Some(cached) => *cached,
            None => {
                // SAFETY: the address is only reinterpreted as the signature
                // declared for the same symbol.
                let found = unsafe { self.inner.source.lookup(function.symbol()) }.map(|a| a as usize);
                trace!(symbol = function.symbol(), found = found.is_some(), "resolved entry point");
                cache.insert(function, found);
                found
            }
        };

        address
            .map(|a| a as *const c_void)
            .ok_or_else(|| self.missing(function))
    }

    /// Whether `function` can be resolved, without reporting why not
    pub fn supports(&self, function: Function) -> bool {
        self.resolve(function).is_ok()
    }

    fn missing(&self, function: Function) -> Error {
        Error::MissingFunction {
            function,
            min_version: function.min_version(),
            loaded_version: self.inner.version,
        }
    }

    /// Whether two handles share one loaded library
    pub fn ptr_eq(&self, other: &Library) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Library {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Library")
            .field("origin", &self.origin())
            .field("version", &self.inner.version)
            .finish()
    }
}

/// Ask the source for its version banner
///
/// Runs before a [`Library`] exists, so entry points come straight from the
/// source. `clang_getClangVersion` predates every other entry point we use
/// and needs no version check.
fn query_version(source: &dyn SymbolSource) -> Result<Option<LibraryVersion>> {
    // SAFETY: each address is reinterpreted as the signature declared for it
    let (query, get, dispose) = unsafe {
        let lookup = |function: Function| source.lookup(function.symbol());
        match (
            lookup(Function::clang_getClangVersion),
            lookup(Function::clang_getCString),
            lookup(Function::clang_disposeString),
        ) {
            (Some(query), Some(get), Some(dispose)) => (
                std::mem::transmute::<*const c_void, signatures::clang_getClangVersion>(query),
                std::mem::transmute::<*const c_void, signatures::clang_getCString>(get),
                std::mem::transmute::<*const c_void, signatures::clang_disposeString>(dispose),
            ),
            _ => return Ok(None),
        }
    };

    // SAFETY: no arguments; the result is owned by the guard
    let banner = NativeString::from_raw(unsafe { query() }, get, dispose).into_string("version banner")?;
    match LibraryVersion::from_banner(&banner) {
        Ok(version) => Ok(Some(version)),
        Err(e) => {
            log::warn!("Could not read a version from '{}': {}", banner, e);
            Ok(None)
        }
    }
}

fn open(path: &Path) -> Result<libloading::Library> {
    // SAFETY: loading runs the library's initialisers; libclang has no
    // initialisers with preconditions on the host.
    unsafe { libloading::Library::new(path) }.map_err(|source| Error::LibraryLoad {
        path: path.to_path_buf(),
        source,
    })
}

fn open_explicit(explicit: &Path, names: &[String]) -> Result<(PathBuf, libloading::Library)> {
    let candidates: Vec<PathBuf> = if explicit.is_dir() {
        names.iter().map(|name| explicit.join(name)).collect()
    } else {
        vec![explicit.to_path_buf()]
    };

    match candidates.iter().find(|c| c.is_file()) {
        Some(path) => Ok((path.clone(), open(path)?)),
        None => Err(Error::LibraryNotFound { searched: candidates }),
    }
}

fn open_default(names: &[String]) -> Result<(PathBuf, libloading::Library)> {
    let mut searched = Vec::new();
    let mut first_failure = None;

    for dir in search_dirs() {
        for name in names {
            let candidate = dir.join(name);
            if !candidate.is_file() {
                searched.push(candidate);
                continue;
            }
            match open(&candidate) {
                Ok(library) => return Ok((candidate, library)),
                Err(e) => {
                    debug!(path = %candidate.display(), error = %e, "candidate rejected");
                    first_failure.get_or_insert(e);
                    searched.push(candidate);
                }
            }
        }
    }

    // Last resort: let the system loader apply its own search rules
    for name in names {
        // SAFETY: as in `open`
        if let Ok(library) = unsafe { libloading::Library::new(name) } {
            return Ok((PathBuf::from(name), library));
        }
    }

    Err(first_failure.unwrap_or(Error::LibraryNotFound { searched }))
}

/// Directories searched when no explicit path is configured
pub fn search_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(env) = std::env::var_os(crate::config::ENV_LIBRARY_PATH) {
        dirs.extend(std::env::split_paths(&env));
    }

    if cfg!(target_os = "macos") {
        dirs.push(PathBuf::from(
            "/Applications/Xcode.app/Contents/Developer/Toolchains/XcodeDefault.xctoolchain/usr/lib",
        ));
        dirs.push(PathBuf::from("/Library/Developer/CommandLineTools/usr/lib"));
        dirs.push(PathBuf::from("/opt/homebrew/opt/llvm/lib"));
        dirs.push(PathBuf::from("/usr/local/opt/llvm/lib"));
    } else if cfg!(windows) {
        dirs.push(PathBuf::from(r"C:\Program Files\LLVM\bin"));
    } else {
        dirs.push(PathBuf::from("/usr/lib"));
        dirs.push(PathBuf::from("/usr/local/lib"));
        dirs.push(PathBuf::from("/usr/lib64"));
        dirs.push(PathBuf::from(format!(
            "/usr/lib/{}-linux-gnu",
            std::env::consts::ARCH
        )));
        dirs.extend(llvm_install_dirs(Path::new("/usr/lib")));
    }
    dirs
}

/// `<root>/llvm-*/lib`, newest release first
fn llvm_install_dirs(root: &Path) -> Vec<PathBuf> {
    let mut found: Vec<(LibraryVersion, PathBuf)> = std::fs::read_dir(root)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            let version = LibraryVersion::parse(name.strip_prefix("llvm-")?).ok()?;
            Some((version, entry.path().join("lib")))
        })
        .collect();
    found.sort_by(|a, b| b.0.cmp(&a.0));
    found.into_iter().map(|(_, dir)| dir).collect()
}

static ACTIVE: Mutex<Option<Library>> = Mutex::new(None);

/// Load a library and install it as the process-wide active library
///
/// Installing a second library while one is active fails with
/// [`Error::AlreadyLoaded`]; wrappers created through the first library
/// keep it alive regardless. Concurrent calls are serialized.
pub fn load(options: &LoadOptions) -> Result<Library> {
    let mut active = ACTIVE
        .lock()
        .map_err(|_| Error::internal("active library lock poisoned"))?;
    if let Some(existing) = active.as_ref() {
        return Err(Error::AlreadyLoaded {
            path: existing.origin(),
        });
    }
    let library = Library::load(options)?;
    *active = Some(library.clone());
    Ok(library)
}

/// Install an already-built library as the active library
pub fn install(library: Library) -> Result<()> {
    let mut active = ACTIVE
        .lock()
        .map_err(|_| Error::internal("active library lock poisoned"))?;
    if let Some(existing) = active.as_ref() {
        return Err(Error::AlreadyLoaded {
            path: existing.origin(),
        });
    }
    *active = Some(library);
    Ok(())
}

/// The process-wide active library
pub fn active() -> Result<Library> {
    let active = ACTIVE
        .lock()
        .map_err(|_| Error::internal("active library lock poisoned"))?;
    active.clone().ok_or_else(|| Error::Configuration {
        message: "no native library is active; call clangbind_core::load first".to_string(),
        source: None,
    })
}

/// Clear the active slot, returning the library that occupied it
///
/// The library itself stays loaded while any clone or wrapper still uses it.
pub fn unload() -> Option<Library> {
    ACTIVE.lock().ok().and_then(|mut active| active.take())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clangbind_stub::StubLibrary;

    #[test]
    fn test_version_from_banner() {
        clangbind_stub::reset();
        let lib = Library::from_source(StubLibrary::new().with_version(3, 4).into_source(), None).unwrap();
        assert_eq!(lib.version(), LibraryVersion::new(3, 4));
        assert_eq!(lib.path(), None);
        assert_eq!(clangbind_stub::counters().live_strings(), 0);
    }

    #[test]
    fn test_assumed_version_without_query() {
        let source = StubLibrary::new().without_version_query().into_source();
        let lib = Library::from_source(source, Some(LibraryVersion::new(2, 9))).unwrap();
        assert_eq!(lib.version(), LibraryVersion::new(2, 9));

        let source = StubLibrary::new().without_version_query().into_source();
        let lib = Library::from_source(source, None).unwrap();
        assert_eq!(lib.version(), LibraryVersion::FLOOR);
    }

    #[test]
    fn test_reported_version_beats_assumption() {
        let source = StubLibrary::new().with_version(15, 0).into_source();
        let lib = Library::from_source(source, Some(LibraryVersion::new(3, 0))).unwrap();
        assert_eq!(lib.version(), LibraryVersion::new(15, 0));
    }

    #[test]
    fn test_resolve_gates_on_version() {
        let lib = Library::from_source(StubLibrary::new().with_version(2, 8).into_source(), None).unwrap();
        assert!(lib.resolve(Function::clang_getCursorType).is_ok());

        match lib.resolve(Function::clang_getTypeSpelling) {
            Err(Error::MissingFunction {
                function,
                min_version,
                loaded_version,
            }) => {
                assert_eq!(function, Function::clang_getTypeSpelling);
                assert_eq!(min_version, LibraryVersion::new(3, 3));
                assert_eq!(loaded_version, LibraryVersion::new(2, 8));
            }
            other => panic!("expected MissingFunction, got {:?}", other),
        }
        assert!(!lib.supports(Function::clang_hashCursor));
        assert!(lib.supports(Function::clang_createIndex));
    }

    #[test]
    fn test_absent_symbol_is_missing_function() {
        let source = StubLibrary::new().without("clang_hashCursor").into_source();
        let lib = Library::from_source(source, None).unwrap();
        let err = lib.resolve(Function::clang_hashCursor).unwrap_err();
        assert!(err.is_missing_function());
        // cached miss answers the same way
        assert!(lib.resolve(Function::clang_hashCursor).unwrap_err().is_missing_function());
    }

    #[test]
    fn test_resolution_is_cached() {
        let lib = Library::from_source(StubLibrary::new().into_source(), None).unwrap();
        let first = lib.resolve(Function::clang_getCursorKind).unwrap();
        let second = lib.clone().resolve(Function::clang_getCursorKind).unwrap();
        assert_eq!(first, second);
        assert!(lib.ptr_eq(&lib.clone()));
    }

    #[test]
    fn test_explicit_missing_path_is_not_found() {
        let options = LoadOptions::with_path("/nonexistent/clangbind/libclang.so");
        match Library::load(&options) {
            Err(Error::LibraryNotFound { searched }) => {
                assert_eq!(searched, vec![PathBuf::from("/nonexistent/clangbind/libclang.so")]);
            }
            other => panic!("expected LibraryNotFound, got {:?}", other.map(|l| l.origin())),
        }
    }

    #[test]
    fn test_unloadable_file_is_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join(&LoadOptions::default().file_names()[0]);
        std::fs::write(&bogus, b"not a shared object").unwrap();

        let err = Library::load(&LoadOptions::with_path(dir.path())).unwrap_err();
        assert!(matches!(err, Error::LibraryLoad { ref path, .. } if path == &bogus), "{}", err);
    }

    #[test]
    fn test_llvm_install_dirs_sorted_newest_first() {
        let root = tempfile::tempdir().unwrap();
        for name in ["llvm-9", "llvm-14", "llvm-11.1", "gcc"] {
            std::fs::create_dir(root.path().join(name)).unwrap();
        }
        let dirs = llvm_install_dirs(root.path());
        assert_eq!(
            dirs,
            vec![
                root.path().join("llvm-14").join("lib"),
                root.path().join("llvm-11.1").join("lib"),
                root.path().join("llvm-9").join("lib"),
            ]
        );
    }
}
