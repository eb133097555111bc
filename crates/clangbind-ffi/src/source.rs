//! Symbol lookup seam
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license

use std::fmt;
use std::os::raw::c_void;

/// Anything that can hand out native entry point addresses by symbol name
///
/// A dynamically loaded library is the production implementation; tests
/// provide in-process tables of `extern "C"` functions.
pub trait SymbolSource: Send + Sync + fmt::Debug {
    /// Human-readable origin, typically the path the library was loaded from
    fn origin(&self) -> String;

    /// Address of `symbol`, or `None` when it is not exported
    ///
    /// # Safety
    /// The returned address must point to a function whose ABI matches the
    /// declaration of the same name in [`crate::signatures`], and must stay
    /// valid for as long as this source is alive.
    unsafe fn lookup(&self, symbol: &str) -> Option<*const c_void>;
}
