//! Scoped ownership of natively allocated buffers
//!
//! Copyright (c) 2025 Specado Team
//! Licensed under the Apache-2.0 license
//!
//! The native library hands out strings and token arrays that the caller
//! must release with a matching dispose call. The guards here copy the
//! contents into host-owned values and release the native buffer when they
//! go out of scope, so the buffer is freed on every path including errors.

use std::ffi::CStr;
use std::os::raw::{c_char, c_uint};

use clangbind_ffi::{signatures, CXString, CXToken, CXTranslationUnit};

use crate::error::{Error, Result};
use crate::library::Library;

/// Natively owned text, released exactly once on drop
pub(crate) struct NativeString {
    raw: CXString,
    get: signatures::clang_getCString,
    dispose: signatures::clang_disposeString,
}

impl NativeString {
    /// Resolve the accessor and dispose entry points, then run `produce`
    ///
    /// The entry points are resolved first so a version gap can never
    /// strand a buffer that has already been produced.
    pub(crate) fn acquire(library: &Library, produce: impl FnOnce() -> Result<CXString>) -> Result<NativeString> {
        let get = native!(library, clang_getCString);
        let dispose = native!(library, clang_disposeString);
        let raw = produce()?;
        Ok(NativeString::from_raw(raw, get, dispose))
    }

    /// Take ownership of a string produced with already resolved entry points
    pub(crate) fn from_raw(
        raw: CXString,
        get: signatures::clang_getCString,
        dispose: signatures::clang_disposeString,
    ) -> NativeString {
        NativeString { raw, get, dispose }
    }

    /// Copy of the bytes, without the terminator
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        // SAFETY: `raw` came from the library that `get` belongs to and has
        // not been released yet.
        let text: *const c_char = unsafe { (self.get)(self.raw) };
        if text.is_null() {
            return Vec::new();
        }
        // SAFETY: non-null results are NUL terminated and live until dispose
        unsafe { CStr::from_ptr(text) }.to_bytes().to_vec()
    }

    /// Copy out as UTF-8, releasing the native buffer first
    pub(crate) fn into_string(self, context: &'static str) -> Result<String> {
        let bytes = self.to_bytes();
        drop(self);
        String::from_utf8(bytes).map_err(|e| Error::InvalidText {
            context,
            source: e.utf8_error(),
        })
    }
}

impl Drop for NativeString {
    fn drop(&mut self) {
        // SAFETY: each guard owns exactly one buffer and drops once
        unsafe { (self.dispose)(self.raw) }
    }
}

/// Produce, convert and release a native string in one step
pub(crate) fn text(library: &Library, context: &'static str, produce: impl FnOnce() -> Result<CXString>) -> Result<String> {
    NativeString::acquire(library, produce)?.into_string(context)
}

/// Produce and copy a native string without UTF-8 validation
pub(crate) fn bytes(library: &Library, produce: impl FnOnce() -> Result<CXString>) -> Result<Vec<u8>> {
    Ok(NativeString::acquire(library, produce)?.to_bytes())
}

/// Natively allocated token array, released on drop
pub(crate) struct TokenBuffer {
    unit: CXTranslationUnit,
    tokens: *mut CXToken,
    count: c_uint,
    dispose: signatures::clang_disposeTokens,
}

impl TokenBuffer {
    /// Run `clang_tokenize` through `produce` with the dispose entry point
    /// already resolved
    pub(crate) fn acquire(
        library: &Library,
        unit: CXTranslationUnit,
        produce: impl FnOnce(*mut *mut CXToken, *mut c_uint) -> Result<()>,
    ) -> Result<TokenBuffer> {
        let dispose = native!(library, clang_disposeTokens);
        let mut buffer = TokenBuffer {
            unit,
            tokens: std::ptr::null_mut(),
            count: 0,
            dispose,
        };
        produce(&mut buffer.tokens, &mut buffer.count)?;
        Ok(buffer)
    }

    /// Copies of the token payloads
    pub(crate) fn to_vec(&self) -> Vec<CXToken> {
        if self.tokens.is_null() || self.count == 0 {
            return Vec::new();
        }
        // SAFETY: the library reported `count` tokens at `tokens`
        unsafe { std::slice::from_raw_parts(self.tokens, self.count as usize) }.to_vec()
    }
}

impl Drop for TokenBuffer {
    fn drop(&mut self) {
        if !self.tokens.is_null() {
            // SAFETY: releases the array exactly as it was reported
            unsafe { (self.dispose)(self.unit, self.tokens, self.count) }
        } else if self.count > 0 {
            log::error!(
                "clang_tokenize reported {} tokens without an array; nothing to release",
                self.count
            );
        }
    }
}
