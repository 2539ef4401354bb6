//! Typed, scoped wrappers around raw libclang handles.
//!
//! Everything unsafe lives here. Each owning wrapper releases its libclang
//! handle on drop, on every exit path; libclang-owned strings are
//! materialized into `String`s immediately so no borrowed pointer escapes
//! the module. Callers above this layer never see a raw pointer.
//!
//! libclang itself is loaded at runtime (`clang-sys` with the `runtime`
//! feature), so the crate builds and its pure logic tests run on machines
//! without libclang installed.

mod cursor;
mod unit;

use std::ffi::CStr;
use std::sync::Arc;

use clang_sys::*;
use once_cell::sync::{Lazy, OnceCell};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

pub use cursor::Cursor;
pub use unit::ParsedUnit;

/// Failure to obtain a parsed translation unit.
///
/// The only fatal error in the crate; everything else degrades to empty
/// results.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("libclang is unavailable: {0}")]
    Library(String),
    #[error("libclang returned no translation unit for `{filename}`")]
    NullUnit { filename: String },
}

/// A libclang index, shared by every translation unit parsed against it.
pub struct Index {
    raw: CXIndex,
}

// libclang permits concurrent use of one index from multiple threads as long
// as each translation unit is externally serialized, which the unit mutex in
// `tu` guarantees.
unsafe impl Send for Index {}
unsafe impl Sync for Index {}

impl Index {
    fn new() -> Result<Self, ParseError> {
        ensure_loaded()?;
        // Exclude declarations from the PCH; diagnostics go through
        // `tracing`, not libclang's stderr printer.
        let raw = unsafe { clang_createIndex(1, 0) };
        if raw.is_null() {
            return Err(ParseError::Library("clang_createIndex returned null".into()));
        }
        Ok(Self {
            raw,
        })
    }

    pub(crate) fn raw(&self) -> CXIndex {
        self.raw
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        unsafe { clang_disposeIndex(self.raw) };
    }
}

static SHARED_INDEX: Lazy<Mutex<Option<Arc<Index>>>> = Lazy::new(|| Mutex::new(None));

/// The process-wide index singleton, created lazily on first use.
pub fn shared_index() -> Result<Arc<Index>, ParseError> {
    let mut slot = SHARED_INDEX.lock();
    if let Some(index) = slot.as_ref() {
        return Ok(Arc::clone(index));
    }
    let index = Arc::new(Index::new()?);
    *slot = Some(Arc::clone(&index));
    Ok(index)
}

/// Drop the shared index so the next parse starts from a fresh one.
///
/// Units parsed against the old index keep it alive through their own `Arc`
/// until they are themselves evicted; this is what releases cached preambles
/// after a bulk eviction.
pub fn refresh_index() {
    debug!("[clang] refreshing shared index");
    SHARED_INDEX.lock().take();
}

/// Whether libclang could be loaded in this process.
pub fn libclang_available() -> bool {
    ensure_loaded().is_ok()
}

fn ensure_loaded() -> Result<(), ParseError> {
    static LOADED: OnceCell<Result<(), String>> = OnceCell::new();
    LOADED
        .get_or_init(|| {
            if clang_sys::is_loaded() {
                Ok(())
            } else {
                clang_sys::load()
            }
        })
        .clone()
        .map_err(ParseError::Library)
}

/// Materialize a libclang-owned string and release the handle.
pub(crate) fn into_string(string: CXString) -> String {
    let contents = unsafe { clang_getCString(string) };
    let result = if contents.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(contents) }.to_string_lossy().into_owned()
    };
    unsafe { clang_disposeString(string) };
    result
}

/// `path:line:col` of a source location's spelling, if it has a file.
pub(crate) fn location_string(location: CXSourceLocation) -> Option<String> {
    let mut file: CXFile = std::ptr::null_mut();
    let mut line = 0;
    let mut col = 0;
    let mut offset = 0;
    unsafe { clang_getSpellingLocation(location, &mut file, &mut line, &mut col, &mut offset) };
    if file.is_null() {
        return None;
    }
    let name = into_string(unsafe { clang_getFileName(file) });
    (!name.is_empty()).then(|| format!("{name}:{line}:{col}"))
}
