use std::ffi::{CStr, CString, c_char, c_int, c_ulong, c_void};
use std::ptr;
use std::sync::Arc;

use clang_sys::*;
use tracing::{debug, warn};

use super::{Cursor, Index, ParseError, into_string, location_string};
use crate::completion::{Chunk, ChunkKind, RawCompletion};

// Parse-time options govern the unit for every later reparse: keep the
// preprocessing record, cache completion results, and build a precompiled
// preamble so keystroke-frequency completion stays cheap.
const PARSE_OPTIONS: CXTranslationUnit_Flags = CXTranslationUnit_DetailedPreprocessingRecord
    | CXTranslationUnit_IncludeBriefCommentsInCodeCompletion
    | CXTranslationUnit_Incomplete
    | CXTranslationUnit_PrecompiledPreamble
    | CXTranslationUnit_CacheCompletionResults;

const COMPLETE_OPTIONS: CXCodeComplete_Flags =
    CXCodeComplete_IncludeMacros | CXCodeComplete_IncludeCodePatterns | CXCodeComplete_IncludeBriefComments;

/// One parsed translation unit, exclusively owned by its
/// [`TranslationUnit`](crate::tu::TranslationUnit).
///
/// Not internally synchronized: the owner serializes every call through its
/// unit mutex, which is also what makes the `Send` impl sound.
pub struct ParsedUnit {
    raw: CXTranslationUnit,
    filename: CString,
    // Keeps the shared index alive for as long as any unit parsed against
    // it exists, including across `refresh_index`.
    _index: Arc<Index>,
}

unsafe impl Send for ParsedUnit {}

impl ParsedUnit {
    /// Parse `filename` with the given compile arguments.
    pub fn parse(
        index: Arc<Index>,
        filename: &str,
        args: &[String],
    ) -> Result<Self, ParseError> {
        let null_unit = || ParseError::NullUnit {
            filename: filename.to_string(),
        };
        let filename_c = CString::new(filename).map_err(|_| null_unit())?;
        let arg_storage: Vec<CString> =
            args.iter().filter_map(|arg| CString::new(arg.as_str()).ok()).collect();
        let arg_ptrs: Vec<*const c_char> = arg_storage.iter().map(|arg| arg.as_ptr()).collect();

        let raw = unsafe {
            clang_parseTranslationUnit(
                index.raw(),
                filename_c.as_ptr(),
                arg_ptrs.as_ptr(),
                arg_ptrs.len() as c_int,
                ptr::null_mut(),
                0,
                PARSE_OPTIONS,
            )
        };
        if raw.is_null() {
            return Err(null_unit());
        }

        debug!("[clang] parsed {filename}");
        Ok(Self {
            raw,
            filename: filename_c,
            _index: index,
        })
    }

    /// Blocking reparse. `buffer` replaces the in-memory contents of the
    /// unit's own file; absent, the on-disk contents are used.
    pub fn reparse(
        &mut self,
        buffer: Option<&[u8]>,
    ) {
        let options = unsafe { clang_defaultReparseOptions(self.raw) };
        let status = match buffer {
            Some(bytes) => {
                let mut unsaved = self.unsaved_file(bytes);
                unsafe { clang_reparseTranslationUnit(self.raw, 1, &mut unsaved, options) }
            }
            None => unsafe { clang_reparseTranslationUnit(self.raw, 0, ptr::null_mut(), options) },
        };
        if status != 0 {
            warn!("[clang] reparse failed for {}", self.filename_lossy());
        }
    }

    /// Blocking code completion at `(line, col)`, 1-based.
    ///
    /// Records are fully materialized before the libclang result set is
    /// released; a null result set is "no results".
    pub fn complete_at(
        &mut self,
        line: u32,
        col: u32,
        buffer: Option<&[u8]>,
    ) -> Vec<RawCompletion> {
        let raw = match buffer {
            Some(bytes) => {
                let mut unsaved = self.unsaved_file(bytes);
                unsafe {
                    clang_codeCompleteAt(self.raw, self.filename.as_ptr(), line, col, &mut unsaved, 1, COMPLETE_OPTIONS)
                }
            }
            None => unsafe {
                clang_codeCompleteAt(self.raw, self.filename.as_ptr(), line, col, ptr::null_mut(), 0, COMPLETE_OPTIONS)
            },
        };
        if raw.is_null() {
            debug!("[clang] no completion results at {}:{line}:{col}", self.filename_lossy());
            return Vec::new();
        }
        CodeCompleteResults {
            raw,
        }
        .collect()
    }

    /// Formatted diagnostics with severity above "ignored".
    pub fn diagnostics(&self) -> Vec<String> {
        let count = unsafe { clang_getNumDiagnostics(self.raw) };
        let mut formatted = Vec::with_capacity(count as usize);
        for i in 0..count {
            let diagnostic = Diagnostic {
                raw: unsafe { clang_getDiagnostic(self.raw, i) },
            };
            if diagnostic.raw.is_null() {
                continue;
            }
            if unsafe { clang_getDiagnosticSeverity(diagnostic.raw) } == CXDiagnostic_Ignored {
                continue;
            }
            let options = unsafe { clang_defaultDiagnosticDisplayOptions() };
            formatted.push(into_string(unsafe { clang_formatDiagnostic(diagnostic.raw, options) }));
        }
        formatted
    }

    /// The cursor at `(line, col)` in `path`, or `None` for a null cursor.
    pub fn cursor_at(
        &self,
        path: &str,
        line: u32,
        col: u32,
    ) -> Option<Cursor<'_>> {
        let path_c = CString::new(path).ok()?;
        let file = unsafe { clang_getFile(self.raw, path_c.as_ptr()) };
        if file.is_null() {
            return None;
        }
        let location = unsafe { clang_getLocation(self.raw, file, line, col) };
        let raw = unsafe { clang_getCursor(self.raw, location) };
        (unsafe { clang_Cursor_isNull(raw) } == 0).then(|| Cursor::from_raw(raw))
    }

    /// Invoke `visitor` for every reference to `cursor` within `path`.
    ///
    /// The closure is carried through a type-erased pointer for the duration
    /// of the libclang call only; the second argument is the reference's
    /// `path:line:col`.
    pub fn find_references<F>(
        &self,
        cursor: Cursor<'_>,
        path: &str,
        mut visitor: F,
    ) where
        F: FnMut(Cursor<'_>, Option<String>),
    {
        let Ok(path_c) = CString::new(path) else {
            return;
        };
        let file = unsafe { clang_getFile(self.raw, path_c.as_ptr()) };
        if file.is_null() {
            debug!("[clang] find_references: `{path}` is not part of this unit");
            return;
        }

        let mut raw_visitor: &mut dyn FnMut(CXCursor, CXSourceRange) = &mut |raw, range| {
            let location = location_string(unsafe { clang_getRangeStart(range) });
            visitor(Cursor::from_raw(raw), location);
        };
        let visitor_object = CXCursorAndRangeVisitor {
            context: (&mut raw_visitor) as *mut _ as *mut c_void,
            visit: Some(visit_reference),
        };
        unsafe { clang_findReferencesInFile(cursor.raw(), file, visitor_object) };
    }

    /// Name/amount pairs from libclang's resource-usage snapshot.
    pub fn resource_usage(&self) -> Vec<(String, u64)> {
        let usage = ResourceUsage {
            raw: unsafe { clang_getCXTUResourceUsage(self.raw) },
        };
        if usage.raw.entries.is_null() || usage.raw.numEntries == 0 {
            return Vec::new();
        }
        let entries = unsafe { std::slice::from_raw_parts(usage.raw.entries, usage.raw.numEntries as usize) };
        entries
            .iter()
            .filter_map(|entry| {
                let name = unsafe { clang_getTUResourceUsageName(entry.kind) };
                if name.is_null() {
                    return None;
                }
                let name = unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned();
                Some((name, entry.amount as u64))
            })
            .collect()
    }

    fn unsaved_file(
        &self,
        bytes: &[u8],
    ) -> CXUnsavedFile {
        CXUnsavedFile {
            Filename: self.filename.as_ptr(),
            Contents: bytes.as_ptr() as *const c_char,
            Length: bytes.len() as c_ulong,
        }
    }

    fn filename_lossy(&self) -> String {
        self.filename.to_string_lossy().into_owned()
    }
}

impl Drop for ParsedUnit {
    fn drop(&mut self) {
        unsafe { clang_disposeTranslationUnit(self.raw) };
    }
}

extern "C" fn visit_reference(
    context: *mut c_void,
    cursor: CXCursor,
    range: CXSourceRange,
) -> CXVisitorResult {
    // `context` points at the caller's closure for exactly the duration of
    // `clang_findReferencesInFile`.
    let callback = unsafe { &mut *(context as *mut &mut dyn FnMut(CXCursor, CXSourceRange)) };
    callback(cursor, range);
    CXVisit_Continue
}

/// Scoped code-complete result set; released on every exit path.
struct CodeCompleteResults {
    raw: *mut CXCodeCompleteResults,
}

impl CodeCompleteResults {
    fn collect(&self) -> Vec<RawCompletion> {
        let (results, count) = unsafe { ((*self.raw).Results, (*self.raw).NumResults) };
        if results.is_null() || count == 0 {
            return Vec::new();
        }
        let records = unsafe { std::slice::from_raw_parts(results, count as usize) };
        records
            .iter()
            .map(|record| {
                let string = record.CompletionString;
                let chunk_count = unsafe { clang_getNumCompletionChunks(string) };
                let chunks = (0..chunk_count)
                    .map(|i| {
                        Chunk::new(
                            chunk_kind(unsafe { clang_getCompletionChunkKind(string, i) }),
                            into_string(unsafe { clang_getCompletionChunkText(string, i) }),
                        )
                    })
                    .collect();
                RawCompletion {
                    constructor: record.CursorKind == CXCursor_Constructor,
                    available: unsafe { clang_getCompletionAvailability(string) } == CXAvailability_Available,
                    priority: unsafe { clang_getCompletionPriority(string) } as u32,
                    chunks,
                }
            })
            .collect()
    }
}

impl Drop for CodeCompleteResults {
    fn drop(&mut self) {
        unsafe { clang_disposeCodeCompleteResults(self.raw) };
    }
}

/// Scoped diagnostic handle.
struct Diagnostic {
    raw: CXDiagnostic,
}

impl Drop for Diagnostic {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            unsafe { clang_disposeDiagnostic(self.raw) };
        }
    }
}

/// Scoped resource-usage snapshot.
struct ResourceUsage {
    raw: CXTUResourceUsage,
}

impl Drop for ResourceUsage {
    fn drop(&mut self) {
        unsafe { clang_disposeCXTUResourceUsage(self.raw) };
    }
}

fn chunk_kind(kind: CXCompletionChunkKind) -> ChunkKind {
    match kind {
        CXCompletionChunk_TypedText => ChunkKind::TypedText,
        CXCompletionChunk_Placeholder => ChunkKind::Placeholder,
        CXCompletionChunk_ResultType => ChunkKind::ResultType,
        CXCompletionChunk_Text => ChunkKind::Text,
        CXCompletionChunk_Informative => ChunkKind::Informative,
        CXCompletionChunk_Equal => ChunkKind::Equal,
        CXCompletionChunk_CurrentParameter => ChunkKind::CurrentParameter,
        CXCompletionChunk_Colon => ChunkKind::Colon,
        CXCompletionChunk_Comma => ChunkKind::Comma,
        CXCompletionChunk_SemiColon => ChunkKind::SemiColon,
        CXCompletionChunk_Optional => ChunkKind::Optional,
        CXCompletionChunk_HorizontalSpace | CXCompletionChunk_VerticalSpace => ChunkKind::Whitespace,
        // Parens, brackets, braces, angle brackets.
        _ => ChunkKind::Punctuation,
    }
}
