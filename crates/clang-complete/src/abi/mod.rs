//! The C ABI surface.
//!
//! Results cross the boundary as opaque `u32` handles backed by
//! process-owned maps ([`handles`]); `0` denotes "no string" / "empty
//! list". Every non-zero handle must be released exactly once through the
//! matching free function; freeing an unknown handle is a no-op.
//!
//! Nothing here raises or aborts. Lock timeouts, unknown files, evicted
//! units, and parser failures all collapse to an empty result the editor
//! already knows how to display; details go to the `tracing` log.

mod handles;

use std::ffi::{c_char, c_int, c_uint};
use std::ptr;
use std::time::Duration;

use crate::logging;
use crate::registry;

/// Default bounded wait on the registry for completion and diagnostics
/// requests, which arrive at keystroke frequency.
const REGISTRY_WAIT: Duration = Duration::from_millis(200);

/// Shaped, prefix-filtered, sorted completions at `(line, col)`.
///
/// Entries encode as `"<display>\n<replacement>"`; replacements carry
/// `${N:name}` placeholders numbered from 1 in chunk order. The prefix
/// filter is case-insensitive starts-with on the display text. A `timeout`
/// of 0 never runs the parser synchronously: the first call at a new
/// position returns an empty list and schedules the work.
///
/// # Safety
/// `file` and `prefix` must be null or valid C strings; `args` must point
/// to `argc` valid C strings; `buffer` must be null or valid for `len`
/// bytes. All pointers need only live for the duration of the call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_completions(
    file: *const c_char,
    args: *const *const c_char,
    argc: c_int,
    line: c_uint,
    col: c_uint,
    prefix: *const c_char,
    timeout_ms: c_int,
    buffer: *const c_char,
    len: c_uint,
) -> u32 {
    logging::init();
    let Some(filename) = (unsafe { owned_str(file) }) else {
        return 0;
    };
    let args = unsafe { args_vec(args, argc) };
    let prefix = unsafe { owned_str(prefix) }.unwrap_or_default();
    let buffer = unsafe { buffer_bytes(buffer, len) };

    let Some(tu) = registry::global().get_or_create(&filename, &args, Some(REGISTRY_WAIT)) else {
        return 0;
    };
    let timeout = Duration::from_millis(timeout_ms.max(0) as u64);
    let completions = tu.completions_async(line, col, &prefix, timeout, buffer);
    if completions.is_empty() {
        return 0;
    }
    handles::export_list(completions.iter().map(|c| format!("{}\n{}", c.display, c.replacement)))
}

/// References to the symbol at `(line, col)` within `search_path` (the
/// file itself when null), as `path:line:col` entries.
///
/// # Safety
/// As [`get_completions`]; `search_path` must be null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn find_uses(
    file: *const c_char,
    args: *const *const c_char,
    argc: c_int,
    line: c_uint,
    col: c_uint,
    search_path: *const c_char,
) -> u32 {
    logging::init();
    let Some(filename) = (unsafe { owned_str(file) }) else {
        return 0;
    };
    let args = unsafe { args_vec(args, argc) };
    let search_path = unsafe { owned_str(search_path) };

    let Some(tu) = registry::global().get_or_create(&filename, &args, None) else {
        return 0;
    };
    let uses = tu.find_uses(line, col, search_path.as_deref());
    if uses.is_empty() {
        return 0;
    }
    handles::export_list(uses)
}

/// Reparse from disk, then list formatted diagnostics above "ignored"
/// severity.
///
/// # Safety
/// As [`get_completions`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_diagnostics(
    file: *const c_char,
    args: *const *const c_char,
    argc: c_int,
) -> u32 {
    logging::init();
    let Some(filename) = (unsafe { owned_str(file) }) else {
        return 0;
    };
    let args = unsafe { args_vec(args, argc) };

    let Some(tu) = registry::global().get_or_create(&filename, &args, Some(REGISTRY_WAIT)) else {
        return 0;
    };
    tu.reparse(None);
    let diagnostics = tu.diagnostics(None);
    if diagnostics.is_empty() {
        return 0;
    }
    handles::export_list(diagnostics)
}

/// `path:line:col` of the definition at `(line, col)`, or the included
/// file's bare path when the cursor is an inclusion directive.
///
/// # Safety
/// As [`get_completions`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_definition(
    file: *const c_char,
    args: *const *const c_char,
    argc: c_int,
    line: c_uint,
    col: c_uint,
) -> u32 {
    logging::init();
    let Some(filename) = (unsafe { owned_str(file) }) else {
        return 0;
    };
    let args = unsafe { args_vec(args, argc) };

    let Some(tu) = registry::global().get_or_create(&filename, &args, None) else {
        return 0;
    };
    let definition = tu.definition_at(line, col);
    if definition.is_empty() {
        return 0;
    }
    handles::export_string(definition)
}

/// Canonical type spelling at `(line, col)`.
///
/// # Safety
/// As [`get_completions`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_type(
    file: *const c_char,
    args: *const *const c_char,
    argc: c_int,
    line: c_uint,
    col: c_uint,
) -> u32 {
    logging::init();
    let Some(filename) = (unsafe { owned_str(file) }) else {
        return 0;
    };
    let args = unsafe { args_vec(args, argc) };

    let Some(tu) = registry::global().get_or_create(&filename, &args, None) else {
        return 0;
    };
    let spelling = tu.type_at(line, col);
    if spelling.is_empty() {
        return 0;
    }
    handles::export_string(spelling)
}

/// libclang resource-usage snapshot for the unit, as `name: amount`
/// entries.
///
/// # Safety
/// As [`get_completions`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_usage(
    file: *const c_char,
    args: *const *const c_char,
    argc: c_int,
) -> u32 {
    logging::init();
    let Some(filename) = (unsafe { owned_str(file) }) else {
        return 0;
    };
    let args = unsafe { args_vec(args, argc) };

    let Some(tu) = registry::global().get_or_create(&filename, &args, None) else {
        return 0;
    };
    let usage = tu.resource_usage();
    if usage.is_empty() {
        return 0;
    }
    handles::export_list(usage.into_iter().map(|(name, amount)| format!("{name}: {amount}")))
}

/// Force a reparse with the in-memory buffer (or from disk when null).
///
/// # Safety
/// As [`get_completions`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn reparse(
    file: *const c_char,
    args: *const *const c_char,
    argc: c_int,
    buffer: *const c_char,
    len: c_uint,
) {
    logging::init();
    let Some(filename) = (unsafe { owned_str(file) }) else {
        return;
    };
    let args = unsafe { args_vec(args, argc) };
    let buffer = unsafe { buffer_bytes(buffer, len) };

    if let Some(tu) = registry::global().get_or_create(&filename, &args, None) {
        tu.reparse(buffer);
    }
}

/// Evict one translation unit; teardown happens on a background thread.
///
/// # Safety
/// `file` must be null or a valid C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_tu(file: *const c_char) {
    logging::init();
    if let Some(filename) = unsafe { owned_str(file) } {
        registry::global().evict(&filename);
    }
}

/// Evict every translation unit and refresh the shared libclang index.
#[unsafe(no_mangle)]
pub extern "C" fn free_all() {
    logging::init();
    registry::global().evict_all();
}

// ───────────────────────── handle accessors ─────────────────────────

/// Read a string handle; null for `0` or an unknown handle.
#[unsafe(no_mangle)]
pub extern "C" fn string_value(handle: u32) -> *const c_char {
    handles::STRINGS.with(handle, |s| s.as_ptr()).unwrap_or(ptr::null())
}

/// Release a string handle; unknown handles are a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn string_free(handle: u32) {
    handles::STRINGS.remove(handle);
}

/// Number of entries behind a list handle; 0 for `0` or an unknown handle.
#[unsafe(no_mangle)]
pub extern "C" fn string_list_len(handle: u32) -> c_int {
    handles::LISTS.with(handle, |list| list.len() as c_int).unwrap_or(0)
}

/// Read one entry of a list handle; null when out of range or unknown.
#[unsafe(no_mangle)]
pub extern "C" fn string_list_at(
    handle: u32,
    index: c_int,
) -> *const c_char {
    if index < 0 {
        return ptr::null();
    }
    handles::LISTS.with(handle, |list| list.get(index as usize).map(|s| s.as_ptr())).flatten().unwrap_or(ptr::null())
}

/// Release a list handle; unknown handles are a no-op.
#[unsafe(no_mangle)]
pub extern "C" fn string_list_free(handle: u32) {
    handles::LISTS.remove(handle);
}

// ───────────────────────── pointer conversion ─────────────────────────

unsafe fn owned_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { std::ffi::CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

unsafe fn args_vec(
    args: *const *const c_char,
    argc: c_int,
) -> Vec<String> {
    if args.is_null() || argc <= 0 {
        return Vec::new();
    }
    let ptrs = unsafe { std::slice::from_raw_parts(args, argc as usize) };
    ptrs.iter().filter_map(|&arg| unsafe { owned_str(arg) }).collect()
}

unsafe fn buffer_bytes<'a>(
    buffer: *const c_char,
    len: c_uint,
) -> Option<&'a [u8]> {
    if buffer.is_null() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(buffer as *const u8, len as usize) })
}
