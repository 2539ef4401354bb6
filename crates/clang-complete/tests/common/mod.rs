#![allow(dead_code)]

use std::ffi::{CStr, CString, c_char};
use std::path::{Path, PathBuf};
use std::ptr;

use clang_complete::abi;

/// Whether libclang can be loaded in this process. Suites that need the
/// real parser return early when it cannot, mirroring how the crate itself
/// degrades.
pub fn libclang_available() -> bool {
    clang_complete::clang::libclang_available()
}

pub const DEFAULT_ARGS: &[&str] = &["-std=c++11", "-x", "c++"];

/// A temp directory of source files that lives for the duration of a test.
pub struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create fixture dir"),
        }
    }

    pub fn write(
        &self,
        name: &str,
        contents: &str,
    ) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("write fixture file");
        path
    }

    pub fn path(
        &self,
        name: &str,
    ) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// 1-based `(line, col)` of the position immediately after the first
/// occurrence of `needle`.
pub fn position_after(
    source: &str,
    needle: &str,
) -> (u32, u32) {
    let idx = source.find(needle).expect("needle must occur in source") + needle.len();
    let before = &source[..idx];
    let line = before.bytes().filter(|&b| b == b'\n').count() as u32 + 1;
    let col = match before.rfind('\n') {
        Some(newline) => (idx - newline - 1) as u32 + 1,
        None => idx as u32 + 1,
    };
    (line, col)
}

/// 1-based `(line, col)` of the first character of the first occurrence of
/// `needle`.
pub fn position_of(
    source: &str,
    needle: &str,
) -> (u32, u32) {
    let (line, col) = position_after(source, needle);
    (line, col - needle.len() as u32)
}

pub struct CArgs {
    storage: Vec<CString>,
    ptrs: Vec<*const c_char>,
}

impl CArgs {
    pub fn new(args: &[&str]) -> Self {
        let storage: Vec<CString> = args.iter().map(|arg| CString::new(*arg).unwrap()).collect();
        let ptrs = storage.iter().map(|arg| arg.as_ptr()).collect();
        Self {
            storage,
            ptrs,
        }
    }

    pub fn as_ptr(&self) -> *const *const c_char {
        self.ptrs.as_ptr()
    }

    pub fn count(&self) -> i32 {
        self.ptrs.len() as i32
    }
}

fn c_path(path: &Path) -> CString {
    CString::new(path.to_str().expect("fixture paths are valid UTF-8")).unwrap()
}

/// Drain a string-list handle into owned strings and free it.
pub fn read_list(handle: u32) -> Vec<String> {
    let len = abi::string_list_len(handle);
    let mut entries = Vec::with_capacity(len as usize);
    for i in 0..len {
        let entry = abi::string_list_at(handle, i);
        if entry.is_null() {
            continue;
        }
        entries.push(unsafe { CStr::from_ptr(entry) }.to_string_lossy().into_owned());
    }
    abi::string_list_free(handle);
    entries
}

/// Drain a string handle and free it; empty for handle 0.
pub fn read_string(handle: u32) -> String {
    let value = abi::string_value(handle);
    let result = if value.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned()
    };
    abi::string_free(handle);
    result
}

/// One `get_completions` round trip, decoded into
/// `(display, replacement)` pairs.
pub fn complete(
    file: &Path,
    args: &[&str],
    line: u32,
    col: u32,
    prefix: &str,
    timeout_ms: i32,
    buffer: Option<&str>,
) -> Vec<(String, String)> {
    let file_c = c_path(file);
    let args = CArgs::new(args);
    let prefix_c = CString::new(prefix).unwrap();
    let (buffer_ptr, buffer_len) = match buffer {
        Some(text) => (text.as_ptr() as *const c_char, text.len() as u32),
        None => (ptr::null(), 0),
    };

    let handle = unsafe {
        abi::get_completions(
            file_c.as_ptr(),
            args.as_ptr(),
            args.count(),
            line,
            col,
            prefix_c.as_ptr(),
            timeout_ms,
            buffer_ptr,
            buffer_len,
        )
    };
    read_list(handle)
        .into_iter()
        .map(|entry| {
            let (display, replacement) = entry.split_once('\n').unwrap_or((entry.as_str(), ""));
            (display.to_string(), replacement.to_string())
        })
        .collect()
}

/// Poll `get_completions` until it returns something; background parsing
/// makes the first attempts legitimately empty.
pub fn complete_until_nonempty(
    file: &Path,
    args: &[&str],
    line: u32,
    col: u32,
    prefix: &str,
) -> Vec<(String, String)> {
    for _ in 0..40 {
        let results = complete(file, args, line, col, prefix, 2_000, None);
        if !results.is_empty() {
            return results;
        }
        std::thread::sleep(std::time::Duration::from_millis(250));
    }
    panic!("no completions arrived at {line}:{col} with prefix {prefix:?}");
}

pub fn get_definition(
    file: &Path,
    args: &[&str],
    line: u32,
    col: u32,
) -> String {
    let file_c = c_path(file);
    let args = CArgs::new(args);
    let handle = unsafe { abi::get_definition(file_c.as_ptr(), args.as_ptr(), args.count(), line, col) };
    read_string(handle)
}

pub fn get_type(
    file: &Path,
    args: &[&str],
    line: u32,
    col: u32,
) -> String {
    let file_c = c_path(file);
    let args = CArgs::new(args);
    let handle = unsafe { abi::get_type(file_c.as_ptr(), args.as_ptr(), args.count(), line, col) };
    read_string(handle)
}

pub fn find_uses(
    file: &Path,
    args: &[&str],
    line: u32,
    col: u32,
    search_path: Option<&Path>,
) -> Vec<String> {
    let file_c = c_path(file);
    let args = CArgs::new(args);
    let search_c = search_path.map(c_path);
    let search_ptr = search_c.as_ref().map_or(ptr::null(), |s| s.as_ptr());
    let handle = unsafe { abi::find_uses(file_c.as_ptr(), args.as_ptr(), args.count(), line, col, search_ptr) };
    read_list(handle)
}

pub fn get_diagnostics(
    file: &Path,
    args: &[&str],
) -> Vec<String> {
    let file_c = c_path(file);
    let args = CArgs::new(args);
    let handle = unsafe { abi::get_diagnostics(file_c.as_ptr(), args.as_ptr(), args.count()) };
    read_list(handle)
}

pub fn get_usage(
    file: &Path,
    args: &[&str],
) -> Vec<String> {
    let file_c = c_path(file);
    let args = CArgs::new(args);
    let handle = unsafe { abi::get_usage(file_c.as_ptr(), args.as_ptr(), args.count()) };
    read_list(handle)
}

pub fn free_tu(file: &Path) {
    let file_c = c_path(file);
    unsafe { abi::free_tu(file_c.as_ptr()) };
}
