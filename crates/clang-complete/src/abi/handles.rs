//! Process-global owning maps behind the string and string-list handles.

use std::ffi::CString;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use once_cell::sync::Lazy;

/// Owns exported payloads until the editor frees them.
///
/// Handle `0` is reserved as "no string" / "empty list" and is never
/// allocated; a live id is never reused until freed.
pub(crate) struct ExportMap<T> {
    entries: DashMap<u32, T>,
}

impl<T> ExportMap<T> {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert `value` under a fresh id.
    ///
    /// The first candidate derives from the current map size and the payload
    /// type's size (so string and list handles start in different ranges),
    /// then probes upward past live ids and past 0.
    pub(crate) fn insert(
        &self,
        value: T,
    ) -> u32 {
        let mut id = self.entries.len() as u32 + std::mem::size_of::<T>() as u32;
        loop {
            if id == 0 {
                id = 1;
            }
            match self.entries.entry(id) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                    return id;
                }
                Entry::Occupied(_) => id = id.wrapping_add(1),
            }
        }
    }

    /// Run `read` against the payload behind `id`, if it is alive.
    pub(crate) fn with<R>(
        &self,
        id: u32,
        read: impl FnOnce(&T) -> R,
    ) -> Option<R> {
        self.entries.get(&id).map(|entry| read(entry.value()))
    }

    /// Release `id`. Unknown ids are a no-op.
    pub(crate) fn remove(
        &self,
        id: u32,
    ) {
        self.entries.remove(&id);
    }
}

// Pointers handed to the editor point into each CString's heap buffer. The
// buffer address survives both map growth and Vec reallocation (only the
// CString value moves, not its allocation), so a pointer stays valid until
// the matching free removes the entry.
pub(crate) static STRINGS: Lazy<ExportMap<CString>> = Lazy::new(ExportMap::new);
pub(crate) static LISTS: Lazy<ExportMap<Vec<CString>>> = Lazy::new(ExportMap::new);

pub(crate) fn export_string(value: String) -> u32 {
    STRINGS.insert(to_c_string(value))
}

pub(crate) fn export_list(values: impl IntoIterator<Item = String>) -> u32 {
    LISTS.insert(values.into_iter().map(to_c_string).collect())
}

fn to_c_string(value: String) -> CString {
    match CString::new(value) {
        Ok(string) => string,
        Err(err) => {
            // Interior NULs cannot cross the ABI; keep everything before the
            // first one.
            let nul = err.nul_position();
            let mut bytes = err.into_vec();
            bytes.truncate(nul);
            CString::new(bytes).unwrap_or_default()
        }
    }
}
