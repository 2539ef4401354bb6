use std::marker::PhantomData;

use clang_sys::*;

use super::{ParsedUnit, into_string, location_string};

/// A lightweight view over a libclang cursor.
///
/// Borrowed from the unit it was resolved against; used only transiently to
/// produce location strings, type names, or reference sets, never stored
/// beyond the call that acquired it.
#[derive(Clone, Copy)]
pub struct Cursor<'tu> {
    raw: CXCursor,
    _unit: PhantomData<&'tu ParsedUnit>,
}

impl<'tu> Cursor<'tu> {
    pub(crate) fn from_raw(raw: CXCursor) -> Self {
        Self {
            raw,
            _unit: PhantomData,
        }
    }

    pub(crate) fn raw(&self) -> CXCursor {
        self.raw
    }

    pub fn is_inclusion_directive(&self) -> bool {
        unsafe { clang_getCursorKind(self.raw) == CXCursor_InclusionDirective }
    }

    /// The cursor this one refers to, e.g. the declaration behind a use.
    pub fn referenced(&self) -> Option<Cursor<'tu>> {
        let raw = unsafe { clang_getCursorReferenced(self.raw) };
        (unsafe { clang_Cursor_isNull(raw) } == 0).then(|| Self::from_raw(raw))
    }

    /// `path:line:col` of the cursor's spelling location.
    pub fn location_string(&self) -> Option<String> {
        location_string(unsafe { clang_getCursorLocation(self.raw) })
    }

    /// For an inclusion directive, the path of the included file.
    pub fn included_file(&self) -> Option<String> {
        let file = unsafe { clang_getIncludedFile(self.raw) };
        if file.is_null() {
            return None;
        }
        let name = into_string(unsafe { clang_getFileName(file) });
        (!name.is_empty()).then_some(name)
    }

    /// Canonical spelling of the cursor's type.
    pub fn canonical_type(&self) -> String {
        into_string(unsafe { clang_getTypeSpelling(clang_getCanonicalType(clang_getCursorType(self.raw))) })
    }

    /// The cursor itself plus, for an overloaded-declaration reference,
    /// every overloaded declaration it names.
    pub fn with_overloads(self) -> Vec<Cursor<'tu>> {
        let mut targets = vec![self];
        if unsafe { clang_getCursorKind(self.raw) } == CXCursor_OverloadedDeclRef {
            let count = unsafe { clang_getNumOverloadedDecls(self.raw) };
            for i in 0..count {
                let raw = unsafe { clang_getOverloadedDecl(self.raw, i) };
                if unsafe { clang_Cursor_isNull(raw) } == 0 {
                    targets.push(Self::from_raw(raw));
                }
            }
        }
        targets
    }
}
