//! The long-lived, serialized translation unit and its query slot.

mod query;

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::clang::{self, ParseError, ParsedUnit};
use crate::completion::{self, Completion};
use crate::config;
use query::QuerySlot;

/// One parsed source file, shared between the registry and any inflight
/// completion workers.
///
/// Every libclang call on the unit goes through the serializing mutex, so at
/// most one executes at any time and all operations on one unit are
/// linearizable. Compile arguments are immutable after creation.
pub struct TranslationUnit {
    filename: String,
    args: Vec<String>,
    unit: Mutex<ParsedUnit>,
    slot: QuerySlot,
}

impl TranslationUnit {
    /// Parse `filename` synchronously, then warm the preamble with an
    /// asynchronous initial reparse.
    pub fn create(
        filename: &str,
        args: &[String],
    ) -> Result<Arc<Self>, ParseError> {
        let unit = ParsedUnit::parse(clang::shared_index()?, filename, args)?;
        let tu = Arc::new(Self {
            filename: filename.to_string(),
            args: args.to_vec(),
            unit: Mutex::new(unit),
            slot: QuerySlot::new(),
        });
        tu.spawn_warm_reparse();
        Ok(tu)
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Serialized blocking reparse; `buffer` is passed through unchanged.
    pub fn reparse(
        &self,
        buffer: Option<&[u8]>,
    ) {
        self.unit.lock().reparse(buffer);
    }

    /// Shaped, prefix-filtered, ordered completions at `(line, col)`.
    ///
    /// The prefix filter here is case-sensitive; the async boundary applies
    /// its own case-insensitive filter on top.
    pub fn complete_at(
        &self,
        line: u32,
        col: u32,
        prefix: &str,
        buffer: Option<&[u8]>,
    ) -> Vec<Completion> {
        let mut unit = self.unit.lock();
        let mut results: Vec<Completion> = unit
            .complete_at(line, col, buffer)
            .iter()
            .filter_map(completion::shape)
            .filter(|c| c.display.starts_with(prefix))
            .collect();
        results.sort();
        if results.is_empty() && config::settings().completion.reparse_on_empty {
            // Perhaps a reparse can rejuvenate the unit for the next attempt.
            unit.reparse(buffer);
        }
        results
    }

    /// Best-effort completions within `timeout`, via the query slot.
    ///
    /// The background job holds only a weak reference, so eviction is never
    /// delayed by an outstanding completion; an evicted unit yields empty.
    pub fn completions_async(
        self: &Arc<Self>,
        line: u32,
        col: u32,
        prefix: &str,
        timeout: Duration,
        buffer: Option<&[u8]>,
    ) -> Vec<Completion> {
        let weak = Arc::downgrade(self);
        let owned_buffer = buffer.map(<[u8]>::to_vec);
        let results = self.slot.completions(line, col, timeout, move || run_completion(weak, line, col, owned_buffer));

        results
            .into_iter()
            .filter(|c| completion::starts_with_ignore_ascii_case(&c.display, prefix))
            .collect()
    }

    /// Formatted non-ignored diagnostics.
    ///
    /// With a timeout, the unit lock is acquired under a bounded wait and
    /// expiry yields an empty sequence.
    pub fn diagnostics(
        &self,
        timeout: Option<Duration>,
    ) -> Vec<String> {
        let unit = match self.lock_unit(timeout) {
            Some(unit) => unit,
            None => {
                debug!("[tu] diagnostics lock timed out for {}", self.filename);
                return Vec::new();
            }
        };
        unit.diagnostics()
    }

    /// `path:line:col` of the definition at `(line, col)`, the included
    /// file's path for an inclusion directive, or the empty string.
    pub fn definition_at(
        &self,
        line: u32,
        col: u32,
    ) -> String {
        let unit = self.unit.lock();
        let Some(cursor) = unit.cursor_at(&self.filename, line, col) else {
            return String::new();
        };
        if let Some(referenced) = cursor.referenced() {
            return referenced.location_string().unwrap_or_default();
        }
        if cursor.is_inclusion_directive() {
            return cursor.included_file().unwrap_or_default();
        }
        String::new()
    }

    /// Canonical type spelling at `(line, col)`, or the empty string.
    pub fn type_at(
        &self,
        line: u32,
        col: u32,
    ) -> String {
        let unit = self.unit.lock();
        unit.cursor_at(&self.filename, line, col).map(|cursor| cursor.canonical_type()).unwrap_or_default()
    }

    /// Ordered `path:line:col` references to the symbol at `(line, col)`
    /// within `path` (the unit's own file when absent), covering every
    /// overloaded declaration the cursor names.
    pub fn find_uses(
        &self,
        line: u32,
        col: u32,
        path: Option<&str>,
    ) -> Vec<String> {
        let unit = self.unit.lock();
        let path = path.unwrap_or(&self.filename);
        let Some(cursor) = unit.cursor_at(&self.filename, line, col) else {
            return Vec::new();
        };

        let mut uses = BTreeSet::new();
        for target in cursor.with_overloads() {
            unit.find_references(target, path, |_reference, location| {
                if let Some(location) = location {
                    uses.insert(location);
                }
            });
        }
        uses.into_iter().collect()
    }

    /// Name/amount pairs from libclang's resource-usage snapshot.
    pub fn resource_usage(&self) -> Vec<(String, u64)> {
        self.unit.lock().resource_usage()
    }

    fn lock_unit(
        &self,
        timeout: Option<Duration>,
    ) -> Option<MutexGuard<'_, ParsedUnit>> {
        match timeout {
            Some(timeout) => self.unit.try_lock_for(timeout),
            None => Some(self.unit.lock()),
        }
    }

    fn spawn_warm_reparse(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        thread::spawn(move || {
            if let Some(tu) = weak.upgrade() {
                tu.reparse(None);
            }
        });
    }
}

/// Body of the detached completion worker: upgrade the weak reference and
/// run the serialized completion with an empty prefix so the cached result
/// set stays unfiltered.
fn run_completion(
    weak: Weak<TranslationUnit>,
    line: u32,
    col: u32,
    buffer: Option<Vec<u8>>,
) -> Vec<Completion> {
    match weak.upgrade() {
        Some(tu) => tu.complete_at(line, col, "", buffer.as_deref()),
        None => {
            debug!("[tu] unit evicted before completion ran");
            Vec::new()
        }
    }
}
