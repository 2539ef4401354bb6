//! Process-wide registry of translation units.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::clang;
use crate::tu::TranslationUnit;

/// Map from canonical filename to shared translation unit.
///
/// Filename canonicalization is the caller's responsibility. The map mutex
/// is the outer lock of the crate's only two-lock order (registry → unit).
pub struct Registry {
    units: Mutex<HashMap<String, Arc<TranslationUnit>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            units: Mutex::new(HashMap::new()),
        }
    }

    /// Look up `filename`, creating and inserting a unit with `args` when
    /// absent.
    ///
    /// The registry mutex is acquired under a bounded wait when a timeout is
    /// given; expiry yields `None` and the caller surfaces an empty result.
    /// Creation is synchronous, so the first request for a file pays the
    /// initial parse.
    pub fn get_or_create(
        &self,
        filename: &str,
        args: &[String],
        timeout: Option<Duration>,
    ) -> Option<Arc<TranslationUnit>> {
        let mut units = match timeout {
            Some(timeout) => match self.units.try_lock_for(timeout) {
                Some(units) => units,
                None => {
                    debug!("[registry] lock timed out for {filename}");
                    return None;
                }
            },
            None => self.units.lock(),
        };

        if let Some(tu) = units.get(filename) {
            return Some(Arc::clone(tu));
        }

        match TranslationUnit::create(filename, args) {
            Ok(tu) => {
                units.insert(filename.to_string(), Arc::clone(&tu));
                Some(tu)
            }
            Err(err) => {
                warn!("[registry] {err}");
                None
            }
        }
    }

    /// Drop one unit on a detached thread so the editor never blocks behind
    /// teardown.
    pub fn evict(
        &self,
        filename: &str,
    ) {
        let removed = self.units.lock().remove(filename);
        if let Some(tu) = removed {
            debug!("[registry] evicting {filename}");
            thread::spawn(move || drop(tu));
        }
    }

    /// Drop every unit and replace the shared libclang index, releasing
    /// cached preambles.
    pub fn evict_all(&self) {
        let drained: Vec<Arc<TranslationUnit>> = {
            let mut units = self.units.lock();
            units.drain().map(|(_, tu)| tu).collect()
        };
        if !drained.is_empty() {
            debug!("[registry] evicting {} units", drained.len());
            thread::spawn(move || drop(drained));
        }
        clang::refresh_index();
    }

    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.lock().is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

/// The process-wide registry used by the ABI bridge.
pub fn global() -> &'static Registry {
    &REGISTRY
}
