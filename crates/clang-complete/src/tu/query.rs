use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::completion::Completion;

/// Bounded attempt on the slot's own mutex; failure yields empty so the
/// editor loop never blocks here.
const SLOT_LOCK_TIMEOUT: Duration = Duration::from_millis(20);

/// Position that never matches a real request, forcing a fresh query.
const POSITION_SENTINEL: (u32, u32) = (0, 0);

/// Per-unit single-slot pending completion.
///
/// Holds at most one outstanding background completion. Repeat requests at
/// the slot's position join the inflight job (each bounded by its own
/// timeout); requests at a different position while a job is inflight get
/// empty immediately, which is what coalesces keystroke bursts.
pub(crate) struct QuerySlot {
    state: Mutex<SlotState>,
}

struct SlotState {
    line: u32,
    col: u32,
    pending: Option<Receiver<Vec<Completion>>>,
    results: Vec<Completion>,
}

impl QuerySlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                line: POSITION_SENTINEL.0,
                col: POSITION_SENTINEL.1,
                pending: None,
                results: Vec::new(),
            }),
        }
    }

    /// Best-effort completions for `(line, col)` within `timeout`.
    ///
    /// A new position starts `job` on a detached thread only when the slot
    /// is free; the result of a job that outlives its caller's timeout is
    /// kept for the next matching request.
    pub(crate) fn completions<F>(
        &self,
        line: u32,
        col: u32,
        timeout: Duration,
        job: F,
    ) -> Vec<Completion>
    where
        F: FnOnce() -> Vec<Completion> + Send + 'static,
    {
        let Some(mut state) = self.state.try_lock_for(SLOT_LOCK_TIMEOUT) else {
            debug!("[slot] contended, returning no completions");
            return Vec::new();
        };

        if (line, col) != (state.line, state.col) {
            if !state.is_free() {
                // Busy with another position; never queue a second query.
                return Vec::new();
            }
            let (sender, receiver) = mpsc::channel();
            thread::spawn(move || {
                let _ = sender.send(job());
            });
            state.line = line;
            state.col = col;
            state.results.clear();
            state.pending = Some(receiver);
        }

        state.drain(timeout);
        state.results.clone()
    }
}

impl SlotState {
    /// True when no job is inflight; a finished job is drained first.
    fn is_free(&mut self) -> bool {
        let Some(receiver) = &self.pending else {
            return true;
        };
        match receiver.try_recv() {
            Ok(results) => {
                self.deliver(results);
                true
            }
            Err(TryRecvError::Empty) => false,
            Err(TryRecvError::Disconnected) => {
                self.deliver(Vec::new());
                true
            }
        }
    }

    /// Wait up to `timeout` for the inflight job and cache its result.
    fn drain(
        &mut self,
        timeout: Duration,
    ) {
        let Some(receiver) = &self.pending else {
            return;
        };
        match receiver.recv_timeout(timeout) {
            Ok(results) => self.deliver(results),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => self.deliver(Vec::new()),
        }
    }

    fn deliver(
        &mut self,
        results: Vec<Completion>,
    ) {
        self.pending = None;
        if results.is_empty() {
            // Let the next request at the same position query again.
            (self.line, self.col) = POSITION_SENTINEL;
        }
        self.results = results;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn completion(display: &str) -> Completion {
        Completion {
            priority: 1,
            display: format!("{display}\t"),
            replacement: display.to_string(),
        }
    }

    fn counted_job(
        calls: &Arc<AtomicUsize>,
        delay: Duration,
        results: Vec<Completion>,
    ) -> impl FnOnce() -> Vec<Completion> + Send + 'static {
        let calls = Arc::clone(calls);
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(delay);
            results
        }
    }

    #[test]
    fn zero_timeout_schedules_work_and_returns_empty() {
        let slot = QuerySlot::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = slot.completions(
            3,
            7,
            Duration::ZERO,
            counted_job(&calls, Duration::from_millis(30), vec![completion("apple")]),
        );
        assert!(first.is_empty(), "first call at a new position must not block on the parser");

        // Same position, generous timeout: joins the inflight job instead of
        // spawning a second one.
        let second = slot.completions(
            3,
            7,
            Duration::from_secs(5),
            counted_job(&calls, Duration::ZERO, vec![completion("never")]),
        );
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].replacement, "apple");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "exactly one job per inflight window");
    }

    #[test]
    fn repeated_requests_reuse_the_delivered_result() {
        let slot = QuerySlot::new();
        let calls = Arc::new(AtomicUsize::new(0));

        slot.completions(2, 4, Duration::from_secs(5), counted_job(&calls, Duration::ZERO, vec![completion("apple")]));
        let again = slot.completions(
            2,
            4,
            Duration::from_secs(5),
            counted_job(&calls, Duration::ZERO, vec![completion("other")]),
        );

        assert_eq!(again[0].replacement, "apple");
        assert_eq!(calls.load(Ordering::SeqCst), 1, "cached result must not trigger a new query");
    }

    #[test]
    fn different_position_while_inflight_returns_empty() {
        let slot = QuerySlot::new();
        let calls = Arc::new(AtomicUsize::new(0));

        slot.completions(1, 2, Duration::ZERO, counted_job(&calls, Duration::from_millis(100), vec![completion("a")]));
        let other = slot.completions(
            9,
            9,
            Duration::from_secs(5),
            counted_job(&calls, Duration::ZERO, vec![completion("b")]),
        );

        assert!(other.is_empty(), "a different position must not cancel or queue behind the inflight job");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn empty_delivery_resets_the_position() {
        let slot = QuerySlot::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let empty = slot.completions(5, 6, Duration::from_secs(5), counted_job(&calls, Duration::ZERO, Vec::new()));
        assert!(empty.is_empty());

        // Identical request after an empty delivery queries again.
        slot.completions(5, 6, Duration::ZERO, counted_job(&calls, Duration::from_millis(10), Vec::new()));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn slow_job_result_lands_for_the_next_matching_request() {
        let slot = QuerySlot::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = slot.completions(
            8,
            1,
            Duration::from_millis(1),
            counted_job(&calls, Duration::from_millis(50), vec![completion("late")]),
        );
        assert!(first.is_empty(), "timeout expired before the job finished");

        thread::sleep(Duration::from_millis(120));
        let second = slot.completions(8, 1, Duration::from_millis(500), counted_job(&calls, Duration::ZERO, Vec::new()));
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].replacement, "late");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
