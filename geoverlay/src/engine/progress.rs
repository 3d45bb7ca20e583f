//! Progress-hook registry bridging engine callbacks to application code.
//!
//! Native geometry libraries report progress through a C-style hook
//! carrying an opaque token. Instead of smuggling pointers through that
//! token, calls register a closure in a process-wide concurrent map
//! keyed by a generated id: insert before the native call, remove when
//! the handle drops. Tokens are never reused, so a stale token simply
//! finds no entry and the call continues uncancelled.

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// Callback invoked with `(fraction_complete, message)`; returning
/// `false` requests cancellation.
pub type ProgressFn = dyn Fn(f64, &str) -> bool + Send + Sync;

/// What a progress report should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressReply {
    Continue,
    Cancel,
}

/// Cooperative cancellation flag shared between the aggregator and
/// every in-flight engine call of one job.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

struct ProgressEntry {
    callback: Arc<ProgressFn>,
    cancel: CancelFlag,
}

static REGISTRY: OnceLock<DashMap<u64, ProgressEntry>> = OnceLock::new();
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

fn registry() -> &'static DashMap<u64, ProgressEntry> {
    REGISTRY.get_or_init(DashMap::new)
}

/// Registration of one engine call's progress hook.
///
/// Creating a handle inserts the callback into the process-wide map;
/// dropping it removes the entry, guaranteeing scoped release even when
/// the engine call fails.
pub struct ProgressHandle {
    token: u64,
}

impl ProgressHandle {
    /// Registers `callback` under a fresh token, wired to `cancel`.
    pub fn register(callback: Arc<ProgressFn>, cancel: CancelFlag) -> Self {
        let token = NEXT_TOKEN.fetch_add(1, Ordering::Relaxed);
        registry().insert(token, ProgressEntry { callback, cancel });
        Self { token }
    }

    /// The opaque token an engine threads through its native hook.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Reports progress on this handle's own token.
    pub fn report(&self, fraction: f64, message: &str) -> ProgressReply {
        report(self.token, fraction, message)
    }

    /// True once the owning job has requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        registry()
            .get(&self.token)
            .map(|e| e.cancel.is_cancelled())
            .unwrap_or(false)
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        registry().remove(&self.token);
    }
}

/// Dispatches a progress report for `token`.
///
/// Unknown tokens reply `Continue`: the entry was already removed, so
/// there is nobody left to cancel for. A `false` callback return sets
/// the job's cancel flag so every sibling call observes it too.
pub fn report(token: u64, fraction: f64, message: &str) -> ProgressReply {
    // Clone the entry out so no map guard is held while the callback
    // runs; a callback may itself register or drop handles.
    let (callback, cancel) = match registry().get(&token) {
        Some(entry) => (Arc::clone(&entry.callback), entry.cancel.clone()),
        None => return ProgressReply::Continue,
    };

    if cancel.is_cancelled() {
        return ProgressReply::Cancel;
    }

    if callback(fraction, message) {
        ProgressReply::Continue
    } else {
        cancel.cancel();
        ProgressReply::Cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_report_reaches_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);
        let handle = ProgressHandle::register(
            Arc::new(move |fraction, message| {
                assert_eq!(fraction, 0.5);
                assert_eq!(message, "halfway");
                calls_in.fetch_add(1, Ordering::SeqCst);
                true
            }),
            CancelFlag::new(),
        );

        assert_eq!(handle.report(0.5, "halfway"), ProgressReply::Continue);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_false_return_sets_shared_flag() {
        let cancel = CancelFlag::new();
        let handle = ProgressHandle::register(Arc::new(|_, _| false), cancel.clone());

        assert_eq!(handle.report(0.1, ""), ProgressReply::Cancel);
        assert!(cancel.is_cancelled());
        // Subsequent reports short-circuit on the flag.
        assert_eq!(handle.report(0.2, ""), ProgressReply::Cancel);
    }

    #[test]
    fn test_drop_removes_entry() {
        let handle = ProgressHandle::register(Arc::new(|_, _| true), CancelFlag::new());
        let token = handle.token();
        drop(handle);
        assert_eq!(report(token, 0.9, "late"), ProgressReply::Continue);
    }

    #[test]
    fn test_callback_may_use_registry_reentrantly() {
        // A callback that registers and drops another handle must not
        // block on the registry from inside its own dispatch.
        let handle = ProgressHandle::register(
            Arc::new(|_, _| {
                let inner = ProgressHandle::register(Arc::new(|_, _| true), CancelFlag::new());
                let reply = inner.report(1.0, "nested");
                reply == ProgressReply::Continue
            }),
            CancelFlag::new(),
        );

        assert_eq!(handle.report(0.5, "outer"), ProgressReply::Continue);
    }

    #[test]
    fn test_external_cancel_observed() {
        let cancel = CancelFlag::new();
        let handle = ProgressHandle::register(Arc::new(|_, _| true), cancel.clone());
        assert!(!handle.is_cancelled());
        cancel.cancel();
        assert!(handle.is_cancelled());
        assert_eq!(handle.report(0.3, ""), ProgressReply::Cancel);
    }
}
