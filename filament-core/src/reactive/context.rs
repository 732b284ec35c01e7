//! Tracking Context
//!
//! The tracking context records which effect is currently evaluating. This
//! enables automatic dependency registration: when a signal is read, the
//! signal asks the context for the active effect and adds it to its own
//! subscriber set.
//!
//! # Implementation
//!
//! A thread-local stack tracks the currently executing effect. Entering a
//! context (running an effect) pushes an entry; the guard pops it on drop,
//! so the stack stays balanced even on early returns. Nested entries are
//! supported: an effect that creates another effect during its run tracks
//! only the innermost one.
//!
//! [`untrack`] pushes a pause entry instead, under which signal reads do
//! not register anybody.

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identity token for a subscriber (an effect).
///
/// Signals store these rather than effect references; the runtime registry
/// resolves them at notification time, which is what makes lazy pruning of
/// destroyed effects possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContextEntry {
    Tracking(SubscriberId),
    Paused,
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops its context entry when dropped.
pub struct TrackingGuard {
    entry: ContextEntry,
}

impl TrackingGuard {
    /// Enter a tracking context for the given subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        let entry = ContextEntry::Tracking(subscriber_id);
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(entry));
        Self { entry }
    }

    /// Enter a paused context: reads under it register nobody.
    pub fn pause() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(ContextEntry::Paused));
        Self { entry: ContextEntry::Paused }
    }
}

impl Drop for TrackingGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            debug_assert_eq!(
                popped,
                Some(self.entry),
                "tracking context mismatch: guards dropped out of order"
            );
        });
    }
}

/// The effect currently evaluating, if any.
pub fn current_subscriber() -> Option<SubscriberId> {
    CONTEXT_STACK.with(|stack| match stack.borrow().last() {
        Some(ContextEntry::Tracking(id)) => Some(*id),
        _ => None,
    })
}

/// Whether any tracking context is active (and not paused).
pub fn is_tracking() -> bool {
    current_subscriber().is_some()
}

/// Run `f` without registering any dependencies, even inside an effect.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _guard = TrackingGuard::pause();
    f()
}
