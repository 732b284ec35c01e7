//! Batched Notification
//!
//! Setters normally notify synchronously. Inside a [`batch`] block they
//! instead enqueue the affected effects, deduplicated and in first-touch
//! order, and the outermost batch flushes the queue once when the block
//! exits. Each effect runs a single time and reads final values, trading
//! immediacy for fewer redundant recomputations.
//!
//! Effects that write signals during the flush enqueue further work; the
//! flusher drains in rounds until quiet, with a round cap as a safety
//! valve against write loops.

use std::cell::RefCell;

use indexmap::IndexSet;
use tracing::error;

use super::context::SubscriberId;
use super::runtime;

/// Maximum flush rounds before the batch gives up on a write loop.
const MAX_FLUSH_ROUNDS: u32 = 1000;

thread_local! {
    static PENDING: RefCell<Option<IndexSet<SubscriberId>>> = const { RefCell::new(None) };
}

/// Queue a subscriber for the active batch. Returns false when no batch is
/// active, in which case the caller notifies synchronously.
pub(crate) fn enqueue(id: SubscriberId) -> bool {
    PENDING.with(|pending| match &mut *pending.borrow_mut() {
        Some(queue) => {
            queue.insert(id);
            true
        }
        None => false,
    })
}

/// Run `f` with notification batching. Nested calls join the outermost
/// batch; only the outermost flushes.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let is_outermost = PENDING.with(|pending| {
        let mut pending = pending.borrow_mut();
        if pending.is_none() {
            *pending = Some(IndexSet::new());
            true
        } else {
            false
        }
    });

    let result = f();

    if is_outermost {
        flush();
        PENDING.with(|pending| *pending.borrow_mut() = None);
    }

    result
}

fn flush() {
    for _round in 0..MAX_FLUSH_ROUNDS {
        let ids: Vec<SubscriberId> = PENDING.with(|pending| {
            pending
                .borrow_mut()
                .as_mut()
                .map(|queue| queue.drain(..).collect())
                .unwrap_or_default()
        });
        if ids.is_empty() {
            return;
        }
        for id in ids {
            runtime::run(id);
        }
    }
    error!("batch flush exceeded round limit; possible infinite update loop; bailing out");
    PENDING.with(|pending| {
        if let Some(queue) = pending.borrow_mut().as_mut() {
            queue.clear();
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{create_signal, Effect};
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn batch_coalesces_notifications() {
        let (count, set_count) = create_signal(0);
        let runs = Arc::new(AtomicI32::new(0));
        let seen = Arc::new(AtomicI32::new(-1));

        let runs_clone = runs.clone();
        let seen_clone = seen.clone();
        let _effect = Effect::new(move |_scope| {
            seen_clone.store(count.get(), Ordering::SeqCst);
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        batch(|| {
            set_count.set(1);
            set_count.set(2);
            set_count.set(3);
            // nothing has run yet
            assert_eq!(runs.load(Ordering::SeqCst), 1);
        });

        // one run, with the final value
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn nested_batches_flush_once() {
        let (count, set_count) = create_signal(0);
        let runs = Arc::new(AtomicI32::new(0));

        let runs_clone = runs.clone();
        let _effect = Effect::new(move |_scope| {
            let _ = count.get();
            runs_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        batch(|| {
            set_count.set(1);
            batch(|| {
                set_count.set(2);
            });
            // inner batch did not flush
            assert_eq!(runs.load(Ordering::SeqCst), 1);
        });
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn batch_returns_the_closure_result() {
        assert_eq!(batch(|| 7), 7);
    }
}
